use crate::core::instrument::ClearingInstrument;
use crate::core::participant::NodeId;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

/// Outcome of clearing one edge: the rate it cleared at and the
/// aggregate demand and supply volumes seen on it.
///
/// Handed read-only to [`ResourceExchangeDelegate::commit`]; never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixedClearingNetworkResult {
    instrument: ClearingInstrument,
    /// First endpoint given to the builder.
    party_a: NodeId,
    /// Second endpoint given to the builder.
    party_b: NodeId,
    rate: f64,
    demand: f64,
    supply: f64,
}

impl MixedClearingNetworkResult {
    pub fn new(
        instrument: ClearingInstrument,
        party_a: NodeId,
        party_b: NodeId,
        rate: f64,
        demand: f64,
        supply: f64,
    ) -> Self {
        Self {
            instrument,
            party_a,
            party_b,
            rate,
            demand,
            supply,
        }
    }

    pub fn instrument(&self) -> &ClearingInstrument {
        &self.instrument
    }

    pub fn party_a(&self) -> &NodeId {
        &self.party_a
    }

    pub fn party_b(&self) -> &NodeId {
        &self.party_b
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn demand(&self) -> f64 {
        self.demand
    }

    pub fn supply(&self) -> f64 {
        self.supply
    }

    /// Signed excess demand.
    pub fn excess(&self) -> f64 {
        self.demand - self.supply
    }

    /// Volume both sides can honour.
    pub fn matched_volume(&self) -> f64 {
        self.demand.min(self.supply).max(0.0)
    }
}

impl fmt::Display for MixedClearingNetworkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} <-> {}] rate {:.6e} demand {:.6e} supply {:.6e} excess {:+.3e}",
            self.instrument,
            self.party_a,
            self.party_b,
            self.rate,
            self.demand,
            self.supply,
            self.excess()
        )
    }
}

/// Boundary to external settlement code.
///
/// The clearing core calls `commit` exactly once per edge, only after
/// an algorithm has returned, in edge insertion order. Implementations
/// that need to record state use interior mutability; clearing is
/// single-threaded.
pub trait ResourceExchangeDelegate {
    fn commit(&self, result: &MixedClearingNetworkResult);
}

/// Delegate that keeps every result it receives. Handy for tests and
/// audit trails.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    results: RefCell<Vec<MixedClearingNetworkResult>>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<MixedClearingNetworkResult> {
        self.results.borrow().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.results.borrow().len()
    }
}

impl ResourceExchangeDelegate for RecordingDelegate {
    fn commit(&self, result: &MixedClearingNetworkResult) {
        self.results.borrow_mut().push(result.clone());
    }
}
