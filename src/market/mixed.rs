use crate::clearing::{AlgorithmKind, ClearingProgress, StoppingCondition};
use crate::core::error::ClearingError;
use crate::core::instrument::{ClearingInstrument, RateDomain};
use crate::core::participant::{ClearingMarketParticipant, MarketOrder, NodeId, OrderSide};
use crate::core::result::{MixedClearingNetworkResult, ResourceExchangeDelegate};
use crate::graph::{MixedClearingNetwork, MixedClearingNetworkBuilder};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

/// How an instrument's participants are wired together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubnetworkKind {
    /// One shared pool cleared at a single rate (e.g. one stock).
    Homogeneous,
    /// One bilateral edge, with its own rate, per buyer/seller pair.
    Heterogeneous,
}

struct RegisteredInstrument {
    instrument: ClearingInstrument,
    delegate: Rc<dyn ResourceExchangeDelegate>,
    kind: SubnetworkKind,
}

struct RegisteredParticipant {
    participant: Rc<dyn ClearingMarketParticipant>,
    name: String,
    orders: Vec<MarketOrder>,
}

/// Caps an inner stopping condition at a number of outer passes.
struct PassCap {
    inner: Box<dyn StoppingCondition>,
    max_passes: usize,
}

impl StoppingCondition for PassCap {
    fn should_stop(&self, progress: &ClearingProgress) -> bool {
        progress.iteration >= self.max_passes || self.inner.should_stop(progress)
    }

    fn reached_target(&self, progress: &ClearingProgress) -> bool {
        self.inner.reached_target(progress)
    }
}

/// Outcome of one [`MixedNetworkMarket::match_all_orders`] call.
#[derive(Debug, Clone, Serialize)]
pub struct MarketClearingReport {
    pub algorithm: &'static str,
    pub residual: f64,
    /// Whether the residual passed the acceptance threshold and the
    /// contracts were committed.
    pub accepted: bool,
    /// `(label, instrument, rate)` for every rate variable.
    pub rates: Vec<(String, ClearingInstrument, f64)>,
    /// Committed edge results, empty when the pass was rejected.
    pub results: Vec<MixedClearingNetworkResult>,
}

impl MarketClearingReport {
    /// Clearing rate of an instrument traded at a single rate.
    pub fn rate_of(&self, instrument: &ClearingInstrument) -> Option<f64> {
        let mut rates = self.rates.iter().filter(|(_, i, _)| i == instrument);
        let (_, _, rate) = rates.next()?;
        match rates.next() {
            Some(_) => None,
            None => Some(*rate),
        }
    }

    /// Matched volume summed over every committed edge of an instrument.
    pub fn matched_volume(&self, instrument: &ClearingInstrument) -> f64 {
        self.results
            .iter()
            .filter(|r| r.instrument() == instrument)
            .map(|r| r.matched_volume())
            .sum()
    }
}

/// Order book façade over the clearing network.
///
/// Instruments are registered once with their settlement delegate and
/// subnetwork kind; participants then place buy and sell orders, and
/// [`match_all_orders`](Self::match_all_orders) wires up the network,
/// clears it and commits the contracts.
pub struct MixedNetworkMarket {
    instruments: Vec<RegisteredInstrument>,
    participants: Vec<RegisteredParticipant>,
    participant_index: HashMap<String, usize>,
    default_domain: RateDomain,
    domains: HashMap<ClearingInstrument, RateDomain>,
    initial_rates: HashMap<ClearingInstrument, f64>,
    edge_accuracy: f64,
    acceptance_threshold: f64,
    algorithm: Option<AlgorithmKind>,
}

impl Default for MixedNetworkMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl MixedNetworkMarket {
    pub fn new() -> Self {
        Self {
            instruments: Vec::new(),
            participants: Vec::new(),
            participant_index: HashMap::new(),
            default_domain: RateDomain::default(),
            domains: HashMap::new(),
            initial_rates: HashMap::new(),
            edge_accuracy: 1e-12,
            acceptance_threshold: f64::INFINITY,
            algorithm: None,
        }
    }

    /// Residuals above `threshold` are rejected without committing.
    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    pub fn with_edge_accuracy(mut self, accuracy: f64) -> Self {
        self.edge_accuracy = accuracy;
        self
    }

    /// Domain of instruments without one of their own.
    pub fn with_default_domain(mut self, domain: RateDomain) -> Self {
        self.default_domain = domain;
        self
    }

    /// Always clear with `kind` instead of choosing by topology.
    pub fn with_algorithm(mut self, kind: AlgorithmKind) -> Self {
        self.algorithm = Some(kind);
        self
    }

    /// Register an instrument, replacing any earlier registration.
    pub fn add_instrument(
        &mut self,
        instrument: ClearingInstrument,
        delegate: Rc<dyn ResourceExchangeDelegate>,
        kind: SubnetworkKind,
    ) {
        self.instruments.retain(|r| r.instrument != instrument);
        self.instruments.push(RegisteredInstrument {
            instrument,
            delegate,
            kind,
        });
    }

    pub fn set_domain(&mut self, instrument: ClearingInstrument, domain: RateDomain) {
        self.domains.insert(instrument, domain);
    }

    pub fn set_initial_rate(&mut self, instrument: ClearingInstrument, rate: f64) {
        self.initial_rates.insert(instrument, rate);
    }

    pub fn add_buy_order(
        &mut self,
        participant: Rc<dyn ClearingMarketParticipant>,
        instrument: &ClearingInstrument,
    ) -> Result<(), ClearingError> {
        self.add_order(participant, instrument, OrderSide::Buy)
    }

    pub fn add_sell_order(
        &mut self,
        participant: Rc<dyn ClearingMarketParticipant>,
        instrument: &ClearingInstrument,
    ) -> Result<(), ClearingError> {
        self.add_order(participant, instrument, OrderSide::Sell)
    }

    fn add_order(
        &mut self,
        participant: Rc<dyn ClearingMarketParticipant>,
        instrument: &ClearingInstrument,
        side: OrderSide,
    ) -> Result<(), ClearingError> {
        if !self.instruments.iter().any(|r| &r.instrument == instrument) {
            return Err(ClearingError::UnknownInstrument(instrument.clone()));
        }
        let name = participant.unique_name();
        let index = match self.participant_index.get(&name) {
            Some(&index) => index,
            None => {
                self.participants.push(RegisteredParticipant {
                    participant,
                    name: name.clone(),
                    orders: Vec::new(),
                });
                self.participant_index.insert(name, self.participants.len() - 1);
                self.participants.len() - 1
            }
        };
        let order = MarketOrder {
            instrument: instrument.clone(),
            side,
        };
        let orders = &mut self.participants[index].orders;
        if !orders.contains(&order) {
            orders.push(order);
        }
        Ok(())
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    fn side_members(&self, instrument: &ClearingInstrument, side: OrderSide) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| {
                p.orders
                    .iter()
                    .any(|o| &o.instrument == instrument && o.side == side)
            })
            .map(|p| p.name.as_str())
            .collect()
    }

    fn build_network(&self) -> Result<MixedClearingNetwork, ClearingError> {
        let mut builder = MixedClearingNetworkBuilder::new().with_default_domain(self.default_domain);
        for (instrument, domain) in &self.domains {
            builder.set_domain(instrument.clone(), *domain);
        }
        for (instrument, rate) in &self.initial_rates {
            builder.set_initial_rate(instrument.clone(), *rate)?;
        }
        for p in &self.participants {
            let response = p.participant.market_response_function(&p.orders);
            builder.add_network_node(Some(p.participant.clone()), response, NodeId::new(p.name.clone()))?;
        }

        for registered in &self.instruments {
            let instrument = &registered.instrument;
            let buyers = self.side_members(instrument, OrderSide::Buy);
            let sellers = self.side_members(instrument, OrderSide::Sell);
            if buyers.is_empty() || sellers.is_empty() {
                debug!("{}: {} buyers, {} sellers, nothing to match", instrument, buyers.len(), sellers.len());
                continue;
            }
            if registered.kind == SubnetworkKind::Homogeneous {
                builder.add_hyper_edge(instrument.id())?;
            }
            for buyer in &buyers {
                for seller in sellers.iter().filter(|s| *s != buyer) {
                    match registered.kind {
                        SubnetworkKind::Homogeneous => builder.add_to_hyper_edge(
                            *buyer,
                            *seller,
                            registered.delegate.clone(),
                            &instrument.id(),
                            instrument.clone(),
                        )?,
                        SubnetworkKind::Heterogeneous => builder.add_edge(
                            *buyer,
                            *seller,
                            registered.delegate.clone(),
                            instrument.clone(),
                        )?,
                    }
                }
            }
        }
        Ok(builder.build())
    }

    /// Clear every registered order in one network and commit the
    /// contracts if the residual is acceptable.
    ///
    /// Unless an algorithm was forced, uses an ascending march when every
    /// coupled component holds a single rate and Levenberg–Marquardt
    /// clearing otherwise. The order book is emptied afterwards,
    /// accepted or not.
    pub fn match_all_orders(
        &mut self,
        edge_iterations: usize,
        network_iterations: usize,
        stopping: Box<dyn StoppingCondition>,
    ) -> Result<MarketClearingReport, ClearingError> {
        let built = self.build_network();
        self.participants.clear();
        self.participant_index.clear();
        let mut network = built?;

        let capped = Box::new(PassCap {
            inner: stopping,
            max_passes: network_iterations,
        });
        let kind = self.algorithm.unwrap_or_else(|| {
            if network.components().iter().all(|c| c.len() == 1) {
                AlgorithmKind::AscendingMarch
            } else {
                AlgorithmKind::LevenbergMarquardt
            }
        });
        let clearing = kind.build(edge_iterations, self.edge_accuracy, capped);
        let residual = network.apply_clearing_algorithm(clearing.as_ref());
        let algorithm = clearing.name();

        let rates = (0..network.variable_count())
            .map(|v| {
                (
                    network.variable_label(v).to_string(),
                    network.instrument(v).clone(),
                    network.rate(v),
                )
            })
            .collect();

        let accepted = residual.is_finite() && residual <= self.acceptance_threshold;
        let results = if accepted {
            info!("{}: accepted residual {:.3e}", algorithm, residual);
            network.create_contracts()?
        } else {
            warn!(
                "{}: rejected residual {:.3e} (threshold {:.3e}), no contracts created",
                algorithm, residual, self.acceptance_threshold
            );
            Vec::new()
        };

        Ok(MarketClearingReport {
            algorithm,
            residual,
            accepted,
            rates,
            results,
        })
    }
}
