use crate::core::instrument::ClearingInstrument;
use crate::response::ResponseFunction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a node in a clearing network.
///
/// Usually the unique name of the participant that owns the node
/// (e.g. "BANK-003", "FIRM-017").
///
/// # Examples
///
/// ```
/// use mixed_clearing::core::participant::NodeId;
///
/// let bank = NodeId::new("BANK-003");
/// let firm = NodeId::new("FIRM-017");
/// assert_ne!(bank, firm);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which side of an instrument a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buyer or borrower: positive volumes.
    Buy,
    /// Seller, lender or issuer: negative volumes.
    Sell,
}

impl OrderSide {
    /// Sign applied to volumes on this side.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

/// One registration of a participant on one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketOrder {
    pub instrument: ClearingInstrument,
    pub side: OrderSide,
}

/// Anything that can take part in a clearing session.
///
/// Banks, firms and funds live outside this crate; they only need to
/// name themselves and hand over a response function describing how
/// much they want to trade at any vector of quoted rates. The clearing
/// core asks for the response function once per node per session.
pub trait ClearingMarketParticipant {
    fn unique_name(&self) -> String;

    /// Build this session's response function. `orders` lists every
    /// instrument and side the participant registered for, so joint
    /// multi-instrument decisions can be expressed.
    fn market_response_function(&self, orders: &[MarketOrder]) -> Box<dyn ResponseFunction>;
}
