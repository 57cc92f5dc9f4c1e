//! Order-book façade: participants register buy and sell orders per
//! instrument and the market wires, clears and settles them in one call.

pub mod mixed;

pub use mixed::{MarketClearingReport, MixedNetworkMarket, SubnetworkKind};
