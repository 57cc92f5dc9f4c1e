//! # mixed-clearing
//!
//! Heterogeneous network market-clearing solver with portfolio return
//! maximization.
//!
//! Participants describe how much they want to trade at any quoted rate;
//! the clearing engine searches for the rates at which every bilateral
//! edge and every shared pool balances, then hands each edge's result to
//! a settlement callback.
//!
//! ## Architecture
//!
//! - **core**: Instruments, node ids, trade opportunities, results, errors
//! - **response**: Response functions, partitioned and stepped responses
//! - **optimization**: Portfolio return maximization (LCQP, domino)
//! - **solver**: Root finding, line search and multivariate minimizers
//! - **graph**: Network builder, rate variables, coupled components
//! - **clearing**: Clearing algorithms and stopping conditions
//! - **market**: Order-book façade over the network
//! - **simulation**: Settlement ledger, reference agents, random sessions
//! - **config**: JSON clearing configuration

pub mod clearing;
pub mod config;
pub mod core;
pub mod graph;
pub mod market;
pub mod optimization;
pub mod response;
pub mod simulation;
pub mod solver;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::clearing::{
        AlgorithmKind, ClearingAlgorithm, MarchClearingAlgorithm, MultivariateClearingAlgorithm, OrderOrIterations,
        StoppingCondition, TargetResidualOrMaximumIterations,
    };
    pub use crate::config::ClearingConfig;
    pub use crate::core::error::ClearingError;
    pub use crate::core::instrument::{ClearingInstrument, RateDomain};
    pub use crate::core::opportunity::TradeOpportunity;
    pub use crate::core::participant::{ClearingMarketParticipant, MarketOrder, NodeId, OrderSide};
    pub use crate::core::result::{MixedClearingNetworkResult, RecordingDelegate, ResourceExchangeDelegate};
    pub use crate::graph::{MixedClearingNetwork, MixedClearingNetworkBuilder};
    pub use crate::market::{MarketClearingReport, MixedNetworkMarket, SubnetworkKind};
    pub use crate::optimization::{
        DominoOptimizer, LcqpOptimizer, PortfolioOptimizer, PortfolioSolver, RateCurve,
    };
    pub use crate::response::{
        BoundedLinearResponse, CurveResponse, PartitionedResponseFunction, ResponseFunction, StepResponseFunction,
    };
}
