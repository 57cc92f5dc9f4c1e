//! Response functions: how much a participant wants to trade at the
//! rates currently quoted to it.

pub mod function;
pub mod partition;
pub mod portfolio;
pub mod step;

pub use function::{AggregateResponse, BoundedLinearResponse, CurveResponse, ResponseFunction};
pub use partition::{
    ExpIOCPartitionFunction, InverseExpIOCPartitionFunction, PartitionFunction,
    PartitionedResponseFunction, UnbiasedPartitionFunction,
};
pub use portfolio::{LegKind, PortfolioLeg, PortfolioResponseFunction};
pub use step::StepResponseFunction;
