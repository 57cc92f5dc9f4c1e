//! Portfolio return maximization.
//!
//! A participant holding several asset and liability instruments, each
//! quoted with a linear market-impact curve, picks the allocation that
//! maximizes its net return under a capital cap and a balance
//! constraint. Two interchangeable solvers implement
//! [`PortfolioOptimizer`]: the exact active-set [`LcqpOptimizer`] and the
//! sorted-pass [`DominoOptimizer`].

pub mod curve;
pub mod domino;
pub mod lcqp;
pub mod linalg;

pub use curve::{PortfolioProblem, RateCurve, MIN_CURVATURE};
pub use domino::DominoOptimizer;
pub use lcqp::LcqpOptimizer;

use crate::core::error::ClearingError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub trait PortfolioOptimizer {
    fn name(&self) -> &'static str;

    /// Optimal allocation `[assets.., liabilities..]` of a validated
    /// problem. Never fails; infeasible problems yield all zeros.
    fn solve(&self, problem: &PortfolioProblem) -> Vec<f64>;

    /// Validate the inputs and solve. Volumes are ordered
    /// `[asset_0..asset_N, liability_0..liability_M]`.
    fn perform_optimization(
        &self,
        assets: &[RateCurve],
        liabilities: &[RateCurve],
        cash: f64,
        capital_constraint: f64,
    ) -> Result<Vec<f64>, ClearingError> {
        let problem = PortfolioProblem::new(assets, liabilities, cash, capital_constraint)?;
        Ok(self.solve(&problem))
    }
}

impl<O: PortfolioOptimizer + ?Sized> PortfolioOptimizer for Box<O> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve(&self, problem: &PortfolioProblem) -> Vec<f64> {
        (**self).solve(problem)
    }
}

/// Selectable portfolio solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioSolver {
    Lcqp,
    #[default]
    Domino,
}

impl PortfolioSolver {
    pub fn optimizer(self) -> Box<dyn PortfolioOptimizer> {
        match self {
            PortfolioSolver::Lcqp => Box::new(LcqpOptimizer::new()),
            PortfolioSolver::Domino => Box::new(DominoOptimizer::new()),
        }
    }
}

impl FromStr for PortfolioSolver {
    type Err = ClearingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lcqp" => Ok(PortfolioSolver::Lcqp),
            "domino" => Ok(PortfolioSolver::Domino),
            other => Err(ClearingError::InvalidConfig(format!(
                "unknown portfolio solver '{}'",
                other
            ))),
        }
    }
}

/// Solver by name, as used by the CLI and configuration files.
pub fn optimizer_by_name(name: &str) -> Result<Box<dyn PortfolioOptimizer>, ClearingError> {
    Ok(name.parse::<PortfolioSolver>()?.optimizer())
}
