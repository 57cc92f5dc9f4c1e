//! Clearing algorithms: strategies that drive every rate variable of a
//! network towards zero excess demand.

pub mod algorithm;
pub mod march;
pub mod multivariate;
pub mod stopping;

pub use algorithm::{ClearingAlgorithm, EdgeSolver, HARD_ITERATION_CEILING};
pub use march::{MarchClearingAlgorithm, SweepOrder};
pub use multivariate::{Minimizer, MultivariateClearingAlgorithm, MAX_MINIMIZER_DIMENSION};
pub use stopping::{
    ClearingProgress, OrderOrIterations, StoppingCondition, TargetResidualOrMaximumIterations,
};

use crate::core::error::ClearingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every clearing algorithm this crate ships, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmKind {
    AscendingMarch,
    DescendingMarch,
    AlternatingMarch,
    NelderMead,
    LevenbergMarquardt,
    QuadraticModel,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 6] = [
        AlgorithmKind::AscendingMarch,
        AlgorithmKind::DescendingMarch,
        AlgorithmKind::AlternatingMarch,
        AlgorithmKind::NelderMead,
        AlgorithmKind::LevenbergMarquardt,
        AlgorithmKind::QuadraticModel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::AscendingMarch => "ascending-march",
            AlgorithmKind::DescendingMarch => "descending-march",
            AlgorithmKind::AlternatingMarch => "alternating-march",
            AlgorithmKind::NelderMead => "nelder-mead",
            AlgorithmKind::LevenbergMarquardt => "levenberg-marquardt",
            AlgorithmKind::QuadraticModel => "quadratic-model",
        }
    }

    pub fn build(
        self,
        edge_iterations: usize,
        edge_accuracy: f64,
        stopping: Box<dyn StoppingCondition>,
    ) -> Box<dyn ClearingAlgorithm> {
        match self {
            AlgorithmKind::AscendingMarch => {
                Box::new(MarchClearingAlgorithm::ascending(edge_iterations, edge_accuracy, stopping))
            }
            AlgorithmKind::DescendingMarch => {
                Box::new(MarchClearingAlgorithm::descending(edge_iterations, edge_accuracy, stopping))
            }
            AlgorithmKind::AlternatingMarch => {
                Box::new(MarchClearingAlgorithm::alternating(edge_iterations, edge_accuracy, stopping))
            }
            AlgorithmKind::NelderMead => Box::new(MultivariateClearingAlgorithm::nelder_mead(
                edge_iterations,
                edge_accuracy,
                stopping,
            )),
            AlgorithmKind::LevenbergMarquardt => Box::new(MultivariateClearingAlgorithm::levenberg_marquardt(
                edge_iterations,
                edge_accuracy,
                stopping,
            )),
            AlgorithmKind::QuadraticModel => Box::new(MultivariateClearingAlgorithm::trust_region(
                edge_iterations,
                edge_accuracy,
                stopping,
            )),
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = ClearingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| ClearingError::InvalidConfig(format!("unknown clearing algorithm '{}'", s)))
    }
}
