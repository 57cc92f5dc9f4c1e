//! Clearing of tightly coupled components by multivariate minimization
//! of the squared residual.
//!
//! Each pass first relaxes every variable with an ascending march, which
//! is cheap and usually lands close to equilibrium. Components still
//! above the per-edge accuracy are then handed to a derivative-free
//! minimizer over all of their rates at once.

use crate::clearing::algorithm::{run_passes, ClearingAlgorithm, EdgeSolver};
use crate::clearing::march::{sweep, SweepOrder};
use crate::clearing::stopping::StoppingCondition;
use crate::graph::network::MixedClearingNetwork;
use crate::solver::{Bounds, LevenbergMarquardt, Minimum, NelderMead, QuadraticModelTrustRegion};
use log::debug;

/// Components larger than this keep their march result; the dense
/// minimizers scale quadratically or worse with dimension.
pub const MAX_MINIMIZER_DIMENSION: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Minimizer {
    NelderMead,
    LevenbergMarquardt,
    QuadraticModelTrustRegion,
}

pub struct MultivariateClearingAlgorithm {
    minimizer: Minimizer,
    edge: EdgeSolver,
    stopping: Box<dyn StoppingCondition>,
}

impl MultivariateClearingAlgorithm {
    pub fn new(
        minimizer: Minimizer,
        edge_iterations: usize,
        edge_accuracy: f64,
        stopping: Box<dyn StoppingCondition>,
    ) -> Self {
        Self {
            minimizer,
            edge: EdgeSolver::new(edge_iterations, edge_accuracy),
            stopping,
        }
    }

    pub fn nelder_mead(edge_iterations: usize, edge_accuracy: f64, stopping: Box<dyn StoppingCondition>) -> Self {
        Self::new(Minimizer::NelderMead, edge_iterations, edge_accuracy, stopping)
    }

    pub fn levenberg_marquardt(
        edge_iterations: usize,
        edge_accuracy: f64,
        stopping: Box<dyn StoppingCondition>,
    ) -> Self {
        Self::new(Minimizer::LevenbergMarquardt, edge_iterations, edge_accuracy, stopping)
    }

    pub fn trust_region(edge_iterations: usize, edge_accuracy: f64, stopping: Box<dyn StoppingCondition>) -> Self {
        Self::new(Minimizer::QuadraticModelTrustRegion, edge_iterations, edge_accuracy, stopping)
    }

    pub fn minimizer(&self) -> Minimizer {
        self.minimizer
    }

    fn minimize_component(&self, network: &mut MixedClearingNetwork, component: &[usize]) {
        let start: Vec<f64> = component.iter().map(|&v| network.rate(v)).collect();
        let before = squares(&network.component_residuals(component, &start));
        let tolerance = self.edge.accuracy() * self.edge.accuracy();
        if before <= tolerance {
            return;
        }

        let lower: Vec<f64> = component.iter().map(|&v| network.domain(v).lower).collect();
        let upper: Vec<f64> = component.iter().map(|&v| network.domain(v).upper).collect();
        let bounds = match Bounds::new(lower, upper) {
            Ok(bounds) => bounds,
            Err(_) => return,
        };
        let iterations = self.edge.max_iterations();

        let found: Minimum = match self.minimizer {
            Minimizer::LevenbergMarquardt => LevenbergMarquardt::new(iterations, tolerance)
                .minimize(|x| network.component_residuals(component, x), &start, &bounds),
            Minimizer::NelderMead => NelderMead::new(iterations, f64::EPSILON)
                .with_initial_step(1e-3)
                .minimize(|x| squares(&network.component_residuals(component, x)), &start, &bounds),
            Minimizer::QuadraticModelTrustRegion => {
                let width = bounds
                    .upper()
                    .iter()
                    .zip(bounds.lower())
                    .map(|(u, l)| u - l)
                    .fold(f64::INFINITY, f64::min);
                QuadraticModelTrustRegion::new(iterations, 1e-3 * width, 1e-15 * width)
                    .with_target(tolerance)
                    .minimize(|x| squares(&network.component_residuals(component, x)), &start, &bounds)
            }
        };

        let keep = if found.value < before { &found.point } else { &start };
        for (&v, &rate) in component.iter().zip(keep) {
            network.set_rate(v, rate);
        }
        debug!(
            "{:?} on {} variables: {:.3e} -> {:.3e} in {} evaluations",
            self.minimizer,
            component.len(),
            before,
            found.value.min(before),
            found.evaluations
        );
    }
}

fn squares(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

impl ClearingAlgorithm for MultivariateClearingAlgorithm {
    fn name(&self) -> &'static str {
        match self.minimizer {
            Minimizer::NelderMead => "nelder-mead",
            Minimizer::LevenbergMarquardt => "levenberg-marquardt",
            Minimizer::QuadraticModelTrustRegion => "quadratic-model",
        }
    }

    fn clear(&self, network: &mut MixedClearingNetwork) -> f64 {
        let components: Vec<Vec<usize>> = network
            .components()
            .iter()
            .filter(|c| c.len() > 1 && c.len() <= MAX_MINIMIZER_DIMENSION)
            .cloned()
            .collect();
        let edge = self.edge;
        run_passes(network, self.stopping.as_ref(), self.name(), |network, pass| {
            sweep(network, &edge, SweepOrder::Ascending, pass);
            for component in &components {
                self.minimize_component(network, component);
            }
        })
    }
}
