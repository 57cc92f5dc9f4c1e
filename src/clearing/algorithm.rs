use crate::clearing::stopping::{ClearingProgress, StoppingCondition};
use crate::graph::network::MixedClearingNetwork;
use crate::solver::{BrentLineSearch, BrentRootFinder};
use log::{debug, warn};

/// Outer passes no algorithm exceeds, whatever its stopping condition.
pub const HARD_ITERATION_CEILING: usize = 10_000;

const MAX_BRACKET_STEPS: usize = 64;

/// A strategy that moves a network's rates towards equilibrium and
/// returns the largest absolute residual it reached.
pub trait ClearingAlgorithm {
    fn name(&self) -> &'static str;

    fn clear(&self, network: &mut MixedClearingNetwork) -> f64;
}

/// Solves one rate variable with every other rate held fixed.
///
/// Brackets a sign change of the residual by marching away from the
/// current rate with doubling steps, then runs a Brent root search on
/// the bracket. When the residual never changes sign inside the
/// domain, the rate minimizing `|residual|` is taken instead (usually
/// a domain boundary).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSolver {
    root_finder: BrentRootFinder,
    accuracy: f64,
}

impl EdgeSolver {
    pub fn new(max_iterations: usize, accuracy: f64) -> Self {
        Self {
            root_finder: BrentRootFinder::new(max_iterations, accuracy),
            accuracy,
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn max_iterations(&self) -> usize {
        self.root_finder.max_iterations()
    }

    /// Move `variable` to its local equilibrium and return its residual.
    pub fn solve(&self, network: &mut MixedClearingNetwork, variable: usize) -> f64 {
        let domain = network.domain(variable);
        let start = network.rate(variable);
        let f0 = network.residual_at(variable, start);
        if f0.abs() <= self.accuracy {
            return f0;
        }

        // excess demand pushes the rate up, excess supply pushes it down
        let primary = if f0 > 0.0 { 1.0 } else { -1.0 };
        let mut best = (start, f0);
        for direction in [primary, -primary] {
            match self.bracket(network, variable, (start, f0), direction, &mut best) {
                Some((left, right)) => {
                    let mut f = |x: f64| network.residual_at(variable, x);
                    if let Some(root) = self.root_finder.find_root_from(&mut f, left, right) {
                        network.set_rate(variable, root.x);
                        return root.value;
                    }
                }
                None => continue,
            }
        }

        let line = BrentLineSearch::new(f64::EPSILON.sqrt(), 1e-15 * domain.width(), self.max_iterations());
        let found = line.minimize_bounded(
            |x| network.residual_at(variable, x).abs(),
            domain.lower,
            domain.upper,
        );
        let (rate, residual) = if found.value < best.1.abs() {
            (found.x, network.residual_at(variable, found.x))
        } else {
            best
        };
        network.set_rate(variable, rate);
        residual
    }

    fn bracket(
        &self,
        network: &mut MixedClearingNetwork,
        variable: usize,
        start: (f64, f64),
        direction: f64,
        best: &mut (f64, f64),
    ) -> Option<((f64, f64), (f64, f64))> {
        let domain = network.domain(variable);
        let mut step = (0.01 * start.0.abs()).max(1e-4 * domain.width());
        let mut previous = start;
        for _ in 0..MAX_BRACKET_STEPS {
            let rate = domain.clamp(previous.0 + direction * step);
            if rate == previous.0 {
                return None;
            }
            let value = network.residual_at(variable, rate);
            if value.abs() < best.1.abs() {
                *best = (rate, value);
            }
            if value.signum() != previous.1.signum() || value == 0.0 {
                return Some((previous, (rate, value)));
            }
            previous = (rate, value);
            step *= 2.0;
        }
        None
    }
}

/// Shared outer loop: call `pass` until the stopping condition fires,
/// the hard ceiling is hit, or a pass leaves every rate unchanged.
pub(crate) fn run_passes<F>(
    network: &mut MixedClearingNetwork,
    stopping: &dyn StoppingCondition,
    name: &str,
    mut pass: F,
) -> f64
where
    F: FnMut(&mut MixedClearingNetwork, usize),
{
    let mut residual = network.total_residual();
    let mut iteration = 0;
    loop {
        let progress = ClearingProgress {
            iteration,
            residual,
            orders: network.evaluations(),
        };
        if stopping.should_stop(&progress) {
            if !stopping.reached_target(&progress) {
                warn!(
                    "{}: stopped after {} passes with residual {:.3e}",
                    name, iteration, residual
                );
            }
            break;
        }
        if iteration >= HARD_ITERATION_CEILING {
            warn!("{}: hit the hard ceiling of {} passes", name, HARD_ITERATION_CEILING);
            break;
        }

        let before = network.rates().to_vec();
        pass(network, iteration);
        residual = network.total_residual();
        iteration += 1;
        debug!("{} pass {}: residual {:.3e}", name, iteration, residual);

        if network.rates() == before.as_slice() {
            debug!("{}: rates stationary after {} passes", name, iteration);
            break;
        }
    }
    residual
}
