//! Closed-form "domino" portfolio solver.
//!
//! At the optimum every invested asset earns the same marginal return
//! `λ` and every used liability costs the same marginal rate `μ`:
//!
//! ```text
//! a_i(λ) = max(0, (c_i − λ) / q_i)      l_j(μ) = max(0, (μ − d_j) / q_j)
//! ```
//!
//! where `q` is the curvature (twice the absolute market impact). With
//! no binding constraint `λ = 0` and every asset sits at its own
//! unconstrained optimum `−intercept / (2·slope)`. Otherwise `λ` and `μ`
//! are found by walking the sorted intercepts once: instruments drop in
//! like dominoes as the marginal level passes their intercepts, and
//! between two intercepts the total volume is linear in the level, so
//! each level solves in closed form.

use crate::optimization::curve::PortfolioProblem;
use crate::optimization::PortfolioOptimizer;

/// Water-filling solver over the marginal return ladder. Produces the
/// same optimum as [`LcqpOptimizer`](crate::optimization::lcqp::LcqpOptimizer)
/// in `O(n log n)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DominoOptimizer;

impl DominoOptimizer {
    pub fn new() -> Self {
        Self
    }
}

/// Sum of ramps `Σ_falling w·max(0, b − λ) − Σ_rising w·max(0, λ − b)`,
/// a non-increasing piecewise-linear function of the marginal level.
#[derive(Debug, Clone)]
struct Ladder {
    /// `(breakpoint, weight, falling)`, sorted by breakpoint.
    steps: Vec<(f64, f64, bool)>,
}

impl Ladder {
    fn new(falling: &[(f64, f64)], rising: &[(f64, f64)]) -> Self {
        let mut steps: Vec<(f64, f64, bool)> = falling
            .iter()
            .map(|&(b, w)| (b, w, true))
            .chain(rising.iter().map(|&(b, w)| (b, w, false)))
            .collect();
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { steps }
    }

    fn value(&self, level: f64) -> f64 {
        self.steps
            .iter()
            .map(|&(b, w, falling)| {
                if falling {
                    w * (b - level).max(0.0)
                } else {
                    -w * (level - b).max(0.0)
                }
            })
            .sum()
    }

    /// Level at which the ladder equals `target`, or `None` if the
    /// ladder never reaches it.
    fn solve(&self, target: f64) -> Option<f64> {
        let first = self.steps.first()?;
        // slope left of every breakpoint: only falling ramps are active
        let mut slope: f64 = -self
            .steps
            .iter()
            .filter(|s| s.2)
            .map(|s| s.1)
            .sum::<f64>();
        let mut level = first.0;
        let mut value = self.value(level);

        if value < target {
            // target lies on the left ray
            if slope == 0.0 {
                return None;
            }
            return Some(level + (target - value) / slope);
        }

        for &(breakpoint, weight, falling) in &self.steps {
            if breakpoint > level {
                let next = value + slope * (breakpoint - level);
                if next <= target {
                    if value == next {
                        return Some(level);
                    }
                    return Some(level + (value - target) / (value - next) * (breakpoint - level));
                }
                level = breakpoint;
                value = next;
            }
            if falling {
                slope += weight;
            } else {
                slope -= weight;
            }
        }

        if value == target {
            return Some(level);
        }
        if slope == 0.0 {
            return None;
        }
        Some(level + (target - value) / slope)
    }
}

impl PortfolioOptimizer for DominoOptimizer {
    fn name(&self) -> &'static str {
        "domino"
    }

    fn solve(&self, problem: &PortfolioProblem) -> Vec<f64> {
        let n = problem.dimension();
        if !problem.is_feasible() || n == 0 {
            return vec![0.0; n];
        }
        let split = problem.asset_count();
        let q = problem.curvature();
        let g = problem.linear();

        // assets: a_i = max(0, (c_i − λ)/q_i) with c_i = −g_i
        let asset_ramps: Vec<(f64, f64)> = (0..split).map(|i| (-g[i], 1.0 / q[i])).collect();
        // liabilities: l_j = max(0, (μ − d_j)/q_j) with d_j = g_j
        let liability_ramps: Vec<(f64, f64)> = (split..n).map(|j| (g[j], 1.0 / q[j])).collect();

        let invested = Ladder::new(&asset_ramps, &[]);
        let borrowed = Ladder::new(&[], &liability_ramps);
        let net = Ladder::new(&asset_ramps, &liability_ramps);

        let cap = problem.capital();
        let cash = problem.cash();
        let slack = 1e-12 * cap.abs().max(cash.abs()).max(1.0);

        let allocate = |lambda: f64, mu: f64| -> Vec<f64> {
            (0..n)
                .map(|k| {
                    if k < split {
                        ((-g[k] - lambda) / q[k]).max(0.0)
                    } else {
                        ((mu - g[k]) / q[k]).max(0.0)
                    }
                })
                .collect()
        };
        let level_for_capital = || invested.solve(cap).unwrap_or(0.0).max(0.0);

        // 1. financing slack: μ = 0, λ = capital multiplier only
        let lambda = if invested.value(0.0) <= cap {
            0.0
        } else {
            level_for_capital()
        };
        if invested.value(lambda) + borrowed.value(0.0) <= cash + slack {
            return allocate(lambda, 0.0);
        }

        // 2. financing binds, capital slack: λ = μ
        let mu = match net.solve(cash) {
            Some(mu) => mu.max(0.0),
            None => return vec![0.0; n],
        };
        if invested.value(mu) <= cap + slack {
            return allocate(mu, mu);
        }

        // 3. both bind: liabilities fund exactly cap − cash
        let mu = borrowed.solve(cash - cap).unwrap_or(0.0).max(0.0);
        let lambda = level_for_capital().max(mu);
        allocate(lambda, mu)
    }
}
