//! Active-set solver for linearly constrained convex quadratic programs.
//!
//! Solves
//!
//! ```text
//! minimize   ½ xᵀ H x + gᵀ x
//! subject to x ≥ 0,  A x ≤ b
//! ```
//!
//! with a primal active-set iteration. Bounds in the working set are
//! handled by fixing the variable at zero, so each KKT system only spans
//! the free variables plus the active general rows. Multipliers of the
//! working set decide which constraint to release.
//!
//! Precision is adaptive: when the iteration budget runs out the step
//! and multiplier tolerances are loosened and the iteration resumes
//! from the current (always feasible) point, and singular KKT systems
//! are retried with growing diagonal regularization. The solver never
//! fails; in the worst case it returns its last feasible iterate.

use crate::optimization::curve::PortfolioProblem;
use crate::optimization::linalg::{dot, norm_inf, solve, Matrix};
use crate::optimization::PortfolioOptimizer;
use log::{debug, warn};

const BASE_TOLERANCE: f64 = 1e-12;
const TOLERANCE_RELAXATION: f64 = 1e3;
const MAX_RELAXATIONS: usize = 4;

/// General form of the program the LCQP solver accepts.
#[derive(Debug, Clone)]
pub struct QuadraticProgram {
    pub hessian: Matrix,
    pub linear: Vec<f64>,
    /// Rows `(a_i, b_i)` of `A x ≤ b`.
    pub constraints: Vec<(Vec<f64>, f64)>,
}

impl QuadraticProgram {
    pub fn dimension(&self) -> usize {
        self.linear.len()
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        self.hessian
            .mul_vec(x)
            .iter()
            .zip(&self.linear)
            .map(|(hx, g)| hx + g)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Blocking {
    Bound(usize),
    Row(usize),
}

struct WorkingSet {
    fixed: Vec<bool>,
    rows: Vec<usize>,
}

/// The exact active-set/KKT portfolio solver. Slower than
/// [`DominoOptimizer`](crate::optimization::domino::DominoOptimizer)
/// but general; used as the reference when validating it.
#[derive(Debug, Clone, Copy)]
pub struct LcqpOptimizer {
    max_iterations: usize,
}

impl LcqpOptimizer {
    pub fn new() -> Self {
        Self { max_iterations: 0 }
    }

    /// Override the per-precision-level iteration budget. Zero picks a
    /// budget proportional to the problem size.
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    /// Solve a general program from a feasible starting point.
    pub fn solve_program(&self, program: &QuadraticProgram, start: Vec<f64>) -> Vec<f64> {
        let n = program.dimension();
        let budget = if self.max_iterations > 0 {
            self.max_iterations
        } else {
            20 * (n + program.constraints.len()) + 50
        };

        let mut x = start;
        let mut working = WorkingSet {
            fixed: x.iter().map(|v| *v <= 0.0).collect(),
            rows: Vec::new(),
        };
        for v in x.iter_mut() {
            *v = v.max(0.0);
        }

        let mut tolerance = BASE_TOLERANCE;
        for relaxation in 0..=MAX_RELAXATIONS {
            if active_set_pass(program, &mut x, &mut working, tolerance, budget) {
                return x;
            }
            warn!(
                "lcqp: no convergence within {} iterations at tolerance {:.1e} (relaxation {})",
                budget, tolerance, relaxation
            );
            tolerance *= TOLERANCE_RELAXATION;
        }
        x
    }
}

impl Default for LcqpOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioOptimizer for LcqpOptimizer {
    fn name(&self) -> &'static str {
        "lcqp"
    }

    fn solve(&self, problem: &PortfolioProblem) -> Vec<f64> {
        let n = problem.dimension();
        if !problem.is_feasible() || n == 0 {
            return vec![0.0; n];
        }
        let assets = problem.asset_count();

        let mut capital_row = vec![0.0; n];
        let mut balance_row = vec![0.0; n];
        for k in 0..n {
            if k < assets {
                capital_row[k] = 1.0;
                balance_row[k] = 1.0;
            } else {
                balance_row[k] = -1.0;
            }
        }
        let program = QuadraticProgram {
            hessian: Matrix::diagonal(problem.curvature()),
            linear: problem.linear().to_vec(),
            constraints: vec![(capital_row, problem.capital()), (balance_row, problem.cash())],
        };

        // Nothing invested; a cash deficit is borrowed on the first liability.
        let mut start = vec![0.0; n];
        if problem.cash() < 0.0 {
            start[assets] = -problem.cash();
        }
        self.solve_program(&program, start)
    }
}

/// One active-set run at a fixed tolerance. Returns `true` on a KKT point.
fn active_set_pass(
    program: &QuadraticProgram,
    x: &mut [f64],
    working: &mut WorkingSet,
    tolerance: f64,
    budget: usize,
) -> bool {
    let n = program.dimension();
    for iteration in 0..budget {
        let gradient = program.gradient(x);
        let free: Vec<usize> = (0..n).filter(|&k| !working.fixed[k]).collect();

        let (step, multipliers) = match kkt_step(program, &gradient, &free, &working.rows) {
            Some(solution) => solution,
            None => {
                // Cannot happen for independent working sets; drop the newest row.
                if working.rows.pop().is_some() {
                    continue;
                }
                return false;
            }
        };

        let scale_x = norm_inf(x).max(1.0);
        if norm_inf(&step) <= tolerance * scale_x {
            let scale_g = norm_inf(&gradient).max(program.hessian.max_abs() * scale_x).max(1.0);
            match most_negative_multiplier(program, &gradient, working, &multipliers) {
                Some((blocking, value)) if value < -tolerance * scale_g => {
                    match blocking {
                        Blocking::Bound(k) => working.fixed[k] = false,
                        Blocking::Row(position) => {
                            working.rows.remove(position);
                        }
                    }
                }
                _ => {
                    debug!("lcqp: converged after {} iterations", iteration);
                    return true;
                }
            }
            continue;
        }

        let mut alpha = 1.0;
        let mut blocking = None;
        for &k in &free {
            if step[k] < 0.0 {
                let limit = -x[k] / step[k];
                if limit < alpha {
                    alpha = limit;
                    blocking = Some(Blocking::Bound(k));
                }
            }
        }
        for (i, (row, bound)) in program.constraints.iter().enumerate() {
            if working.rows.contains(&i) {
                continue;
            }
            let rate = dot(row, &step);
            if rate > 0.0 {
                let limit = (bound - dot(row, x)).max(0.0) / rate;
                if limit < alpha {
                    alpha = limit;
                    blocking = Some(Blocking::Row(i));
                }
            }
        }
        let alpha = alpha.max(0.0);
        for &k in &free {
            x[k] = (x[k] + alpha * step[k]).max(0.0);
        }
        match blocking {
            Some(Blocking::Bound(k)) => {
                x[k] = 0.0;
                working.fixed[k] = true;
            }
            Some(Blocking::Row(i)) => working.rows.push(i),
            None => {}
        }
    }
    false
}

/// Solve the equality-constrained subproblem on the free variables.
/// Returns the full-length step and the multipliers of active rows.
fn kkt_step(
    program: &QuadraticProgram,
    gradient: &[f64],
    free: &[usize],
    rows: &[usize],
) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = program.dimension();
    let nf = free.len();
    let m = rows.len();
    let size = nf + m;
    if size == 0 {
        return Some((vec![0.0; n], Vec::new()));
    }

    let hessian_scale = program.hessian.max_abs();
    let mut regularization = hessian_scale * 1e-14;
    for _ in 0..6 {
        let mut kkt = Matrix::zeros(size, size);
        let mut rhs = vec![0.0; size];
        for (i, &p) in free.iter().enumerate() {
            for (j, &q) in free.iter().enumerate() {
                kkt.set(i, j, program.hessian.get(p, q));
            }
            kkt.add(i, i, regularization);
            rhs[i] = -gradient[p];
        }
        for (r, &row) in rows.iter().enumerate() {
            let coefficients = &program.constraints[row].0;
            for (i, &p) in free.iter().enumerate() {
                kkt.set(nf + r, i, coefficients[p]);
                kkt.set(i, nf + r, coefficients[p]);
            }
            kkt.set(nf + r, nf + r, -regularization);
        }

        if let Some(solution) = solve(&kkt, &rhs) {
            let mut step = vec![0.0; n];
            for (i, &p) in free.iter().enumerate() {
                step[p] = solution[i];
            }
            return Some((step, solution[nf..].to_vec()));
        }
        regularization = (regularization * 1e3).max(1e-14);
    }
    None
}

/// Smallest multiplier over the working set, with where it came from.
fn most_negative_multiplier(
    program: &QuadraticProgram,
    gradient: &[f64],
    working: &WorkingSet,
    row_multipliers: &[f64],
) -> Option<(Blocking, f64)> {
    let mut best: Option<(Blocking, f64)> = None;
    let mut consider = |candidate: Blocking, value: f64| {
        if best.map_or(true, |(_, v)| value < v) {
            best = Some((candidate, value));
        }
    };

    for (position, value) in row_multipliers.iter().enumerate() {
        consider(Blocking::Row(position), *value);
    }
    // Bound x_k ≥ 0: ν_k = ∇f_k + Σ λ_i a_ik.
    for k in 0..program.dimension() {
        if !working.fixed[k] {
            continue;
        }
        let coupling: f64 = working
            .rows
            .iter()
            .zip(row_multipliers)
            .map(|(&row, lambda)| lambda * program.constraints[row].0[k])
            .sum();
        consider(Blocking::Bound(k), gradient[k] + coupling);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::curve::RateCurve;
    use approx::assert_abs_diff_eq;

    fn optimize(assets: &[RateCurve], liabilities: &[RateCurve], cash: f64, cap: f64) -> Vec<f64> {
        LcqpOptimizer::new()
            .perform_optimization(assets, liabilities, cash, cap)
            .unwrap()
    }

    #[test]
    fn test_equal_curves_do_nothing() {
        let x = optimize(
            &[RateCurve::new(-1e-3, 0.10)],
            &[RateCurve::new(1e-3, 0.10)],
            0.0,
            0.3,
        );
        assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_profitable_spread_fills_capital() {
        let x = optimize(
            &[RateCurve::new(-1e-3, 0.20)],
            &[RateCurve::new(1e-3, 0.10)],
            0.0,
            0.3,
        );
        assert_abs_diff_eq!(x[0], 0.3, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 0.3, epsilon = 1e-10);
    }

    #[test]
    fn test_two_by_two_interior_optimum() {
        let x = optimize(
            &[RateCurve::new(-0.99, 0.99), RateCurve::new(-1.05, 1.05)],
            &[RateCurve::new(0.90, 0.90), RateCurve::new(0.95, 0.95)],
            0.0,
            0.3,
        );
        assert_abs_diff_eq!(x[0], 0.010399, epsilon = 1e-6);
        assert_abs_diff_eq!(x[1], 0.038377, epsilon = 1e-6);
        assert_abs_diff_eq!(x[2], 0.038561, epsilon = 1e-6);
        assert_abs_diff_eq!(x[3], 0.010215, epsilon = 1e-6);
        // balance sheet balances exactly
        assert_abs_diff_eq!(x[0] + x[1], x[2] + x[3], epsilon = 1e-12);
    }

    #[test]
    fn test_commercial_loans_funded_from_cash() {
        let x = optimize(
            &[
                RateCurve::new(-0.01, 1.0 / 30.0),
                RateCurve::new(-0.02, 11.0 / 300.0),
                RateCurve::new(-0.04, 12.0 / 300.0),
            ],
            &[RateCurve::new(0.0, 0.01)],
            4.0,
            5.0,
        );
        assert_abs_diff_eq!(x[0], 5.0 / 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 11.0 / 12.0, epsilon = 1e-10);
        assert_abs_diff_eq!(x[2], 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(x[3], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_cash_deficit_is_borrowed() {
        let x = optimize(
            &[RateCurve::new(-0.1, 0.01)],
            &[RateCurve::new(0.1, 0.05)],
            -2.0,
            10.0,
        );
        // the asset is not worth the cost of funds; only the deficit is financed
        assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_large_balance_sheet_stays_finite() {
        let equity = 8.26e8;
        let cash = 8.18e8;
        let assets = [
            RateCurve::new(-1e-10, 0.05),
            RateCurve::new(-1e-10, 0.04),
            RateCurve::new(0.0, 0.0),
        ];
        let liabilities = [RateCurve::new(1e-10, 0.02), RateCurve::new(0.0, 0.0)];
        let x = optimize(&assets, &liabilities, cash, equity * 1.5);
        assert_eq!(x.len(), 5);
        assert!(x.iter().all(|v| v.is_finite() && *v >= 0.0));
        let invested: f64 = x[..3].iter().sum();
        assert!(invested <= equity * 1.5 * (1.0 + 1e-9));
    }

    #[test]
    fn test_infeasible_deficit_returns_zeros() {
        let x = optimize(&[RateCurve::new(-0.1, 0.2)], &[], -1.0, 1.0);
        assert_eq!(x, vec![0.0]);
    }
}
