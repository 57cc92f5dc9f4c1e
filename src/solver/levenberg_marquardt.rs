use crate::optimization::linalg::{solve, Matrix};
use crate::solver::bounds::Bounds;
use crate::solver::Minimum;

/// Damped Gauss–Newton least squares: minimizes `Σ r_k(x)²` for a
/// residual vector `r`, using a forward-difference Jacobian and
/// projecting every trial point into the box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardt {
    max_iterations: usize,
    target: f64,
    initial_damping: f64,
}

impl LevenbergMarquardt {
    /// Stops when the sum of squares reaches `target` or after
    /// `max_iterations` Jacobian evaluations.
    pub fn new(max_iterations: usize, target: f64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            target,
            initial_damping: 1e-3,
        }
    }

    pub fn minimize<F>(&self, mut residuals: F, start: &[f64], bounds: &Bounds) -> Minimum
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let n = start.len();
        let mut evaluations = 0;
        let mut eval = |x: &[f64]| {
            evaluations += 1;
            residuals(x)
        };

        let mut x = bounds.projected(start);
        let mut r = eval(&x);
        let mut cost = sum_of_squares(&r);
        let mut damping = self.initial_damping;
        let mut iterations = 0;

        while iterations < self.max_iterations && cost > self.target && n > 0 {
            iterations += 1;
            let m = r.len();

            // forward differences, stepping backwards at an upper limit
            let mut jacobian = Matrix::zeros(m, n);
            for j in 0..n {
                let mut h = f64::EPSILON.sqrt() * x[j].abs().max(1e-2);
                if x[j] + h > bounds.upper()[j] {
                    h = -h;
                }
                let mut shifted = x.clone();
                shifted[j] += h;
                let rs = eval(&shifted);
                for k in 0..m {
                    jacobian.set(k, j, (rs[k] - r[k]) / h);
                }
            }

            let mut jtj = Matrix::zeros(n, n);
            let mut jtr = vec![0.0; n];
            for a in 0..n {
                for b in 0..n {
                    let value: f64 = (0..m).map(|k| jacobian.get(k, a) * jacobian.get(k, b)).sum();
                    jtj.set(a, b, value);
                }
                jtr[a] = -(0..m).map(|k| jacobian.get(k, a) * r[k]).sum::<f64>();
            }

            let mut improved = false;
            while damping < 1e16 {
                let mut system = jtj.clone();
                for a in 0..n {
                    system.add(a, a, damping * (jtj.get(a, a) + 1e-12));
                }
                if let Some(step) = solve(&system, &jtr) {
                    let mut trial: Vec<f64> = x.iter().zip(&step).map(|(xi, s)| xi + s).collect();
                    bounds.project(&mut trial);
                    let trial_r = eval(&trial);
                    let trial_cost = sum_of_squares(&trial_r);
                    if trial_cost < cost {
                        x = trial;
                        r = trial_r;
                        cost = trial_cost;
                        damping = (damping / 10.0).max(1e-12);
                        improved = true;
                        break;
                    }
                }
                damping *= 10.0;
            }
            if !improved {
                break;
            }
        }

        Minimum {
            point: x,
            value: cost,
            iterations,
            evaluations,
        }
    }
}

fn sum_of_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}
