//! Derivative-free trust-region minimizer with a separable quadratic
//! model.
//!
//! Each iteration samples `2n + 1` points (the centre and one step up
//! and down every axis, clipped to the box), fits a per-coordinate
//! parabola, and minimizes the model over the infinity-norm trust
//! region intersected with the box. The model is separable, so the
//! model step is solved coordinate by coordinate in closed form.

use crate::solver::bounds::Bounds;
use crate::solver::Minimum;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticModelTrustRegion {
    max_iterations: usize,
    initial_radius: f64,
    min_radius: f64,
    target: f64,
}

impl QuadraticModelTrustRegion {
    pub fn new(max_iterations: usize, initial_radius: f64, min_radius: f64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            initial_radius,
            min_radius,
            target: f64::NEG_INFINITY,
        }
    }

    /// Stop as soon as the objective falls to `target`.
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = target;
        self
    }

    pub fn minimize<F>(&self, mut f: F, start: &[f64], bounds: &Bounds) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = start.len();
        let mut evaluations = 0;
        let mut eval = |x: &[f64]| {
            evaluations += 1;
            f(x)
        };

        let mut x = bounds.projected(start);
        let mut value = eval(&x);
        let mut radius = self.initial_radius;
        let mut iterations = 0;

        while iterations < self.max_iterations && radius > self.min_radius && value > self.target {
            iterations += 1;

            let mut step = vec![0.0; n];
            let mut predicted = 0.0;
            let mut best_sample: Option<(Vec<f64>, f64)> = None;

            for i in 0..n {
                let up = radius.min(bounds.upper()[i] - x[i]).max(0.0);
                let down = radius.min(x[i] - bounds.lower()[i]).max(0.0);
                let mut sample = |delta: f64, x: &[f64]| -> f64 {
                    let mut p = x.to_vec();
                    p[i] += delta;
                    bounds.project(&mut p);
                    let v = eval(&p);
                    if best_sample.as_ref().map_or(true, |(_, b)| v < *b) {
                        best_sample = Some((p, v));
                    }
                    v
                };
                let f_up = if up > 0.0 { Some(sample(up, &x)) } else { None };
                let f_down = if down > 0.0 { Some(sample(-down, &x)) } else { None };

                let (s, change) = coordinate_step(value, f_up.map(|v| (up, v)), f_down.map(|v| (down, v)));
                step[i] = s;
                predicted += change;
            }

            let mut trial = x.iter().zip(&step).map(|(a, b)| a + b).collect::<Vec<f64>>();
            bounds.project(&mut trial);
            let trial_value = eval(&trial);
            let actual = value - trial_value;
            let ratio = if predicted < 0.0 { actual / -predicted } else { 0.0 };

            let hits_radius = step.iter().any(|s| s.abs() >= 0.999 * radius);
            if trial_value < value {
                x = trial;
                value = trial_value;
                if ratio > 0.75 && hits_radius {
                    radius *= 2.0;
                } else if ratio < 0.25 {
                    radius *= 0.5;
                }
            } else {
                radius *= 0.5;
            }
            if let Some((point, sample_value)) = best_sample {
                if sample_value < value {
                    x = point;
                    value = sample_value;
                }
            }
        }

        Minimum {
            point: x,
            value,
            iterations,
            evaluations,
        }
    }
}

/// Minimize the parabola through `(0, f0)`, `(up, f_up)` and
/// `(−down, f_down)` on `[−down, up]`. Returns the step and the model
/// change at that step.
fn coordinate_step(f0: f64, up: Option<(f64, f64)>, down: Option<(f64, f64)>) -> (f64, f64) {
    match (up, down) {
        (Some((hu, fu)), Some((hd, fd))) => {
            // f(t) ≈ f0 + g t + ½ c t²
            let du = (fu - f0) / hu;
            let dd = (f0 - fd) / hd;
            let c = 2.0 * (du - dd) / (hu + hd);
            let g = du - 0.5 * c * hu;
            let model = |t: f64| g * t + 0.5 * c * t * t;
            let t = if c > 0.0 {
                (-g / c).clamp(-hd, hu)
            } else if model(hu) <= model(-hd) {
                hu
            } else {
                -hd
            };
            (t, model(t))
        }
        (Some((hu, fu)), None) if fu < f0 => (hu, fu - f0),
        (None, Some((hd, fd))) if fd < f0 => (-hd, fd - f0),
        _ => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_separable_quadratic() {
        let f = |x: &[f64]| (x[0] - 1.0).powi(2) + 3.0 * (x[1] + 2.0).powi(2);
        let result = QuadraticModelTrustRegion::new(200, 0.5, 1e-12).minimize(f, &[0.0, 0.0], &Bounds::unbounded(2));
        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(result.point[1], -2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_decreasing_function_ends_on_corner() {
        let bounds = Bounds::new(vec![-1.0, 0.0, 2.0], vec![1.0, 5.0, 3.0]).unwrap();
        let f = |x: &[f64]| -x.iter().map(|v| (v + 2.0).powi(2)).sum::<f64>();
        let result = QuadraticModelTrustRegion::new(500, 0.1, 1e-12).minimize(f, &[0.0, 1.0, 2.5], &bounds);
        assert_eq!(result.point, vec![1.0, 5.0, 3.0]);
    }

    #[test]
    fn test_coupled_objective() {
        let f = |x: &[f64]| (x[0] + 2.0 * x[1] - 1.0).powi(2) + (x[0] - x[1]).powi(2);
        let result = QuadraticModelTrustRegion::new(2000, 0.25, 1e-14).minimize(f, &[0.0, 0.0], &Bounds::unbounded(2));
        assert!(result.value < 1e-12);
        assert_abs_diff_eq!(result.point[0], 1.0 / 3.0, epsilon = 1e-5);
    }
}
