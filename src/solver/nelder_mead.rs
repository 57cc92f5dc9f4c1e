use crate::solver::bounds::Bounds;
use crate::solver::Minimum;

/// Downhill simplex minimizer. Vertices are projected into the box after
/// every move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    max_iterations: usize,
    tolerance: f64,
    initial_step: f64,
}

impl NelderMead {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            tolerance,
            initial_step: 0.05,
        }
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    pub fn minimize<F>(&self, mut f: F, start: &[f64], bounds: &Bounds) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = start.len();
        let origin = bounds.projected(start);
        let mut evaluations = 0;
        let mut eval = |x: &[f64]| {
            evaluations += 1;
            f(x)
        };

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        let value = eval(&origin);
        simplex.push((origin.clone(), value));
        for i in 0..n {
            let mut vertex = origin.clone();
            let step = self.initial_step * origin[i].abs().max(1.0);
            vertex[i] += step;
            bounds.project(&mut vertex);
            if vertex[i] == origin[i] {
                vertex[i] -= step;
                bounds.project(&mut vertex);
            }
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        let mut iterations = 0;
        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let best = simplex[0].1;
            let worst = simplex[n].1;
            if (worst - best).abs() <= self.tolerance * (best.abs() + worst.abs()) + f64::MIN_POSITIVE {
                break;
            }
            iterations += 1;

            let mut centroid = vec![0.0; n];
            for (vertex, _) in &simplex[..n] {
                for (c, v) in centroid.iter_mut().zip(vertex) {
                    *c += v / n as f64;
                }
            }
            let toward = |t: f64, from: &[f64]| -> Vec<f64> {
                let mut p: Vec<f64> = centroid
                    .iter()
                    .zip(from)
                    .map(|(c, w)| c + t * (w - c))
                    .collect();
                bounds.project(&mut p);
                p
            };

            let worst_point = simplex[n].0.clone();
            let reflected = toward(-1.0, &worst_point);
            let reflected_value = eval(&reflected);

            if reflected_value < simplex[0].1 {
                let expanded = toward(-2.0, &worst_point);
                let expanded_value = eval(&expanded);
                simplex[n] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
                continue;
            }
            if reflected_value < simplex[n - 1].1 {
                simplex[n] = (reflected, reflected_value);
                continue;
            }

            let contracted = if reflected_value < worst {
                toward(-0.5, &worst_point)
            } else {
                toward(0.5, &worst_point)
            };
            let contracted_value = eval(&contracted);
            if contracted_value < worst.min(reflected_value) {
                simplex[n] = (contracted, contracted_value);
                continue;
            }

            // shrink towards the best vertex
            let best_point = simplex[0].0.clone();
            for (vertex, value) in simplex.iter_mut().skip(1) {
                for (v, b) in vertex.iter_mut().zip(&best_point) {
                    *v = b + 0.5 * (*v - b);
                }
                *value = eval(vertex);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
            evaluations,
        }
    }
}
