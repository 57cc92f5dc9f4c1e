use crate::core::error::ClearingError;

/// Axis-aligned box `lower ≤ x ≤ upper`. Infinite limits are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, ClearingError> {
        if lower.len() != upper.len() {
            return Err(ClearingError::InvalidConfig(format!(
                "bounds have {} lower and {} upper limits",
                lower.len(),
                upper.len()
            )));
        }
        for (l, u) in lower.iter().zip(&upper) {
            if l.is_nan() || u.is_nan() || l > u {
                return Err(ClearingError::InvalidDomain {
                    lower: *l,
                    upper: *u,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn unbounded(dimension: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; dimension],
            upper: vec![f64::INFINITY; dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn project(&self, x: &mut [f64]) {
        for (i, v) in x.iter_mut().enumerate() {
            *v = v.clamp(self.lower[i], self.upper[i]);
        }
    }

    pub fn projected(&self, x: &[f64]) -> Vec<f64> {
        let mut y = x.to_vec();
        self.project(&mut y);
        y
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter()
            .enumerate()
            .all(|(i, v)| *v >= self.lower[i] && *v <= self.upper[i])
    }

    /// True when some coordinate lies within `tolerance` of a finite limit.
    pub fn is_on_boundary(&self, x: &[f64], tolerance: f64) -> bool {
        x.iter().enumerate().any(|(i, v)| {
            (self.lower[i].is_finite() && (v - self.lower[i]).abs() <= tolerance)
                || (self.upper[i].is_finite() && (self.upper[i] - v).abs() <= tolerance)
        })
    }

    /// Range of `t` keeping `x + t·direction` inside the box.
    pub fn step_range(&self, x: &[f64], direction: &[f64]) -> (f64, f64) {
        let mut low = f64::NEG_INFINITY;
        let mut high = f64::INFINITY;
        for (i, d) in direction.iter().enumerate() {
            if *d == 0.0 {
                continue;
            }
            let a = (self.lower[i] - x[i]) / d;
            let b = (self.upper[i] - x[i]) / d;
            low = low.max(a.min(b));
            high = high.min(a.max(b));
        }
        (low.min(0.0), high.max(0.0))
    }
}
