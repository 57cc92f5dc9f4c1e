use crate::core::error::{ensure_finite, ClearingError};
use serde::{Deserialize, Serialize};

/// Smallest curvature the optimizers work with. Zero-slope (linear)
/// curves are floored to it so the problem stays strictly convex.
pub const MIN_CURVATURE: f64 = 1e-12;

/// Linear market-impact curve `rate(x) = slope · x + intercept`.
///
/// Asset curves have `slope ≤ 0` (diminishing return with size),
/// liability curves `slope ≥ 0` (rising marginal cost).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateCurve {
    pub slope: f64,
    pub intercept: f64,
}

impl RateCurve {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn rate(&self, volume: f64) -> f64 {
        self.slope * volume + self.intercept
    }

    /// Volume maximizing `rate(x) · x` on its own: `−intercept / (2 · slope)`.
    pub fn unconstrained_optimum(&self) -> f64 {
        if self.slope == 0.0 {
            return f64::INFINITY;
        }
        -self.intercept / (2.0 * self.slope)
    }
}

/// A portfolio return-maximization problem in canonical minimization
/// form: minimize `Σ ½ q_k x_k² + g_k x_k` over `x ≥ 0`, subject to
/// `Σ a ≤ capital` and `Σ a − Σ l ≤ cash`.
///
/// Variables are ordered `[assets.., liabilities..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioProblem {
    curvature: Vec<f64>,
    linear: Vec<f64>,
    asset_count: usize,
    cash: f64,
    capital: f64,
}

impl PortfolioProblem {
    pub fn new(
        assets: &[RateCurve],
        liabilities: &[RateCurve],
        cash: f64,
        capital_constraint: f64,
    ) -> Result<Self, ClearingError> {
        ensure_finite("existing cash", cash)?;
        ensure_finite("capital constraint", capital_constraint)?;

        let mut curvature = Vec::with_capacity(assets.len() + liabilities.len());
        let mut linear = Vec::with_capacity(assets.len() + liabilities.len());

        for (i, curve) in assets.iter().enumerate() {
            ensure_finite("asset slope", curve.slope)?;
            ensure_finite("asset intercept", curve.intercept)?;
            if curve.slope > 0.0 {
                return Err(ClearingError::InvalidPortfolio(format!(
                    "asset {} has positive market impact {}",
                    i, curve.slope
                )));
            }
            curvature.push((-2.0 * curve.slope).max(2.0 * MIN_CURVATURE));
            linear.push(-curve.intercept);
        }
        for (j, curve) in liabilities.iter().enumerate() {
            ensure_finite("liability slope", curve.slope)?;
            ensure_finite("liability intercept", curve.intercept)?;
            if curve.slope < 0.0 {
                return Err(ClearingError::InvalidPortfolio(format!(
                    "liability {} has negative market impact {}",
                    j, curve.slope
                )));
            }
            curvature.push((2.0 * curve.slope).max(2.0 * MIN_CURVATURE));
            linear.push(curve.intercept);
        }

        Ok(Self {
            curvature,
            linear,
            asset_count: assets.len(),
            cash,
            capital: capital_constraint.max(0.0),
        })
    }

    pub fn dimension(&self) -> usize {
        self.curvature.len()
    }

    pub fn asset_count(&self) -> usize {
        self.asset_count
    }

    pub fn liability_count(&self) -> usize {
        self.curvature.len() - self.asset_count
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn curvature(&self) -> &[f64] {
        &self.curvature
    }

    pub fn linear(&self) -> &[f64] {
        &self.linear
    }

    /// Negative cash with nothing to borrow from cannot be balanced.
    pub fn is_feasible(&self) -> bool {
        self.cash >= 0.0 || self.liability_count() > 0
    }

    /// Net return `Σ rate(a)·a − Σ rate(l)·l` of an allocation.
    pub fn profit(&self, allocation: &[f64]) -> f64 {
        -allocation
            .iter()
            .enumerate()
            .map(|(k, x)| 0.5 * self.curvature[k] * x * x + self.linear[k] * x)
            .sum::<f64>()
    }

    /// Largest violation of any constraint, zero when feasible.
    pub fn violation(&self, allocation: &[f64]) -> f64 {
        let assets: f64 = allocation[..self.asset_count].iter().sum();
        let liabilities: f64 = allocation[self.asset_count..].iter().sum();
        let negative = allocation.iter().fold(0.0_f64, |m, x| m.max(-x));
        negative
            .max(assets - self.capital)
            .max(assets - liabilities - self.cash)
            .max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_optimum() {
        let curve = RateCurve::new(-0.01, 1.0 / 30.0);
        assert!((curve.unconstrained_optimum() - 5.0 / 3.0).abs() < 1e-12);
        assert!((curve.rate(1.0) - (1.0 / 30.0 - 0.01)).abs() < 1e-15);
        assert!(RateCurve::new(0.0, 0.1).unconstrained_optimum().is_infinite());
    }

    #[test]
    fn test_rejects_wrong_impact_sign() {
        let bad_asset = PortfolioProblem::new(&[RateCurve::new(0.1, 0.1)], &[], 1.0, 1.0);
        assert!(bad_asset.is_err());
        let bad_liability = PortfolioProblem::new(&[], &[RateCurve::new(-0.1, 0.1)], 1.0, 1.0);
        assert!(bad_liability.is_err());
        let nan_cash = PortfolioProblem::new(&[], &[], f64::NAN, 1.0);
        assert!(nan_cash.is_err());
    }

    #[test]
    fn test_profit_and_violation() {
        let problem = PortfolioProblem::new(
            &[RateCurve::new(-1e-3, 0.2)],
            &[RateCurve::new(1e-3, 0.1)],
            0.0,
            0.3,
        )
        .unwrap();
        let profit = problem.profit(&[0.3, 0.3]);
        let expected = (0.2 - 1e-3 * 0.3) * 0.3 - (0.1 + 1e-3 * 0.3) * 0.3;
        assert!((profit - expected).abs() < 1e-15);
        assert_eq!(problem.violation(&[0.3, 0.3]), 0.0);
        assert!(problem.violation(&[0.4, 0.4]) > 0.09);
    }
}
