//! Clearing session configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "algorithm": "levenberg-marquardt",
//!   "edge_iterations": 200,
//!   "network_iterations": 100,
//!   "target_residual": 1e-12,
//!   "domain": { "lower": 0.0, "upper": 1.0 },
//!   "acceptance_threshold": 1e-10,
//!   "portfolio_solver": "domino"
//! }
//! ```
//!
//! Every field is optional; missing ones take the defaults below.

use crate::clearing::{
    AlgorithmKind, ClearingAlgorithm, OrderOrIterations, StoppingCondition, TargetResidualOrMaximumIterations,
};
use crate::core::error::ClearingError;
use crate::core::instrument::RateDomain;
use crate::market::MixedNetworkMarket;
use crate::optimization::PortfolioSolver;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearingConfig {
    /// Forced clearing algorithm; `None` lets the market choose by
    /// topology.
    pub algorithm: Option<AlgorithmKind>,
    /// Root-finder iteration cap per rate variable.
    pub edge_iterations: usize,
    /// Absolute residual goal per rate variable.
    pub edge_accuracy: f64,
    /// Outer pass cap.
    pub network_iterations: usize,
    /// Largest absolute residual at which clearing stops early.
    pub target_residual: f64,
    /// Response-evaluation budget; switches the stopping condition to
    /// an order count when set.
    pub max_orders: Option<usize>,
    /// Rate domain of instruments without an explicit one.
    pub domain: RateDomain,
    /// Residual above which a session is rejected without contracts;
    /// `None` accepts any finite residual.
    pub acceptance_threshold: Option<f64>,
    pub portfolio_solver: PortfolioSolver,
}

impl Default for ClearingConfig {
    fn default() -> Self {
        Self {
            algorithm: None,
            edge_iterations: 200,
            edge_accuracy: 1e-12,
            network_iterations: 100,
            target_residual: 1e-12,
            max_orders: None,
            domain: RateDomain::default(),
            acceptance_threshold: None,
            portfolio_solver: PortfolioSolver::default(),
        }
    }
}

impl ClearingConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ClearingError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClearingError> {
        Self::from_json(&fs::read_to_string(path.as_ref())?)
    }

    pub fn to_json(&self) -> Result<String, ClearingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ClearingError> {
        if self.edge_iterations == 0 {
            return Err(ClearingError::InvalidConfig("edge_iterations must be positive".into()));
        }
        if self.network_iterations == 0 {
            return Err(ClearingError::InvalidConfig("network_iterations must be positive".into()));
        }
        if !(self.edge_accuracy.is_finite() && self.edge_accuracy > 0.0) {
            return Err(ClearingError::InvalidConfig(format!(
                "edge_accuracy must be positive, got {}",
                self.edge_accuracy
            )));
        }
        if !(self.target_residual.is_finite() && self.target_residual >= 0.0) {
            return Err(ClearingError::InvalidConfig(format!(
                "target_residual must be non-negative, got {}",
                self.target_residual
            )));
        }
        if let Some(threshold) = self.acceptance_threshold {
            if threshold.is_nan() || threshold < 0.0 {
                return Err(ClearingError::InvalidConfig(format!(
                    "acceptance_threshold must be non-negative, got {}",
                    threshold
                )));
            }
        }
        RateDomain::new(self.domain.lower, self.domain.upper)
            .map_err(|err| ClearingError::InvalidConfig(err.to_string()))?;
        Ok(())
    }

    pub fn stopping_condition(&self) -> Box<dyn StoppingCondition> {
        match self.max_orders {
            Some(orders) => Box::new(OrderOrIterations::new(orders, self.network_iterations)),
            None => Box::new(TargetResidualOrMaximumIterations::new(
                self.target_residual,
                self.network_iterations,
            )),
        }
    }

    /// The configured algorithm, or `fallback` when none is forced.
    pub fn clearing_algorithm(&self, fallback: AlgorithmKind) -> Box<dyn ClearingAlgorithm> {
        self.algorithm
            .unwrap_or(fallback)
            .build(self.edge_iterations, self.edge_accuracy, self.stopping_condition())
    }

    /// Empty market carrying this configuration's accuracy, threshold
    /// and forced algorithm.
    pub fn market(&self) -> MixedNetworkMarket {
        let mut market = MixedNetworkMarket::new()
            .with_edge_accuracy(self.edge_accuracy)
            .with_default_domain(self.domain);
        if let Some(threshold) = self.acceptance_threshold {
            market = market.with_acceptance_threshold(threshold);
        }
        if let Some(kind) = self.algorithm {
            market = market.with_algorithm(kind);
        }
        market
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = ClearingConfig::from_json("{}").unwrap();
        assert_eq!(config, ClearingConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = ClearingConfig::from_json(
            r#"{"algorithm": "nelder-mead", "network_iterations": 7, "portfolio_solver": "lcqp"}"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Some(AlgorithmKind::NelderMead));
        assert_eq!(config.network_iterations, 7);
        assert_eq!(config.portfolio_solver, PortfolioSolver::Lcqp);
        assert_eq!(config.edge_iterations, 200);
        assert_eq!(config.clearing_algorithm(AlgorithmKind::AscendingMarch).name(), "nelder-mead");
    }

    #[test]
    fn test_validation_errors() {
        for json in [
            r#"{"edge_iterations": 0}"#,
            r#"{"edge_accuracy": -1.0}"#,
            r#"{"domain": {"lower": 1.0, "upper": 0.0}}"#,
            r#"{"acceptance_threshold": -2.0}"#,
        ] {
            let err = ClearingConfig::from_json(json).unwrap_err();
            assert!(matches!(err, ClearingError::InvalidConfig(_)), "{}", json);
        }
        assert!(matches!(
            ClearingConfig::from_json(r#"{"algorithm": "simplex"}"#),
            Err(ClearingError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = ClearingConfig {
            max_orders: Some(5000),
            acceptance_threshold: Some(1e-9),
            ..ClearingConfig::default()
        };
        let parsed = ClearingConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
