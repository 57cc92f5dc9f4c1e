use crate::core::instrument::ClearingInstrument;
use crate::core::participant::NodeId;
use thiserror::Error;

/// Errors raised by the clearing subsystem.
///
/// Numerical non-convergence is not an error; it is reported
/// through the residual returned by a clearing algorithm.
#[derive(Debug, Error)]
pub enum ClearingError {
    #[error("duplicate network node id '{0}'")]
    DuplicateNode(NodeId),
    #[error("unknown network node '{0}'")]
    UnknownNode(NodeId),
    #[error("edge endpoints must differ, got '{0}' on both sides")]
    SelfEdge(NodeId),
    #[error("duplicate hyperedge '{0}'")]
    DuplicateHyperEdge(String),
    #[error("unknown hyperedge '{0}'")]
    UnknownHyperEdge(String),
    #[error("hyperedge '{hyperedge}' trades {expected}, cannot add an edge trading {found}")]
    InstrumentMismatch {
        hyperedge: String,
        expected: ClearingInstrument,
        found: ClearingInstrument,
    },
    #[error("instrument {0} is already traded on a hyperedge")]
    InstrumentOnHyperEdge(ClearingInstrument),
    #[error("unknown instrument {0}")]
    UnknownInstrument(ClearingInstrument),
    #[error("invalid rate domain [{lower}, {upper}]")]
    InvalidDomain { lower: f64, upper: f64 },
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },
    #[error("invalid portfolio problem: {0}")]
    InvalidPortfolio(String),
    #[error("network has not been cleared yet")]
    NotCleared,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reject NaN and infinities with a descriptive error.
pub(crate) fn ensure_finite(what: &'static str, value: f64) -> Result<f64, ClearingError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ClearingError::NonFinite { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClearingError::DuplicateNode(NodeId::new("BANK-1"));
        assert_eq!(err.to_string(), "duplicate network node id 'BANK-1'");

        let err = ClearingError::InstrumentMismatch {
            hyperedge: "Stocks/ACME".to_string(),
            expected: ClearingInstrument::new("Stocks", "ACME"),
            found: ClearingInstrument::new("Stocks", "INIT"),
        };
        assert!(err.to_string().contains("Stocks/INIT"));
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("rate", 0.1).is_ok());
        assert!(ensure_finite("rate", f64::NAN).is_err());
        assert!(ensure_finite("rate", f64::INFINITY).is_err());
    }
}
