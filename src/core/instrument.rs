use crate::core::error::ClearingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a tradable resource: the market it trades in and the
/// instrument name within that market.
///
/// Instruments are immutable value objects and are used as map keys
/// throughout the clearing subsystem.
///
/// # Examples
///
/// ```
/// use mixed_clearing::core::instrument::ClearingInstrument;
///
/// let loans = ClearingInstrument::new("Loans", "Commercial Loan");
/// let bonds = ClearingInstrument::new("Bonds", "Bank Bond");
/// assert_ne!(loans, bonds);
/// assert_eq!(loans.to_string(), "Loans/Commercial Loan");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClearingInstrument {
    market: String,
    name: String,
}

impl ClearingInstrument {
    pub fn new(market: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            name: name.into(),
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used for hyperedges: `market/name`.
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ClearingInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.market, self.name)
    }
}

/// Closed interval of admissible clearing rates for one instrument.
///
/// Interest rates usually live in `[0, 1]`, stock prices in
/// `[ε, large]`. Clearing algorithms never move a rate outside its
/// domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateDomain {
    pub lower: f64,
    pub upper: f64,
}

impl RateDomain {
    /// Create a domain, rejecting non-finite or inverted bounds.
    pub fn new(lower: f64, upper: f64) -> Result<Self, ClearingError> {
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(ClearingError::InvalidDomain { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub fn clamp(&self, rate: f64) -> f64 {
        rate.clamp(self.lower, self.upper)
    }

    pub fn contains(&self, rate: f64) -> bool {
        rate >= self.lower && rate <= self.upper
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl Default for RateDomain {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }
}
