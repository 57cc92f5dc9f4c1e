//! Derivative-free numerical toolkit used by the clearing algorithms.

pub mod bounds;
pub mod levenberg_marquardt;
pub mod line_search;
pub mod nelder_mead;
pub mod root;
pub mod trust_region;

pub use bounds::Bounds;
pub use levenberg_marquardt::LevenbergMarquardt;
pub use line_search::{BrentLineSearch, LineMinimum};
pub use nelder_mead::NelderMead;
pub use root::{BrentRootFinder, Root};
pub use trust_region::QuadraticModelTrustRegion;

/// Best point found by a multivariate minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
}
