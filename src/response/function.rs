use crate::core::opportunity::TradeOpportunity;

/// The contract every clearing participant implements.
///
/// Given the full vector of rates currently quoted to a participant,
/// return the desired signed volume for each queried opportunity
/// (positive = buy/borrow, negative = sell/lend). Implementations must
/// be pure: solvers evaluate the same point many times.
pub trait ResponseFunction {
    /// `query` holds indices into `opportunities`; the output has one
    /// entry per query index, in query order.
    fn value(&self, query: &[usize], opportunities: &[TradeOpportunity<'_>]) -> Vec<f64>;
}

impl<R: ResponseFunction + ?Sized> ResponseFunction for Box<R> {
    fn value(&self, query: &[usize], opportunities: &[TradeOpportunity<'_>]) -> Vec<f64> {
        (**self).value(query, opportunities)
    }
}

/// A scalar volume-vs-rate curve: the aggregate a participant wants to
/// trade at a single rate, before it is split among counterparties.
pub trait AggregateResponse {
    fn aggregate(&self, rate: f64) -> f64;
}

impl<F: Fn(f64) -> f64> AggregateResponse for F {
    fn aggregate(&self, rate: f64) -> f64 {
        self(rate)
    }
}

/// Linear curve clipped to `[0, max_volume]`, signed by side.
///
/// Demand falls linearly to zero at `pivot_rate`; supply rises
/// linearly from zero at `pivot_rate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedLinearResponse {
    pivot_rate: f64,
    sensitivity: f64,
    max_volume: f64,
    sign: f64,
}

impl BoundedLinearResponse {
    /// Demand `clamp(sensitivity · (pivot_rate − r), 0, max_volume)`.
    pub fn demand(pivot_rate: f64, sensitivity: f64, max_volume: f64) -> Self {
        Self {
            pivot_rate,
            sensitivity: sensitivity.abs(),
            max_volume: max_volume.max(0.0),
            sign: 1.0,
        }
    }

    /// Supply `−clamp(sensitivity · (r − pivot_rate), 0, max_volume)`.
    pub fn supply(pivot_rate: f64, sensitivity: f64, max_volume: f64) -> Self {
        Self {
            pivot_rate,
            sensitivity: sensitivity.abs(),
            max_volume: max_volume.max(0.0),
            sign: -1.0,
        }
    }

    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }
}

impl AggregateResponse for BoundedLinearResponse {
    fn aggregate(&self, rate: f64) -> f64 {
        let distance = if self.sign > 0.0 {
            self.pivot_rate - rate
        } else {
            rate - self.pivot_rate
        };
        self.sign * (self.sensitivity * distance).clamp(0.0, self.max_volume)
    }
}

/// Trivial response: every opportunity is answered independently by
/// the same aggregate curve, with no splitting.
pub struct CurveResponse<A> {
    curve: A,
}

impl<A: AggregateResponse> CurveResponse<A> {
    pub fn new(curve: A) -> Self {
        Self { curve }
    }
}

impl<A: AggregateResponse> ResponseFunction for CurveResponse<A> {
    fn value(&self, query: &[usize], opportunities: &[TradeOpportunity<'_>]) -> Vec<f64> {
        query
            .iter()
            .map(|&i| self.curve.aggregate(opportunities[i].rate))
            .collect()
    }
}
