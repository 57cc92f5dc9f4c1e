use crate::core::opportunity::TradeOpportunity;
use crate::response::function::ResponseFunction;

/// Wraps a continuous response and adds jumps at fixed rates, to model
/// discontinuous supply or demand.
///
/// Each queried volume gains the sum of every jump whose threshold is
/// at or below that opportunity's rate. Jumps should carry the same
/// direction as the inner curve's slope (negative for demand and for
/// supply alike under the signed convention) so the wrapped response
/// stays monotone.
pub struct StepResponseFunction<R> {
    inner: R,
    steps: Vec<(f64, f64)>,
}

impl<R: ResponseFunction> StepResponseFunction<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            steps: Vec::new(),
        }
    }

    /// Add a jump of `volume` at `rate`.
    pub fn with_step(mut self, rate: f64, volume: f64) -> Self {
        self.steps.push((rate, volume));
        self
    }

    fn offset(&self, rate: f64) -> f64 {
        self.steps
            .iter()
            .filter(|(threshold, _)| *threshold <= rate)
            .map(|(_, jump)| jump)
            .sum()
    }
}

impl<R: ResponseFunction> ResponseFunction for StepResponseFunction<R> {
    fn value(&self, query: &[usize], opportunities: &[TradeOpportunity<'_>]) -> Vec<f64> {
        let base = self.inner.value(query, opportunities);
        query
            .iter()
            .zip(base)
            .map(|(&i, v)| v + self.offset(opportunities[i].rate))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instrument::ClearingInstrument;
    use crate::core::participant::NodeId;
    use crate::response::function::CurveResponse;

    #[test]
    fn test_jump_applies_at_and_above_threshold() {
        let instrument = ClearingInstrument::new("Loans", "L");
        let peer = NodeId::new("P");
        let response = StepResponseFunction::new(CurveResponse::new(|r: f64| 2.0 - r))
            .with_step(0.5, -0.25);

        let below = [TradeOpportunity::new(0.4, &instrument, &peer)];
        let at = [TradeOpportunity::new(0.5, &instrument, &peer)];
        assert!((response.value(&[0], &below)[0] - 1.6).abs() < 1e-12);
        assert!((response.value(&[0], &at)[0] - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_multiple_steps_accumulate() {
        let instrument = ClearingInstrument::new("Loans", "L");
        let peer = NodeId::new("P");
        let response = StepResponseFunction::new(CurveResponse::new(|_r: f64| 0.0))
            .with_step(0.1, -1.0)
            .with_step(0.2, -2.0);
        let opportunities = [
            TradeOpportunity::new(0.05, &instrument, &peer),
            TradeOpportunity::new(0.15, &instrument, &peer),
            TradeOpportunity::new(0.25, &instrument, &peer),
        ];
        assert_eq!(response.value(&[0, 1, 2], &opportunities), vec![0.0, -1.0, -3.0]);
    }
}
