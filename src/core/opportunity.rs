use crate::core::instrument::ClearingInstrument;
use crate::core::participant::NodeId;

/// A single rate quote handed to a response function: the rate, the
/// instrument it applies to and the counterparty offering it.
///
/// A response function may receive several opportunities at once and
/// decide on all of them jointly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeOpportunity<'a> {
    pub rate: f64,
    pub instrument: &'a ClearingInstrument,
    pub counterparty: &'a NodeId,
}

impl<'a> TradeOpportunity<'a> {
    pub fn new(rate: f64, instrument: &'a ClearingInstrument, counterparty: &'a NodeId) -> Self {
        Self {
            rate,
            instrument,
            counterparty,
        }
    }
}

/// Indices of the opportunities grouped by instrument, groups ordered by
/// first appearance.
pub fn group_by_instrument(opportunities: &[TradeOpportunity<'_>]) -> Vec<Vec<usize>> {
    let mut groups: Vec<(&ClearingInstrument, Vec<usize>)> = Vec::new();
    for (i, opportunity) in opportunities.iter().enumerate() {
        match groups.iter_mut().find(|(instrument, _)| *instrument == opportunity.instrument) {
            Some((_, members)) => members.push(i),
            None => groups.push((opportunity.instrument, vec![i])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}
