//! Splitting one participant's aggregate curve across several
//! simultaneous counterparties.
//!
//! A participant facing quotes `r_1..r_n` on one instrument gives
//! counterparty `i` the volume `w_i · A(r_i)`, where `A` is its aggregate
//! curve and the weights `w` come from a [`PartitionFunction`]. Quotes on
//! different instruments are split independently. Every partition
//! function returns weights that sum to one and reduce to `1/n` when all
//! quotes are equal, and each weight is non-decreasing in the
//! counterparty's own quote for suppliers (non-increasing for
//! demanders), which keeps the split monotone for the clearing solvers.

use crate::core::opportunity::{group_by_instrument, TradeOpportunity};
use crate::response::function::{AggregateResponse, ResponseFunction};

pub trait PartitionFunction {
    /// Weights for every quote, summing to one.
    fn partition(&self, rates: &[f64]) -> Vec<f64>;
}

/// Income-weighted exponential split for suppliers:
/// `w_i = exp(β r_i) / Σ_k exp(β r_k)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpIOCPartitionFunction {
    sensitivity: f64,
}

impl ExpIOCPartitionFunction {
    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }
}

impl Default for ExpIOCPartitionFunction {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PartitionFunction for ExpIOCPartitionFunction {
    fn partition(&self, rates: &[f64]) -> Vec<f64> {
        softmax(rates, self.sensitivity)
    }
}

/// Cost-weighted exponential split for demanders:
/// `w_i = exp(−β r_i) / Σ_k exp(−β r_k)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseExpIOCPartitionFunction {
    sensitivity: f64,
}

impl InverseExpIOCPartitionFunction {
    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }
}

impl Default for InverseExpIOCPartitionFunction {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PartitionFunction for InverseExpIOCPartitionFunction {
    fn partition(&self, rates: &[f64]) -> Vec<f64> {
        softmax(rates, -self.sensitivity)
    }
}

/// Equal split by degree, regardless of quotes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UnbiasedPartitionFunction;

impl PartitionFunction for UnbiasedPartitionFunction {
    fn partition(&self, rates: &[f64]) -> Vec<f64> {
        if rates.is_empty() {
            return Vec::new();
        }
        vec![1.0 / rates.len() as f64; rates.len()]
    }
}

// Shifted by the largest exponent so large β·r cannot overflow.
fn softmax(rates: &[f64], beta: f64) -> Vec<f64> {
    if rates.is_empty() {
        return Vec::new();
    }
    let exponents: Vec<f64> = rates.iter().map(|r| beta * r).collect();
    let shift = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = exponents.iter().map(|e| (e - shift).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Aggregate curve plus the rule that splits it among counterparties.
pub struct PartitionedResponseFunction<P, A> {
    partition: P,
    inner: A,
}

impl<P: PartitionFunction, A: AggregateResponse> PartitionedResponseFunction<P, A> {
    pub fn new(partition: P, inner: A) -> Self {
        Self { partition, inner }
    }
}

impl<P: PartitionFunction, A: AggregateResponse> ResponseFunction
    for PartitionedResponseFunction<P, A>
{
    fn value(&self, query: &[usize], opportunities: &[TradeOpportunity<'_>]) -> Vec<f64> {
        let mut weights = vec![0.0; opportunities.len()];
        for group in group_by_instrument(opportunities) {
            let rates: Vec<f64> = group.iter().map(|&i| opportunities[i].rate).collect();
            for (&i, w) in group.iter().zip(self.partition.partition(&rates)) {
                weights[i] = w;
            }
        }
        query
            .iter()
            .map(|&i| weights[i] * self.inner.aggregate(opportunities[i].rate))
            .collect()
    }
}
