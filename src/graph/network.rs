use crate::clearing::ClearingAlgorithm;
use crate::core::error::ClearingError;
use crate::core::instrument::{ClearingInstrument, RateDomain};
use crate::core::opportunity::TradeOpportunity;
use crate::core::participant::{ClearingMarketParticipant, NodeId};
use crate::core::result::{MixedClearingNetworkResult, ResourceExchangeDelegate};
use crate::response::ResponseFunction;
use log::{debug, info};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) participant: Option<Rc<dyn ClearingMarketParticipant>>,
    pub(crate) response: Box<dyn ResponseFunction>,
    /// Incident edges in insertion order; a node's opportunities are
    /// listed in this order.
    pub(crate) incidences: Vec<usize>,
}

pub(crate) struct Edge {
    pub(crate) a: usize,
    pub(crate) b: usize,
    /// Positions of this edge in `a`'s and `b`'s incidence lists.
    pub(crate) position_a: usize,
    pub(crate) position_b: usize,
    pub(crate) instrument: ClearingInstrument,
    pub(crate) delegate: Rc<dyn ResourceExchangeDelegate>,
    pub(crate) variable: usize,
}

/// One unknown rate: a free simple edge, or a hyperedge whose member
/// edges all share it.
#[derive(Debug, Clone)]
pub(crate) struct RateVariable {
    pub(crate) label: String,
    pub(crate) instrument: ClearingInstrument,
    pub(crate) domain: RateDomain,
    pub(crate) edges: Vec<usize>,
    /// `(node, positions)` of every node quoting this rate, with the
    /// positions of the member edges in that node's incidence list.
    pub(crate) quoters: Vec<(usize, Vec<usize>)>,
}

/// Demand and supply seen on one rate variable or one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flow {
    pub demand: f64,
    pub supply: f64,
}

impl Flow {
    fn add(&mut self, volume: f64) {
        if volume > 0.0 {
            self.demand += volume;
        } else {
            self.supply -= volume;
        }
    }

    /// Signed excess demand.
    pub fn excess(&self) -> f64 {
        self.demand - self.supply
    }
}

/// A built clearing network: participants' nodes, bilateral edges and
/// shared-rate hyperedges, plus the current rate of every variable.
///
/// The topology is immutable once built; clearing algorithms only move
/// the rates. Build a fresh network for every clearing session.
pub struct MixedClearingNetwork {
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) variables: Vec<RateVariable>,
    pub(crate) hyperedge_count: usize,
    pub(crate) components: Vec<Vec<usize>>,
    rates: Vec<f64>,
    evaluations: Cell<usize>,
    cleared: Option<f64>,
}

impl MixedClearingNetwork {
    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        variables: Vec<RateVariable>,
        hyperedge_count: usize,
        components: Vec<Vec<usize>>,
        rates: Vec<f64>,
    ) -> Self {
        Self {
            nodes,
            edges,
            variables,
            hyperedge_count,
            components,
            rates,
            evaluations: Cell::new(0),
            cleared: None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn hyperedge_count(&self) -> usize {
        self.hyperedge_count
    }

    /// Number of unknown rates.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn rate(&self, variable: usize) -> f64 {
        self.rates[variable]
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    /// Move a rate, clamped into its domain.
    pub fn set_rate(&mut self, variable: usize, rate: f64) {
        let domain = self.variables[variable].domain;
        if rate.is_finite() {
            self.rates[variable] = domain.clamp(rate);
        }
    }

    pub fn domain(&self, variable: usize) -> RateDomain {
        self.variables[variable].domain
    }

    pub fn instrument(&self, variable: usize) -> &ClearingInstrument {
        &self.variables[variable].instrument
    }

    /// Instrument id for hyperedges, `instrument [a <-> b]` for simple edges.
    pub fn variable_label(&self, variable: usize) -> &str {
        &self.variables[variable].label
    }

    /// Rate variable an instrument clears at, for instruments traded on
    /// a single variable (hyperedges, or a lone simple edge).
    pub fn variable_of(&self, instrument: &ClearingInstrument) -> Option<usize> {
        let mut matches = self
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| &v.instrument == instrument)
            .map(|(i, _)| i);
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Groups of variables coupled through shared nodes.
    pub fn components(&self) -> &[Vec<usize>] {
        &self.components
    }

    /// Response-function evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }

    pub fn participant(&self, id: &NodeId) -> Option<Rc<dyn ClearingMarketParticipant>> {
        self.nodes
            .iter()
            .find(|n| &n.id == id)
            .and_then(|n| n.participant.clone())
    }

    /// Residual of the last applied clearing algorithm.
    pub fn cleared_residual(&self) -> Option<f64> {
        self.cleared
    }

    fn node_volumes(&self, node: usize, query: &[usize]) -> Vec<f64> {
        let n = &self.nodes[node];
        let opportunities: Vec<TradeOpportunity<'_>> = n
            .incidences
            .iter()
            .map(|&e| {
                let edge = &self.edges[e];
                let other = if edge.a == node { edge.b } else { edge.a };
                TradeOpportunity::new(
                    self.rates[edge.variable],
                    &edge.instrument,
                    &self.nodes[other].id,
                )
            })
            .collect();
        self.evaluations.set(self.evaluations.get() + 1);
        n.response.value(query, &opportunities)
    }

    fn all_node_volumes(&self) -> Vec<Vec<f64>> {
        (0..self.nodes.len())
            .map(|node| {
                let query: Vec<usize> = (0..self.nodes[node].incidences.len()).collect();
                self.node_volumes(node, &query)
            })
            .collect()
    }

    /// Demand and supply on one variable at the current rates.
    pub fn variable_flow(&self, variable: usize) -> Flow {
        let mut flow = Flow::default();
        for (node, positions) in &self.variables[variable].quoters {
            for volume in self.node_volumes(*node, positions) {
                flow.add(volume);
            }
        }
        flow
    }

    /// Signed excess demand of one variable.
    pub fn variable_residual(&self, variable: usize) -> f64 {
        self.variable_flow(variable).excess()
    }

    /// Excess demand of one variable with its rate moved to `rate` and
    /// every other rate held fixed.
    pub fn residual_at(&mut self, variable: usize, rate: f64) -> f64 {
        self.set_rate(variable, rate);
        self.variable_residual(variable)
    }

    /// Flow of every variable, evaluating each node once.
    pub fn flows(&self) -> Vec<Flow> {
        let mut flows = vec![Flow::default(); self.variables.len()];
        for (node, volumes) in self.all_node_volumes().into_iter().enumerate() {
            for (position, volume) in volumes.into_iter().enumerate() {
                let edge = self.nodes[node].incidences[position];
                flows[self.edges[edge].variable].add(volume);
            }
        }
        flows
    }

    pub fn residuals(&self) -> Vec<f64> {
        self.flows().iter().map(Flow::excess).collect()
    }

    /// Largest absolute residual `max_v |demand_v − supply_v|`. Every
    /// clearing algorithm reports this and stopping conditions compare
    /// against it.
    pub fn total_residual(&self) -> f64 {
        self.residuals().iter().fold(0.0, |max, r| max.max(r.abs()))
    }

    /// Residuals of `variables` after setting them to `values`. Only the
    /// nodes quoting those variables are evaluated.
    pub fn component_residuals(&mut self, variables: &[usize], values: &[f64]) -> Vec<f64> {
        for (&v, &r) in variables.iter().zip(values) {
            self.set_rate(v, r);
        }
        variables.iter().map(|&v| self.variable_residual(v)).collect()
    }

    /// Run a clearing algorithm and return the residual it reached.
    pub fn apply_clearing_algorithm(&mut self, algorithm: &dyn ClearingAlgorithm) -> f64 {
        let start = self.evaluations();
        let residual = algorithm.clear(self);
        debug!(
            "{}: residual {:.3e} after {} response evaluations",
            algorithm.name(),
            residual,
            self.evaluations() - start
        );
        self.cleared = Some(residual);
        residual
    }

    /// Volumes each edge's endpoints trade with each other, `(a, b)` per
    /// edge.
    ///
    /// A node's responses on the member edges of one variable only
    /// balance against the other side in aggregate. Each node's total on
    /// a variable is therefore spread over its edges in proportion to the
    /// opposite-side totals of the counterparties, so a buyer `i` and a
    /// seller `j` of a pool trade `d_i · s_j / Σ s` and every participant
    /// settles exactly its own total. A node without any opposite-side
    /// counterparty keeps its raw per-edge volumes.
    fn pairwise_allocations(&self, volumes: &[Vec<f64>]) -> Vec<(f64, f64)> {
        let mut totals: HashMap<(usize, usize), f64> = HashMap::new();
        for edge in &self.edges {
            let key = |node: usize| (node, edge.variable);
            *totals.entry(key(edge.a)).or_default() += volumes[edge.a][edge.position_a];
            *totals.entry(key(edge.b)).or_default() += volumes[edge.b][edge.position_b];
        }
        let total = |node: usize, variable: usize| totals.get(&(node, variable)).copied().unwrap_or(0.0);
        // counterparty weight: its total when on the opposite side, else zero
        let weight = |own: f64, other: f64| if own * other < 0.0 { other.abs() } else { 0.0 };

        let mut weight_sums: HashMap<(usize, usize), f64> = HashMap::new();
        for edge in &self.edges {
            let (ta, tb) = (total(edge.a, edge.variable), total(edge.b, edge.variable));
            *weight_sums.entry((edge.a, edge.variable)).or_default() += weight(ta, tb);
            *weight_sums.entry((edge.b, edge.variable)).or_default() += weight(tb, ta);
        }

        let share = |node: usize, other: usize, variable: usize, raw: f64| {
            let own = total(node, variable);
            let sum = weight_sums.get(&(node, variable)).copied().unwrap_or(0.0);
            if sum > 0.0 {
                own * weight(own, total(other, variable)) / sum
            } else {
                raw
            }
        };
        self.edges
            .iter()
            .map(|edge| {
                (
                    share(edge.a, edge.b, edge.variable, volumes[edge.a][edge.position_a]),
                    share(edge.b, edge.a, edge.variable, volumes[edge.b][edge.position_b]),
                )
            })
            .collect()
    }

    /// Commit every edge through its delegate, exactly once each and in
    /// edge insertion order, then drop the network.
    ///
    /// Fails with [`ClearingError::NotCleared`] before any commit when no
    /// clearing algorithm has been applied.
    pub fn create_contracts(self) -> Result<Vec<MixedClearingNetworkResult>, ClearingError> {
        if self.cleared.is_none() {
            return Err(ClearingError::NotCleared);
        }
        let volumes = self.all_node_volumes();

        for (v, flow) in self.flows().iter().enumerate() {
            info!(
                "cleared {} at rate {:.6e}: demand {:.6e}, supply {:.6e}, excess {:+.3e}",
                self.variables[v].label,
                self.rates[v],
                flow.demand,
                flow.supply,
                flow.excess()
            );
        }

        let allocations = self.pairwise_allocations(&volumes);
        let mut results = Vec::with_capacity(self.edges.len());
        for (edge, (volume_a, volume_b)) in self.edges.iter().zip(allocations) {
            let mut flow = Flow::default();
            flow.add(volume_a);
            flow.add(volume_b);
            let result = MixedClearingNetworkResult::new(
                edge.instrument.clone(),
                self.nodes[edge.a].id.clone(),
                self.nodes[edge.b].id.clone(),
                self.rates[edge.variable],
                flow.demand,
                flow.supply,
            );
            edge.delegate.commit(&result);
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::RecordingDelegate;
    use crate::graph::builder::MixedClearingNetworkBuilder;
    use crate::clearing::{MarchClearingAlgorithm, TargetResidualOrMaximumIterations};
    use crate::response::{
        BoundedLinearResponse, CurveResponse, PartitionedResponseFunction, UnbiasedPartitionFunction,
    };

    fn bilateral() -> (MixedClearingNetwork, Rc<RecordingDelegate>) {
        let loans = ClearingInstrument::new("Loans", "L");
        let delegate = Rc::new(RecordingDelegate::new());
        let mut builder = MixedClearingNetworkBuilder::new();
        builder
            .add_network_node(
                None,
                Box::new(CurveResponse::new(BoundedLinearResponse::demand(0.2, 100.0, 50.0))),
                "FIRM",
            )
            .unwrap();
        builder
            .add_network_node(
                None,
                Box::new(CurveResponse::new(BoundedLinearResponse::supply(0.0, 100.0, 50.0))),
                "BANK",
            )
            .unwrap();
        builder
            .add_edge("FIRM", "BANK", delegate.clone(), loans)
            .unwrap();
        (builder.build(), delegate)
    }

    #[test]
    fn test_residual_at_midpoint() {
        let (network, _) = bilateral();
        assert_eq!(network.variable_count(), 1);
        assert_eq!(network.rate(0), 0.5);
        // demand 0, supply capped at 50
        let flow = network.variable_flow(0);
        assert_eq!(flow.demand, 0.0);
        assert_eq!(flow.supply, 50.0);
        assert_eq!(network.total_residual(), 50.0);
    }

    #[test]
    fn test_set_rate_clamps_to_domain() {
        let (mut network, _) = bilateral();
        network.set_rate(0, 3.0);
        assert_eq!(network.rate(0), 1.0);
        network.set_rate(0, f64::NAN);
        assert_eq!(network.rate(0), 1.0);
    }

    #[test]
    fn test_contracts_require_clearing() {
        let (network, delegate) = bilateral();
        assert!(matches!(network.create_contracts(), Err(ClearingError::NotCleared)));
        assert_eq!(delegate.commit_count(), 0);
    }

    #[test]
    fn test_reported_residual_is_largest_absolute_excess() {
        let (mut network, _) = bilateral();
        // equilibrium is 0.1; the slope of the excess is −200
        network.set_rate(0, 0.1 + 2.5e-8);
        let excess = network.variable_residual(0);
        assert!((excess + 5e-6).abs() < 1e-9);
        assert!((network.total_residual() - 5e-6).abs() < 1e-9);

        let algorithm = MarchClearingAlgorithm::ascending(
            100,
            1e-12,
            Box::new(TargetResidualOrMaximumIterations::new(1e-10, 10)),
        );
        let residual = network.apply_clearing_algorithm(&algorithm);
        assert!(residual <= 1e-10);
        assert!(network.variable_residual(0).abs() <= 1e-10);
    }

    #[test]
    fn test_pool_members_settle_their_own_totals() {
        let stock = ClearingInstrument::new("Stocks", "ACME");
        let delegate = Rc::new(RecordingDelegate::new());
        let mut builder = MixedClearingNetworkBuilder::new();
        let curves = [
            ("B1", BoundedLinearResponse::demand(0.4, 100.0, 1e3)),
            ("B2", BoundedLinearResponse::demand(0.6, 100.0, 1e3)),
            ("S1", BoundedLinearResponse::supply(0.1, 100.0, 1e3)),
        ];
        for (name, curve) in curves {
            builder
                .add_network_node(
                    None,
                    Box::new(PartitionedResponseFunction::new(UnbiasedPartitionFunction, curve)),
                    name,
                )
                .unwrap();
        }
        builder.add_hyper_edge(stock.id()).unwrap();
        for buyer in ["B1", "B2"] {
            builder
                .add_to_hyper_edge(buyer, "S1", delegate.clone(), &stock.id(), stock.clone())
                .unwrap();
        }
        let mut network = builder.build();
        network.apply_clearing_algorithm(&MarchClearingAlgorithm::ascending(
            100,
            1e-12,
            Box::new(TargetResidualOrMaximumIterations::new(1e-12, 10)),
        ));
        let rate = network.rate(0);
        assert!((rate - 1.1 / 3.0).abs() < 1e-12);

        // the seller quotes both buyers at one rate and splits its supply
        // evenly, yet each pair must trade exactly the buyer's demand
        let results = network.create_contracts().unwrap();
        for (result, pivot) in results.iter().zip([0.4, 0.6]) {
            let demand = 100.0 * (pivot - rate);
            assert!((result.demand() - demand).abs() < 1e-9);
            assert!((result.supply() - demand).abs() < 1e-9);
        }
        let sold: f64 = results.iter().map(|r| r.supply()).sum();
        assert!((sold - 100.0 * (rate - 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_residual_at_moves_only_one_rate() {
        let (mut network, _) = bilateral();
        // demand 100·(0.2 − 0.1) = 10, supply 100·0.1 = 10
        assert!(network.residual_at(0, 0.1).abs() < 1e-12);
        assert_eq!(network.rate(0), 0.1);
    }
}
