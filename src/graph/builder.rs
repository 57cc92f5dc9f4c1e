use crate::core::error::{ensure_finite, ClearingError};
use crate::core::instrument::{ClearingInstrument, RateDomain};
use crate::core::participant::{ClearingMarketParticipant, NodeId};
use crate::core::result::ResourceExchangeDelegate;
use crate::graph::components::coupled_components;
use crate::graph::network::{Edge, MixedClearingNetwork, Node, RateVariable};
use crate::response::ResponseFunction;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

struct PendingEdge {
    a: usize,
    b: usize,
    instrument: ClearingInstrument,
    delegate: Rc<dyn ResourceExchangeDelegate>,
    hyperedge: Option<usize>,
}

struct PendingHyperEdge {
    id: String,
    instrument: Option<ClearingInstrument>,
}

/// Assembles a [`MixedClearingNetwork`].
///
/// Every method validates its inputs before touching the builder, so a
/// rejected call leaves the partial network unchanged.
///
/// # Examples
///
/// ```
/// use mixed_clearing::prelude::*;
/// use std::rc::Rc;
///
/// let loans = ClearingInstrument::new("Loans", "Commercial Loan");
/// let delegate = Rc::new(RecordingDelegate::new());
/// let mut builder = MixedClearingNetworkBuilder::new();
/// builder
///     .add_network_node(None, Box::new(CurveResponse::new(|r: f64| 1.0 - r)), "FIRM-1")
///     .unwrap();
/// builder
///     .add_network_node(None, Box::new(CurveResponse::new(|r: f64| -r)), "BANK-1")
///     .unwrap();
/// builder.add_edge("FIRM-1", "BANK-1", delegate, loans).unwrap();
///
/// let network = builder.build();
/// assert_eq!(network.variable_count(), 1);
/// ```
pub struct MixedClearingNetworkBuilder {
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,
    edges: Vec<PendingEdge>,
    hyperedges: Vec<PendingHyperEdge>,
    hyperedge_index: HashMap<String, usize>,
    bilateral_instruments: HashSet<ClearingInstrument>,
    default_domain: RateDomain,
    domains: HashMap<ClearingInstrument, RateDomain>,
    initial_rates: HashMap<ClearingInstrument, f64>,
}

impl Default for MixedClearingNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MixedClearingNetworkBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            hyperedges: Vec::new(),
            hyperedge_index: HashMap::new(),
            bilateral_instruments: HashSet::new(),
            default_domain: RateDomain::default(),
            domains: HashMap::new(),
            initial_rates: HashMap::new(),
        }
    }

    /// Domain for instruments without one of their own.
    pub fn with_default_domain(mut self, domain: RateDomain) -> Self {
        self.default_domain = domain;
        self
    }

    pub fn set_domain(&mut self, instrument: ClearingInstrument, domain: RateDomain) {
        self.domains.insert(instrument, domain);
    }

    /// Starting rate for an instrument; defaults to its domain midpoint.
    pub fn set_initial_rate(&mut self, instrument: ClearingInstrument, rate: f64) -> Result<(), ClearingError> {
        ensure_finite("initial rate", rate)?;
        self.initial_rates.insert(instrument, rate);
        Ok(())
    }

    pub fn add_network_node(
        &mut self,
        participant: Option<Rc<dyn ClearingMarketParticipant>>,
        response: Box<dyn ResponseFunction>,
        id: impl Into<NodeId>,
    ) -> Result<(), ClearingError> {
        let id = id.into();
        if self.node_index.contains_key(&id) {
            return Err(ClearingError::DuplicateNode(id));
        }
        self.node_index.insert(id.clone(), self.nodes.len());
        self.nodes.push(Node {
            id,
            participant,
            response,
            incidences: Vec::new(),
        });
        Ok(())
    }

    fn endpoints(&self, a: &NodeId, b: &NodeId) -> Result<(usize, usize), ClearingError> {
        let ia = *self
            .node_index
            .get(a)
            .ok_or_else(|| ClearingError::UnknownNode(a.clone()))?;
        let ib = *self
            .node_index
            .get(b)
            .ok_or_else(|| ClearingError::UnknownNode(b.clone()))?;
        if ia == ib {
            return Err(ClearingError::SelfEdge(a.clone()));
        }
        Ok((ia, ib))
    }

    /// Bilateral edge between `a` and `b`, cleared at its own rate.
    pub fn add_edge(
        &mut self,
        a: impl Into<NodeId>,
        b: impl Into<NodeId>,
        delegate: Rc<dyn ResourceExchangeDelegate>,
        instrument: ClearingInstrument,
    ) -> Result<(), ClearingError> {
        let (ia, ib) = self.endpoints(&a.into(), &b.into())?;
        if self
            .hyperedges
            .iter()
            .any(|h| h.instrument.as_ref() == Some(&instrument))
        {
            return Err(ClearingError::InstrumentOnHyperEdge(instrument));
        }
        self.bilateral_instruments.insert(instrument.clone());
        self.edges.push(PendingEdge {
            a: ia,
            b: ib,
            instrument,
            delegate,
            hyperedge: None,
        });
        Ok(())
    }

    pub fn add_hyper_edge(&mut self, id: impl Into<String>) -> Result<(), ClearingError> {
        let id = id.into();
        if self.hyperedge_index.contains_key(&id) {
            return Err(ClearingError::DuplicateHyperEdge(id));
        }
        self.hyperedge_index.insert(id.clone(), self.hyperedges.len());
        self.hyperedges.push(PendingHyperEdge {
            id,
            instrument: None,
        });
        Ok(())
    }

    /// Edge between `a` and `b` clearing at the hyperedge's shared rate.
    /// All members of a hyperedge trade the same instrument.
    pub fn add_to_hyper_edge(
        &mut self,
        a: impl Into<NodeId>,
        b: impl Into<NodeId>,
        delegate: Rc<dyn ResourceExchangeDelegate>,
        hyperedge: &str,
        instrument: ClearingInstrument,
    ) -> Result<(), ClearingError> {
        let h = *self
            .hyperedge_index
            .get(hyperedge)
            .ok_or_else(|| ClearingError::UnknownHyperEdge(hyperedge.to_string()))?;
        let (ia, ib) = self.endpoints(&a.into(), &b.into())?;
        match self.hyperedges[h].instrument.clone() {
            Some(expected) if expected != instrument => {
                return Err(ClearingError::InstrumentMismatch {
                    hyperedge: hyperedge.to_string(),
                    expected,
                    found: instrument,
                });
            }
            Some(_) => {}
            None => {
                let taken = self.bilateral_instruments.contains(&instrument)
                    || self
                        .hyperedges
                        .iter()
                        .any(|other| other.instrument.as_ref() == Some(&instrument));
                if taken {
                    return Err(ClearingError::InstrumentOnHyperEdge(instrument));
                }
                self.hyperedges[h].instrument = Some(instrument.clone());
            }
        }
        self.edges.push(PendingEdge {
            a: ia,
            b: ib,
            instrument,
            delegate,
            hyperedge: Some(h),
        });
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Freeze the topology. Variables are numbered by first appearance
    /// in edge insertion order.
    pub fn build(self) -> MixedClearingNetwork {
        let mut nodes = self.nodes;
        let mut edges = Vec::with_capacity(self.edges.len());
        let mut variables: Vec<RateVariable> = Vec::new();
        let mut hyper_variable: Vec<Option<usize>> = vec![None; self.hyperedges.len()];

        for (index, pending) in self.edges.into_iter().enumerate() {
            let existing = pending.hyperedge.and_then(|h| hyper_variable[h]);
            let variable = match existing {
                Some(v) => v,
                None => {
                    let label = match pending.hyperedge {
                        Some(h) => self.hyperedges[h].id.clone(),
                        None => format!(
                            "{} [{} <-> {}]",
                            pending.instrument, nodes[pending.a].id, nodes[pending.b].id
                        ),
                    };
                    let domain = self
                        .domains
                        .get(&pending.instrument)
                        .copied()
                        .unwrap_or(self.default_domain);
                    variables.push(RateVariable {
                        label,
                        instrument: pending.instrument.clone(),
                        domain,
                        edges: Vec::new(),
                        quoters: Vec::new(),
                    });
                    let v = variables.len() - 1;
                    if let Some(h) = pending.hyperedge {
                        hyper_variable[h] = Some(v);
                    }
                    v
                }
            };
            variables[variable].edges.push(index);

            let position_a = nodes[pending.a].incidences.len();
            nodes[pending.a].incidences.push(index);
            let position_b = nodes[pending.b].incidences.len();
            nodes[pending.b].incidences.push(index);

            for (node, position) in [(pending.a, position_a), (pending.b, position_b)] {
                let quoters = &mut variables[variable].quoters;
                match quoters.iter_mut().find(|(n, _)| *n == node) {
                    Some((_, positions)) => positions.push(position),
                    None => quoters.push((node, vec![position])),
                }
            }

            edges.push(Edge {
                a: pending.a,
                b: pending.b,
                position_a,
                position_b,
                instrument: pending.instrument,
                delegate: pending.delegate,
                variable,
            });
        }

        for (h, pending) in self.hyperedges.iter().enumerate() {
            if hyper_variable[h].is_none() {
                debug!("hyperedge {} has no member edges, dropped", pending.id);
            }
        }

        let rates = variables
            .iter()
            .map(|v| match self.initial_rates.get(&v.instrument) {
                Some(rate) => v.domain.clamp(*rate),
                None => v.domain.midpoint(),
            })
            .collect();
        let components = coupled_components(&nodes, &edges, variables.len());
        let hyperedge_count = hyper_variable.iter().filter(|v| v.is_some()).count();

        MixedClearingNetwork::from_parts(nodes, edges, variables, hyperedge_count, components, rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::RecordingDelegate;
    use crate::response::CurveResponse;

    fn node(builder: &mut MixedClearingNetworkBuilder, id: &str, slope: f64) {
        builder
            .add_network_node(None, Box::new(CurveResponse::new(move |r: f64| slope * r)), id)
            .unwrap();
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut builder = MixedClearingNetworkBuilder::new();
        node(&mut builder, "A", 1.0);
        let err = builder
            .add_network_node(None, Box::new(CurveResponse::new(|r: f64| r)), "A")
            .unwrap_err();
        assert!(matches!(err, ClearingError::DuplicateNode(_)));
        assert_eq!(builder.node_count(), 1);
    }

    #[test]
    fn test_edge_validation() {
        let stock = ClearingInstrument::new("Stocks", "ACME");
        let delegate = Rc::new(RecordingDelegate::new());
        let mut builder = MixedClearingNetworkBuilder::new();
        node(&mut builder, "A", 1.0);
        node(&mut builder, "B", -1.0);

        assert!(matches!(
            builder.add_edge("A", "C", delegate.clone(), stock.clone()),
            Err(ClearingError::UnknownNode(_))
        ));
        assert!(matches!(
            builder.add_edge("A", "A", delegate.clone(), stock.clone()),
            Err(ClearingError::SelfEdge(_))
        ));
        assert!(matches!(
            builder.add_to_hyper_edge("A", "B", delegate.clone(), "missing", stock.clone()),
            Err(ClearingError::UnknownHyperEdge(_))
        ));
        assert_eq!(builder.edge_count(), 0);
    }

    #[test]
    fn test_hyperedge_instrument_rules() {
        let acme = ClearingInstrument::new("Stocks", "ACME");
        let init = ClearingInstrument::new("Stocks", "INIT");
        let delegate = Rc::new(RecordingDelegate::new());
        let mut builder = MixedClearingNetworkBuilder::new();
        node(&mut builder, "A", 1.0);
        node(&mut builder, "B", -1.0);
        node(&mut builder, "C", -1.0);

        builder.add_hyper_edge(acme.id()).unwrap();
        assert!(builder.add_hyper_edge(acme.id()).is_err());
        builder
            .add_to_hyper_edge("A", "B", delegate.clone(), &acme.id(), acme.clone())
            .unwrap();
        assert!(matches!(
            builder.add_to_hyper_edge("A", "C", delegate.clone(), &acme.id(), init.clone()),
            Err(ClearingError::InstrumentMismatch { .. })
        ));
        assert!(matches!(
            builder.add_edge("A", "C", delegate.clone(), acme.clone()),
            Err(ClearingError::InstrumentOnHyperEdge(_))
        ));
        builder
            .add_to_hyper_edge("A", "C", delegate, &acme.id(), acme)
            .unwrap();

        let network = builder.build();
        assert_eq!(network.hyperedge_count(), 1);
        assert_eq!(network.variable_count(), 1);
        assert_eq!(network.edge_count(), 2);
        assert_eq!(network.variable_label(0), "Stocks/ACME");
    }

    #[test]
    fn test_initial_rates_and_domains() {
        let loans = ClearingInstrument::new("Loans", "L");
        let stock = ClearingInstrument::new("Stocks", "ACME");
        let delegate = Rc::new(RecordingDelegate::new());
        let mut builder = MixedClearingNetworkBuilder::new();
        node(&mut builder, "A", 1.0);
        node(&mut builder, "B", -1.0);
        builder.set_domain(stock.clone(), RateDomain::new(1.0, 100.0).unwrap());
        builder.set_initial_rate(stock.clone(), 250.0).unwrap();
        assert!(builder.set_initial_rate(loans.clone(), f64::NAN).is_err());
        builder.add_edge("A", "B", delegate.clone(), loans).unwrap();
        builder.add_edge("A", "B", delegate, stock.clone()).unwrap();

        let network = builder.build();
        assert_eq!(network.rate(0), 0.5);
        assert_eq!(network.rate(1), 100.0);
        assert_eq!(network.variable_of(&stock), Some(1));
        // both edges share both nodes
        assert_eq!(network.components().len(), 1);
    }
}
