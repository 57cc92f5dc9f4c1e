use crate::graph::network::{Edge, Node};
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;

/// Group rate variables into coupled components.
///
/// Two variables are coupled when some node quotes both: moving one
/// rate can change that node's volume on the other. Components are
/// returned ordered by their smallest variable, each sorted ascending.
pub(crate) fn coupled_components(nodes: &[Node], edges: &[Edge], variable_count: usize) -> Vec<Vec<usize>> {
    let mut sets = UnionFind::<usize>::new(variable_count);
    for node in nodes {
        let mut incident = node.incidences.iter().map(|&e| edges[e].variable);
        if let Some(first) = incident.next() {
            for other in incident {
                sets.union(first, other);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for v in 0..variable_count {
        groups.entry(sets.find(v)).or_default().push(v);
    }
    let mut components: Vec<Vec<usize>> = groups.into_values().collect();
    components.sort_by_key(|c| c[0]);
    components
}
