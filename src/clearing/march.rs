use crate::clearing::algorithm::{run_passes, ClearingAlgorithm, EdgeSolver};
use crate::clearing::stopping::StoppingCondition;
use crate::graph::network::MixedClearingNetwork;

/// Order in which a march visits the rate variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOrder {
    /// Variable insertion order.
    Ascending,
    /// Reverse insertion order.
    Descending,
    /// Ascending on even passes, descending on odd ones.
    Alternating,
}

impl SweepOrder {
    fn sequence(self, count: usize, pass: usize) -> Box<dyn Iterator<Item = usize>> {
        let forward = match self {
            SweepOrder::Ascending => true,
            SweepOrder::Descending => false,
            SweepOrder::Alternating => pass % 2 == 0,
        };
        if forward {
            Box::new(0..count)
        } else {
            Box::new((0..count).rev())
        }
    }
}

/// Gauss–Seidel relaxation: each pass solves every variable in turn
/// with the others held at their latest values.
pub struct MarchClearingAlgorithm {
    order: SweepOrder,
    edge: EdgeSolver,
    stopping: Box<dyn StoppingCondition>,
}

impl MarchClearingAlgorithm {
    pub fn new(
        order: SweepOrder,
        edge_iterations: usize,
        edge_accuracy: f64,
        stopping: Box<dyn StoppingCondition>,
    ) -> Self {
        Self {
            order,
            edge: EdgeSolver::new(edge_iterations, edge_accuracy),
            stopping,
        }
    }

    pub fn ascending(edge_iterations: usize, edge_accuracy: f64, stopping: Box<dyn StoppingCondition>) -> Self {
        Self::new(SweepOrder::Ascending, edge_iterations, edge_accuracy, stopping)
    }

    pub fn descending(edge_iterations: usize, edge_accuracy: f64, stopping: Box<dyn StoppingCondition>) -> Self {
        Self::new(SweepOrder::Descending, edge_iterations, edge_accuracy, stopping)
    }

    pub fn alternating(edge_iterations: usize, edge_accuracy: f64, stopping: Box<dyn StoppingCondition>) -> Self {
        Self::new(SweepOrder::Alternating, edge_iterations, edge_accuracy, stopping)
    }

    pub fn order(&self) -> SweepOrder {
        self.order
    }
}

/// One relaxation sweep over every variable.
pub(crate) fn sweep(network: &mut MixedClearingNetwork, edge: &EdgeSolver, order: SweepOrder, pass: usize) {
    for variable in order.sequence(network.variable_count(), pass) {
        edge.solve(network, variable);
    }
}

impl ClearingAlgorithm for MarchClearingAlgorithm {
    fn name(&self) -> &'static str {
        match self.order {
            SweepOrder::Ascending => "ascending-march",
            SweepOrder::Descending => "descending-march",
            SweepOrder::Alternating => "alternating-march",
        }
    }

    fn clear(&self, network: &mut MixedClearingNetwork) -> f64 {
        let edge = self.edge;
        let order = self.order;
        run_passes(network, self.stopping.as_ref(), self.name(), |network, pass| {
            sweep(network, &edge, order, pass)
        })
    }
}
