/// Snapshot handed to a [`StoppingCondition`] before every outer pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearingProgress {
    /// Outer passes completed so far.
    pub iteration: usize,
    /// Largest absolute residual after the last pass.
    pub residual: f64,
    /// Response-function evaluations ("orders" placed with
    /// participants) so far in this session.
    pub orders: usize,
}

/// Termination policy of a clearing algorithm's outer loop.
pub trait StoppingCondition {
    fn should_stop(&self, progress: &ClearingProgress) -> bool;

    /// Whether stopping at `progress` counts as success. Policies
    /// without a residual goal always succeed.
    fn reached_target(&self, _progress: &ClearingProgress) -> bool {
        true
    }
}

/// Stop once the residual is at or below `target`, or after
/// `max_iterations` passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetResidualOrMaximumIterations {
    target: f64,
    max_iterations: usize,
}

impl TargetResidualOrMaximumIterations {
    pub fn new(target: f64, max_iterations: usize) -> Self {
        Self {
            target,
            max_iterations,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }
}

impl StoppingCondition for TargetResidualOrMaximumIterations {
    fn should_stop(&self, progress: &ClearingProgress) -> bool {
        progress.residual <= self.target || progress.iteration >= self.max_iterations
    }

    fn reached_target(&self, progress: &ClearingProgress) -> bool {
        progress.residual <= self.target
    }
}

/// Stop after `max_orders` response evaluations or `max_iterations`
/// passes, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderOrIterations {
    max_orders: usize,
    max_iterations: usize,
}

impl OrderOrIterations {
    pub fn new(max_orders: usize, max_iterations: usize) -> Self {
        Self {
            max_orders,
            max_iterations,
        }
    }
}

impl StoppingCondition for OrderOrIterations {
    fn should_stop(&self, progress: &ClearingProgress) -> bool {
        progress.orders >= self.max_orders || progress.iteration >= self.max_iterations
    }
}

impl<S: StoppingCondition + ?Sized> StoppingCondition for Box<S> {
    fn should_stop(&self, progress: &ClearingProgress) -> bool {
        (**self).should_stop(progress)
    }

    fn reached_target(&self, progress: &ClearingProgress) -> bool {
        (**self).reached_target(progress)
    }
}
