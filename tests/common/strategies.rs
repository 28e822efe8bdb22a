use proptest::prelude::*;
use proptest::strategy::Just;

/// A dependency graph over tasks `0..task_count`; every edge points from a task to one
/// registered before it, so the graph is acyclic by construction
#[derive(Debug, Clone)]
pub struct DagShape {
    pub task_count: usize,
    /// `(task, dependency)` pairs with `dependency < task`
    pub edges: Vec<(usize, usize)>,
}

impl DagShape {
    pub fn task_id(index: usize) -> String {
        format!("task-{index}")
    }

    pub fn dependencies_of(&self, task: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|(from, _)| *from == task)
            .map(|(_, to)| *to)
            .collect()
    }

    /// All transitive dependencies of `task`
    pub fn ancestors_of(&self, task: usize) -> Vec<usize> {
        let mut seen = vec![false; self.task_count];
        let mut stack = self.dependencies_of(task);
        while let Some(next) = stack.pop() {
            if !seen[next] {
                seen[next] = true;
                stack.extend(self.dependencies_of(next));
            }
        }
        (0..self.task_count).filter(|i| seen[*i]).collect()
    }
}

/// Strategy for generating acyclic dependency graphs of 1 to 12 tasks
pub fn dag_strategy() -> impl Strategy<Value = DagShape> {
    (1usize..=12).prop_flat_map(|task_count| {
        let edge = (1..task_count.max(2))
            .prop_flat_map(|from| (Just(from), 0..from));
        let edges = if task_count < 2 {
            Just(Vec::new()).boxed()
        } else {
            prop::collection::vec(edge, 0..task_count * 2).boxed()
        };
        edges.prop_map(move |mut edges| {
            edges.sort_unstable();
            edges.dedup();
            DagShape { task_count, edges }
        })
    })
}

/// Strategy for registration orders: a permutation of `0..task_count`
pub fn registration_order_strategy(task_count: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..task_count).collect::<Vec<_>>()).prop_shuffle()
}

/// Strategy for retry attempt budgets
pub fn max_attempts_strategy() -> impl Strategy<Value = u32> {
    1u32..=6
}

/// Strategy for backoff factors between linear and aggressive growth
pub fn backoff_factor_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(1.0), Just(1.5), Just(2.0), Just(3.0)]
}
