//! Priority-based exploration in the style of PCT.
//!
//! Every operation receives a random priority; the scheduler always runs
//! the highest-priority enabled operation. A bounded number of priority
//! change points, sampled over the steps of the previous iteration, demote
//! the running operation so that bugs of bounded depth are found with
//! provable probability.

// Layer 1: Standard library imports
use std::collections::BTreeSet;

// Layer 2: Third-party crate imports
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

// Layer 3: Internal module imports
use super::traits::SchedulingStrategy;
use crate::util::OperationId;

pub struct PctStrategy {
    seed: u64,
    iteration: u64,
    rng: StdRng,
    /// Number of priority change points injected per iteration.
    priority_switch_count: u32,
    /// Operations ordered by priority; front is highest.
    prioritized: Vec<OperationId>,
    change_points: BTreeSet<u64>,
    steps: u64,
    max_steps_observed: u64,
}

impl PctStrategy {
    pub fn new(seed: u64, priority_switch_count: u32) -> Self {
        Self {
            seed,
            iteration: 0,
            rng: StdRng::seed_from_u64(seed),
            priority_switch_count,
            prioritized: Vec::new(),
            change_points: BTreeSet::new(),
            steps: 0,
            max_steps_observed: 0,
        }
    }

    /// Insert newly observed operations at random priority positions.
    fn register_new(&mut self, enabled: &[OperationId]) {
        for op in enabled {
            if !self.prioritized.contains(op) {
                let index = self.rng.gen_range(0..=self.prioritized.len());
                self.prioritized.insert(index, *op);
            }
        }
    }

    fn highest_enabled(&self, enabled: &[OperationId]) -> Option<OperationId> {
        self.prioritized.iter().find(|op| enabled.contains(op)).copied()
    }
}

impl SchedulingStrategy for PctStrategy {
    fn name(&self) -> String {
        format!("pct({})", self.priority_switch_count)
    }

    fn next_operation(
        &mut self,
        enabled: &[OperationId],
        _current: OperationId,
    ) -> Option<OperationId> {
        if enabled.is_empty() {
            return None;
        }
        self.steps += 1;
        self.register_new(enabled);

        if self.change_points.contains(&self.steps) {
            if let Some(victim) = self.highest_enabled(enabled) {
                self.prioritized.retain(|op| *op != victim);
                self.prioritized.push(victim);
                trace!(%victim, step = self.steps, "pct priority change point");
            }
        }
        self.highest_enabled(enabled)
    }

    fn next_boolean(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    fn next_integer(&mut self, max_exclusive: u32) -> u32 {
        if max_exclusive <= 1 {
            return 0;
        }
        self.rng.gen_range(0..max_exclusive)
    }

    fn prepare_next_iteration(&mut self) -> bool {
        self.max_steps_observed = self.max_steps_observed.max(self.steps);
        self.rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.iteration));
        self.iteration += 1;
        self.prioritized.clear();
        self.steps = 0;

        // Sample change points over the horizon observed so far.
        let horizon = self.max_steps_observed.max(1);
        self.change_points.clear();
        for _ in 0..self.priority_switch_count {
            self.change_points.insert(self.rng.gen_range(1..=horizon));
        }
        true
    }

    fn is_fair(&self) -> bool {
        false
    }
}
