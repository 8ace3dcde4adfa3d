//! Activity coverage: states, events, and transitions visited during
//! exploration, merged monotonically across iterations.

pub mod formatter;
pub mod graph;

pub use formatter::{CoverageFormatter, JsonCoverageFormatter, TextCoverageFormatter};
pub use graph::{CoverageEdge, CoverageGraph, CoverageNode};

// Layer 1: Standard library imports
use std::collections::{BTreeMap, BTreeSet};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Coverage of one machine or monitor type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineCoverage {
    pub is_monitor: bool,
    pub states: BTreeSet<String>,
    pub events_received: BTreeSet<String>,
    pub events_sent: BTreeSet<String>,
    /// (from state, event, to state)
    pub transitions: BTreeSet<(String, String, String)>,
}

impl MachineCoverage {
    /// Union in another machine's coverage. Idempotent and commutative.
    pub fn merge(&mut self, other: &MachineCoverage) {
        self.is_monitor |= other.is_monitor;
        self.states.extend(other.states.iter().cloned());
        self.events_received
            .extend(other.events_received.iter().cloned());
        self.events_sent.extend(other.events_sent.iter().cloned());
        self.transitions.extend(other.transitions.iter().cloned());
    }

    /// Whether every set of `other` is contained in this coverage.
    pub fn contains(&self, other: &MachineCoverage) -> bool {
        other.states.is_subset(&self.states)
            && other.events_received.is_subset(&self.events_received)
            && other.events_sent.is_subset(&self.events_sent)
            && other.transitions.is_subset(&self.transitions)
    }
}

/// Coverage report of one iteration, or the merge of many.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageInfo {
    /// Keyed by machine/monitor short type name.
    pub machines: BTreeMap<String, MachineCoverage>,
}

impl CoverageInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union in another report. Commutative, idempotent, associative.
    pub fn merge(&mut self, other: &CoverageInfo) {
        for (name, coverage) in &other.machines {
            self.machines
                .entry(name.clone())
                .or_default()
                .merge(coverage);
        }
    }

    /// Whether this report contains everything in `other`.
    pub fn contains(&self, other: &CoverageInfo) -> bool {
        other.machines.iter().all(|(name, coverage)| {
            self.machines
                .get(name)
                .is_some_and(|mine| mine.contains(coverage))
        })
    }
}

/// Per-iteration coverage recorder with interior mutability.
///
/// Disabled collectors are no-ops so the hot path stays cheap when
/// coverage reporting is off.
#[derive(Debug)]
pub struct CoverageCollector {
    enabled: bool,
    info: Mutex<CoverageInfo>,
}

impl CoverageCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            info: Mutex::new(CoverageInfo::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn machine_created(&self, machine: &str, is_monitor: bool) {
        if !self.enabled {
            return;
        }
        let mut info = self.info.lock();
        let entry = info.machines.entry(machine.to_string()).or_default();
        entry.is_monitor |= is_monitor;
    }

    pub fn state_visited(&self, machine: &str, state: &str) {
        if !self.enabled {
            return;
        }
        let mut info = self.info.lock();
        info.machines
            .entry(machine.to_string())
            .or_default()
            .states
            .insert(state.to_string());
    }

    pub fn event_received(&self, machine: &str, event: &str) {
        if !self.enabled {
            return;
        }
        let mut info = self.info.lock();
        info.machines
            .entry(machine.to_string())
            .or_default()
            .events_received
            .insert(event.to_string());
    }

    pub fn event_sent(&self, machine: &str, event: &str) {
        if !self.enabled {
            return;
        }
        let mut info = self.info.lock();
        info.machines
            .entry(machine.to_string())
            .or_default()
            .events_sent
            .insert(event.to_string());
    }

    pub fn transition(&self, machine: &str, from: &str, event: &str, to: &str) {
        if !self.enabled {
            return;
        }
        let mut info = self.info.lock();
        info.machines
            .entry(machine.to_string())
            .or_default()
            .transitions
            .insert((from.to_string(), event.to_string(), to.to_string()));
    }

    pub fn snapshot(&self) -> CoverageInfo {
        self.info.lock().clone()
    }
}

/// Cross-iteration accumulator: concurrent merges, monotonic union.
#[derive(Debug, Default)]
pub struct CoverageAccumulator {
    machines: DashMap<String, MachineCoverage>,
}

impl CoverageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, info: &CoverageInfo) {
        for (name, coverage) in &info.machines {
            self.machines
                .entry(name.clone())
                .or_default()
                .merge(coverage);
        }
    }

    pub fn snapshot(&self) -> CoverageInfo {
        let mut info = CoverageInfo::new();
        for entry in self.machines.iter() {
            info.machines.insert(entry.key().clone(), entry.value().clone());
        }
        info
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn report(machine: &str, state: &str, event: &str) -> CoverageInfo {
        let collector = CoverageCollector::new(true);
        collector.machine_created(machine, false);
        collector.state_visited(machine, state);
        collector.event_received(machine, event);
        collector.transition(machine, state, event, "Next");
        collector.snapshot()
    }

    #[test]
    fn test_merge_is_union() {
        let mut a = report("Node", "Init", "Ping");
        let b = report("Node", "Active", "Pong");
        a.merge(&b);

        let node = &a.machines["Node"];
        assert!(node.states.contains("Init"));
        assert!(node.states.contains("Active"));
        assert!(node.events_received.contains("Ping"));
        assert!(node.events_received.contains("Pong"));
    }

    #[test]
    fn test_merge_commutative() {
        let a = report("Node", "Init", "Ping");
        let b = report("Server", "Start", "Req");

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_merge_idempotent() {
        let a = report("Node", "Init", "Ping");
        let mut twice = a.clone();
        twice.merge(&a);
        assert_eq!(twice, a);
    }

    #[test]
    fn test_merge_associative() {
        let a = report("A", "S1", "E1");
        let b = report("B", "S2", "E2");
        let c = report("C", "S3", "E3");

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        assert_eq!(left, right);
    }

    #[test]
    fn test_merged_report_contains_inputs() {
        let a = report("Node", "Init", "Ping");
        let b = report("Node", "Active", "Pong");
        let mut merged = a.clone();
        merged.merge(&b);
        assert!(merged.contains(&a));
        assert!(merged.contains(&b));
        assert!(!a.contains(&merged));
    }

    #[test]
    fn test_disabled_collector_records_nothing() {
        let collector = CoverageCollector::new(false);
        collector.state_visited("Node", "Init");
        assert!(collector.snapshot().machines.is_empty());
    }

    #[test]
    fn test_accumulator_merges_across_iterations() {
        let accumulator = CoverageAccumulator::new();
        accumulator.merge(&report("Node", "Init", "Ping"));
        accumulator.merge(&report("Node", "Active", "Pong"));

        let merged = accumulator.snapshot();
        assert_eq!(merged.machines["Node"].states.len(), 2);
    }
}
