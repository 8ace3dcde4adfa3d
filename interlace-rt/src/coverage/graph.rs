//! Coverage graph: machines contain states; transitions label edges.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::CoverageInfo;

/// A node: one state of one machine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoverageNode {
    pub machine: String,
    pub state: String,
}

/// A directed edge labeled by the triggering event type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoverageEdge {
    pub from: CoverageNode,
    pub to: CoverageNode,
    pub event: String,
}

/// The full graph: state nodes, labeled transition edges, and
/// machine-to-state containment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageGraph {
    pub nodes: Vec<CoverageNode>,
    pub edges: Vec<CoverageEdge>,
    /// (machine, state) containment pairs, one per node.
    pub containment: Vec<(String, String)>,
}

impl CoverageGraph {
    /// Build the graph from a coverage report. Deterministic: nodes and
    /// edges come out sorted.
    pub fn build(info: &CoverageInfo) -> Self {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut containment = Vec::new();

        for (machine, coverage) in &info.machines {
            for state in &coverage.states {
                nodes.push(CoverageNode {
                    machine: machine.clone(),
                    state: state.clone(),
                });
                containment.push((machine.clone(), state.clone()));
            }
            for (from, event, to) in &coverage.transitions {
                edges.push(CoverageEdge {
                    from: CoverageNode {
                        machine: machine.clone(),
                        state: from.clone(),
                    },
                    to: CoverageNode {
                        machine: machine.clone(),
                        state: to.clone(),
                    },
                    event: event.clone(),
                });
            }
        }

        nodes.sort();
        edges.sort();
        containment.sort();
        Self {
            nodes,
            edges,
            containment,
        }
    }
}
