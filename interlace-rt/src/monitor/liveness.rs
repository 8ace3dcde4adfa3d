//! The liveness checker: hot-state temperatures and cycle detection.

// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::{debug, trace};

// Layer 3: Internal module imports
use crate::runtime::errors::RuntimeError;

/// A monitor currently residing in a hot state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotMonitor {
    pub monitor: String,
    pub state: &'static str,
}

/// Tracks how long each monitor has been hot and, optionally, whether the
/// global program state repeats while some monitor is hot.
///
/// Temperature mode: a monitor's temperature is its number of consecutive
/// scheduling steps spent in a hot state; exceeding the threshold under a
/// fair strategy is a liveness violation. Cycle mode replaces the
/// threshold with exact state-hash repetition.
#[derive(Debug)]
pub struct LivenessChecker {
    temperature_threshold: u64,
    cycle_detection: bool,
    temperatures: Mutex<HashMap<String, u64>>,
    seen_hashes: Mutex<HashSet<u64>>,
}

impl LivenessChecker {
    pub fn new(temperature_threshold: u64, cycle_detection: bool) -> Self {
        Self {
            temperature_threshold,
            cycle_detection,
            temperatures: Mutex::new(HashMap::new()),
            seen_hashes: Mutex::new(HashSet::new()),
        }
    }

    pub fn cycle_detection(&self) -> bool {
        self.cycle_detection
    }

    /// Account one scheduling step. `hot` lists monitors currently in hot
    /// states; `state_hash` is the global state digest when cycle
    /// detection is on; `fair` is whether the installed strategy is fair.
    pub fn on_step(
        &self,
        fair: bool,
        hot: &[HotMonitor],
        state_hash: Option<u64>,
    ) -> Option<RuntimeError> {
        if self.cycle_detection {
            if let Some(hash) = state_hash {
                let repeated = !self.seen_hashes.lock().insert(hash);
                if repeated {
                    if let Some(entry) = hot.first() {
                        debug!(monitor = %entry.monitor, "state repetition while hot");
                        return Some(RuntimeError::LivenessCycle {
                            monitor: entry.monitor.clone(),
                            state: entry.state.to_string(),
                        });
                    }
                }
            }
            return None;
        }

        let mut temperatures = self.temperatures.lock();
        // Cool every monitor not currently hot.
        temperatures.retain(|name, _| hot.iter().any(|h| h.monitor == *name));
        for entry in hot {
            let temperature = temperatures.entry(entry.monitor.clone()).or_insert(0);
            *temperature += 1;
            trace!(monitor = %entry.monitor, temperature = *temperature, "hot step");
            if fair && *temperature > self.temperature_threshold {
                return Some(RuntimeError::LivenessViolation {
                    monitor: entry.monitor.clone(),
                    state: entry.state.to_string(),
                });
            }
        }
        None
    }

    /// Check for monitors still hot when the program ends.
    pub fn at_end(&self, hot: &[HotMonitor]) -> Option<RuntimeError> {
        hot.first().map(|entry| RuntimeError::LivenessEndOfProgram {
            monitor: entry.monitor.clone(),
            state: entry.state.to_string(),
        })
    }
}
