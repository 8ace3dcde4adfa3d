//! Testing configuration with sensible defaults.

// Layer 1: Standard library
use std::path::PathBuf;

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

// Layer 3: Internal
// (none initially)

/// Default number of schedules to explore
pub const DEFAULT_TESTING_ITERATIONS: u64 = 1;

/// Default per-iteration step cap (0 = unlimited); also the fairness horizon
pub const DEFAULT_MAX_SCHEDULING_STEPS: u64 = 10_000;

/// Default strategy-specific bound (priority switches / switch exponent)
pub const DEFAULT_STRATEGY_BOUND: u32 = 2;

/// Default hot-state residence limit for the liveness checker
pub const DEFAULT_LIVENESS_TEMPERATURE_THRESHOLD: u64 = 1_000;

/// Which exploration strategy drives the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    #[default]
    Random,
    Dfs,
    Prioritization,
    Probabilistic,
    Replay,
}

/// Configuration of a systematic testing run.
///
/// # Examples
///
/// ```rust
/// use interlace_rt::runtime::{Configuration, StrategyKind};
///
/// let config = Configuration::builder()
///     .with_testing_iterations(100)
///     .with_strategy(StrategyKind::Prioritization)
///     .with_strategy_bound(3)
///     .with_random_seed(7)
///     .build()
///     .unwrap();
/// assert_eq!(config.testing_iterations, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Number of schedules to explore.
    pub testing_iterations: u64,

    /// Per-iteration step cap (0 = unlimited); also the fairness horizon.
    pub max_scheduling_steps: u64,

    /// Exploration strategy.
    pub scheduling_strategy: StrategyKind,

    /// Strategy-specific parameter: priority change points for
    /// prioritization, switch-probability exponent for probabilistic.
    pub strategy_bound: u32,

    /// Seed for reproducible exploration.
    pub random_seed: u64,

    /// Detect liveness cycles by hashing the global state each step.
    pub enable_cycle_detection: bool,

    /// Mix user `hashed_state` contributions into the cycle hash.
    pub enable_user_defined_state_hashing: bool,

    /// Consecutive hot scheduling steps tolerated under a fair strategy.
    pub liveness_temperature_threshold: u64,

    /// Allow specification monitors outside the controlled runtime.
    pub enable_monitors_in_production: bool,

    /// Trace file to record to, or to replay from with `StrategyKind::Replay`.
    pub schedule_file: Option<PathBuf>,

    /// Enable activity-coverage accounting.
    pub report_activity_coverage: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            testing_iterations: DEFAULT_TESTING_ITERATIONS,
            max_scheduling_steps: DEFAULT_MAX_SCHEDULING_STEPS,
            scheduling_strategy: StrategyKind::default(),
            strategy_bound: DEFAULT_STRATEGY_BOUND,
            random_seed: 0,
            enable_cycle_detection: false,
            enable_user_defined_state_hashing: false,
            liveness_temperature_threshold: DEFAULT_LIVENESS_TEMPERATURE_THRESHOLD,
            enable_monitors_in_production: false,
            schedule_file: None,
            report_activity_coverage: false,
        }
    }
}

impl Configuration {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.testing_iterations == 0 {
            return Err("testing_iterations must be > 0".to_string());
        }
        if self.scheduling_strategy == StrategyKind::Probabilistic && self.strategy_bound > 31 {
            return Err("strategy_bound must be <= 31 for the probabilistic strategy".to_string());
        }
        if self.scheduling_strategy == StrategyKind::Replay && self.schedule_file.is_none() {
            return Err("replay requires a schedule_file".to_string());
        }
        Ok(())
    }

    /// The step cap handed to the scheduler; `None` when unlimited.
    pub fn step_cap(&self) -> Option<u64> {
        (self.max_scheduling_steps > 0).then_some(self.max_scheduling_steps)
    }

    /// The step count past which the fair wrapper switches to round-robin.
    pub fn fairness_threshold(&self) -> u64 {
        match self.step_cap() {
            Some(steps) => steps / 2,
            None => DEFAULT_MAX_SCHEDULING_STEPS / 2,
        }
    }
}

/// Builder for [`Configuration`] with fluent API.
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    config: Configuration,
}

impl ConfigurationBuilder {
    pub fn with_testing_iterations(mut self, iterations: u64) -> Self {
        self.config.testing_iterations = iterations;
        self
    }

    pub fn with_max_scheduling_steps(mut self, steps: u64) -> Self {
        self.config.max_scheduling_steps = steps;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.config.scheduling_strategy = strategy;
        self
    }

    pub fn with_strategy_bound(mut self, bound: u32) -> Self {
        self.config.strategy_bound = bound;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.config.enable_cycle_detection = enabled;
        self
    }

    pub fn with_user_defined_state_hashing(mut self, enabled: bool) -> Self {
        self.config.enable_user_defined_state_hashing = enabled;
        self
    }

    pub fn with_liveness_temperature_threshold(mut self, threshold: u64) -> Self {
        self.config.liveness_temperature_threshold = threshold;
        self
    }

    pub fn with_monitors_in_production(mut self, enabled: bool) -> Self {
        self.config.enable_monitors_in_production = enabled;
        self
    }

    pub fn with_schedule_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.schedule_file = Some(path.into());
        self
    }

    pub fn with_activity_coverage(mut self, enabled: bool) -> Self {
        self.config.report_activity_coverage = enabled;
        self
    }

    pub fn build(self) -> Result<Configuration, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        let config = Configuration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.testing_iterations, DEFAULT_TESTING_ITERATIONS);
        assert_eq!(config.max_scheduling_steps, DEFAULT_MAX_SCHEDULING_STEPS);
        assert_eq!(config.scheduling_strategy, StrategyKind::Random);
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = Configuration::builder()
            .with_testing_iterations(500)
            .with_strategy(StrategyKind::Probabilistic)
            .with_strategy_bound(3)
            .with_random_seed(42)
            .with_cycle_detection(true)
            .build()
            .unwrap();
        assert_eq!(config.testing_iterations, 500);
        assert_eq!(config.scheduling_strategy, StrategyKind::Probabilistic);
        assert_eq!(config.strategy_bound, 3);
        assert_eq!(config.random_seed, 42);
        assert!(config.enable_cycle_detection);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = Configuration::builder().with_testing_iterations(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_replay_requires_schedule_file() {
        let result = Configuration::builder()
            .with_strategy(StrategyKind::Replay)
            .build();
        assert!(result.is_err());

        let result = Configuration::builder()
            .with_strategy(StrategyKind::Replay)
            .with_schedule_file("trace.schedule")
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_probabilistic_bound_capped() {
        let result = Configuration::builder()
            .with_strategy(StrategyKind::Probabilistic)
            .with_strategy_bound(40)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_step_cap_zero_means_unlimited() {
        let config = Configuration::builder()
            .with_max_scheduling_steps(0)
            .build()
            .unwrap();
        assert_eq!(config.step_cap(), None);
    }
}
