//! Coin-flip exploration biased toward staying on the current operation.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Layer 3: Internal module imports
use super::traits::SchedulingStrategy;
use crate::util::OperationId;

/// Keeps running the current operation, switching with probability
/// `1 / 2^switch_exponent`.
///
/// Low exponents behave like uniform random; higher exponents produce long
/// runs of the same operation, which exposes bugs that need few context
/// switches.
pub struct ProbabilisticStrategy {
    seed: u64,
    iteration: u64,
    rng: StdRng,
    switch_exponent: u32,
}

impl ProbabilisticStrategy {
    pub fn new(seed: u64, switch_exponent: u32) -> Self {
        Self {
            seed,
            iteration: 0,
            rng: StdRng::seed_from_u64(seed),
            switch_exponent: switch_exponent.min(31),
        }
    }

    fn should_switch(&mut self) -> bool {
        let denominator = 1u32 << self.switch_exponent;
        self.rng.gen_ratio(1, denominator)
    }
}

impl SchedulingStrategy for ProbabilisticStrategy {
    fn name(&self) -> String {
        format!("probabilistic({})", self.switch_exponent)
    }

    fn next_operation(
        &mut self,
        enabled: &[OperationId],
        current: OperationId,
    ) -> Option<OperationId> {
        if enabled.is_empty() {
            return None;
        }
        if enabled.contains(&current) && !self.should_switch() {
            return Some(current);
        }
        let index = self.rng.gen_range(0..enabled.len());
        Some(enabled[index])
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
        self.rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.iteration));
        self.iteration += 1;
        true
    }

    fn is_fair(&self) -> bool {
        // The switch coin has fixed positive probability, so every
        // continually-enabled operation is eventually selected.
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ops(values: &[u64]) -> Vec<OperationId> {
        values.iter().copied().map(OperationId::new).collect()
    }

    #[test]
    fn test_exponent_zero_always_switch_candidate() {
        // With exponent 0 the coin always asks to switch; selection is
        // uniform but must stay inside the enabled set.
        let enabled = ops(&[1, 2, 3]);
        let mut s = ProbabilisticStrategy::new(3, 0);
        s.prepare_next_iteration();
        for _ in 0..32 {
            let chosen = s
                .next_operation(&enabled, OperationId::new(1))
                .unwrap();
            assert!(enabled.contains(&chosen));
        }
    }

    #[test]
    fn test_high_exponent_mostly_continues() {
        let enabled = ops(&[1, 2, 3]);
        let current = OperationId::new(2);
        let mut s = ProbabilisticStrategy::new(3, 10);
        s.prepare_next_iteration();

        let mut stayed = 0;
        for _ in 0..100 {
            if s.next_operation(&enabled, current) == Some(current) {
                stayed += 1;
            }
        }
        assert!(stayed > 80, "stayed only {stayed} of 100 steps");
    }

    #[test]
    fn test_current_not_enabled_switches() {
        let enabled = ops(&[5]);
        let mut s = ProbabilisticStrategy::new(3, 10);
        s.prepare_next_iteration();
        assert_eq!(
            s.next_operation(&enabled, OperationId::new(9)),
            Some(OperationId::new(5))
        );
    }

    #[test]
    fn test_deterministic_under_seed() {
        let enabled = ops(&[0, 1, 2]);
        let mut a = ProbabilisticStrategy::new(21, 2);
        let mut b = ProbabilisticStrategy::new(21, 2);
        a.prepare_next_iteration();
        b.prepare_next_iteration();
        for _ in 0..64 {
            assert_eq!(
                a.next_operation(&enabled, OperationId::ROOT),
                b.next_operation(&enabled, OperationId::ROOT)
            );
        }
    }
}
