//! Uniform random exploration.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Layer 3: Internal module imports
use super::traits::SchedulingStrategy;
use crate::util::OperationId;

/// Picks uniformly among enabled operations and values.
///
/// Seeded for reproducibility: each iteration reseeds from `seed + i`, so a
/// failing iteration can be replayed by seed alone.
pub struct RandomStrategy {
    seed: u64,
    iteration: u64,
    rng: StdRng,
}

impl RandomStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            iteration: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl SchedulingStrategy for RandomStrategy {
    fn name(&self) -> String {
        "random".to_string()
    }

    fn next_operation(
        &mut self,
        enabled: &[OperationId],
        _current: OperationId,
    ) -> Option<OperationId> {
        if enabled.is_empty() {
            return None;
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
        // Uniform selection eventually schedules every continually-enabled
        // operation given an unbounded step budget.
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
    fn test_same_seed_same_choices() {
        let enabled = ops(&[0, 1, 2, 3]);
        let mut a = RandomStrategy::new(9);
        let mut b = RandomStrategy::new(9);
        a.prepare_next_iteration();
        b.prepare_next_iteration();

        for _ in 0..64 {
            assert_eq!(
                a.next_operation(&enabled, OperationId::ROOT),
                b.next_operation(&enabled, OperationId::ROOT)
            );
            assert_eq!(a.next_boolean(), b.next_boolean());
            assert_eq!(a.next_integer(10), b.next_integer(10));
        }
    }

    #[test]
    fn test_choices_stay_in_enabled() {
        let enabled = ops(&[4, 7]);
        let mut s = RandomStrategy::new(1);
        s.prepare_next_iteration();
        for _ in 0..32 {
            let chosen = s.next_operation(&enabled, OperationId::ROOT).unwrap();
            assert!(enabled.contains(&chosen));
        }
    }

    #[test]
    fn test_empty_enabled_returns_none() {
        let mut s = RandomStrategy::new(1);
        assert_eq!(s.next_operation(&[], OperationId::ROOT), None);
    }

    #[test]
    fn test_integer_bounds() {
        let mut s = RandomStrategy::new(5);
        assert_eq!(s.next_integer(0), 0);
        assert_eq!(s.next_integer(1), 0);
        for _ in 0..32 {
            assert!(s.next_integer(3) < 3);
        }
    }

    #[test]
    fn test_never_exhausts() {
        let mut s = RandomStrategy::new(5);
        for _ in 0..10 {
            assert!(s.prepare_next_iteration());
        }
    }
}
