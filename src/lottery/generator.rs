//! Random draw generator
//!
//! Winning numbers are produced by rejection sampling: pick a uniform
//! integer in range, discard it if already chosen, repeat until enough
//! distinct numbers are collected.

use rand::Rng;
use std::collections::BTreeSet;

use crate::error::{LotteryError, LotteryResult};
use crate::types::{DrawType, WinningNumbers};

/// Source of uniform integers for draws
pub trait RandomSource {
    /// Uniform integer in `low..=high`
    fn uniform(&mut self, low: u32, high: u32) -> u32;
}

impl<R: Rng> RandomSource for R {
    fn uniform(&mut self, low: u32, high: u32) -> u32 {
        self.gen_range(low..=high)
    }
}

/// Draw `count` distinct integers in `1..=max_number`, sorted ascending.
///
/// Asking for more numbers than the range holds is a programming error
/// and is reported as [`LotteryError::DrawRange`].
pub fn generate<R: RandomSource + ?Sized>(
    count: usize,
    max_number: u32,
    rng: &mut R,
) -> LotteryResult<Vec<u32>> {
    if max_number == 0 || count > max_number as usize {
        return Err(LotteryError::DrawRange { count, max_number });
    }

    let mut chosen = BTreeSet::new();
    while chosen.len() < count {
        chosen.insert(rng.uniform(1, max_number));
    }

    Ok(chosen.into_iter().collect())
}

/// Winning numbers for a draw type
pub fn draw_numbers<R: RandomSource + ?Sized>(
    draw_type: DrawType,
    rng: &mut R,
) -> LotteryResult<WinningNumbers> {
    let numbers = generate(draw_type.number_count(), draw_type.max_number(), rng)?;
    Ok(WinningNumbers::new(numbers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Replays a fixed sequence, cycling when exhausted
    struct Scripted {
        values: Vec<u32>,
        pos: usize,
    }

    impl RandomSource for Scripted {
        fn uniform(&mut self, _low: u32, _high: u32) -> u32 {
            let v = self.values[self.pos % self.values.len()];
            self.pos += 1;
            v
        }
    }

    #[test]
    fn test_generate_distinct_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let nums = generate(5, 50, &mut rng).unwrap();
            assert_eq!(nums.len(), 5);
            assert!(nums.windows(2).all(|w| w[0] < w[1]));
            assert!(nums.iter().all(|n| (1..=50).contains(n)));
        }
    }

    #[test]
    fn test_duplicates_are_rejected_and_redrawn() {
        let mut rng = Scripted {
            values: vec![12, 12, 4, 12, 4, 30],
            pos: 0,
        };
        let nums = generate(3, 30, &mut rng).unwrap();
        assert_eq!(nums, vec![4, 12, 30]);
        assert_eq!(rng.pos, 6);
    }

    #[test]
    fn test_full_range_draw() {
        let mut rng = StdRng::seed_from_u64(1);
        let nums = generate(30, 30, &mut rng).unwrap();
        assert_eq!(nums, (1..=30).collect::<Vec<_>>());
    }

    #[test]
    fn test_count_above_range_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate(31, 30, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            LotteryError::DrawRange {
                count: 31,
                max_number: 30
            }
        ));
    }

    #[test]
    fn test_draw_numbers_follow_draw_type() {
        let mut rng = StdRng::seed_from_u64(42);
        let weekly = draw_numbers(DrawType::Weekly, &mut rng).unwrap();
        assert_eq!(weekly.len(), 3);
        assert!(weekly.as_slice().iter().all(|n| *n <= 30));

        let monthly = draw_numbers(DrawType::Monthly, &mut rng).unwrap();
        assert_eq!(monthly.len(), 5);
        assert!(monthly.as_slice().iter().all(|n| *n <= 50));
    }
}
