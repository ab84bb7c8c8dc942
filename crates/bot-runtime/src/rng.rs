use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

fn next_random_bounded_with<F>(state: &mut u32, bound: u32, mut next: F) -> u32
where
    F: FnMut(&mut u32) -> u32,
{
    let threshold = (u64::from(u32::MAX) + 1) / u64::from(bound) * u64::from(bound);
    let mut candidate = next(state);
    while u64::from(candidate) >= threshold {
        candidate = next(state);
    }
    candidate % bound
}

fn seed_from_clock() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos() ^ (elapsed.as_secs() as u32))
        .unwrap_or(0x9e37_79b9)
}

/// Process-wide uniform picker; one generator shared by every session
/// instead of reseeding per reply.
#[derive(Debug)]
pub struct ReplyPicker {
    state: Mutex<u32>,
}

impl ReplyPicker {
    pub fn new(seed: Option<u32>) -> Self {
        Self {
            state: Mutex::new(seed.unwrap_or_else(seed_from_clock)),
        }
    }

    /// Index in `0..len`; `0` when `len` is 0 or 1.
    pub fn pick(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        let bound = u32::try_from(len).unwrap_or(u32::MAX);
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        next_random_bounded_with(&mut state, bound, next_random_u32) as usize
    }
}

#[cfg(test)]
mod rng_tests {
    use super::*;

    #[test]
    fn next_random_bounded_with_covers_threshold_retry_path() {
        let mut state = 0u32;
        let mut values = vec![u32::MAX, 42u32].into_iter();
        let result = next_random_bounded_with(&mut state, 10, |_s| {
            values.next().expect("test values should be available")
        });
        assert_eq!(result, 2);
    }

    #[test]
    fn seeded_pickers_repeat_and_stay_in_range() {
        let first = ReplyPicker::new(Some(7));
        let second = ReplyPicker::new(Some(7));
        let a = (0..16).map(|_| first.pick(3)).collect::<Vec<_>>();
        let b = (0..16).map(|_| second.pick(3)).collect::<Vec<_>>();
        assert_eq!(a, b);
        assert!(a.iter().all(|index| *index < 3));
        assert_eq!(first.pick(1), 0);
        assert_eq!(first.pick(0), 0);
    }
}
