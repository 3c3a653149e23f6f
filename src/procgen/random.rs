//! Seeded pseudo-random source shared by every generator.
//!
//! Wraps `StdRng` so that a chunk's content depends only on the seed it was
//! handed, never on a global generator or on the order chunks were visited.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic random stream built from an integer seed.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    seed: u64,
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build a stream for a sub-domain (chunk, road line, ...) of a global seed.
    pub fn derive(seed: u64, salts: &[i64]) -> Self {
        Self::new(derive_seed(seed, salts))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform float in [0, 1).
    pub fn next_float(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// Uniform float between `min` and `max`.
    ///
    /// Never panics: an empty or inverted range collapses onto `min`.
    pub fn random_float(&mut self, min: f32, max: f32) -> f32 {
        let t = self.next_float();
        if max <= min {
            return min;
        }
        min + (max - min) * t
    }

    /// Uniform integer with both bounds inclusive.
    pub fn random_int(&mut self, min: i32, max: i32) -> i32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform choice from a slice; `None` when the slice is empty.
    pub fn random_element<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..items.len());
        items.get(idx)
    }

    /// True with probability `p` (clamped to [0, 1]).
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_float() < p.clamp(0.0, 1.0)
    }

    /// Either `1.0` or `-1.0`.
    pub fn sign(&mut self) -> f32 {
        if self.rng.gen::<bool>() {
            1.0
        } else {
            -1.0
        }
    }

    /// Index drawn proportionally to `weights`. Non-positive weights never win.
    pub fn weighted_index(&mut self, weights: &[f32]) -> Option<usize> {
        let total: f32 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }

        let mut choice = self.next_float() * total;
        let mut last_positive = None;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            last_positive = Some(i);
            choice -= w;
            if choice < 0.0 {
                return Some(i);
            }
        }

        last_positive
    }

    /// Fisher-Yates shuffle driven by this stream.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            items.swap(i, j);
        }
    }
}

/// Fold salts into a seed with a splitmix64 finaliser.
pub fn derive_seed(seed: u64, salts: &[i64]) -> u64 {
    let mut state = splitmix(seed ^ 0x9E37_79B9_7F4A_7C15);
    for salt in salts {
        state = splitmix(state ^ (*salt as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93));
    }
    state
}

fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SeededRandom::new(12345);
        let mut b = SeededRandom::new(12345);
        for _ in 0..64 {
            assert_eq!(a.next_float().to_bits(), b.next_float().to_bits());
            assert_eq!(a.random_int(-5, 5), b.random_int(-5, 5));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SeededRandom::new(1);
        let mut b = SeededRandom::new(2);
        let sa: Vec<u32> = (0..8).map(|_| a.next_float().to_bits()).collect();
        let sb: Vec<u32> = (0..8).map(|_| b.next_float().to_bits()).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn ranges_are_respected() {
        let mut rng = SeededRandom::new(7);
        for _ in 0..500 {
            let f = rng.next_float();
            assert!((0.0..1.0).contains(&f));
            let r = rng.random_float(3.0, 4.0);
            assert!((3.0..=4.0).contains(&r));
            let i = rng.random_int(2, 4);
            assert!((2..=4).contains(&i));
        }
        assert_eq!(rng.random_float(5.0, 5.0), 5.0);
        assert_eq!(rng.random_float(9.0, 1.0), 9.0);
        assert!((1..=3).contains(&rng.random_int(3, 1)));
    }

    #[test]
    fn random_element_handles_empty() {
        let mut rng = SeededRandom::new(3);
        let empty: [u8; 0] = [];
        assert!(rng.random_element(&empty).is_none());
        assert_eq!(rng.random_element(&[42]), Some(&42));
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = SeededRandom::new(99);
        for _ in 0..200 {
            let idx = rng.weighted_index(&[0.0, 1.0, 0.0, 2.0]).unwrap();
            assert!(idx == 1 || idx == 3);
        }
        assert!(rng.weighted_index(&[0.0, 0.0]).is_none());
        assert!(rng.weighted_index(&[]).is_none());
    }

    #[test]
    fn derived_seeds_depend_on_every_salt() {
        let base = derive_seed(12345, &[0, 0]);
        assert_eq!(base, derive_seed(12345, &[0, 0]));
        assert_ne!(base, derive_seed(12345, &[1, 0]));
        assert_ne!(base, derive_seed(12345, &[0, 1]));
        assert_ne!(derive_seed(12345, &[1, 2]), derive_seed(12345, &[2, 1]));
    }
}
