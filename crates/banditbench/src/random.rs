//! Deterministic random number generation.
//!
//! Reproducibility is a first-class guarantee of the engine, so every source
//! of randomness is an explicit [`LcgRandom`] instance constructed from a
//! seed. The generator is a linear congruential generator with parameters
//! `a = 116_646_453`, `c = 9`, `m = 2^30`, chosen for a full period of `m`
//! and stable behavior across platforms (the state never exceeds 30 bits, so
//! `a * state + c` fits comfortably in a `u64` and no platform-dependent
//! arithmetic is involved).
//!
//! Generators are never shared: each environment carries its own, re-seeded
//! identically on every `read()`, which is what makes repeated reads yield
//! identical interaction sequences.

const LCG_A: u64 = 116_646_453;
const LCG_C: u64 = 9;
const LCG_M: u64 = 1 << 30;

/// A seedable linear congruential generator.
#[derive(Debug, Clone)]
pub struct LcgRandom {
    state: u64,
}

impl LcgRandom {
    /// Create a generator from an optional seed.
    ///
    /// `None` draws a seed from host entropy; pass `Some` whenever
    /// reproducibility matters (which is almost always).
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::from_seed(s),
            None => Self::from_seed(fastrand::u64(0..LCG_M)),
        }
    }

    /// Create a generator from a fixed seed.
    ///
    /// Only the low 30 bits of `seed` participate in the recurrence.
    pub fn from_seed(seed: u64) -> Self {
        LcgRandom { state: seed & (LCG_M - 1) }
    }

    /// Advance the recurrence and return the new 30-bit state.
    fn next_state(&mut self) -> u64 {
        self.state = (LCG_A * self.state + LCG_C) & (LCG_M - 1);
        self.state
    }

    /// One uniform draw in `[0, 1]`, computed as `state / (m - 1)`.
    ///
    /// Both endpoints are attainable, which is why [`randint`](Self::randint)
    /// clamps its scaled draw.
    pub fn uniform(&mut self) -> f64 {
        self.next_state() as f64 / (LCG_M - 1) as f64
    }

    /// `n` uniform draws in `[0, 1]`.
    pub fn uniforms(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.uniform()).collect()
    }

    /// A uniform integer in `[lo, hi]`, inclusive on both ends.
    ///
    /// The naive `floor((hi - lo + 1) * u) + lo` overshoots when `u == 1.0`,
    /// so the scaled draw is clamped to `hi - lo` first.
    ///
    /// # Panics
    ///
    /// Panics if `lo > hi`.
    pub fn randint(&mut self, lo: i64, hi: i64) -> i64 {
        assert!(lo <= hi, "randint requires lo <= hi, got [{lo}, {hi}]");
        let span = (hi - lo + 1) as f64;
        let draw = (span * self.uniform()) as i64;
        draw.min(hi - lo) + lo
    }

    /// A uniformly chosen element of `items`.
    ///
    /// # Panics
    ///
    /// Panics if `items` is empty.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "choice requires a non-empty slice");
        let index = self.randint(0, items.len() as i64 - 1) as usize;
        &items[index]
    }

    /// Shuffle `items` in place.
    ///
    /// Fisher–Yates with all `n` uniforms drawn up front; the swap target is
    /// `min(floor(i + u_i * (n - i)), n - 1)`, where the `min` handles the
    /// `u_i == 1.0` edge. Stable for a given seed across platforms.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let n = items.len();
        let draws = self.uniforms(n);
        for i in 0..n {
            let j = ((i as f64 + draws[i] * (n - i) as f64) as usize).min(n.saturating_sub(1));
            items.swap(i, j);
        }
    }
}

impl Default for LcgRandom {
    fn default() -> Self {
        LcgRandom::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Golden sequences (frozen; do not change) ─────────────────────────────

    #[test]
    fn test_golden_states_seed_zero() {
        let mut rng = LcgRandom::from_seed(0);
        let states: Vec<u64> = (0..5).map(|_| rng.next_state()).collect();
        assert_eq!(
            states,
            vec![9, 1_049_818_086, 386_894_503, 86_254_236, 958_194_261]
        );
    }

    #[test]
    fn test_golden_uniforms_seed_zero() {
        let mut rng = LcgRandom::from_seed(0);
        let draws = rng.uniforms(3);
        assert_eq!(draws[0], 9.0 / ((1u64 << 30) - 1) as f64);
        assert_eq!(draws[1], 1_049_818_086.0 / ((1u64 << 30) - 1) as f64);
        assert_eq!(draws[2], 386_894_503.0 / ((1u64 << 30) - 1) as f64);
    }

    #[test]
    fn test_golden_uniforms_seed_one() {
        let mut rng = LcgRandom::from_seed(1);
        let draws = rng.uniforms(2);
        assert!((draws[0] - 0.108_635_483_410_801_26).abs() < 1e-15);
        assert!((draws[1] - 0.798_008_650_353_186_5).abs() < 1e-15);
    }

    // ── Determinism ──────────────────────────────────────────────────────────

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = LcgRandom::from_seed(42);
        let mut b = LcgRandom::from_seed(42);
        assert_eq!(a.uniforms(100), b.uniforms(100));
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = LcgRandom::from_seed(1);
        let mut b = LcgRandom::from_seed(2);
        assert_ne!(a.uniforms(10), b.uniforms(10));
    }

    #[test]
    fn test_unseeded_generators_are_usable() {
        let mut rng = LcgRandom::new(None);
        let u = rng.uniform();
        assert!((0.0..=1.0).contains(&u));
    }

    // ── Ranges ───────────────────────────────────────────────────────────────

    #[test]
    fn test_uniform_in_unit_interval() {
        let mut rng = LcgRandom::from_seed(7);
        for _ in 0..1000 {
            let u = rng.uniform();
            assert!((0.0..=1.0).contains(&u), "uniform out of range: {u}");
        }
    }

    #[test]
    fn test_randint_inclusive_bounds() {
        let mut rng = LcgRandom::from_seed(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let v = rng.randint(0, 2);
            assert!((0..=2).contains(&v), "randint out of range: {v}");
            seen.insert(v);
        }
        assert_eq!(seen.len(), 3, "all of 0, 1, 2 should be attainable");
    }

    #[test]
    fn test_randint_golden_seed_zero() {
        let mut rng = LcgRandom::from_seed(0);
        let draws: Vec<i64> = (0..6).map(|_| rng.randint(0, 2)).collect();
        assert_eq!(draws, vec![0, 2, 1, 0, 2, 1]);
    }

    #[test]
    fn test_randint_single_value_range() {
        let mut rng = LcgRandom::from_seed(11);
        for _ in 0..10 {
            assert_eq!(rng.randint(5, 5), 5);
        }
    }

    #[test]
    fn test_randint_negative_bounds() {
        let mut rng = LcgRandom::from_seed(13);
        for _ in 0..100 {
            let v = rng.randint(-3, -1);
            assert!((-3..=-1).contains(&v));
        }
    }

    // ── choice / shuffle ─────────────────────────────────────────────────────

    #[test]
    fn test_choice_returns_member() {
        let items = ["a", "b", "c", "d"];
        let mut rng = LcgRandom::from_seed(5);
        for _ in 0..50 {
            let picked = rng.choice(&items);
            assert!(items.contains(picked));
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut items: Vec<u32> = (0..20).collect();
        let mut rng = LcgRandom::from_seed(9);
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<u32>>());
    }

    #[test]
    fn test_shuffle_golden_seed_one() {
        let mut items: Vec<u32> = (0..10).collect();
        let mut rng = LcgRandom::from_seed(1);
        rng.shuffle(&mut items);
        assert_eq!(items, vec![1, 8, 5, 4, 6, 0, 7, 3, 2, 9]);
    }

    #[test]
    fn test_shuffle_deterministic() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b: Vec<u32> = (0..50).collect();
        LcgRandom::from_seed(21).shuffle(&mut a);
        LcgRandom::from_seed(21).shuffle(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_empty_and_single() {
        let mut empty: Vec<u32> = vec![];
        LcgRandom::from_seed(1).shuffle(&mut empty);
        assert!(empty.is_empty());

        let mut single = vec![7u32];
        LcgRandom::from_seed(1).shuffle(&mut single);
        assert_eq!(single, vec![7]);
    }
}
