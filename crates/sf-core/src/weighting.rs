//! Weighted index sampling
//!
//! Weights are stored as cumulative fixed-point integers with 3 decimals of
//! precision; fractions beyond that are truncated. Options with a zero or
//! negative weight are excluded at registration and can never be drawn.

use crate::{Index, RngRecorder, WeightingError};

/// Deduplication applied by [`Weighting::fill`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DedupMode {
    #[default]
    None,
    /// No value equal to any of the previous 3 accepted values.
    Window3,
    /// No value equal to any of the previous 4 accepted values.
    Window4,
    /// No value equal to any of the previous 5 accepted values.
    Window5,
    /// Exactly three distinct options, produced as a full random permutation.
    Unique3,
}

impl DedupMode {
    fn window(self) -> usize {
        match self {
            DedupMode::None | DedupMode::Unique3 => 0,
            DedupMode::Window3 => 3,
            DedupMode::Window4 => 4,
            DedupMode::Window5 => 5,
        }
    }
}

const BINARY_SEARCH_MIN: usize = 16;
const FIXED_POINT: f64 = 1000.0;

/// Weighted random index generator.
#[derive(Debug, Default, Clone)]
pub struct Weighting {
    indexes: Vec<Index>,
    cumulative: Vec<u32>,
    total: u32,
    dedup: DedupMode,
}

impl Weighting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup(mut self, dedup: DedupMode) -> Self {
        self.dedup = dedup;
        self
    }

    /// Adds a single weighted option. Zero and negative weights are skipped.
    pub fn add_weight(mut self, index: Index, weight: f64) -> Self {
        // truncating conversion; negative weights saturate to 0
        let w = (weight * FIXED_POINT) as u32;
        if w > 0 {
            self.total += w;
            self.indexes.push(index);
            self.cumulative.push(self.total);
        }
        self
    }

    /// Adds options pairwise from the two slices.
    pub fn add_weights(mut self, indexes: &[Index], weights: &[f64]) -> Self {
        for (&ix, &w) in indexes.iter().zip(weights) {
            self = self.add_weight(ix, w);
        }
        self
    }

    /// Number of drawable options.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Total fixed-point weight.
    pub fn total_weight(&self) -> u32 {
        self.total
    }

    pub fn dedup(&self) -> DedupMode {
        self.dedup
    }

    /// Draws a single index.
    ///
    /// A single-option table returns that option without consuming a draw.
    pub fn sample(&self, rng: &mut RngRecorder) -> Result<Index, WeightingError> {
        match self.indexes.len() {
            0 => Err(WeightingError::EmptyDistribution),
            1 => Ok(self.indexes[0]),
            _ => {
                let n = rng.int_n(self.total)?;
                Ok(self.indexes[self.locate(n)])
            }
        }
    }

    /// Fills `out` with drawn indexes, honouring the dedup mode.
    ///
    /// Window modes re-draw until the value differs from the previous `k`
    /// accepted values, which requires more than `k` distinct options.
    pub fn fill(&self, rng: &mut RngRecorder, out: &mut [Index]) -> Result<(), WeightingError> {
        if self.dedup == DedupMode::Unique3 {
            return self.fill_unique3(rng, out);
        }
        if self.is_empty() {
            return Err(WeightingError::EmptyDistribution);
        }

        let window = self.dedup.window();
        if window > 0 && self.indexes.len() <= window && out.len() > window {
            return Err(WeightingError::InvalidArity {
                options: self.indexes.len(),
                count: out.len(),
            });
        }

        for ix in 0..out.len() {
            let start = ix.saturating_sub(window);
            loop {
                let v = self.sample(rng)?;
                if window == 0 || !out[start..ix].contains(&v) {
                    out[ix] = v;
                    break;
                }
            }
        }
        Ok(())
    }

    // One weighted draw picks the first value; a coin flip orders the
    // remaining two.
    fn fill_unique3(&self, rng: &mut RngRecorder, out: &mut [Index]) -> Result<(), WeightingError> {
        if self.indexes.len() != 3 || out.len() != 3 {
            return Err(WeightingError::InvalidArity {
                options: self.indexes.len(),
                count: out.len(),
            });
        }
        // a permutation needs three distinct indexes
        let mut sorted = [self.indexes[0], self.indexes[1], self.indexes[2]];
        sorted.sort_unstable();
        if sorted[0] == sorted[1] || sorted[1] == sorted[2] {
            let distinct =
                1 + usize::from(sorted[0] != sorted[1]) + usize::from(sorted[1] != sorted[2]);
            return Err(WeightingError::InvalidArity {
                options: distinct,
                count: out.len(),
            });
        }

        let first = self.sample(rng)?;
        let rest: Vec<Index> = self
            .indexes
            .iter()
            .copied()
            .filter(|&v| v != first)
            .collect();

        out[0] = first;
        if rng.int_n(10_000)? < 5_000 {
            out[1] = rest[0];
            out[2] = rest[1];
        } else {
            out[1] = rest[1];
            out[2] = rest[0];
        }
        Ok(())
    }

    fn locate(&self, n: u32) -> usize {
        if self.cumulative.len() >= BINARY_SEARCH_MIN {
            self.locate_binary(n)
        } else {
            self.locate_linear(n)
        }
    }

    fn locate_linear(&self, n: u32) -> usize {
        for (ix, &c) in self.cumulative.iter().enumerate() {
            if n < c {
                return ix;
            }
        }
        self.cumulative.len() - 1
    }

    // first index whose cumulative weight exceeds n
    fn locate_binary(&self, n: u32) -> usize {
        self.cumulative.partition_point(|&c| c <= n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameRng;

    fn recorder(seed: u64) -> RngRecorder {
        RngRecorder::logging(Box::new(GameRng::seeded(seed)))
    }

    #[test]
    fn test_weights_are_fixed_point_truncated() {
        let w = Weighting::new()
            .add_weight(1, 1.2345)
            .add_weight(2, 0.0004);
        // 1.2345 → 1234; 0.0004 truncates to zero and is skipped
        assert_eq!(w.total_weight(), 1234);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_zero_and_negative_weights_excluded() {
        let w = Weighting::new()
            .add_weight(1, 0.0)
            .add_weight(2, -3.0)
            .add_weight(3, 2.0);
        assert_eq!(w.len(), 1);

        let mut rng = recorder(1);
        for _ in 0..50 {
            assert_eq!(w.sample(&mut rng).unwrap(), 3);
        }
    }

    #[test]
    fn test_empty_distribution_fails_at_draw() {
        let w = Weighting::new().add_weight(9, 0.0);
        let mut rng = recorder(1);
        assert_eq!(
            w.sample(&mut rng),
            Err(WeightingError::EmptyDistribution)
        );
    }

    #[test]
    fn test_single_option_consumes_no_randomness() {
        let w = Weighting::new().add_weight(5, 10.0);
        let mut rng = recorder(1);
        assert_eq!(w.sample(&mut rng).unwrap(), 5);
        assert_eq!(rng.log_len(), 0);
    }

    #[test]
    fn test_locate_strategies_agree() {
        let mut w = Weighting::new();
        for ix in 0..20u16 {
            w = w.add_weight(ix, (ix + 1) as f64 * 0.3);
        }
        assert!(w.len() >= BINARY_SEARCH_MIN);
        for n in 0..w.total_weight() {
            assert_eq!(
                w.locate_linear(n),
                w.locate_binary(n),
                "disagreement at n={n}"
            );
        }
    }

    #[test]
    fn test_sampling_conserves_weights() {
        let w = Weighting::new()
            .add_weight(1, 10.0)
            .add_weight(2, 20.0)
            .add_weight(3, 70.0);
        let mut rng = recorder(42);

        let mut counts = [0usize; 4];
        const DRAWS: usize = 1_000_000;
        for _ in 0..DRAWS {
            counts[w.sample(&mut rng).unwrap() as usize] += 1;
        }

        for (ix, expected) in [(1usize, 0.10), (2, 0.20), (3, 0.70)] {
            let got = counts[ix] as f64 / DRAWS as f64;
            assert!(
                (got - expected).abs() < expected * 0.1,
                "option {ix}: got {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_window_dedup_never_repeats_within_window() {
        let mut w = Weighting::new().with_dedup(DedupMode::Window3);
        for ix in 1..=8u16 {
            w = w.add_weight(ix, 1.0);
        }

        let mut rng = recorder(17);
        let mut out = [0 as Index; 100];
        w.fill(&mut rng, &mut out).unwrap();

        for ix in 1..out.len() {
            let start = ix.saturating_sub(3);
            assert!(
                !out[start..ix].contains(&out[ix]),
                "repeat within window at {ix}: {:?}",
                &out[start..=ix]
            );
        }
    }

    #[test]
    fn test_window_dedup_requires_enough_options() {
        let w = Weighting::new()
            .with_dedup(DedupMode::Window3)
            .add_weight(1, 1.0)
            .add_weight(2, 1.0);
        let mut rng = recorder(1);
        let mut out = [0 as Index; 10];
        assert_eq!(
            w.fill(&mut rng, &mut out),
            Err(WeightingError::InvalidArity {
                options: 2,
                count: 10
            })
        );
    }

    #[test]
    fn test_unique3_produces_permutations() {
        let w = Weighting::new()
            .with_dedup(DedupMode::Unique3)
            .add_weight(1, 1.0)
            .add_weight(2, 1.0)
            .add_weight(3, 1.0);

        let mut rng = recorder(23);
        let mut out = [0 as Index; 3];
        for _ in 0..100 {
            w.fill(&mut rng, &mut out).unwrap();
            let mut sorted = out;
            sorted.sort_unstable();
            assert_eq!(sorted, [1, 2, 3]);
        }
    }

    #[test]
    fn test_unique3_rejects_wrong_arity() {
        let w = Weighting::new()
            .with_dedup(DedupMode::Unique3)
            .add_weight(1, 1.0)
            .add_weight(2, 1.0);
        let mut rng = recorder(1);
        let mut out = [0 as Index; 3];
        assert_eq!(
            w.fill(&mut rng, &mut out),
            Err(WeightingError::InvalidArity {
                options: 2,
                count: 3
            })
        );
    }

    #[test]
    fn test_unique3_rejects_duplicate_indexes() {
        let w = Weighting::new()
            .with_dedup(DedupMode::Unique3)
            .add_weight(1, 1.0)
            .add_weight(1, 1.0)
            .add_weight(2, 1.0);
        let mut rng = recorder(1);
        let mut out = [0 as Index; 3];
        assert_eq!(
            w.fill(&mut rng, &mut out),
            Err(WeightingError::InvalidArity {
                options: 2,
                count: 3
            })
        );
    }

    #[test]
    fn test_fill_is_replayable() {
        let mut w = Weighting::new().with_dedup(DedupMode::Window4);
        for ix in 1..=10u16 {
            w = w.add_weight(ix, ix as f64);
        }

        let mut live = recorder(5);
        let mut first = [0 as Index; 40];
        w.fill(&mut live, &mut first).unwrap();

        let mut replay = RngRecorder::replay(live.log().clone());
        let mut second = [0 as Index; 40];
        w.fill(&mut replay, &mut second).unwrap();
        assert_eq!(first, second);
    }
}
