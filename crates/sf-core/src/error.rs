//! Error types for the core primitives.

use thiserror::Error;

/// Failures raised by the recorded randomness layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RngError {
    /// Replay requested more draws than the cache holds.
    #[error("replay cache exhausted after {draws} draws")]
    ReplayExhausted { draws: usize },

    /// The live request asked for a different range than the cache recorded.
    #[error("replay cache mismatch at draw {draw}: cached range {cached}, requested {requested}")]
    ReplayMismatch {
        draw: usize,
        cached: u32,
        requested: u32,
    },
}

/// Failures raised by weighted sampling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeightingError {
    /// The weighting holds no option with a positive weight.
    #[error("weighting has no options with a positive weight")]
    EmptyDistribution,

    /// The dedup mode cannot be satisfied by this weighting / fill size.
    #[error("dedup mode cannot be satisfied ({options} usable options, fill count {count})")]
    InvalidArity { options: usize, count: usize },

    #[error(transparent)]
    Rng(#[from] RngError),
}
