//! Engine error taxonomy.

use sf_core::{Index, RngError, WeightingError};
use thiserror::Error;

/// Construction-time configuration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("duplicate action id {0}")]
    DuplicateActionId(u32),

    #[error("grid must have at least 3 reels and 2 rows (got {reels}x{rows})")]
    BadGrid { reels: usize, rows: usize },

    #[error("reel {0} has no symbols with a positive weight")]
    EmptyReel(usize),

    #[error("no symbols configured")]
    NoSymbols,

    #[error("symbol id {0} is not in the symbol set")]
    UnknownSymbol(Index),

    #[error("payline {index} does not span {reels} reels")]
    BadPayline { index: u8, reels: usize },

    #[error("round flag {flag} out of range ({declared} declared)")]
    FlagOutOfRange { flag: usize, declared: usize },

    #[error("unknown script id {0}")]
    UnknownScript(u32),

    #[error("script id {0} does not fit in an index")]
    ScriptIdTooLarge(u32),
}

/// Failures raised while playing out a round.
///
/// An erring round yields no partial results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Weighting(#[from] WeightingError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("round exceeded the step limit of {0}")]
    StepLimit(usize),

    #[error("no suspended round to resume")]
    NothingToResume,
}
