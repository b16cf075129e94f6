//! SpinForge Core — shared primitives for the round engine
//!
//! Weighted index sampling and recorded randomness, shared by the engine
//! crates. This crate is a leaf: it knows nothing about grids, symbols or
//! rounds.

mod error;
mod rng;
mod weighting;

pub use error::*;
pub use rng::*;
pub use weighting::*;

/// Symbol / option index. Zero denotes an empty grid cell.
pub type Index = u16;

/// Sentinel for "no index selected".
pub const NULL_INDEX: Index = Index::MAX;
