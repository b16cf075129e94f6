//! Deterministic, replayable slot round engine
//!
//! The engine plays complete rounds (first spin, free spins, refills and
//! bonus games) against a validated [`GameConfig`]. Every random draw goes
//! through a recording PRNG, so any round can be replayed byte-identically
//! from its draw log; every evaluated action leaves an audit event. Game
//! behaviour is pure data: a list of [`Action`]s partitioned over a fixed
//! stage pipeline.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sf_engine::{Round, presets};
//!
//! # fn main() -> Result<(), sf_engine::EngineError> {
//! let cfg = Arc::new(presets::demo_config()?);
//! let mut round = Round::new(cfg);
//! let result = round.round(0)?;
//! println!("paid {} over {} steps", result.total_payout, result.step_count());
//! # Ok(())
//! # }
//! ```

mod actions;
mod chance;
mod config;
mod error;
mod handler;
mod paytable;
pub mod presets;
mod results;
mod round;
mod scripted;
mod spin;
mod symbols;

pub use actions::*;
pub use chance::*;
pub use config::*;
pub use error::*;
pub use handler::ActionHandler;
pub use paytable::*;
pub use results::*;
pub use round::*;
pub use scripted::*;
pub use spin::*;
pub use symbols::*;
