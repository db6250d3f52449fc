//! The personality evolution pipeline.
//!
//! `pattern`, `adjustment`, `anchoring` and `limiter` are pure functions of
//! their inputs. [`EvolutionEngine`] wires them together and holds the only
//! mutable state (pattern cache and statistics).

pub mod adjustment;
pub mod anchoring;
mod engine;
pub mod limiter;
pub mod pattern;
pub mod preprocess;
mod types;

pub use engine::{confidence_score, stability_score, EvolutionEngine};
pub use types::*;
