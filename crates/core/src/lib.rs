//! Personality trait evolution: a pure numeric pipeline plus the engine that runs it.

pub mod clock;
pub mod config;
pub mod db;
pub mod evolution;
pub mod store;
pub mod test_utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EvolutionConfig, ValidationReport};
pub use db::SqliteRecentChangeStore;
pub use evolution::{EvolutionEngine, EvolutionRequest, EvolutionResult, EvolutionStats};
pub use store::InMemoryRecentChangeStore;
