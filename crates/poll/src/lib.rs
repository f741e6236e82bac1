pub mod engine;
pub mod ledger;

pub use engine::{Engine, EngineError, TickOutcome};
