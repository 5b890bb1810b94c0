//! Praktika Store - SQLite persistence for the progression & booking engine
//!
//! One store, three mutable facts: seat counts, license levels, assessment
//! states. Everything else is read-only snapshots for the rule layer.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{AssessmentTransition, EngineStore};
