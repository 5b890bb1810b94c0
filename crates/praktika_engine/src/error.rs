//! Engine error surface.
//!
//! Business denials and fatal defects stay apart: a `Denied` carries a code
//! from the fixed vocabulary the caller can act on; `CorruptLevel`,
//! `Config` and `Storage` indicate problems no retry or input change can
//! remediate.

use praktika_core::reason::{CatalogError, DenialReason};
use praktika_store::StoreError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Recoverable business denial; branch on the inner reason
    #[error(transparent)]
    Denied(#[from] DenialReason),

    /// A license carries a level token its model does not define
    #[error("license {license} carries level token '{level}' undefined by specialization '{specialization}'")]
    CorruptLevel {
        license: Uuid,
        level: String,
        specialization: String,
    },

    /// The program catalog failed validation at startup
    #[error("invalid program catalog: {0}")]
    Config(#[from] CatalogError),

    /// Underlying storage failure
    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl EngineError {
    /// The denial reason, if this is a business denial.
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            EngineError::Denied(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        // Constraint races map onto the denial vocabulary; everything else
        // is a real storage failure
        match err {
            StoreError::CapacityExhausted => EngineError::Denied(DenialReason::CapacityExhausted),
            StoreError::DuplicateBooking => EngineError::Denied(DenialReason::AlreadyBooked),
            StoreError::WriteConflict => EngineError::Denied(DenialReason::ConcurrencyConflict),
            other => EngineError::Storage(other),
        }
    }
}
