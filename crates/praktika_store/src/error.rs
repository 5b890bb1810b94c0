//! Store error taxonomy.
//!
//! Constraint races surface as their own variants so the gates can map them
//! to the denial vocabulary without inspecting SQLite error codes; genuine
//! storage failures stay in `Sqlite`/`Corrupt`.

use rusqlite::ffi::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("session has no remaining capacity")]
    CapacityExhausted,

    #[error("user already holds a booking for this session")]
    DuplicateBooking,

    #[error("write conflict")]
    WriteConflict,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Transient conflicts are retried by the Booking Gate; everything else
    /// is surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::WriteConflict)
    }
}

/// Classify an SQLite failure: busy/locked becomes a retryable conflict,
/// a unique-key violation on bookings becomes a duplicate.
pub(crate) fn classify(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return StoreError::WriteConflict
            }
            ErrorCode::ConstraintViolation => return StoreError::DuplicateBooking,
            _ => {}
        }
    }
    StoreError::Sqlite(err)
}
