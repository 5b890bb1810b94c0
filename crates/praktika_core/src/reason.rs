//! Denial vocabulary v0.4.0
//!
//! Every booking/progression denial the engine can produce, as a closed enum
//! so callers branch on the kind instead of parsing text. Business denials
//! are values, never panics; genuinely fatal data-integrity problems live in
//! [`CatalogError`] and the engine-level error types instead.

use serde::{Deserialize, Serialize};

/// Reason a booking or transition request was denied.
///
/// All variants are recoverable-by-caller conditions. The `#[error]` text is
/// the human message the API layer may render directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// No registered specialization prefixes the requested identifier
    #[error("no specialization is registered under this identifier")]
    SpecializationUnknown,

    /// The user has no license for this specialization, or it is inactive
    #[error("no active license for this specialization")]
    LicenseInactiveOrMissing,

    /// The session belongs to a different specialization than the license
    #[error("this session belongs to a different specialization")]
    SpecializationMismatch,

    /// The user is below the minimum age for the specialization or level
    #[error("minimum age for this specialization or level not reached")]
    UnderMinimumAge,

    /// Semester-based specialization without a current enrollment period
    #[error("no enrollment period covers the current semester")]
    EnrollmentPeriodMissing,

    /// Enrollment period exists but payment has not been verified
    #[error("enrollment payment has not been verified yet")]
    PaymentNotVerified,

    /// The session's booking deadline is already in the past
    #[error("the booking deadline for this session has passed")]
    BookingDeadlinePassed,

    /// Every seat of the session is taken
    #[error("this session is fully booked")]
    CapacityExhausted,

    /// The user already holds a booking for this session
    #[error("already booked into this session")]
    AlreadyBooked,

    /// Requested transition is not an edge of the state machine, or its
    /// evidence is missing or insufficient
    #[error("the requested transition is not valid from the current state")]
    InvalidTransition,

    /// Transient write conflict that survived the internal retries
    #[error("concurrent update conflict, please retry")]
    ConcurrencyConflict,
}

impl DenialReason {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::SpecializationUnknown => "specialization_unknown",
            DenialReason::LicenseInactiveOrMissing => "license_inactive_or_missing",
            DenialReason::SpecializationMismatch => "specialization_mismatch",
            DenialReason::UnderMinimumAge => "under_minimum_age",
            DenialReason::EnrollmentPeriodMissing => "enrollment_period_missing",
            DenialReason::PaymentNotVerified => "payment_not_verified",
            DenialReason::BookingDeadlinePassed => "booking_deadline_passed",
            DenialReason::CapacityExhausted => "capacity_exhausted",
            DenialReason::AlreadyBooked => "already_booked",
            DenialReason::InvalidTransition => "invalid_transition",
            DenialReason::ConcurrencyConflict => "concurrency_conflict",
        }
    }

    /// Transient denials may be retried by the caller; business denials must not.
    pub fn is_transient(&self) -> bool {
        matches!(self, DenialReason::ConcurrencyConflict)
    }
}

/// Fatal problems in the program catalog (configuration), detected at load
/// time. These indicate operator error, not a request the caller can fix.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("specialization '{0}' is defined twice")]
    DuplicateSpecialization(String),

    #[error("specialization '{id}': {detail}")]
    InvalidDefinition { id: String, detail: String },

    #[error("specialization '{id}': semester {index} thresholds must not loosen ({detail})")]
    NonMonotonicThresholds {
        id: String,
        index: usize,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(DenialReason::PaymentNotVerified.code(), "payment_not_verified");
        assert_eq!(DenialReason::CapacityExhausted.code(), "capacity_exhausted");
    }

    #[test]
    fn test_only_conflict_is_transient() {
        assert!(DenialReason::ConcurrencyConflict.is_transient());
        assert!(!DenialReason::CapacityExhausted.is_transient());
        assert!(!DenialReason::AlreadyBooked.is_transient());
    }

    #[test]
    fn test_human_message_via_display() {
        let msg = DenialReason::UnderMinimumAge.to_string();
        assert!(msg.contains("age"));
    }
}
