//! Booking Gate v0.4.2 - transactional reservation boundary
//!
//! Attempt lifecycle:
//! 1. Requested - inputs gathered, nothing checked yet
//! 2. PreChecked - eligibility re-validated against fresh rows
//! 3. Reserved - one capacity unit atomically consumed, booking row created
//! 4. Confirmed - informational, no further state change
//! or Rejected at any point.
//!
//! Only the Reserved step touches shared mutable state, inside a single
//! store transaction. Transient write conflicts are retried a bounded
//! number of times; business denials never are. All collaborator work
//! (lookups, audit) happens strictly before or after the transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use praktika_core::domain::Booking;
use praktika_core::eligibility::EligibilityEvaluator;
use praktika_core::reason::DenialReason;
use praktika_core::registry::SpecializationRegistry;
use praktika_store::{EngineStore, StoreError};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::EngineError;

/// Bounded internal retry for transient write conflicts.
const MAX_RESERVE_RETRIES: u32 = 3;

/// Phases of one booking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Requested,
    PreChecked,
    Reserved,
    Confirmed,
    Rejected,
}

impl AttemptPhase {
    /// Next phase in the successful flow.
    pub fn next(&self) -> Option<AttemptPhase> {
        match self {
            AttemptPhase::Requested => Some(AttemptPhase::PreChecked),
            AttemptPhase::PreChecked => Some(AttemptPhase::Reserved),
            AttemptPhase::Reserved => Some(AttemptPhase::Confirmed),
            AttemptPhase::Confirmed => None,
            AttemptPhase::Rejected => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptPhase::Confirmed | AttemptPhase::Rejected)
    }
}

impl std::fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptPhase::Requested => write!(f, "requested"),
            AttemptPhase::PreChecked => write!(f, "pre_checked"),
            AttemptPhase::Reserved => write!(f, "reserved"),
            AttemptPhase::Confirmed => write!(f, "confirmed"),
            AttemptPhase::Rejected => write!(f, "rejected"),
        }
    }
}

/// The gate. Borrowed per call from the engine facade; all state lives in
/// the store.
pub struct BookingGate<'a> {
    store: &'a EngineStore,
    registry: &'a SpecializationRegistry,
    audit: &'a dyn AuditSink,
}

impl<'a> BookingGate<'a> {
    pub fn new(
        store: &'a EngineStore,
        registry: &'a SpecializationRegistry,
        audit: &'a dyn AuditSink,
    ) -> Self {
        Self {
            store,
            registry,
            audit,
        }
    }

    /// Run one booking attempt to completion: pre-check, atomic reserve,
    /// confirm. Returns the booking or the denial that stopped it.
    pub fn reserve(&self, user_id: Uuid, session_id: Uuid) -> Result<Booking, EngineError> {
        let now = Utc::now();
        let mut phase = AttemptPhase::Requested;

        // Gather inputs before any lock is taken
        let user = self.store.get_user(user_id)?;
        let session = self.store.get_session(session_id)?;
        let license = self.store.find_license(user_id, &session.specialization_id)?;
        let period = match self.registry.resolve(&session.specialization_id) {
            Ok(model) if model.enrollment_period_required() => match &license {
                Some(license) => self
                    .store
                    .current_period_for(license.id, now.date_naive())?,
                None => None,
            },
            _ => None,
        };

        // Pre-check: state may have moved since the caller last asked
        let evaluator = EligibilityEvaluator::new(self.registry);
        let decision =
            evaluator.can_book_session(&user, license.as_ref(), period.as_ref(), &session, now);
        if let Some(reason) = decision.reason {
            self.reject(user_id, session_id, phase, reason);
            return Err(EngineError::Denied(reason));
        }
        phase = AttemptPhase::PreChecked;

        // Reserve: the only step touching shared mutable state
        let mut retries = 0;
        let booking = loop {
            match self.store.reserve_seat(user_id, session_id, now) {
                Ok(booking) => break booking,
                Err(err) if err.is_transient() && retries < MAX_RESERVE_RETRIES => {
                    retries += 1;
                    warn!(
                        user = %user_id,
                        session = %session_id,
                        retries,
                        "write conflict during reservation, retrying"
                    );
                }
                Err(StoreError::CapacityExhausted) => {
                    self.reject(user_id, session_id, phase, DenialReason::CapacityExhausted);
                    return Err(EngineError::Denied(DenialReason::CapacityExhausted));
                }
                Err(StoreError::DuplicateBooking) => {
                    self.reject(user_id, session_id, phase, DenialReason::AlreadyBooked);
                    return Err(EngineError::Denied(DenialReason::AlreadyBooked));
                }
                Err(err) => {
                    let mapped = EngineError::from(err);
                    if let Some(reason) = mapped.denial() {
                        self.reject(user_id, session_id, phase, reason);
                    }
                    return Err(mapped);
                }
            }
        };
        phase = AttemptPhase::Reserved;

        // Confirm: informational only
        phase = phase.next().unwrap_or(AttemptPhase::Confirmed);
        debug_assert!(phase.is_terminal());
        info!(
            user = %user_id,
            session = %session_id,
            booking = %booking.id,
            "booking confirmed"
        );
        self.audit.record(AuditEvent::new(
            Some(user_id),
            "reserve_booking",
            "ok",
            serde_json::json!({
                "session_id": session_id,
                "booking_id": booking.id,
                "phase": phase,
            }),
        ));
        Ok(booking)
    }

    /// Cancel a booking and return the seat atomically. Cancelling when no
    /// booking exists is a no-op success (`Ok(false)`); cancelling after
    /// the session has started is refused.
    pub fn cancel(&self, user_id: Uuid, session_id: Uuid) -> Result<bool, EngineError> {
        let now = Utc::now();
        let session = self.store.get_session(session_id)?;
        if now >= session.starts_at {
            return Err(EngineError::Denied(DenialReason::BookingDeadlinePassed));
        }

        let released = self.store.release_seat(user_id, session_id)?;
        if released {
            info!(user = %user_id, session = %session_id, "booking cancelled");
        } else {
            debug!(user = %user_id, session = %session_id, "no booking to cancel");
        }
        self.audit.record(AuditEvent::new(
            Some(user_id),
            "cancel_booking",
            if released { "ok" } else { "noop" },
            serde_json::json!({ "session_id": session_id }),
        ));
        Ok(released)
    }

    fn reject(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        reached: AttemptPhase,
        reason: DenialReason,
    ) {
        debug!(
            user = %user_id,
            session = %session_id,
            phase = %reached,
            reason = reason.code(),
            "booking attempt rejected"
        );
        self.audit.record(AuditEvent::new(
            Some(user_id),
            "reserve_booking",
            reason.code(),
            serde_json::json!({ "session_id": session_id, "phase": AttemptPhase::Rejected }),
        ));
    }
}
