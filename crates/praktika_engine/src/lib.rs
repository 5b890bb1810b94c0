//! Praktika Engine - the library boundary consumed by the API layer v0.4.2
//!
//! Composes the pure rule layer (`praktika_core`) with the SQLite store
//! (`praktika_store`) into the operations the platform calls in-process:
//! eligibility questions, the Booking Gate, the Progression Ledger and the
//! assessment lifecycle. Serializing results to a transport format is the
//! caller's job.

pub mod audit;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod lifecycle;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use error::EngineError;
pub use gate::{AttemptPhase, BookingGate};
pub use ledger::{CertifyOutcome, ProgressionLedger, XpAwarded};
pub use lifecycle::AssessmentLifecycle;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use praktika_core::config::ProgramCatalog;
use praktika_core::domain::{
    AssessmentRecord, AssessmentState, Booking, ProgressionRecord,
};
use praktika_core::eligibility::{BookingDecision, EligibilityEvaluator};
use praktika_core::model::{
    AttendanceOutcome, EnrollmentRequirements, ProgressionEvidence, ProgressionModel,
    ProgressionStatus,
};
use praktika_core::reason::DenialReason;
use praktika_core::registry::SpecializationRegistry;
use praktika_store::EngineStore;

/// Progression status plus the license's transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionReport {
    pub status: ProgressionStatus,
    pub history: Vec<ProgressionRecord>,
}

/// The engine facade. One instance per process; every operation is safe to
/// call from many threads at once.
pub struct Engine {
    registry: SpecializationRegistry,
    store: EngineStore,
    audit: Arc<dyn AuditSink>,
}

impl Engine {
    /// Build the engine from a program catalog and an opened store. The
    /// registry is populated here, once; it is read-only afterwards.
    pub fn new(catalog: &ProgramCatalog, store: EngineStore) -> Result<Self, EngineError> {
        Self::with_audit(catalog, store, Arc::new(TracingAuditSink))
    }

    pub fn with_audit(
        catalog: &ProgramCatalog,
        store: EngineStore,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, EngineError> {
        let registry = SpecializationRegistry::from_catalog(catalog)?;
        Ok(Self {
            registry,
            store,
            audit,
        })
    }

    pub fn store(&self) -> &EngineStore {
        &self.store
    }

    pub fn registry(&self) -> &SpecializationRegistry {
        &self.registry
    }

    // ========================================================================
    // Eligibility & status queries
    // ========================================================================

    /// Resolve a specialization identifier (exact or prefixed) to its model.
    pub fn resolve_specialization_model(
        &self,
        identifier: &str,
    ) -> Result<Arc<dyn ProgressionModel>, EngineError> {
        Ok(self.registry.resolve(identifier)?)
    }

    /// "Can this user book this session" without reserving anything.
    pub fn can_book_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<BookingDecision, EngineError> {
        let now = Utc::now();
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
        let evaluator = EligibilityEvaluator::new(&self.registry);
        Ok(evaluator.can_book_session(&user, license.as_ref(), period.as_ref(), &session, now))
    }

    /// Per-requirement participation status for one user in one
    /// specialization.
    pub fn describe_enrollment_requirements(
        &self,
        user_id: Uuid,
        specialization_id: &str,
    ) -> Result<EnrollmentRequirements, EngineError> {
        let now = Utc::now();
        let model = self.registry.resolve(specialization_id)?;
        let license = self
            .store
            .find_license(user_id, specialization_id)?
            .ok_or(DenialReason::LicenseInactiveOrMissing)?;
        let period = self
            .store
            .current_period_for(license.id, now.date_naive())?;
        Ok(model.describe_enrollment_requirements(&license, period.as_ref(), now))
    }

    /// Current level, next level, progress percentage and history.
    pub fn describe_progression_status(
        &self,
        license_id: Uuid,
    ) -> Result<ProgressionReport, EngineError> {
        let license = self.store.get_license(license_id)?;
        let user = self.store.get_user(license.user_id)?;
        let model = self.registry.resolve(&license.specialization_id)?;
        let status =
            model.describe_progression_status(&user, &license, Utc::now().date_naive());
        let history = self.store.progression_history(license_id)?;
        Ok(ProgressionReport { status, history })
    }

    /// Fail when a license carries a level token its model does not define.
    pub fn verify_license_integrity(&self, license_id: Uuid) -> Result<(), EngineError> {
        let license = self.store.get_license(license_id)?;
        let model = self.registry.resolve(&license.specialization_id)?;
        if model.level_rank(&license.current_level).is_none() {
            return Err(EngineError::CorruptLevel {
                license: license.id,
                level: license.current_level.clone(),
                specialization: license.specialization_id.clone(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Booking Gate
    // ========================================================================

    /// Reserve one seat for the user, atomically.
    pub fn reserve_booking(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Booking, EngineError> {
        BookingGate::new(&self.store, &self.registry, self.audit.as_ref())
            .reserve(user_id, session_id)
    }

    /// Cancel a booking, returning the seat. No-op success when no booking
    /// exists.
    pub fn cancel_booking(&self, user_id: Uuid, session_id: Uuid) -> Result<bool, EngineError> {
        BookingGate::new(&self.store, &self.registry, self.audit.as_ref())
            .cancel(user_id, session_id)
    }

    // ========================================================================
    // Progression Ledger
    // ========================================================================

    pub fn certify_next_level(
        &self,
        license_id: Uuid,
        evaluator_id: Uuid,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
    ) -> Result<CertifyOutcome, EngineError> {
        ProgressionLedger::new(&self.store, &self.registry, self.audit.as_ref())
            .certify_next_level(license_id, evaluator_id, target_level, evidence)
    }

    pub fn promote_rank(
        &self,
        license_id: Uuid,
        evaluator_id: Uuid,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
    ) -> Result<CertifyOutcome, EngineError> {
        ProgressionLedger::new(&self.store, &self.registry, self.audit.as_ref())
            .promote_rank(license_id, evaluator_id, target_level, evidence)
    }

    pub fn award_session_xp(
        &self,
        license_id: Uuid,
        session_id: Uuid,
        attendance: AttendanceOutcome,
        makeup: bool,
    ) -> Result<XpAwarded, EngineError> {
        ProgressionLedger::new(&self.store, &self.registry, self.audit.as_ref())
            .award_session_xp(license_id, session_id, attendance, makeup)
    }

    pub fn select_positions(
        &self,
        license_id: Uuid,
        roles: &[String],
    ) -> Result<(), EngineError> {
        ProgressionLedger::new(&self.store, &self.registry, self.audit.as_ref())
            .select_positions(license_id, roles)
    }

    // ========================================================================
    // Assessment lifecycle
    // ========================================================================

    pub fn create_assessment(
        &self,
        subject_id: Uuid,
        kind: &str,
    ) -> Result<AssessmentRecord, EngineError> {
        AssessmentLifecycle::new(&self.store).create(subject_id, kind)
    }

    pub fn mark_assessed(
        &self,
        subject_id: Uuid,
        kind: &str,
    ) -> Result<AssessmentState, EngineError> {
        AssessmentLifecycle::new(&self.store).mark_assessed(subject_id, kind)
    }

    pub fn validate_assessment(
        &self,
        subject_id: Uuid,
        kind: &str,
    ) -> Result<AssessmentState, EngineError> {
        AssessmentLifecycle::new(&self.store).validate(subject_id, kind)
    }

    pub fn archive_assessment(
        &self,
        subject_id: Uuid,
        kind: &str,
    ) -> Result<AssessmentState, EngineError> {
        AssessmentLifecycle::new(&self.store).archive(subject_id, kind)
    }
}
