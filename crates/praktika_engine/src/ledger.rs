//! Progression Ledger v0.4.2
//!
//! Applies level transitions to license records, exactly once. Every
//! create-or-advance operation here treats "already recorded with the
//! expected shape" as success: re-certifying a reached level, re-awarding a
//! session's XP or losing a transition race to an identical outcome are
//! no-ops, never errors. Invalid requests (wrong successor, insufficient
//! evidence) stay errors.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use praktika_core::domain::ProgressMetric;
use praktika_core::model::{AttendanceOutcome, ProgressionEvidence, TransitionPlan};
use praktika_core::reason::DenialReason;
use praktika_core::registry::SpecializationRegistry;
use praktika_store::{EngineStore, StoreError};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::EngineError;

/// Outcome of a certify/promote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertifyOutcome {
    /// The license advanced to a new level
    Advanced { new_level: String },
    /// The license already is at or past the requested level
    AlreadyAtLevel { level: String },
}

/// Outcome of a session XP award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAwarded {
    pub xp: u32,
    /// `false` when the (license, session) award already existed
    pub applied: bool,
}

pub struct ProgressionLedger<'a> {
    store: &'a EngineStore,
    registry: &'a SpecializationRegistry,
    audit: &'a dyn AuditSink,
}

impl<'a> ProgressionLedger<'a> {
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

    /// Certify a license into the next ladder level (certification family),
    /// or into `target_level` when given.
    pub fn certify_next_level(
        &self,
        license_id: Uuid,
        evaluator_id: Uuid,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
    ) -> Result<CertifyOutcome, EngineError> {
        self.advance(license_id, evaluator_id, target_level, evidence, "certify")
    }

    /// Promote a rank-family license. Same transition contract as
    /// certification; the model enforces the checkpoint criteria.
    pub fn promote_rank(
        &self,
        license_id: Uuid,
        evaluator_id: Uuid,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
    ) -> Result<CertifyOutcome, EngineError> {
        self.advance(license_id, evaluator_id, target_level, evidence, "promote")
    }

    fn advance(
        &self,
        license_id: Uuid,
        evaluator_id: Uuid,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
        action: &str,
    ) -> Result<CertifyOutcome, EngineError> {
        let license = self.store.get_license(license_id)?;
        let user = self.store.get_user(license.user_id)?;
        let model = self.registry.resolve(&license.specialization_id)?;

        // A stored level token the model does not define is a data-integrity
        // defect, not a deniable request
        if model.level_rank(&license.current_level).is_none() {
            return Err(EngineError::CorruptLevel {
                license: license.id,
                level: license.current_level.clone(),
                specialization: license.specialization_id.clone(),
            });
        }

        let today = Utc::now().date_naive();
        let plan = model.evaluate_transition(&user, &license, target_level, evidence, today)?;

        match plan {
            TransitionPlan::AlreadyAtLevel { level } => {
                Ok(CertifyOutcome::AlreadyAtLevel { level })
            }
            TransitionPlan::Advance {
                from,
                to,
                progress_after,
            } => {
                let evidence_json = serde_json::to_value(evidence).map_err(|e| {
                    EngineError::Storage(StoreError::Corrupt(format!(
                        "unserializable evidence: {e}"
                    )))
                })?;
                let applied = self.store.apply_transition(
                    license.id,
                    &from,
                    &to,
                    evaluator_id,
                    &evidence_json,
                    &progress_after,
                    Utc::now(),
                )?;
                if applied {
                    info!(license = %license.id, from = %from, to = %to, "level transition applied");
                } else {
                    // A concurrent identical call won; same resulting level
                    info!(license = %license.id, to = %to, "level transition already recorded");
                }
                self.audit.record(AuditEvent::new(
                    Some(evaluator_id),
                    action,
                    "ok",
                    serde_json::json!({ "license_id": license.id, "from": from, "to": to }),
                ));
                Ok(CertifyOutcome::Advanced { new_level: to })
            }
        }
    }

    /// Award the XP for attending one session, at most once per
    /// (license, session). The model derives the amount from delivery mode,
    /// semester and attendance outcome; `makeup` routes the award through
    /// the capped make-up channel.
    pub fn award_session_xp(
        &self,
        license_id: Uuid,
        session_id: Uuid,
        attendance: AttendanceOutcome,
        makeup: bool,
    ) -> Result<XpAwarded, EngineError> {
        let license = self.store.get_license(license_id)?;
        let model = self.registry.resolve(&license.specialization_id)?;
        let session = self.store.get_session(session_id)?;

        let today = Utc::now().date_naive();
        let period = self
            .store
            .current_period_for(license.id, today)?
            .ok_or(DenialReason::EnrollmentPeriodMissing)?;

        let xp = model
            .session_xp_award(&session, period.semester_index, attendance)
            .ok_or(DenialReason::InvalidTransition)?;

        let applied =
            self.store
                .record_session_xp(license.id, session.id, xp, makeup, Utc::now())?;
        if applied {
            info!(license = %license.id, session = %session.id, xp, makeup, "session XP awarded");
        }
        Ok(XpAwarded { xp, applied })
    }

    /// Store a learner's position selection after validating it against the
    /// model's catalogue and bounds.
    pub fn select_positions(
        &self,
        license_id: Uuid,
        roles: &[String],
    ) -> Result<(), EngineError> {
        let license = self.store.get_license(license_id)?;
        let model = self.registry.resolve(&license.specialization_id)?;
        model.validate_position_selection(roles)?;

        let progress = match license.progress {
            ProgressMetric::Xp {
                base_xp, makeup_xp, ..
            } => ProgressMetric::Xp {
                base_xp,
                makeup_xp,
                positions: roles.to_vec(),
            },
            // Only the XP family carries a position selection
            _ => return Err(EngineError::Denied(DenialReason::InvalidTransition)),
        };
        self.store.update_progress(license.id, &progress)?;
        info!(license = %license.id, count = roles.len(), "position selection stored");
        Ok(())
    }
}
