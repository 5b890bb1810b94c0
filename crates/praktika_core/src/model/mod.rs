//! Progression models v0.4.0
//!
//! One model per specialization family, all implementing the same capability
//! set behind [`ProgressionModel`]. Variants are independent tagged types
//! selected through the registry; adding a family never touches an existing
//! one.
//!
//! Families:
//! - [`AgeGroupModel`] - session-based, level derived from age
//! - [`CertificationModel`] - semester-based ladder gated by exam + hours
//! - [`RankModel`] - semester-based belt ladder gated by skill checkpoints
//! - [`XpModel`] - semester-based XP accumulation with a capped make-up
//!   channel and bounded position selection

pub mod age_group;
pub mod certification;
pub mod rank;
pub mod xp;

pub use age_group::AgeGroupModel;
pub use certification::CertificationModel;
pub use rank::RankModel;
pub use xp::{AchievementTier, XpModel};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EnrollmentPeriod, License, ProgressMetric, Session, User};
use crate::reason::DenialReason;

// ============================================================================
// Shared status types
// ============================================================================

/// A single requirement a family checks before a learner may participate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    ActiveLicense,
    EnrollmentPeriod,
    PaymentVerified,
    PositionSelection,
}

/// One requirement with its current satisfaction state, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementStatus {
    pub kind: RequirementKind,
    pub satisfied: bool,
    pub detail: String,
}

/// Structured answer to "what is still missing before this learner can
/// participate".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRequirements {
    pub can_participate: bool,
    /// Denial codes for each unsatisfied requirement
    pub missing: Vec<DenialReason>,
    pub requirements: Vec<RequirementStatus>,
}

impl EnrollmentRequirements {
    pub fn from_checks(requirements: Vec<RequirementStatus>, missing: Vec<DenialReason>) -> Self {
        Self {
            can_participate: requirements.iter().all(|r| r.satisfied),
            missing,
            requirements,
        }
    }
}

/// Structured progression status of one license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionStatus {
    pub current_level: String,
    pub current_label: String,
    /// `None` at the terminal level
    pub next_level: Option<String>,
    /// Progress toward the next level's threshold, 0-100
    pub progress_percent: u8,
    pub metric_summary: String,
}

/// Evidence supporting a requested level transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressionEvidence {
    /// Certification ladder: score of the level exam (0-100)
    Exam { score: u32 },
    /// Rank ladder: total skill checkpoints signed off
    Checkpoints { completed: u32 },
    /// XP family: close out the current semester from accumulated XP
    SemesterCompletion,
}

/// What the model decided a transition request amounts to. Persisting the
/// plan is the Progression Ledger's job.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPlan {
    /// Apply the transition and reset the metric for the new level
    Advance {
        from: String,
        to: String,
        progress_after: ProgressMetric,
    },
    /// The license already is at (or past) the requested level; nothing to do
    AlreadyAtLevel { level: String },
}

/// Attendance outcome of a booked session, for XP awards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceOutcome {
    Full,
    Partial,
    Absent,
}

// ============================================================================
// The capability set
// ============================================================================

/// Capability set implemented by every specialization family.
pub trait ProgressionModel: std::fmt::Debug + Send + Sync {
    /// Registry key this model was built for
    fn specialization_id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Semester-based families require an active, payment-verified
    /// enrollment period for any booking; session-based families never do.
    fn enrollment_period_required(&self) -> bool;

    /// Ordered level tokens, first to terminal.
    fn level_order(&self) -> Vec<&str>;

    /// Minimum-age check for the specialization overall and, when
    /// `target_level` is given, for that specific level.
    fn validate_age_eligibility(
        &self,
        birth_date: NaiveDate,
        on: NaiveDate,
        target_level: Option<&str>,
    ) -> Result<(), DenialReason>;

    /// The booking-eligibility composition: active license, matching
    /// specialization, enrollment period (where required), deadline, and a
    /// cheap capacity pre-check. Age is checked separately via
    /// [`Self::validate_age_eligibility`].
    fn can_book_session(
        &self,
        license: &License,
        period: Option<&EnrollmentPeriod>,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<(), DenialReason>;

    /// Per-requirement participation status for display.
    fn describe_enrollment_requirements(
        &self,
        license: &License,
        period: Option<&EnrollmentPeriod>,
        now: DateTime<Utc>,
    ) -> EnrollmentRequirements;

    /// Current/next level and numeric progress toward the next threshold.
    fn describe_progression_status(
        &self,
        user: &User,
        license: &License,
        on: NaiveDate,
    ) -> ProgressionStatus;

    /// Decide whether a requested transition is an advance, an idempotent
    /// no-op, or invalid. Pure; the ledger persists the plan.
    fn evaluate_transition(
        &self,
        user: &User,
        license: &License,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
        on: NaiveDate,
    ) -> Result<TransitionPlan, DenialReason>;

    /// XP awarded for attending one session. `None` for families that do
    /// not accumulate session XP.
    fn session_xp_award(
        &self,
        session: &Session,
        semester_index: u32,
        attendance: AttendanceOutcome,
    ) -> Option<u32> {
        let _ = (session, semester_index, attendance);
        None
    }

    /// Validate a position selection. Families without position selection
    /// accept anything vacuously empty and refuse the rest.
    fn validate_position_selection(&self, roles: &[String]) -> Result<(), DenialReason> {
        if roles.is_empty() {
            Ok(())
        } else {
            Err(DenialReason::InvalidTransition)
        }
    }

    /// Position of a level token within the ladder, if defined.
    fn level_rank(&self, token: &str) -> Option<usize> {
        self.level_order().iter().position(|t| *t == token)
    }
}

// ============================================================================
// Shared booking checks
// ============================================================================

/// The booking checks common to every family, in denial-priority order.
/// Variants call this from `can_book_session`.
pub(crate) fn shared_booking_checks(
    model: &dyn ProgressionModel,
    license: &License,
    period: Option<&EnrollmentPeriod>,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<(), DenialReason> {
    if !license.is_active() {
        return Err(DenialReason::LicenseInactiveOrMissing);
    }
    if license.specialization_id != session.specialization_id {
        return Err(DenialReason::SpecializationMismatch);
    }
    if model.enrollment_period_required() {
        let period = period.ok_or(DenialReason::EnrollmentPeriodMissing)?;
        if !period.covers(now.date_naive()) {
            return Err(DenialReason::EnrollmentPeriodMissing);
        }
        if !period.payment_verified {
            return Err(DenialReason::PaymentNotVerified);
        }
    }
    if session.deadline_passed(now) {
        return Err(DenialReason::BookingDeadlinePassed);
    }
    // Cheap pre-check; the Booking Gate re-checks atomically at reserve time
    if session.remaining_capacity() == 0 {
        return Err(DenialReason::CapacityExhausted);
    }
    Ok(())
}

/// Requirement rows shared by the semester-based families.
pub(crate) fn semester_requirement_rows(
    license: &License,
    period: Option<&EnrollmentPeriod>,
    now: DateTime<Utc>,
) -> (Vec<RequirementStatus>, Vec<DenialReason>) {
    let mut rows = Vec::new();
    let mut missing = Vec::new();

    let active = license.is_active();
    rows.push(RequirementStatus {
        kind: RequirementKind::ActiveLicense,
        satisfied: active,
        detail: if active {
            "license is active".to_string()
        } else {
            "license is inactive".to_string()
        },
    });
    if !active {
        missing.push(DenialReason::LicenseInactiveOrMissing);
    }

    let today = now.date_naive();
    let current = period.filter(|p| p.covers(today));
    rows.push(RequirementStatus {
        kind: RequirementKind::EnrollmentPeriod,
        satisfied: current.is_some(),
        detail: match current {
            Some(p) => format!("enrolled until {}", p.ends_on),
            None => "no enrollment period covers today".to_string(),
        },
    });
    if current.is_none() {
        missing.push(DenialReason::EnrollmentPeriodMissing);
    }

    let paid = current.map(|p| p.payment_verified).unwrap_or(false);
    rows.push(RequirementStatus {
        kind: RequirementKind::PaymentVerified,
        satisfied: paid,
        detail: if paid {
            "payment verified".to_string()
        } else {
            "payment not verified".to_string()
        },
    });
    if current.is_some() && !paid {
        missing.push(DenialReason::PaymentNotVerified);
    }

    (rows, missing)
}

/// Percentage of `value` relative to `threshold`, clamped to 0-100.
pub(crate) fn percent_toward(value: u32, threshold: u32) -> u8 {
    if threshold == 0 {
        return 100;
    }
    ((value as u64 * 100 / threshold as u64).min(100)) as u8
}
