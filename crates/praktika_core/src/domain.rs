//! Domain entities shared across the engine.
//!
//! These mirror the platform's storage rows. The engine reads users,
//! enrollment periods and sessions; it mutates only `Session.booked_count`
//! (Booking Gate), `License.current_level`/`progress` (Progression Ledger)
//! and `AssessmentRecord.state` (lifecycle machine).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Users
// ============================================================================

/// Role of a platform account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Learner,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Learner => "learner",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "learner" => Some(UserRole::Learner),
            "instructor" => Some(UserRole::Instructor),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A platform account. Owned by the account subsystem; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub role: UserRole,
}

impl User {
    /// Whole years of age on the given date. `None` if the birth date lies
    /// in the future (corrupt account data).
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        date.years_since(self.birth_date)
    }
}

// ============================================================================
// Licenses
// ============================================================================

/// Lifecycle status of a license. Licenses are deactivated, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Active,
    Inactive,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(LicenseStatus::Active),
            "inactive" => Some(LicenseStatus::Inactive),
            _ => None,
        }
    }
}

/// Accumulated progress toward the next level. The shape depends on the
/// specialization family that owns the license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressMetric {
    /// Age-group family: the applicable level is derived from age, nothing
    /// is accumulated.
    None,
    /// Certification ladder: hours taught since the last certification.
    TaughtHours { hours: u32 },
    /// Rank ladder: skill checkpoints completed toward the next rank.
    Checkpoints { completed: u32 },
    /// XP family: base-channel and capped make-up-channel totals for the
    /// current semester, plus the learner's position selection.
    Xp {
        base_xp: u32,
        makeup_xp: u32,
        positions: Vec<String>,
    },
}

impl ProgressMetric {
    /// Short one-line summary for status displays.
    pub fn summary(&self) -> String {
        match self {
            ProgressMetric::None => "derived from age".to_string(),
            ProgressMetric::TaughtHours { hours } => format!("{hours}h taught"),
            ProgressMetric::Checkpoints { completed } => {
                format!("{completed} checkpoints completed")
            }
            ProgressMetric::Xp {
                base_xp, makeup_xp, ..
            } => format!("{base_xp} XP (+{makeup_xp} make-up)"),
        }
    }
}

/// A user's enrollment in exactly one specialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization_id: String,
    /// Opaque level token; always one of the owning model's defined levels.
    pub current_level: String,
    pub status: LicenseStatus,
    pub progress: ProgressMetric,
    pub created_at: DateTime<Utc>,
}

impl License {
    pub fn is_active(&self) -> bool {
        self.status == LicenseStatus::Active
    }
}

// ============================================================================
// Enrollment periods (semester membership)
// ============================================================================

/// Semester membership of a license. Only semester-based families require
/// one; session-based families never look at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentPeriod {
    pub id: Uuid,
    pub license_id: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub payment_verified: bool,
    /// 1-based semester counter within the specialization.
    pub semester_index: u32,
}

impl EnrollmentPeriod {
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.starts_on && date <= self.ends_on
    }
}

// ============================================================================
// Sessions and bookings
// ============================================================================

/// How a session is delivered. The three modes award different XP and are
/// not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    InPerson,
    Online,
    SelfPaced,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::InPerson => "in_person",
            DeliveryMode::Online => "online",
            DeliveryMode::SelfPaced => "self_paced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_person" => Some(DeliveryMode::InPerson),
            "online" => Some(DeliveryMode::Online),
            "self_paced" => Some(DeliveryMode::SelfPaced),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The bookable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub specialization_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: u32,
    /// Monotonically consumed by the Booking Gate; never exceeds `capacity`.
    pub booked_count: u32,
    /// Cutoff after which new bookings are refused.
    pub booking_deadline: DateTime<Utc>,
    pub delivery_mode: DeliveryMode,
}

impl Session {
    pub fn remaining_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.booked_count)
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.booking_deadline
    }
}

/// One reserved seat. Unique per (user, session); created only by the
/// Booking Gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Progression history
// ============================================================================

/// Append-only record of one applied level transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionRecord {
    pub id: Uuid,
    pub license_id: Uuid,
    pub from_level: String,
    pub to_level: String,
    pub recorded_at: DateTime<Utc>,
    pub evaluator_id: Uuid,
    /// Supporting evidence (exam score, checkpoint list, semester result).
    pub evidence: serde_json::Value,
}

// ============================================================================
// Assessment records (lifecycle variant)
// ============================================================================

/// State of a skill/competency assessment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentState {
    Unassessed,
    Assessed,
    Validated,
    Archived,
}

impl AssessmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentState::Unassessed => "unassessed",
            AssessmentState::Assessed => "assessed",
            AssessmentState::Validated => "validated",
            AssessmentState::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unassessed" => Some(AssessmentState::Unassessed),
            "assessed" => Some(AssessmentState::Assessed),
            "validated" => Some(AssessmentState::Validated),
            "archived" => Some(AssessmentState::Archived),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssessmentState::Archived)
    }
}

impl std::fmt::Display for AssessmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One assessment per (subject, kind) pair; concurrent creations collapse
/// onto one row via the storage-level unique key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub kind: String,
    pub state: AssessmentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
