//! Semester-based certification ladder.
//!
//! An ordered ladder of levels, each carrying an age floor, a role label and
//! a cumulative hour requirement, chained to its predecessor. Certification
//! into the next level requires a passing exam score and the target level's
//! hour requirement; re-certifying an already-reached level is a no-op.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::config::{CertificationConfig, CertificationLevel};
use crate::domain::{EnrollmentPeriod, License, ProgressMetric, Session, User};
use crate::model::{
    percent_toward, semester_requirement_rows, shared_booking_checks, EnrollmentRequirements,
    ProgressionEvidence, ProgressionModel, ProgressionStatus, TransitionPlan,
};
use crate::reason::DenialReason;

#[derive(Debug)]
pub struct CertificationModel {
    id: String,
    name: String,
    cfg: CertificationConfig,
}

impl CertificationModel {
    pub fn new(id: String, name: String, cfg: CertificationConfig) -> Self {
        Self { id, name, cfg }
    }

    fn level(&self, index: usize) -> Option<&CertificationLevel> {
        self.cfg.levels.get(index)
    }

    fn level_by_token(&self, token: &str) -> Option<(usize, &CertificationLevel)> {
        self.cfg
            .levels
            .iter()
            .enumerate()
            .find(|(_, l)| l.token == token)
    }

    fn taught_hours(license: &License) -> u32 {
        match license.progress {
            ProgressMetric::TaughtHours { hours } => hours,
            _ => 0,
        }
    }
}

impl ProgressionModel for CertificationModel {
    fn specialization_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn enrollment_period_required(&self) -> bool {
        true
    }

    fn level_order(&self) -> Vec<&str> {
        self.cfg.levels.iter().map(|l| l.token.as_str()).collect()
    }

    fn validate_age_eligibility(
        &self,
        birth_date: NaiveDate,
        on: NaiveDate,
        target_level: Option<&str>,
    ) -> Result<(), DenialReason> {
        let age = on.years_since(birth_date).unwrap_or(0);
        let floor = self.cfg.levels.first().map(|l| l.min_age).unwrap_or(0);
        if age < floor {
            return Err(DenialReason::UnderMinimumAge);
        }
        if let Some(token) = target_level {
            let (_, level) = self
                .level_by_token(token)
                .ok_or(DenialReason::InvalidTransition)?;
            if age < level.min_age {
                return Err(DenialReason::UnderMinimumAge);
            }
        }
        Ok(())
    }

    fn can_book_session(
        &self,
        license: &License,
        period: Option<&EnrollmentPeriod>,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<(), DenialReason> {
        shared_booking_checks(self, license, period, session, now)
    }

    fn describe_enrollment_requirements(
        &self,
        license: &License,
        period: Option<&EnrollmentPeriod>,
        now: DateTime<Utc>,
    ) -> EnrollmentRequirements {
        let (rows, missing) = semester_requirement_rows(license, period, now);
        EnrollmentRequirements::from_checks(rows, missing)
    }

    fn describe_progression_status(
        &self,
        _user: &User,
        license: &License,
        _on: NaiveDate,
    ) -> ProgressionStatus {
        let hours = Self::taught_hours(license);
        match self.level_by_token(&license.current_level) {
            Some((index, level)) => {
                let next = self.level(index + 1);
                ProgressionStatus {
                    current_level: level.token.clone(),
                    current_label: level.label.clone(),
                    next_level: next.map(|l| l.token.clone()),
                    progress_percent: match next {
                        Some(next_level) => percent_toward(hours, next_level.required_hours),
                        None => 100,
                    },
                    metric_summary: license.progress.summary(),
                }
            }
            // Undefined token: report verbatim, the engine's integrity check
            // turns this into a fatal error
            None => ProgressionStatus {
                current_level: license.current_level.clone(),
                current_label: license.current_level.clone(),
                next_level: None,
                progress_percent: 0,
                metric_summary: license.progress.summary(),
            },
        }
    }

    fn evaluate_transition(
        &self,
        user: &User,
        license: &License,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
        on: NaiveDate,
    ) -> Result<TransitionPlan, DenialReason> {
        let (current_index, _) = self
            .level_by_token(&license.current_level)
            .ok_or(DenialReason::InvalidTransition)?;

        if let Some(token) = target_level {
            let (target_index, _) = self
                .level_by_token(token)
                .ok_or(DenialReason::InvalidTransition)?;
            if target_index <= current_index {
                // Already at or past the requested level
                return Ok(TransitionPlan::AlreadyAtLevel {
                    level: license.current_level.clone(),
                });
            }
            if target_index != current_index + 1 {
                return Err(DenialReason::InvalidTransition);
            }
        }

        let next = self
            .level(current_index + 1)
            .ok_or(DenialReason::InvalidTransition)?;

        let score = match evidence {
            ProgressionEvidence::Exam { score } => *score,
            _ => return Err(DenialReason::InvalidTransition),
        };
        if score < self.cfg.min_exam_score {
            debug!(
                specialization = %self.id,
                score,
                required = self.cfg.min_exam_score,
                "exam score below certification minimum"
            );
            return Err(DenialReason::InvalidTransition);
        }

        let age = on.years_since(user.birth_date).unwrap_or(0);
        if age < next.min_age {
            return Err(DenialReason::UnderMinimumAge);
        }

        if Self::taught_hours(license) < next.required_hours {
            return Err(DenialReason::InvalidTransition);
        }

        Ok(TransitionPlan::Advance {
            from: license.current_level.clone(),
            to: next.token.clone(),
            // Hour counts are cumulative across the ladder
            progress_after: license.progress.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FamilyConfig, ProgramCatalog};
    use crate::domain::{DeliveryMode, LicenseStatus, UserRole};
    use chrono::Duration;
    use uuid::Uuid;

    fn model() -> CertificationModel {
        let catalog = ProgramCatalog::default();
        let spec = catalog.find("COACH").unwrap();
        match &spec.family {
            FamilyConfig::Certification(cfg) => {
                CertificationModel::new(spec.id.clone(), spec.name.clone(), cfg.clone())
            }
            _ => unreachable!(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn adult() -> User {
        User {
            id: Uuid::new_v4(),
            display_name: "coach".to_string(),
            birth_date: date(1995, 3, 12),
            role: UserRole::Learner,
        }
    }

    fn license_at(user: &User, level: &str, hours: u32) -> License {
        License {
            id: Uuid::new_v4(),
            user_id: user.id,
            specialization_id: "COACH".to_string(),
            current_level: level.to_string(),
            status: LicenseStatus::Active,
            progress: ProgressMetric::TaughtHours { hours },
            created_at: Utc::now(),
        }
    }

    fn period_for(license: &License, paid: bool) -> EnrollmentPeriod {
        let today = Utc::now().date_naive();
        EnrollmentPeriod {
            id: Uuid::new_v4(),
            license_id: license.id,
            starts_on: today - Duration::days(30),
            ends_on: today + Duration::days(120),
            payment_verified: paid,
            semester_index: 1,
        }
    }

    fn open_session() -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            specialization_id: "COACH".to_string(),
            starts_at: now + Duration::days(3),
            ends_at: now + Duration::days(3) + Duration::hours(4),
            capacity: 12,
            booked_count: 0,
            booking_deadline: now + Duration::days(2),
            delivery_mode: DeliveryMode::InPerson,
        }
    }

    #[test]
    fn test_booking_requires_enrollment_period() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 0);
        assert_eq!(
            m.can_book_session(&license, None, &open_session(), Utc::now()),
            Err(DenialReason::EnrollmentPeriodMissing)
        );
    }

    #[test]
    fn test_booking_requires_verified_payment() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 0);
        let period = period_for(&license, false);
        assert_eq!(
            m.can_book_session(&license, Some(&period), &open_session(), Utc::now()),
            Err(DenialReason::PaymentNotVerified)
        );
    }

    #[test]
    fn test_booking_allowed_when_paid() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 0);
        let period = period_for(&license, true);
        assert!(m
            .can_book_session(&license, Some(&period), &open_session(), Utc::now())
            .is_ok());
    }

    #[test]
    fn test_low_exam_score_is_invalid_transition() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 100);
        let err = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::Exam { score: 69 },
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::InvalidTransition);
    }

    #[test]
    fn test_certification_advances_to_successor() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 80);
        let plan = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::Exam { score: 84 },
                date(2026, 8, 1),
            )
            .unwrap();
        assert_eq!(
            plan,
            TransitionPlan::Advance {
                from: "ASSISTANT".to_string(),
                to: "COACH".to_string(),
                progress_after: ProgressMetric::TaughtHours { hours: 80 },
            }
        );
    }

    #[test]
    fn test_insufficient_hours_refused() {
        let m = model();
        let user = adult();
        // COACH needs 60 cumulative hours
        let license = license_at(&user, "ASSISTANT", 59);
        let err = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::Exam { score: 95 },
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::InvalidTransition);
    }

    #[test]
    fn test_recertify_reached_level_is_noop() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "COACH", 80);
        let plan = m
            .evaluate_transition(
                &user,
                &license,
                Some("COACH"),
                &ProgressionEvidence::Exam { score: 90 },
                date(2026, 8, 1),
            )
            .unwrap();
        assert_eq!(
            plan,
            TransitionPlan::AlreadyAtLevel {
                level: "COACH".to_string()
            }
        );
    }

    #[test]
    fn test_level_skip_refused() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 300);
        let err = m
            .evaluate_transition(
                &user,
                &license,
                Some("SENIOR"),
                &ProgressionEvidence::Exam { score: 99 },
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::InvalidTransition);
    }

    #[test]
    fn test_age_floor_on_target_level() {
        let m = model();
        let young = User {
            id: Uuid::new_v4(),
            display_name: "junior".to_string(),
            birth_date: date(2009, 1, 1), // 17 in 2026
            role: UserRole::Learner,
        };
        let license = license_at(&young, "ASSISTANT", 200);
        // COACH requires age 18
        let err = m
            .evaluate_transition(
                &young,
                &license,
                None,
                &ProgressionEvidence::Exam { score: 90 },
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::UnderMinimumAge);
    }

    #[test]
    fn test_terminal_level_has_no_successor() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "HEAD", 500);
        let err = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::Exam { score: 100 },
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::InvalidTransition);
    }

    #[test]
    fn test_wrong_evidence_kind_refused() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 80);
        let err = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::Checkpoints { completed: 99 },
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::InvalidTransition);
    }

    #[test]
    fn test_progress_percent_toward_next() {
        let m = model();
        let user = adult();
        let license = license_at(&user, "ASSISTANT", 30);
        let status = m.describe_progression_status(&user, &license, date(2026, 8, 1));
        assert_eq!(status.next_level.as_deref(), Some("COACH"));
        assert_eq!(status.progress_percent, 50); // 30 of 60
    }
}
