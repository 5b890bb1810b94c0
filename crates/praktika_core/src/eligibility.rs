//! Eligibility evaluator.
//!
//! Single entry point for "can this user book this session": resolves the
//! model from the *session's* specialization id, folds in the license,
//! enrollment period and age, and returns one allow/deny decision carrying
//! a reason code the caller can branch on.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{EnrollmentPeriod, License, Session, User};
use crate::reason::DenialReason;
use crate::registry::SpecializationRegistry;

/// Outcome of one eligibility evaluation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BookingDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
    /// Renderable human message; derived from the reason, never parsed back
    pub message: String,
}

impl BookingDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: "booking allowed".to_string(),
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            message: reason.to_string(),
        }
    }
}

impl From<Result<(), DenialReason>> for BookingDecision {
    fn from(result: Result<(), DenialReason>) -> Self {
        match result {
            Ok(()) => BookingDecision::allow(),
            Err(reason) => BookingDecision::deny(reason),
        }
    }
}

pub struct EligibilityEvaluator<'a> {
    registry: &'a SpecializationRegistry,
}

impl<'a> EligibilityEvaluator<'a> {
    pub fn new(registry: &'a SpecializationRegistry) -> Self {
        Self { registry }
    }

    /// Evaluate every booking precondition. Pure with respect to the
    /// snapshots it is handed; the Booking Gate re-runs this against fresh
    /// rows before reserving.
    pub fn can_book_session(
        &self,
        user: &User,
        license: Option<&License>,
        period: Option<&EnrollmentPeriod>,
        session: &Session,
        now: DateTime<Utc>,
    ) -> BookingDecision {
        let model = match self.registry.resolve(&session.specialization_id) {
            Ok(model) => model,
            Err(reason) => return BookingDecision::deny(reason),
        };

        let license = match license.filter(|l| l.is_active()) {
            Some(license) => license,
            None => return BookingDecision::deny(DenialReason::LicenseInactiveOrMissing),
        };

        if let Err(reason) = model.validate_age_eligibility(user.birth_date, now.date_naive(), None)
        {
            return BookingDecision::deny(reason);
        }

        let decision: BookingDecision = model
            .can_book_session(license, period, session, now)
            .into();
        if let Some(reason) = decision.reason {
            debug!(
                user = %user.id,
                session = %session.id,
                reason = reason.code(),
                "booking denied"
            );
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgramCatalog;
    use crate::domain::{DeliveryMode, LicenseStatus, ProgressMetric, UserRole};
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn registry() -> SpecializationRegistry {
        SpecializationRegistry::from_catalog(&ProgramCatalog::default()).unwrap()
    }

    fn user_aged(years: i64) -> User {
        User {
            id: Uuid::new_v4(),
            display_name: "u".to_string(),
            birth_date: (Utc::now() - Duration::days(365 * years + 180)).date_naive(),
            role: UserRole::Learner,
        }
    }

    fn license(user: &User, spec: &str, level: &str) -> License {
        License {
            id: Uuid::new_v4(),
            user_id: user.id,
            specialization_id: spec.to_string(),
            current_level: level.to_string(),
            status: LicenseStatus::Active,
            progress: ProgressMetric::None,
            created_at: Utc::now(),
        }
    }

    fn session(spec: &str) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            specialization_id: spec.to_string(),
            starts_at: now + Duration::days(5),
            ends_at: now + Duration::days(5) + Duration::hours(2),
            capacity: 8,
            booked_count: 0,
            booking_deadline: now + Duration::days(4),
            delivery_mode: DeliveryMode::InPerson,
        }
    }

    #[test]
    fn test_unknown_specialization_denied() {
        let r = registry();
        let evaluator = EligibilityEvaluator::new(&r);
        let user = user_aged(20);
        let decision =
            evaluator.can_book_session(&user, None, None, &session("MYSTERY"), Utc::now());
        assert_eq!(decision.reason, Some(DenialReason::SpecializationUnknown));
    }

    #[test]
    fn test_missing_license_denied() {
        let r = registry();
        let evaluator = EligibilityEvaluator::new(&r);
        let user = user_aged(20);
        let decision = evaluator.can_book_session(&user, None, None, &session("YOUTH"), Utc::now());
        assert_eq!(
            decision.reason,
            Some(DenialReason::LicenseInactiveOrMissing)
        );
    }

    #[test]
    fn test_inactive_license_denied() {
        let r = registry();
        let evaluator = EligibilityEvaluator::new(&r);
        let user = user_aged(20);
        let mut lic = license(&user, "YOUTH", "ADULTS");
        lic.status = LicenseStatus::Inactive;
        let decision =
            evaluator.can_book_session(&user, Some(&lic), None, &session("YOUTH"), Utc::now());
        assert_eq!(
            decision.reason,
            Some(DenialReason::LicenseInactiveOrMissing)
        );
    }

    #[test]
    fn test_session_based_booking_allowed_without_period() {
        let r = registry();
        let evaluator = EligibilityEvaluator::new(&r);
        let user = user_aged(20);
        let lic = license(&user, "YOUTH", "ADULTS");
        let decision =
            evaluator.can_book_session(&user, Some(&lic), None, &session("YOUTH"), Utc::now());
        assert!(decision.allowed, "denied: {:?}", decision.reason);
    }

    #[test]
    fn test_under_minimum_age_wins_over_other_state() {
        let r = registry();
        let evaluator = EligibilityEvaluator::new(&r);
        let toddler = User {
            id: Uuid::new_v4(),
            display_name: "t".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            role: UserRole::Learner,
        };
        let lic = license(&toddler, "YOUTH", "MINIS");
        let decision =
            evaluator.can_book_session(&toddler, Some(&lic), None, &session("YOUTH"), Utc::now());
        assert_eq!(decision.reason, Some(DenialReason::UnderMinimumAge));
    }

    #[test]
    fn test_semester_based_requires_payment() {
        let r = registry();
        let evaluator = EligibilityEvaluator::new(&r);
        let user = user_aged(25);
        let lic = license(&user, "COACH", "ASSISTANT");
        let decision =
            evaluator.can_book_session(&user, Some(&lic), None, &session("COACH"), Utc::now());
        assert_eq!(decision.reason, Some(DenialReason::EnrollmentPeriodMissing));
    }

    #[test]
    fn test_decision_message_matches_reason() {
        let decision = BookingDecision::deny(DenialReason::PaymentNotVerified);
        assert_eq!(decision.message, DenialReason::PaymentNotVerified.to_string());
    }
}
