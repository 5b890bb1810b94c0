//! Session-based age-group family.
//!
//! Levels are age bands with a fixed minimum age per band. The applicable
//! level is derived from the learner's age at evaluation time, not from a
//! persisted progression, and booking eligibility never involves an
//! enrollment period or payment.

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{AgeBand, AgeGroupConfig};
use crate::domain::{EnrollmentPeriod, License, Session, User};
use crate::model::{
    percent_toward, shared_booking_checks, EnrollmentRequirements, ProgressionEvidence,
    ProgressionModel, ProgressionStatus, RequirementKind, RequirementStatus, TransitionPlan,
};
use crate::reason::DenialReason;

#[derive(Debug)]
pub struct AgeGroupModel {
    id: String,
    name: String,
    cfg: AgeGroupConfig,
}

impl AgeGroupModel {
    pub fn new(id: String, name: String, cfg: AgeGroupConfig) -> Self {
        Self { id, name, cfg }
    }

    /// Highest band whose minimum age the learner has reached.
    pub fn band_for_age(&self, age: u32) -> Option<&AgeBand> {
        self.cfg
            .bands
            .iter()
            .rev()
            .find(|band| age >= band.min_age)
    }

    fn band_by_token(&self, token: &str) -> Option<&AgeBand> {
        self.cfg.bands.iter().find(|band| band.token == token)
    }
}

impl ProgressionModel for AgeGroupModel {
    fn specialization_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn enrollment_period_required(&self) -> bool {
        false
    }

    fn level_order(&self) -> Vec<&str> {
        self.cfg.bands.iter().map(|b| b.token.as_str()).collect()
    }

    fn validate_age_eligibility(
        &self,
        birth_date: NaiveDate,
        on: NaiveDate,
        target_level: Option<&str>,
    ) -> Result<(), DenialReason> {
        let age = on.years_since(birth_date).unwrap_or(0);
        if age < self.cfg.min_age() {
            return Err(DenialReason::UnderMinimumAge);
        }
        if let Some(token) = target_level {
            let band = self
                .band_by_token(token)
                .ok_or(DenialReason::InvalidTransition)?;
            if age < band.min_age {
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
        _period: Option<&EnrollmentPeriod>,
        _now: DateTime<Utc>,
    ) -> EnrollmentRequirements {
        // Session-based: no enrollment period, no payment rows at all
        let active = license.is_active();
        let rows = vec![RequirementStatus {
            kind: RequirementKind::ActiveLicense,
            satisfied: active,
            detail: if active {
                "license is active".to_string()
            } else {
                "license is inactive".to_string()
            },
        }];
        let missing = if active {
            vec![]
        } else {
            vec![DenialReason::LicenseInactiveOrMissing]
        };
        EnrollmentRequirements::from_checks(rows, missing)
    }

    fn describe_progression_status(
        &self,
        user: &User,
        license: &License,
        on: NaiveDate,
    ) -> ProgressionStatus {
        let age = user.age_on(on).unwrap_or(0);
        // Derived, not persisted. Below the lowest band we still report the
        // lowest band with zero progress.
        let Some(band) = self.band_for_age(age).or_else(|| self.cfg.bands.first()) else {
            return ProgressionStatus {
                current_level: license.current_level.clone(),
                current_label: license.current_level.clone(),
                next_level: None,
                progress_percent: 0,
                metric_summary: license.progress.summary(),
            };
        };

        let index = self
            .cfg
            .bands
            .iter()
            .position(|b| b.token == band.token)
            .unwrap_or(0);
        let next = self.cfg.bands.get(index + 1);

        let progress_percent = match next {
            Some(next_band) => {
                let span = next_band.min_age.saturating_sub(band.min_age);
                percent_toward(age.saturating_sub(band.min_age), span)
            }
            None => 100,
        };

        ProgressionStatus {
            current_level: band.token.clone(),
            current_label: band.label.clone(),
            next_level: next.map(|b| b.token.clone()),
            progress_percent,
            metric_summary: license.progress.summary(),
        }
    }

    fn evaluate_transition(
        &self,
        _user: &User,
        _license: &License,
        _target_level: Option<&str>,
        _evidence: &ProgressionEvidence,
        _on: NaiveDate,
    ) -> Result<TransitionPlan, DenialReason> {
        // Levels are derived from age; there is nothing to administer
        Err(DenialReason::InvalidTransition)
    }
}
