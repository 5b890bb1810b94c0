//! Semester-based rank/belt ladder.
//!
//! Structurally a ladder like the certification family, but promotion is
//! gated by signed-off skill checkpoints instead of an exam score. Kept as
//! its own variant; the transition contract and idempotency rule are the
//! same.

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{RankConfig, RankLevel};
use crate::domain::{EnrollmentPeriod, License, ProgressMetric, Session, User};
use crate::model::{
    percent_toward, semester_requirement_rows, shared_booking_checks, EnrollmentRequirements,
    ProgressionEvidence, ProgressionModel, ProgressionStatus, TransitionPlan,
};
use crate::reason::DenialReason;

#[derive(Debug)]
pub struct RankModel {
    id: String,
    name: String,
    cfg: RankConfig,
}

impl RankModel {
    pub fn new(id: String, name: String, cfg: RankConfig) -> Self {
        Self { id, name, cfg }
    }

    fn rank(&self, index: usize) -> Option<&RankLevel> {
        self.cfg.ranks.get(index)
    }

    fn rank_by_token(&self, token: &str) -> Option<(usize, &RankLevel)> {
        self.cfg
            .ranks
            .iter()
            .enumerate()
            .find(|(_, r)| r.token == token)
    }

    fn checkpoints(license: &License) -> u32 {
        match license.progress {
            ProgressMetric::Checkpoints { completed } => completed,
            _ => 0,
        }
    }
}

impl ProgressionModel for RankModel {
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
        self.cfg.ranks.iter().map(|r| r.token.as_str()).collect()
    }

    fn validate_age_eligibility(
        &self,
        birth_date: NaiveDate,
        on: NaiveDate,
        target_level: Option<&str>,
    ) -> Result<(), DenialReason> {
        let age = on.years_since(birth_date).unwrap_or(0);
        let floor = self.cfg.ranks.first().map(|r| r.min_age).unwrap_or(0);
        if age < floor {
            return Err(DenialReason::UnderMinimumAge);
        }
        if let Some(token) = target_level {
            let (_, rank) = self
                .rank_by_token(token)
                .ok_or(DenialReason::InvalidTransition)?;
            if age < rank.min_age {
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
        let completed = Self::checkpoints(license);
        match self.rank_by_token(&license.current_level) {
            Some((index, rank)) => {
                let next = self.rank(index + 1);
                ProgressionStatus {
                    current_level: rank.token.clone(),
                    current_label: rank.label.clone(),
                    next_level: next.map(|r| r.token.clone()),
                    progress_percent: match next {
                        Some(next_rank) => {
                            percent_toward(completed, next_rank.required_checkpoints)
                        }
                        None => 100,
                    },
                    metric_summary: license.progress.summary(),
                }
            }
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
            .rank_by_token(&license.current_level)
            .ok_or(DenialReason::InvalidTransition)?;

        if let Some(token) = target_level {
            let (target_index, _) = self
                .rank_by_token(token)
                .ok_or(DenialReason::InvalidTransition)?;
            if target_index <= current_index {
                return Ok(TransitionPlan::AlreadyAtLevel {
                    level: license.current_level.clone(),
                });
            }
            if target_index != current_index + 1 {
                return Err(DenialReason::InvalidTransition);
            }
        }

        let next = self
            .rank(current_index + 1)
            .ok_or(DenialReason::InvalidTransition)?;

        let completed = match evidence {
            ProgressionEvidence::Checkpoints { completed } => *completed,
            _ => return Err(DenialReason::InvalidTransition),
        };
        // The sign-off sheet must cover the target rank; stored progress is
        // updated to whatever the evaluator signed off
        if completed < next.required_checkpoints {
            return Err(DenialReason::InvalidTransition);
        }

        let age = on.years_since(user.birth_date).unwrap_or(0);
        if age < next.min_age {
            return Err(DenialReason::UnderMinimumAge);
        }

        Ok(TransitionPlan::Advance {
            from: license.current_level.clone(),
            to: next.token.clone(),
            progress_after: ProgressMetric::Checkpoints { completed },
        })
    }
}
