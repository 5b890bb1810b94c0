//! Semester-based XP accumulation family.
//!
//! Levels are semesters. Each semester defines a base XP requirement and
//! three achievement thresholds (excellence / standard / conditional pass)
//! as percentages of the base, tightening across semesters. A capped
//! make-up channel can lift a learner from conditional to standard but the
//! excellence tier is reachable from the base channel alone - the make-up
//! number never counts toward it, however large.
//!
//! Per-session XP depends on the delivery mode and scales up by a fixed
//! percentage per successive semester. Learners also select between 1 and 7
//! distinct positions from a fixed catalogue; the selection gates
//! participation readiness but not the XP math.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{SemesterConfig, XpConfig};
use crate::domain::{DeliveryMode, EnrollmentPeriod, License, ProgressMetric, Session, User};
use crate::model::{
    percent_toward, semester_requirement_rows, shared_booking_checks, AttendanceOutcome,
    EnrollmentRequirements, ProgressionEvidence, ProgressionModel, ProgressionStatus,
    RequirementKind, RequirementStatus, TransitionPlan,
};
use crate::reason::DenialReason;

/// Achievement tier reached within one semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementTier {
    Below,
    ConditionalPass,
    Standard,
    Excellence,
}

impl std::fmt::Display for AchievementTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AchievementTier::Below => write!(f, "below"),
            AchievementTier::ConditionalPass => write!(f, "conditional_pass"),
            AchievementTier::Standard => write!(f, "standard"),
            AchievementTier::Excellence => write!(f, "excellence"),
        }
    }
}

#[derive(Debug)]
pub struct XpModel {
    id: String,
    name: String,
    cfg: XpConfig,
}

impl XpModel {
    pub fn new(id: String, name: String, cfg: XpConfig) -> Self {
        Self { id, name, cfg }
    }

    pub fn config(&self) -> &XpConfig {
        &self.cfg
    }

    fn xp_of(license: &License) -> (u32, u32) {
        match &license.progress {
            ProgressMetric::Xp {
                base_xp, makeup_xp, ..
            } => (*base_xp, *makeup_xp),
            _ => (0, 0),
        }
    }

    fn positions_of(license: &License) -> &[String] {
        match &license.progress {
            ProgressMetric::Xp { positions, .. } => positions,
            _ => &[],
        }
    }

    /// XP counted toward the standard/conditional thresholds: base channel
    /// plus the make-up channel clipped at the semester cap.
    pub fn counted_xp(&self, base_xp: u32, makeup_xp: u32, semester: &SemesterConfig) -> u32 {
        base_xp.saturating_add(makeup_xp.min(semester.makeup_cap_xp()))
    }

    /// Achievement tier for one semester. Excellence is judged on the base
    /// channel alone; make-up XP never reaches it.
    pub fn achievement(&self, base_xp: u32, makeup_xp: u32, semester: &SemesterConfig) -> AchievementTier {
        let t = semester.thresholds;
        if base_xp >= semester.threshold_xp(t.excellence_pct) {
            return AchievementTier::Excellence;
        }
        let counted = self.counted_xp(base_xp, makeup_xp, semester);
        if counted >= semester.threshold_xp(t.standard_pct) {
            AchievementTier::Standard
        } else if counted >= semester.threshold_xp(t.conditional_pct) {
            AchievementTier::ConditionalPass
        } else {
            AchievementTier::Below
        }
    }

    /// Per-session XP award. The base award per delivery mode scales up by
    /// the configured percentage per successive semester (1-based index).
    pub fn compute_session_xp(
        &self,
        mode: DeliveryMode,
        semester_index: u32,
        attendance: AttendanceOutcome,
    ) -> u32 {
        let award = &self.cfg.session_award;
        let base = award.base_for(mode) as u64;
        let steps = semester_index.saturating_sub(1) as u64;
        let scaled = base * (100 + award.semester_increment_pct as u64 * steps) / 100;
        let full = scaled as u32;
        match attendance {
            AttendanceOutcome::Full => full,
            AttendanceOutcome::Partial => {
                (scaled * award.partial_attendance_pct as u64 / 100) as u32
            }
            AttendanceOutcome::Absent => 0,
        }
    }
}

impl ProgressionModel for XpModel {
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
        self.cfg.semesters.iter().map(|s| s.token.as_str()).collect()
    }

    fn validate_age_eligibility(
        &self,
        birth_date: NaiveDate,
        on: NaiveDate,
        target_level: Option<&str>,
    ) -> Result<(), DenialReason> {
        let age = on.years_since(birth_date).unwrap_or(0);
        if age < self.cfg.min_age {
            return Err(DenialReason::UnderMinimumAge);
        }
        if let Some(token) = target_level {
            // Semesters carry no age floor of their own, but the token must
            // at least be defined
            if self.cfg.semester_by_token(token).is_none() {
                return Err(DenialReason::InvalidTransition);
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
        let (mut rows, missing) = semester_requirement_rows(license, period, now);

        let positions = Self::positions_of(license);
        let selected = self.validate_position_selection_impl(positions).is_ok() && !positions.is_empty();
        rows.push(RequirementStatus {
            kind: RequirementKind::PositionSelection,
            satisfied: selected,
            detail: if selected {
                format!("{} position(s) selected", positions.len())
            } else {
                "position selection outstanding".to_string()
            },
        });

        EnrollmentRequirements::from_checks(rows, missing)
    }

    fn describe_progression_status(
        &self,
        _user: &User,
        license: &License,
        _on: NaiveDate,
    ) -> ProgressionStatus {
        let (base_xp, makeup_xp) = Self::xp_of(license);
        match self.cfg.semester_by_token(&license.current_level) {
            Some((index, semester)) => {
                let next = self.cfg.semesters.get(index + 1);
                let counted = self.counted_xp(base_xp, makeup_xp, semester);
                let standard = semester.threshold_xp(semester.thresholds.standard_pct);
                ProgressionStatus {
                    current_level: semester.token.clone(),
                    current_label: format!("Semester {}", index + 1),
                    next_level: next.map(|s| s.token.clone()),
                    progress_percent: percent_toward(counted, standard),
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
        _user: &User,
        license: &License,
        target_level: Option<&str>,
        evidence: &ProgressionEvidence,
        _on: NaiveDate,
    ) -> Result<TransitionPlan, DenialReason> {
        let (current_index, semester) = self
            .cfg
            .semester_by_token(&license.current_level)
            .ok_or(DenialReason::InvalidTransition)?;

        if let Some(token) = target_level {
            let (target_index, _) = self
                .cfg
                .semester_by_token(token)
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
            .cfg
            .semesters
            .get(current_index + 1)
            .ok_or(DenialReason::InvalidTransition)?;

        if !matches!(evidence, ProgressionEvidence::SemesterCompletion) {
            return Err(DenialReason::InvalidTransition);
        }

        let (base_xp, makeup_xp) = Self::xp_of(license);
        let tier = self.achievement(base_xp, makeup_xp, semester);
        if tier == AchievementTier::Below {
            debug!(
                specialization = %self.id,
                semester = %semester.token,
                base_xp,
                makeup_xp,
                "semester close-out below the conditional threshold"
            );
            return Err(DenialReason::InvalidTransition);
        }

        Ok(TransitionPlan::Advance {
            from: license.current_level.clone(),
            to: next.token.clone(),
            // XP restarts each semester; the position selection carries over
            progress_after: ProgressMetric::Xp {
                base_xp: 0,
                makeup_xp: 0,
                positions: Self::positions_of(license).to_vec(),
            },
        })
    }

    fn session_xp_award(
        &self,
        session: &Session,
        semester_index: u32,
        attendance: AttendanceOutcome,
    ) -> Option<u32> {
        Some(self.compute_session_xp(session.delivery_mode, semester_index, attendance))
    }

    fn validate_position_selection(&self, roles: &[String]) -> Result<(), DenialReason> {
        self.validate_position_selection_impl(roles)
    }
}

impl XpModel {
    fn validate_position_selection_impl(&self, roles: &[String]) -> Result<(), DenialReason> {
        let bounds = &self.cfg.positions;
        if roles.len() < bounds.min_selection || roles.len() > bounds.max_selection {
            return Err(DenialReason::InvalidTransition);
        }
        let mut seen = std::collections::HashSet::new();
        for role in roles {
            if !bounds.roles.contains(role) {
                return Err(DenialReason::InvalidTransition);
            }
            if !seen.insert(role.as_str()) {
                return Err(DenialReason::InvalidTransition);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FamilyConfig, ProgramCatalog};
    use crate::domain::{LicenseStatus, UserRole};
    use chrono::Utc;
    use uuid::Uuid;

    fn model() -> XpModel {
        let catalog = ProgramCatalog::default();
        let spec = catalog.find("TRAINEE").unwrap();
        match &spec.family {
            FamilyConfig::Xp(cfg) => XpModel::new(spec.id.clone(), spec.name.clone(), cfg.clone()),
            _ => unreachable!(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trainee() -> User {
        User {
            id: Uuid::new_v4(),
            display_name: "trainee".to_string(),
            birth_date: date(2004, 9, 2),
            role: UserRole::Learner,
        }
    }

    fn license_with_xp(user: &User, semester: &str, base_xp: u32, makeup_xp: u32) -> License {
        License {
            id: Uuid::new_v4(),
            user_id: user.id,
            specialization_id: "TRAINEE".to_string(),
            current_level: semester.to_string(),
            status: LicenseStatus::Active,
            progress: ProgressMetric::Xp {
                base_xp,
                makeup_xp,
                positions: vec!["mentor".to_string()],
            },
            created_at: Utc::now(),
        }
    }

    fn sem(m: &XpModel, index: u32) -> SemesterConfig {
        m.config().semester(index).unwrap().clone()
    }

    #[test]
    fn test_thresholds_tighten_across_semesters() {
        let m = model();
        let semesters = &m.config().semesters;
        for pair in semesters.windows(2) {
            assert!(pair[1].thresholds.excellence_pct >= pair[0].thresholds.excellence_pct);
            assert!(pair[1].thresholds.standard_pct >= pair[0].thresholds.standard_pct);
            assert!(pair[1].thresholds.conditional_pct >= pair[0].thresholds.conditional_pct);
        }
    }

    #[test]
    fn test_makeup_only_never_reaches_excellence() {
        let m = model();
        let semester = sem(&m, 1);
        // Raw make-up far above every threshold
        let tier = m.achievement(0, semester.base_xp * 3, &semester);
        assert!(tier < AchievementTier::Excellence);
        // And in fact the cap keeps a make-up-only learner below standard too
        assert!(tier <= AchievementTier::Standard);
    }

    #[test]
    fn test_makeup_lifts_conditional_to_standard() {
        let m = model();
        let semester = sem(&m, 1); // base 1000: conditional 500, standard 650, cap 150
        let conditional_only = m.achievement(520, 0, &semester);
        assert_eq!(conditional_only, AchievementTier::ConditionalPass);
        let with_makeup = m.achievement(520, 150, &semester);
        assert_eq!(with_makeup, AchievementTier::Standard);
    }

    #[test]
    fn test_excellence_from_base_channel() {
        let m = model();
        let semester = sem(&m, 1); // excellence 850
        assert_eq!(m.achievement(850, 0, &semester), AchievementTier::Excellence);
        assert_eq!(m.achievement(849, 500, &semester), AchievementTier::Standard);
    }

    #[test]
    fn test_makeup_cap_is_applied() {
        let m = model();
        let semester = sem(&m, 1);
        assert_eq!(semester.makeup_cap_xp(), 150);
        // 400 base + 10_000 make-up counts as 550
        assert_eq!(m.counted_xp(400, 10_000, &semester), 550);
    }

    #[test]
    fn test_session_xp_differs_by_delivery_mode() {
        let m = model();
        let a = m.compute_session_xp(DeliveryMode::InPerson, 1, AttendanceOutcome::Full);
        let b = m.compute_session_xp(DeliveryMode::Online, 1, AttendanceOutcome::Full);
        let c = m.compute_session_xp(DeliveryMode::SelfPaced, 1, AttendanceOutcome::Full);
        assert!(a > b && b > c);
    }

    #[test]
    fn test_session_xp_scales_per_semester() {
        let m = model();
        // +10% per successive semester on the in-person base of 40
        assert_eq!(
            m.compute_session_xp(DeliveryMode::InPerson, 1, AttendanceOutcome::Full),
            40
        );
        assert_eq!(
            m.compute_session_xp(DeliveryMode::InPerson, 2, AttendanceOutcome::Full),
            44
        );
        assert_eq!(
            m.compute_session_xp(DeliveryMode::InPerson, 3, AttendanceOutcome::Full),
            48
        );
    }

    #[test]
    fn test_attendance_outcomes() {
        let m = model();
        let full = m.compute_session_xp(DeliveryMode::InPerson, 1, AttendanceOutcome::Full);
        let partial = m.compute_session_xp(DeliveryMode::InPerson, 1, AttendanceOutcome::Partial);
        let absent = m.compute_session_xp(DeliveryMode::InPerson, 1, AttendanceOutcome::Absent);
        assert_eq!(partial, full / 2);
        assert_eq!(absent, 0);
    }

    #[test]
    fn test_position_selection_bounds() {
        let m = model();
        let ok = vec!["mentor".to_string(), "first_aid".to_string()];
        assert!(m.validate_position_selection(&ok).is_ok());

        let empty: Vec<String> = vec![];
        assert!(m.validate_position_selection(&empty).is_err());

        let dup = vec!["mentor".to_string(), "mentor".to_string()];
        assert!(m.validate_position_selection(&dup).is_err());

        let unknown = vec!["astronaut".to_string()];
        assert!(m.validate_position_selection(&unknown).is_err());

        let eight: Vec<String> = m.config().positions.roles.iter().take(8).cloned().collect();
        assert!(m.validate_position_selection(&eight).is_err());

        let seven: Vec<String> = m.config().positions.roles.iter().take(7).cloned().collect();
        assert!(m.validate_position_selection(&seven).is_ok());
    }

    #[test]
    fn test_semester_close_advances() {
        let m = model();
        let user = trainee();
        let license = license_with_xp(&user, "SEM1", 700, 0);
        let plan = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::SemesterCompletion,
                date(2026, 8, 1),
            )
            .unwrap();
        match plan {
            TransitionPlan::Advance {
                from,
                to,
                progress_after,
            } => {
                assert_eq!(from, "SEM1");
                assert_eq!(to, "SEM2");
                assert_eq!(
                    progress_after,
                    ProgressMetric::Xp {
                        base_xp: 0,
                        makeup_xp: 0,
                        positions: vec!["mentor".to_string()],
                    }
                );
            }
            other => panic!("expected advance, got {:?}", other),
        }
    }

    #[test]
    fn test_below_conditional_cannot_close_semester() {
        let m = model();
        let user = trainee();
        let license = license_with_xp(&user, "SEM1", 499, 0);
        let err = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::SemesterCompletion,
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::InvalidTransition);
    }

    #[test]
    fn test_terminal_semester_refuses_close() {
        let m = model();
        let user = trainee();
        let license = license_with_xp(&user, "SEM4", 1600, 0);
        let err = m
            .evaluate_transition(
                &user,
                &license,
                None,
                &ProgressionEvidence::SemesterCompletion,
                date(2026, 8, 1),
            )
            .unwrap_err();
        assert_eq!(err, DenialReason::InvalidTransition);
    }

    #[test]
    fn test_position_readiness_gates_requirements() {
        let m = model();
        let user = trainee();
        let mut license = license_with_xp(&user, "SEM1", 0, 0);
        let today = Utc::now().date_naive();
        let period = EnrollmentPeriod {
            id: Uuid::new_v4(),
            license_id: license.id,
            starts_on: today,
            ends_on: today + chrono::Duration::days(120),
            payment_verified: true,
            semester_index: 1,
        };
        let ready = m.describe_enrollment_requirements(&license, Some(&period), Utc::now());
        assert!(ready.can_participate);

        license.progress = ProgressMetric::Xp {
            base_xp: 0,
            makeup_xp: 0,
            positions: vec![],
        };
        let not_ready = m.describe_enrollment_requirements(&license, Some(&period), Utc::now());
        assert!(!not_ready.can_participate);
        assert!(not_ready
            .requirements
            .iter()
            .any(|r| r.kind == RequirementKind::PositionSelection && !r.satisfied));
    }
}
