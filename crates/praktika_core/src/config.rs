//! Program catalog v0.4.0
//!
//! Product parameters for every specialization family: age floors, ladder
//! definitions, semester XP thresholds, position catalogue. Loaded from TOML
//! (`/etc/praktika/catalog.toml` in production) with compiled-in defaults.
//!
//! Only the *structural* invariants are enforced here (ordering of ladders,
//! monotone thresholds, cap bounds); the concrete numbers are product
//! decisions and deliberately not hard-coded anywhere else in the engine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::domain::DeliveryMode;
use crate::reason::CatalogError;

// ============================================================================
// Catalog root
// ============================================================================

/// The full program catalog (loaded from TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramCatalog {
    /// Schema version
    pub schema_version: u32,
    /// Specialization entries
    pub specializations: Vec<SpecializationConfig>,
}

impl Default for ProgramCatalog {
    fn default() -> Self {
        Self {
            schema_version: 1,
            specializations: default_specializations(),
        }
    }
}

impl ProgramCatalog {
    /// Load a catalog from a TOML file, falling back to nothing: a missing
    /// or invalid file is an operator error, not a silent default.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read program catalog: {:?}", path))?;
        let catalog: ProgramCatalog = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse program catalog: {:?}", path))?;
        catalog
            .validate()
            .with_context(|| format!("Invalid program catalog: {:?}", path))?;
        Ok(catalog)
    }

    /// Check the structural invariants of every specialization entry.
    pub fn validate(&self) -> std::result::Result<(), CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for spec in &self.specializations {
            if spec.id.trim().is_empty() {
                return Err(CatalogError::InvalidDefinition {
                    id: spec.id.clone(),
                    detail: "empty specialization id".to_string(),
                });
            }
            if !seen.insert(spec.id.clone()) {
                return Err(CatalogError::DuplicateSpecialization(spec.id.clone()));
            }
            spec.family.validate(&spec.id)?;
        }
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&SpecializationConfig> {
        self.specializations.iter().find(|s| s.id == id)
    }
}

/// One specialization entry in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecializationConfig {
    /// Registry key, e.g. "COACH". Cohort-qualified identifiers
    /// ("COACH_PRO") resolve to the longest registered prefix.
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Family-specific parameters
    pub family: FamilyConfig,
}

/// Family-specific parameter block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FamilyConfig {
    AgeGroup(AgeGroupConfig),
    Certification(CertificationConfig),
    Rank(RankConfig),
    Xp(XpConfig),
}

impl FamilyConfig {
    fn validate(&self, id: &str) -> std::result::Result<(), CatalogError> {
        match self {
            FamilyConfig::AgeGroup(cfg) => cfg.validate(id),
            FamilyConfig::Certification(cfg) => cfg.validate(id),
            FamilyConfig::Rank(cfg) => cfg.validate(id),
            FamilyConfig::Xp(cfg) => cfg.validate(id),
        }
    }
}

// ============================================================================
// Session-based age-group family
// ============================================================================

/// One age band (level) of an age-group specialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeBand {
    /// Level token, e.g. "JUNIORS"
    pub token: String,
    /// Display label
    pub label: String,
    /// Minimum age for this band
    pub min_age: u32,
}

/// Parameters of a session-based age-group specialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeGroupConfig {
    /// Bands ordered by ascending minimum age
    pub bands: Vec<AgeBand>,
}

impl AgeGroupConfig {
    fn validate(&self, id: &str) -> std::result::Result<(), CatalogError> {
        if self.bands.is_empty() {
            return Err(CatalogError::InvalidDefinition {
                id: id.to_string(),
                detail: "no age bands defined".to_string(),
            });
        }
        ensure_unique_tokens(id, self.bands.iter().map(|b| b.token.as_str()))?;
        for pair in self.bands.windows(2) {
            if pair[1].min_age <= pair[0].min_age {
                return Err(CatalogError::InvalidDefinition {
                    id: id.to_string(),
                    detail: format!(
                        "band '{}' must have a higher minimum age than '{}'",
                        pair[1].token, pair[0].token
                    ),
                });
            }
        }
        Ok(())
    }

    /// Overall minimum age for the specialization (lowest band).
    pub fn min_age(&self) -> u32 {
        self.bands.first().map(|b| b.min_age).unwrap_or(0)
    }
}

// ============================================================================
// Semester-based certification ladder
// ============================================================================

/// One level of the certification ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationLevel {
    /// Level token, e.g. "COACH_SENIOR"
    pub token: String,
    /// Role label carried by holders of this level
    pub label: String,
    /// Age floor for certification into this level
    pub min_age: u32,
    /// Cumulative taught hours required before certification into this level
    pub required_hours: u32,
}

/// Parameters of a semester-based certification-ladder specialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationConfig {
    /// Ladder ordered from first to terminal level
    pub levels: Vec<CertificationLevel>,
    /// Fixed minimum exam score (0-100) for any certification
    pub min_exam_score: u32,
}

impl CertificationConfig {
    fn validate(&self, id: &str) -> std::result::Result<(), CatalogError> {
        if self.levels.is_empty() {
            return Err(CatalogError::InvalidDefinition {
                id: id.to_string(),
                detail: "no certification levels defined".to_string(),
            });
        }
        if self.min_exam_score > 100 {
            return Err(CatalogError::InvalidDefinition {
                id: id.to_string(),
                detail: format!("min_exam_score {} exceeds 100", self.min_exam_score),
            });
        }
        ensure_unique_tokens(id, self.levels.iter().map(|l| l.token.as_str()))?;
        for pair in self.levels.windows(2) {
            if pair[1].min_age < pair[0].min_age {
                return Err(CatalogError::InvalidDefinition {
                    id: id.to_string(),
                    detail: format!("age floor regresses at level '{}'", pair[1].token),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Semester-based rank/belt ladder
// ============================================================================

/// One rank of the belt ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankLevel {
    /// Rank token, e.g. "BLUE"
    pub token: String,
    pub label: String,
    /// Age floor for promotion into this rank
    pub min_age: u32,
    /// Cumulative skill checkpoints required before promotion into this rank
    pub required_checkpoints: u32,
}

/// Parameters of a semester-based rank specialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    /// Ladder ordered from first to terminal rank
    pub ranks: Vec<RankLevel>,
}

impl RankConfig {
    fn validate(&self, id: &str) -> std::result::Result<(), CatalogError> {
        if self.ranks.is_empty() {
            return Err(CatalogError::InvalidDefinition {
                id: id.to_string(),
                detail: "no ranks defined".to_string(),
            });
        }
        ensure_unique_tokens(id, self.ranks.iter().map(|r| r.token.as_str()))?;
        for pair in self.ranks.windows(2) {
            if pair[1].min_age < pair[0].min_age {
                return Err(CatalogError::InvalidDefinition {
                    id: id.to_string(),
                    detail: format!("age floor regresses at rank '{}'", pair[1].token),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Semester-based XP accumulation
// ============================================================================

/// Achievement thresholds of one semester, as percentages of that
/// semester's base XP requirement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SemesterThresholds {
    pub excellence_pct: u32,
    pub standard_pct: u32,
    pub conditional_pct: u32,
}

/// One semester of an XP specialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemesterConfig {
    /// Level token, e.g. "SEM3"
    pub token: String,
    /// Base XP requirement for the semester
    pub base_xp: u32,
    /// Cap on make-up channel contribution, as a percentage of `base_xp`
    pub makeup_cap_pct: u32,
    pub thresholds: SemesterThresholds,
}

impl SemesterConfig {
    /// Absolute XP needed for an achievement tier.
    pub fn threshold_xp(&self, pct: u32) -> u32 {
        // Round up so a learner cannot pass on truncation alone
        (self.base_xp as u64 * pct as u64).div_ceil(100) as u32
    }

    /// Absolute cap on make-up XP counted for this semester.
    pub fn makeup_cap_xp(&self) -> u32 {
        (self.base_xp as u64 * self.makeup_cap_pct as u64 / 100) as u32
    }
}

/// Per-mode base XP awards for attending one session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionAwardConfig {
    pub in_person: u32,
    pub online: u32,
    pub self_paced: u32,
    /// Fixed percentage increment applied per successive semester
    pub semester_increment_pct: u32,
    /// Percentage of the full award granted for partial attendance
    pub partial_attendance_pct: u32,
}

impl SessionAwardConfig {
    pub fn base_for(&self, mode: DeliveryMode) -> u32 {
        match mode {
            DeliveryMode::InPerson => self.in_person,
            DeliveryMode::Online => self.online,
            DeliveryMode::SelfPaced => self.self_paced,
        }
    }
}

/// Fixed catalogue of selectable positions plus selection bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionCatalog {
    pub roles: Vec<String>,
    pub min_selection: usize,
    pub max_selection: usize,
}

/// Parameters of a semester-based XP specialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpConfig {
    /// Overall minimum age for the specialization
    pub min_age: u32,
    /// Semesters ordered first to last
    pub semesters: Vec<SemesterConfig>,
    pub session_award: SessionAwardConfig,
    pub positions: PositionCatalog,
}

impl XpConfig {
    fn validate(&self, id: &str) -> std::result::Result<(), CatalogError> {
        if self.semesters.is_empty() {
            return Err(CatalogError::InvalidDefinition {
                id: id.to_string(),
                detail: "no semesters defined".to_string(),
            });
        }
        ensure_unique_tokens(id, self.semesters.iter().map(|s| s.token.as_str()))?;

        for (index, sem) in self.semesters.iter().enumerate() {
            let t = sem.thresholds;
            if !(t.conditional_pct < t.standard_pct && t.standard_pct < t.excellence_pct) {
                return Err(CatalogError::InvalidDefinition {
                    id: id.to_string(),
                    detail: format!(
                        "semester '{}' thresholds must satisfy conditional < standard < excellence",
                        sem.token
                    ),
                });
            }
            if sem.makeup_cap_pct >= t.standard_pct {
                return Err(CatalogError::InvalidDefinition {
                    id: id.to_string(),
                    detail: format!(
                        "semester '{}' make-up cap {}% would cover the standard threshold alone",
                        sem.token, sem.makeup_cap_pct
                    ),
                });
            }
            if index > 0 {
                let prev = self.semesters[index - 1].thresholds;
                if t.excellence_pct < prev.excellence_pct
                    || t.standard_pct < prev.standard_pct
                    || t.conditional_pct < prev.conditional_pct
                {
                    return Err(CatalogError::NonMonotonicThresholds {
                        id: id.to_string(),
                        index,
                        detail: format!(
                            "'{}' loosens a threshold of '{}'",
                            sem.token,
                            self.semesters[index - 1].token
                        ),
                    });
                }
            }
        }

        if self.positions.min_selection < 1
            || self.positions.max_selection < self.positions.min_selection
            || self.positions.max_selection > self.positions.roles.len()
        {
            return Err(CatalogError::InvalidDefinition {
                id: id.to_string(),
                detail: "position selection bounds do not fit the role catalogue".to_string(),
            });
        }
        Ok(())
    }

    pub fn semester(&self, index: u32) -> Option<&SemesterConfig> {
        // semester_index is 1-based
        self.semesters.get(index.checked_sub(1)? as usize)
    }

    pub fn semester_by_token(&self, token: &str) -> Option<(usize, &SemesterConfig)> {
        self.semesters
            .iter()
            .enumerate()
            .find(|(_, s)| s.token == token)
    }
}

fn ensure_unique_tokens<'a>(
    id: &str,
    tokens: impl Iterator<Item = &'a str>,
) -> std::result::Result<(), CatalogError> {
    let mut seen = std::collections::HashSet::new();
    for token in tokens {
        if !seen.insert(token) {
            return Err(CatalogError::InvalidDefinition {
                id: id.to_string(),
                detail: format!("duplicate level token '{token}'"),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Default catalog
// ============================================================================

/// Built-in catalog used when no TOML override is supplied.
fn default_specializations() -> Vec<SpecializationConfig> {
    vec![
        SpecializationConfig {
            id: "YOUTH".to_string(),
            name: "Youth Program".to_string(),
            family: FamilyConfig::AgeGroup(AgeGroupConfig {
                bands: vec![
                    AgeBand {
                        token: "MINIS".to_string(),
                        label: "Minis".to_string(),
                        min_age: 4,
                    },
                    AgeBand {
                        token: "KIDS".to_string(),
                        label: "Kids".to_string(),
                        min_age: 7,
                    },
                    AgeBand {
                        token: "JUNIORS".to_string(),
                        label: "Juniors".to_string(),
                        min_age: 11,
                    },
                    AgeBand {
                        token: "ADULTS".to_string(),
                        label: "Adults".to_string(),
                        min_age: 16,
                    },
                ],
            }),
        },
        SpecializationConfig {
            id: "COACH".to_string(),
            name: "Coaching Track".to_string(),
            family: FamilyConfig::Certification(CertificationConfig {
                min_exam_score: 70,
                levels: vec![
                    CertificationLevel {
                        token: "ASSISTANT".to_string(),
                        label: "Assistant Coach".to_string(),
                        min_age: 16,
                        required_hours: 20,
                    },
                    CertificationLevel {
                        token: "COACH".to_string(),
                        label: "Coach".to_string(),
                        min_age: 18,
                        required_hours: 60,
                    },
                    CertificationLevel {
                        token: "SENIOR".to_string(),
                        label: "Senior Coach".to_string(),
                        min_age: 21,
                        required_hours: 120,
                    },
                    CertificationLevel {
                        token: "HEAD".to_string(),
                        label: "Head Coach".to_string(),
                        min_age: 25,
                        required_hours: 200,
                    },
                ],
            }),
        },
        SpecializationConfig {
            id: "BUDO".to_string(),
            name: "Martial Arts Track".to_string(),
            family: FamilyConfig::Rank(RankConfig {
                ranks: vec![
                    RankLevel {
                        token: "WHITE".to_string(),
                        label: "White Belt".to_string(),
                        min_age: 6,
                        required_checkpoints: 0,
                    },
                    RankLevel {
                        token: "YELLOW".to_string(),
                        label: "Yellow Belt".to_string(),
                        min_age: 7,
                        required_checkpoints: 4,
                    },
                    RankLevel {
                        token: "ORANGE".to_string(),
                        label: "Orange Belt".to_string(),
                        min_age: 8,
                        required_checkpoints: 6,
                    },
                    RankLevel {
                        token: "GREEN".to_string(),
                        label: "Green Belt".to_string(),
                        min_age: 10,
                        required_checkpoints: 8,
                    },
                    RankLevel {
                        token: "BLUE".to_string(),
                        label: "Blue Belt".to_string(),
                        min_age: 12,
                        required_checkpoints: 10,
                    },
                    RankLevel {
                        token: "BROWN".to_string(),
                        label: "Brown Belt".to_string(),
                        min_age: 14,
                        required_checkpoints: 12,
                    },
                    RankLevel {
                        token: "BLACK".to_string(),
                        label: "Black Belt".to_string(),
                        min_age: 16,
                        required_checkpoints: 16,
                    },
                ],
            }),
        },
        SpecializationConfig {
            id: "TRAINEE".to_string(),
            name: "Internship Track".to_string(),
            family: FamilyConfig::Xp(XpConfig {
                min_age: 16,
                semesters: vec![
                    SemesterConfig {
                        token: "SEM1".to_string(),
                        base_xp: 1000,
                        thresholds: SemesterThresholds {
                            excellence_pct: 85,
                            standard_pct: 65,
                            conditional_pct: 50,
                        },
                        makeup_cap_pct: 15,
                    },
                    SemesterConfig {
                        token: "SEM2".to_string(),
                        base_xp: 1200,
                        thresholds: SemesterThresholds {
                            excellence_pct: 88,
                            standard_pct: 68,
                            conditional_pct: 52,
                        },
                        makeup_cap_pct: 15,
                    },
                    SemesterConfig {
                        token: "SEM3".to_string(),
                        base_xp: 1400,
                        thresholds: SemesterThresholds {
                            excellence_pct: 90,
                            standard_pct: 72,
                            conditional_pct: 55,
                        },
                        makeup_cap_pct: 15,
                    },
                    SemesterConfig {
                        token: "SEM4".to_string(),
                        base_xp: 1600,
                        thresholds: SemesterThresholds {
                            excellence_pct: 92,
                            standard_pct: 75,
                            conditional_pct: 58,
                        },
                        makeup_cap_pct: 15,
                    },
                ],
                session_award: SessionAwardConfig {
                    in_person: 40,
                    online: 30,
                    self_paced: 20,
                    semester_increment_pct: 10,
                    partial_attendance_pct: 50,
                },
                positions: PositionCatalog {
                    roles: vec![
                        "mentor".to_string(),
                        "event_support".to_string(),
                        "content_author".to_string(),
                        "lab_assistant".to_string(),
                        "community_host".to_string(),
                        "translator".to_string(),
                        "equipment_manager".to_string(),
                        "first_aid".to_string(),
                        "media_team".to_string(),
                        "front_desk".to_string(),
                    ],
                    min_selection: 1,
                    max_selection: 7,
                },
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = ProgramCatalog::default();
        assert!(catalog.validate().is_ok());
        assert!(catalog.find("COACH").is_some());
        assert!(catalog.find("NOPE").is_none());
    }

    #[test]
    fn test_duplicate_specialization_rejected() {
        let mut catalog = ProgramCatalog::default();
        let dup = catalog.specializations[0].clone();
        catalog.specializations.push(dup);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::DuplicateSpecialization(_))
        ));
    }

    #[test]
    fn test_loosened_semester_thresholds_rejected() {
        let mut catalog = ProgramCatalog::default();
        for spec in &mut catalog.specializations {
            if let FamilyConfig::Xp(cfg) = &mut spec.family {
                cfg.semesters[1].thresholds.excellence_pct =
                    cfg.semesters[0].thresholds.excellence_pct - 1;
            }
        }
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::NonMonotonicThresholds { .. })
        ));
    }

    #[test]
    fn test_makeup_cap_must_stay_below_standard() {
        let mut catalog = ProgramCatalog::default();
        for spec in &mut catalog.specializations {
            if let FamilyConfig::Xp(cfg) = &mut spec.family {
                cfg.semesters[0].makeup_cap_pct = cfg.semesters[0].thresholds.standard_pct;
            }
        }
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_age_band_order_enforced() {
        let mut catalog = ProgramCatalog::default();
        for spec in &mut catalog.specializations {
            if let FamilyConfig::AgeGroup(cfg) = &mut spec.family {
                cfg.bands.swap(0, 1);
            }
        }
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_threshold_xp_rounds_up() {
        let sem = SemesterConfig {
            token: "SEM1".to_string(),
            base_xp: 999,
            thresholds: SemesterThresholds {
                excellence_pct: 85,
                standard_pct: 65,
                conditional_pct: 50,
            },
            makeup_cap_pct: 15,
        };
        // 999 * 65% = 649.35, must round up
        assert_eq!(sem.threshold_xp(65), 650);
    }

    #[test]
    fn test_load_roundtrip_through_toml() {
        let catalog = ProgramCatalog::default();
        let raw = toml::to_string(&catalog).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();

        let loaded = ProgramCatalog::load(file.path()).unwrap();
        assert_eq!(loaded.specializations.len(), catalog.specializations.len());
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a catalog").unwrap();
        assert!(ProgramCatalog::load(file.path()).is_err());
    }
}
