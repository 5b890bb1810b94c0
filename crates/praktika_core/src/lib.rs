//! Praktika Core - Domain rules for the progression & booking engine v0.4.2
//!
//! Pure decision layer: entity types, the denial vocabulary, the program
//! catalog, the per-family progression models, the specialization registry
//! and the eligibility evaluator. No storage and no I/O besides catalog
//! loading; persistence and the transactional gates live in
//! `praktika_store` and `praktika_engine`.

pub mod config;
pub mod domain;
pub mod eligibility;
pub mod model;
pub mod reason;
pub mod registry;

pub use config::ProgramCatalog;
pub use domain::*;
pub use eligibility::{BookingDecision, EligibilityEvaluator};
pub use model::{
    AchievementTier, AgeGroupModel, AttendanceOutcome, CertificationModel, EnrollmentRequirements,
    ProgressionEvidence, ProgressionModel, ProgressionStatus, RankModel, RequirementKind,
    RequirementStatus, TransitionPlan, XpModel,
};
pub use reason::{CatalogError, DenialReason};
pub use registry::SpecializationRegistry;
