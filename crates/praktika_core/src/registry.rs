//! Specialization registry v0.4.0
//!
//! Maps specialization identifiers (and their cohort-qualified sub-variants)
//! to progression models. Population happens once at startup from the
//! program catalog; afterwards the registry is read-only, so concurrent
//! lookups need no synchronization.

use std::sync::Arc;

use crate::config::{FamilyConfig, ProgramCatalog};
use crate::model::{AgeGroupModel, CertificationModel, ProgressionModel, RankModel, XpModel};
use crate::reason::{CatalogError, DenialReason};

pub struct SpecializationRegistry {
    /// (identifier, model), insertion order preserved
    entries: Vec<(String, Arc<dyn ProgressionModel>)>,
}

impl SpecializationRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build the registry from a validated program catalog. This is the
    /// only population path used in production.
    pub fn from_catalog(catalog: &ProgramCatalog) -> Result<Self, CatalogError> {
        catalog.validate()?;
        let mut registry = Self::new();
        for spec in &catalog.specializations {
            let model: Arc<dyn ProgressionModel> = match &spec.family {
                FamilyConfig::AgeGroup(cfg) => Arc::new(AgeGroupModel::new(
                    spec.id.clone(),
                    spec.name.clone(),
                    cfg.clone(),
                )),
                FamilyConfig::Certification(cfg) => Arc::new(CertificationModel::new(
                    spec.id.clone(),
                    spec.name.clone(),
                    cfg.clone(),
                )),
                FamilyConfig::Rank(cfg) => Arc::new(RankModel::new(
                    spec.id.clone(),
                    spec.name.clone(),
                    cfg.clone(),
                )),
                FamilyConfig::Xp(cfg) => Arc::new(XpModel::new(
                    spec.id.clone(),
                    spec.name.clone(),
                    cfg.clone(),
                )),
            };
            registry.register(spec.id.clone(), model);
        }
        Ok(registry)
    }

    /// Register a model under an identifier. Init-time only; the engine
    /// never calls this after startup.
    pub fn register(&mut self, identifier: impl Into<String>, model: Arc<dyn ProgressionModel>) {
        self.entries.push((identifier.into(), model));
    }

    /// Resolve an identifier to its model: exact match first, else the
    /// longest registered identifier that prefixes the request. Never
    /// defaults silently.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn ProgressionModel>, DenialReason> {
        if let Some((_, model)) = self.entries.iter().find(|(id, _)| id == identifier) {
            return Ok(Arc::clone(model));
        }
        self.entries
            .iter()
            .filter(|(id, _)| identifier.starts_with(id.as_str()))
            .max_by_key(|(id, _)| id.len())
            .map(|(_, model)| Arc::clone(model))
            .ok_or(DenialReason::SpecializationUnknown)
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }
}

impl Default for SpecializationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
