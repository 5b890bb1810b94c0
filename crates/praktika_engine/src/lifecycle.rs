//! Assessment lifecycle v0.4.2
//!
//! Generic four-state machine for skill/competency records:
//! unassessed -> assessed -> validated -> archived, with archive also
//! reachable from assessed. Creation and every transition are idempotent;
//! off-edge requests fail with `InvalidTransition` and leave the row
//! untouched. The storage layer's unique subject key collapses concurrent
//! creations, and transitions serialize on the row.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use praktika_core::domain::{AssessmentRecord, AssessmentState};
use praktika_core::reason::DenialReason;
use praktika_store::{AssessmentTransition, EngineStore};

use crate::error::EngineError;

/// Allowed source states per target, the full edge set of the machine.
fn sources_for(target: AssessmentState) -> &'static [AssessmentState] {
    match target {
        AssessmentState::Unassessed => &[],
        AssessmentState::Assessed => &[AssessmentState::Unassessed],
        AssessmentState::Validated => &[AssessmentState::Assessed],
        AssessmentState::Archived => &[AssessmentState::Assessed, AssessmentState::Validated],
    }
}

pub struct AssessmentLifecycle<'a> {
    store: &'a EngineStore,
}

impl<'a> AssessmentLifecycle<'a> {
    pub fn new(store: &'a EngineStore) -> Self {
        Self { store }
    }

    /// Create the record for a subject key, or return the existing one.
    pub fn create(&self, subject_id: Uuid, kind: &str) -> Result<AssessmentRecord, EngineError> {
        let record = self.store.create_assessment(subject_id, kind, Utc::now())?;
        Ok(record)
    }

    /// unassessed -> assessed
    pub fn mark_assessed(
        &self,
        subject_id: Uuid,
        kind: &str,
    ) -> Result<AssessmentState, EngineError> {
        self.transition(subject_id, kind, AssessmentState::Assessed)
    }

    /// assessed -> validated
    pub fn validate(&self, subject_id: Uuid, kind: &str) -> Result<AssessmentState, EngineError> {
        self.transition(subject_id, kind, AssessmentState::Validated)
    }

    /// assessed | validated -> archived
    pub fn archive(&self, subject_id: Uuid, kind: &str) -> Result<AssessmentState, EngineError> {
        self.transition(subject_id, kind, AssessmentState::Archived)
    }

    pub fn current_state(
        &self,
        subject_id: Uuid,
        kind: &str,
    ) -> Result<AssessmentState, EngineError> {
        Ok(self.store.get_assessment(subject_id, kind)?.state)
    }

    fn transition(
        &self,
        subject_id: Uuid,
        kind: &str,
        target: AssessmentState,
    ) -> Result<AssessmentState, EngineError> {
        let result = self.store.transition_assessment(
            subject_id,
            kind,
            target,
            sources_for(target),
            Utc::now(),
        )?;
        match result {
            AssessmentTransition::Applied(record) => {
                debug!(subject = %subject_id, kind, state = %record.state, "assessment transitioned");
                Ok(record.state)
            }
            AssessmentTransition::Unchanged(record) => Ok(record.state),
            AssessmentTransition::Refused { current } => {
                debug!(
                    subject = %subject_id,
                    kind,
                    current = %current,
                    target = %target,
                    "assessment transition refused"
                );
                Err(EngineError::Denied(DenialReason::InvalidTransition))
            }
        }
    }
}
