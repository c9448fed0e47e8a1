use thiserror::Error;

use crate::model::{BatchId, EnvironmentId};
use crate::store::StoreError;

/// Problems building a workflow definition from a stage list
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Workflow definition has no stages")]
    Empty,

    #[error("Duplicate stage code: {code}")]
    DuplicateCode { code: String },

    #[error("Invalid stage code: {code:?}")]
    InvalidCode { code: String },

    #[error("Unknown stage code: {code}")]
    UnknownStage { code: String },
}

/// Everything the workflow core can reject
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The batch points at a stage the active definition does not know.
    /// Signals a data repair need; never auto-corrected.
    #[error("Batch {batch_id} references stage {stage_code} which is not in the workflow definition")]
    ConfigIntegrity { batch_id: BatchId, stage_code: String },

    #[error("Batch {batch_id} is already at the terminal stage {stage_code}")]
    AlreadyTerminal { batch_id: BatchId, stage_code: String },

    #[error("Environments not in batch {batch_id}: {}", format_ids(.environment_ids))]
    NotMember {
        batch_id: BatchId,
        environment_ids: Vec<EnvironmentId>,
    },

    #[error("Split requires at least one environment")]
    EmptySelection,

    #[error("Unknown re-entry stage: {code}")]
    UnknownReentryStage { code: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Workflow definition conflict: {reason}")]
    DefinitionConflict { reason: String },

    #[error("Invalid workflow definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        WorkflowError::Validation {
            reason: reason.into(),
        }
    }
}

fn format_ids(ids: &[EnvironmentId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
