// Storage collaborator: explicit queries plus one atomic commit per operation

pub mod changeset;
pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::audit::AuditNote;
use crate::model::{
    BatchId, Client, ClientId, Environment, EnvironmentId, FactoryOrder, Project, ProjectId, User,
};
use crate::workflow::{Batch, WorkflowDefinition};

pub use changeset::{Changeset, Mutation};
pub use memory::{InMemoryStore, StoreSnapshot};
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A precondition of the changeset no longer holds (stale version,
    /// ownership moved, duplicate key). Nothing was written.
    #[error("Conflicting write on {entity} {id}: {reason}")]
    Conflict {
        entity: &'static str,
        id: String,
        reason: String,
    },

    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt stored data: {reason}")]
    Corrupt { reason: String },

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn conflict(entity: &'static str, id: impl ToString, reason: impl Into<String>) -> Self {
        StoreError::Conflict {
            entity,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(entity: &'static str, id: impl ToString) -> Self {
        StoreError::Missing {
            entity,
            id: id.to_string(),
        }
    }
}

/// Everything the workflow core reads and writes.
///
/// Implementations must apply a [`Changeset`] atomically: either every
/// mutation lands or none does. After a commit no batch may be left without
/// members and no environment may be owned by two batches.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load_definition(&self) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Replaces the stored definition; the caller checks order compatibility
    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;

    /// Batch with its members resolved from environment ownership
    async fn load_batch_with_members(&self, id: BatchId) -> Result<Option<Batch>, StoreError>;

    async fn list_batches(&self, project: Option<ProjectId>) -> Result<Vec<Batch>, StoreError>;

    async fn count_batches(&self) -> Result<usize, StoreError>;

    async fn load_environment(&self, id: EnvironmentId) -> Result<Option<Environment>, StoreError>;

    async fn list_environments(&self, project: ProjectId) -> Result<Vec<Environment>, StoreError>;

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    async fn load_client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;

    /// Notes of one project in storage order; callers sort by timestamp
    async fn list_notes(&self, project: ProjectId) -> Result<Vec<AuditNote>, StoreError>;

    async fn list_factory_orders(&self, project: ProjectId) -> Result<Vec<FactoryOrder>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError>;
}
