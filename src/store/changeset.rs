use serde::{Deserialize, Serialize};

use crate::audit::AuditNote;
use crate::model::{
    BatchId, Client, Environment, EnvironmentId, FactoryOrder, Project, ProjectId, ProjectStatus,
    User,
};
use crate::workflow::Batch;

/// A single row-level change. Stores apply a whole [`Changeset`] or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    InsertClient(Client),
    UpdateClient(Client),
    InsertProject(Project),
    SetProjectStatus {
        project_id: ProjectId,
        status: ProjectStatus,
    },
    InsertEnvironment(Environment),
    /// Writes the editable fields; batch ownership is left as stored
    UpdateEnvironment(Environment),
    /// Ownership transfer; fails if the environment is no longer owned by `from`
    MoveEnvironment {
        environment_id: EnvironmentId,
        from: BatchId,
        to: BatchId,
    },
    /// Inserts the batch row; members are assigned through environments
    InsertBatch(Batch),
    /// Overwrites stage pointer, name and timestamps if the stored version matches
    UpdateBatch {
        batch: Batch,
        expected_version: u64,
    },
    DeleteBatch {
        batch_id: BatchId,
        expected_version: u64,
    },
    AppendNote(AuditNote),
    InsertFactoryOrder(FactoryOrder),
    InsertUser(User),
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::InsertClient(_) => "insert_client",
            Mutation::UpdateClient(_) => "update_client",
            Mutation::InsertProject(_) => "insert_project",
            Mutation::SetProjectStatus { .. } => "set_project_status",
            Mutation::InsertEnvironment(_) => "insert_environment",
            Mutation::UpdateEnvironment(_) => "update_environment",
            Mutation::MoveEnvironment { .. } => "move_environment",
            Mutation::InsertBatch(_) => "insert_batch",
            Mutation::UpdateBatch { .. } => "update_batch",
            Mutation::DeleteBatch { .. } => "delete_batch",
            Mutation::AppendNote(_) => "append_note",
            Mutation::InsertFactoryOrder(_) => "insert_factory_order",
            Mutation::InsertUser(_) => "insert_user",
        }
    }
}

/// Ordered list of mutations committed atomically
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    mutations: Vec<Mutation>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn with(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Notes appended by this changeset
    pub fn notes(&self) -> impl Iterator<Item = &AuditNote> {
        self.mutations.iter().filter_map(|mutation| match mutation {
            Mutation::AppendNote(note) => Some(note),
            _ => None,
        })
    }
}

impl Extend<Mutation> for Changeset {
    fn extend<T: IntoIterator<Item = Mutation>>(&mut self, iter: T) {
        self.mutations.extend(iter);
    }
}
