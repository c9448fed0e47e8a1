use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Changeset, Mutation, StoreError, WorkflowStore};
use crate::audit::AuditNote;
use crate::model::{
    BatchId, Client, ClientId, Environment, EnvironmentId, FactoryOrder, Project, ProjectId, User,
};
use crate::workflow::{Batch, WorkflowDefinition};

/// Batch row as stored; membership lives on the environments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: BatchId,
    pub project_id: ProjectId,
    pub name: String,
    pub current_stage_code: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub version: u64,
}

impl From<&Batch> for BatchRecord {
    fn from(batch: &Batch) -> Self {
        Self {
            id: batch.id,
            project_id: batch.project_id,
            name: batch.name.clone(),
            current_stage_code: batch.current_stage_code.clone(),
            created_at: batch.created_at,
            last_updated: batch.last_updated,
            version: batch.version,
        }
    }
}

impl BatchRecord {
    fn with_members(&self, members: BTreeSet<EnvironmentId>) -> Batch {
        Batch {
            id: self.id,
            project_id: self.project_id,
            name: self.name.clone(),
            current_stage_code: self.current_stage_code.clone(),
            created_at: self.created_at,
            last_updated: self.last_updated,
            members,
            version: self.version,
        }
    }
}

/// Whole store contents; also the on-disk JSON format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub definition: Option<WorkflowDefinition>,
    #[serde(default)]
    pub clients: BTreeMap<ClientId, Client>,
    #[serde(default)]
    pub projects: BTreeMap<ProjectId, Project>,
    #[serde(default)]
    pub environments: BTreeMap<EnvironmentId, Environment>,
    #[serde(default)]
    pub batches: BTreeMap<BatchId, BatchRecord>,
    #[serde(default)]
    pub notes: Vec<AuditNote>,
    #[serde(default)]
    pub factory_orders: Vec<FactoryOrder>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl StoreSnapshot {
    fn members_of(&self, batch_id: BatchId) -> BTreeSet<EnvironmentId> {
        self.environments
            .values()
            .filter(|env| env.batch_id == Some(batch_id))
            .map(|env| env.id)
            .collect()
    }

    fn batch(&self, id: BatchId) -> Option<Batch> {
        self.batches
            .get(&id)
            .map(|record| record.with_members(self.members_of(id)))
    }

    fn check_version(&self, batch_id: BatchId, expected: u64) -> Result<(), StoreError> {
        let record = self
            .batches
            .get(&batch_id)
            .ok_or_else(|| StoreError::missing("batch", batch_id))?;
        if record.version != expected {
            return Err(StoreError::conflict(
                "batch",
                batch_id,
                format!("expected version {expected}, found {}", record.version),
            ));
        }
        Ok(())
    }

    fn apply(&mut self, mutation: Mutation, touched: &mut BTreeSet<BatchId>) -> Result<(), StoreError> {
        match mutation {
            Mutation::InsertClient(client) => {
                if self.clients.contains_key(&client.id) {
                    return Err(StoreError::conflict("client", client.id, "already exists"));
                }
                self.clients.insert(client.id, client);
            }
            Mutation::UpdateClient(client) => {
                let slot = self
                    .clients
                    .get_mut(&client.id)
                    .ok_or_else(|| StoreError::missing("client", client.id))?;
                *slot = client;
            }
            Mutation::InsertProject(project) => {
                if !self.clients.contains_key(&project.client_id) {
                    return Err(StoreError::missing("client", project.client_id));
                }
                if self.projects.contains_key(&project.id) {
                    return Err(StoreError::conflict("project", project.id, "already exists"));
                }
                self.projects.insert(project.id, project);
            }
            Mutation::SetProjectStatus { project_id, status } => {
                let project = self
                    .projects
                    .get_mut(&project_id)
                    .ok_or_else(|| StoreError::missing("project", project_id))?;
                // concurrent writers may race; status never moves backward
                if status.rank() > project.status.rank() {
                    project.status = status;
                }
            }
            Mutation::InsertEnvironment(environment) => {
                if !self.projects.contains_key(&environment.project_id) {
                    return Err(StoreError::missing("project", environment.project_id));
                }
                if let Some(batch_id) = environment.batch_id {
                    if !self.batches.contains_key(&batch_id) {
                        return Err(StoreError::missing("batch", batch_id));
                    }
                    touched.insert(batch_id);
                }
                if self.environments.contains_key(&environment.id) {
                    return Err(StoreError::conflict("environment", environment.id, "already exists"));
                }
                self.environments.insert(environment.id, environment);
            }
            Mutation::UpdateEnvironment(environment) => {
                let slot = self
                    .environments
                    .get_mut(&environment.id)
                    .ok_or_else(|| StoreError::missing("environment", environment.id))?;
                let batch_id = slot.batch_id;
                *slot = Environment {
                    batch_id,
                    ..environment
                };
            }
            Mutation::MoveEnvironment {
                environment_id,
                from,
                to,
            } => {
                if !self.batches.contains_key(&to) {
                    return Err(StoreError::missing("batch", to));
                }
                let environment = self
                    .environments
                    .get_mut(&environment_id)
                    .ok_or_else(|| StoreError::missing("environment", environment_id))?;
                if environment.batch_id != Some(from) {
                    return Err(StoreError::conflict(
                        "environment",
                        environment_id,
                        format!("no longer owned by batch {from}"),
                    ));
                }
                environment.batch_id = Some(to);
                touched.insert(from);
                touched.insert(to);
            }
            Mutation::InsertBatch(batch) => {
                if self.batches.contains_key(&batch.id) {
                    return Err(StoreError::conflict("batch", batch.id, "already exists"));
                }
                touched.insert(batch.id);
                self.batches.insert(batch.id, BatchRecord::from(&batch));
            }
            Mutation::UpdateBatch {
                batch,
                expected_version,
            } => {
                self.check_version(batch.id, expected_version)?;
                let mut record = BatchRecord::from(&batch);
                record.version = expected_version + 1;
                touched.insert(batch.id);
                self.batches.insert(batch.id, record);
            }
            Mutation::DeleteBatch {
                batch_id,
                expected_version,
            } => {
                self.check_version(batch_id, expected_version)?;
                if !self.members_of(batch_id).is_empty() {
                    return Err(StoreError::conflict("batch", batch_id, "still has members"));
                }
                self.batches.remove(&batch_id);
                touched.remove(&batch_id);
            }
            Mutation::AppendNote(note) => {
                if !self.projects.contains_key(&note.project_id) {
                    return Err(StoreError::missing("project", note.project_id));
                }
                self.notes.push(note);
            }
            Mutation::InsertFactoryOrder(order) => {
                if !self.environments.contains_key(&order.environment_id) {
                    return Err(StoreError::missing("environment", order.environment_id));
                }
                self.factory_orders.push(order);
            }
            Mutation::InsertUser(user) => {
                if self.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
                    return Err(StoreError::conflict("user", &user.email, "email already registered"));
                }
                self.users.push(user);
            }
        }
        Ok(())
    }
}

/// Store holding everything in memory, optionally mirrored to a JSON file
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreSnapshot>,
    path: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            path: None,
        }
    }

    /// Opens a file-backed store; a missing file starts empty
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", path.display());
                StoreSnapshot::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            state: RwLock::new(snapshot),
            path: Some(path),
        })
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    async fn persist(path: &Path, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        debug!("Snapshot written to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn load_definition(&self) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self.state.read().await.definition.clone())
    }

    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let mut working = state.clone();
        working.definition = Some(definition.clone());
        if let Some(path) = &self.path {
            Self::persist(path, &working).await?;
        }
        *state = working;
        Ok(())
    }

    async fn load_batch_with_members(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.state.read().await.batch(id))
    }

    async fn list_batches(&self, project: Option<ProjectId>) -> Result<Vec<Batch>, StoreError> {
        let state = self.state.read().await;
        let mut batches: Vec<Batch> = state
            .batches
            .values()
            .filter(|record| project.map_or(true, |p| record.project_id == p))
            .map(|record| record.with_members(state.members_of(record.id)))
            .collect();
        batches.sort_by_key(|batch| batch.created_at);
        Ok(batches)
    }

    async fn count_batches(&self) -> Result<usize, StoreError> {
        Ok(self.state.read().await.batches.len())
    }

    async fn load_environment(&self, id: EnvironmentId) -> Result<Option<Environment>, StoreError> {
        Ok(self.state.read().await.environments.get(&id).cloned())
    }

    async fn list_environments(&self, project: ProjectId) -> Result<Vec<Environment>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .environments
            .values()
            .filter(|env| env.project_id == project)
            .cloned()
            .collect())
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.state.read().await.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self.state.read().await.projects.values().cloned().collect();
        projects.sort_by_key(|project| project.created_at);
        Ok(projects)
    }

    async fn load_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.state.read().await.clients.get(&id).cloned())
    }

    async fn list_notes(&self, project: ProjectId) -> Result<Vec<AuditNote>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .notes
            .iter()
            .filter(|note| note.project_id == project)
            .cloned()
            .collect())
    }

    async fn list_factory_orders(&self, project: ProjectId) -> Result<Vec<FactoryOrder>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .factory_orders
            .iter()
            .filter(|order| order.project_id == project)
            .cloned()
            .collect())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let mut working = state.clone();
        let mut touched = BTreeSet::new();
        let count = changeset.len();

        for mutation in changeset.into_mutations() {
            let label = mutation.label();
            working.apply(mutation, &mut touched).map_err(|e| {
                debug!(mutation = label, error = %e, "Changeset rejected");
                e
            })?;
        }

        for batch_id in touched {
            if working.batches.contains_key(&batch_id) && working.members_of(batch_id).is_empty() {
                return Err(StoreError::conflict(
                    "batch",
                    batch_id,
                    "commit would leave the batch without members",
                ));
            }
        }

        if let Some(path) = &self.path {
            Self::persist(path, &working).await?;
        }
        *state = working;
        debug!(mutations = count, "Changeset committed");
        Ok(())
    }
}
