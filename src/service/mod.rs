// Application service: loads state, runs the engine, commits one changeset
// per operation and returns serializable views.

pub mod clock;
pub mod view;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditNote, AuditTrail, StageHistoryEntry};
use crate::errors::WorkflowError;
use crate::identity::Actor;
use crate::model::{
    BatchId, Client, Environment, EnvironmentId, EnvironmentStatus, FactoryOrder, FactoryOrderId,
    FactoryOrderStatus, NewClient, NewEnvironment, Project, ProjectId, ProjectStatus,
};
use crate::patch::{ClientPatch, EnvironmentPatch};
use crate::project::{next_status, LifecycleEvent};
use crate::store::{Changeset, Mutation, WorkflowStore};
use crate::workflow::{
    Batch, Stage, WorkflowDefinition, WorkflowEngine, DEFAULT_INITIAL_BATCH_NAME,
    DEFAULT_REENTRY_STAGE,
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use view::{BatchView, ProjectView, SplitView};

use clock::BatchLocks;

/// Tunables that come from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    pub reentry_stage: String,
    pub initial_batch_name: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            reentry_stage: DEFAULT_REENTRY_STAGE.to_string(),
            initial_batch_name: DEFAULT_INITIAL_BATCH_NAME.to_string(),
        }
    }
}

pub struct WorkflowService {
    store: Arc<dyn WorkflowStore>,
    definition: RwLock<Arc<WorkflowDefinition>>,
    clock: Arc<dyn Clock>,
    locks: BatchLocks,
    options: ServiceOptions,
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: &str, what: &str) -> Result<(), WorkflowError> {
    if value.trim().is_empty() {
        return Err(WorkflowError::validation(format!("{what} cannot be empty")));
    }
    Ok(())
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        definition: WorkflowDefinition,
        options: ServiceOptions,
    ) -> Self {
        Self {
            store,
            definition: RwLock::new(Arc::new(definition)),
            clock: Arc::new(SystemClock),
            locks: BatchLocks::default(),
            options,
        }
    }

    /// Builds the service around the definition already stored
    pub async fn load(
        store: Arc<dyn WorkflowStore>,
        options: ServiceOptions,
    ) -> Result<Self, WorkflowError> {
        let definition = store
            .load_definition()
            .await?
            .ok_or_else(|| WorkflowError::not_found("workflow definition", "active"))?;
        Ok(Self::new(store, definition, options))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub async fn definition(&self) -> Arc<WorkflowDefinition> {
        self.definition.read().await.clone()
    }

    async fn engine(&self) -> WorkflowEngine {
        WorkflowEngine::new(self.definition().await)
    }

    async fn require_batch(&self, id: BatchId) -> Result<Batch, WorkflowError> {
        self.store
            .load_batch_with_members(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("batch", id))
    }

    async fn require_project(&self, id: ProjectId) -> Result<Project, WorkflowError> {
        self.store
            .load_project(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("project", id))
    }

    async fn require_environment(&self, id: EnvironmentId) -> Result<Environment, WorkflowError> {
        self.store
            .load_environment(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("environment", id))
    }

    async fn batch_view(
        &self,
        definition: &WorkflowDefinition,
        batch: &Batch,
        project: &Project,
    ) -> Result<BatchView, WorkflowError> {
        let environments = self.store.list_environments(project.id).await?;
        Ok(BatchView::build(
            definition,
            batch,
            &project.name,
            &environments,
            self.clock.now(),
        ))
    }

    /// Appends a status change for `project` when `event` moves it forward
    fn status_change(project: &Project, event: LifecycleEvent, changeset: &mut Changeset) {
        if let Some(status) = next_status(project.status, project.id, event) {
            changeset.push(Mutation::SetProjectStatus {
                project_id: project.id,
                status,
            });
        }
    }

    /// Registers a client, a project and its rooms, all in one batch at the first stage
    pub async fn create_project(
        &self,
        client: NewClient,
        environments: Vec<NewEnvironment>,
        seller_name: &str,
        actor: &Actor,
    ) -> Result<ProjectView, WorkflowError> {
        non_empty(&client.name, "client name")?;
        if environments.is_empty() {
            return Err(WorkflowError::validation(
                "a project needs at least one environment",
            ));
        }
        for env in &environments {
            non_empty(&env.name, "environment name")?;
            if !env.area_sqm.is_finite() || env.area_sqm <= 0.0 {
                return Err(WorkflowError::validation(format!(
                    "area of {} must be positive",
                    env.name
                )));
            }
            if !env.estimated_value.is_finite() || env.estimated_value < 0.0 {
                return Err(WorkflowError::validation(format!(
                    "estimated value of {} must be non-negative",
                    env.name
                )));
            }
        }

        let definition = self.definition().await;
        let first = definition.first();
        let now = self.clock.now();

        let client = Client {
            name: client.name.trim().to_string(),
            phone: client.phone,
            email: client.email,
            address: client.address,
            origin: client.origin,
            salesperson: client.salesperson,
            property_type: client.property_type,
            budget_expectation: client.budget_expectation,
            ..Default::default()
        };
        let mut project = Project {
            id: ProjectId::new(),
            client_id: client.id,
            name: format!("Projeto {}", client.name),
            seller_name: seller_name.to_string(),
            status: ProjectStatus::PreSale,
            created_at: now,
        };
        if let Some(status) = next_status(
            project.status,
            project.id,
            LifecycleEvent::PhaseReached { phase: first.phase },
        ) {
            project.status = status;
        }

        let environment_ids: Vec<EnvironmentId> =
            environments.iter().map(|_| EnvironmentId::new()).collect();
        let batch = Batch::seed(
            project.id,
            self.options.initial_batch_name.clone(),
            first.code.clone(),
            environment_ids.iter().copied().collect(),
            now,
        );
        let rooms: Vec<Environment> = environments
            .into_iter()
            .zip(&environment_ids)
            .map(|(new, id)| Environment {
                id: *id,
                project_id: project.id,
                name: new.name.trim().to_string(),
                area_sqm: new.area_sqm,
                urgency_level: new.urgency_level,
                estimated_value: new.estimated_value,
                observations: new.observations,
                status: EnvironmentStatus::InBatch,
                batch_id: Some(batch.id),
            })
            .collect();

        let note = AuditNote::system(
            project.id,
            "Projeto iniciado.",
            actor,
            AuditEvent::ProjectCreated {
                batch_id: batch.id,
                stage_code: first.code.clone(),
                environment_count: rooms.len(),
            },
            now,
        );

        let mut changeset = Changeset::new()
            .with(Mutation::InsertClient(client.clone()))
            .with(Mutation::InsertProject(project.clone()))
            .with(Mutation::InsertBatch(batch.clone()));
        changeset.extend(rooms.iter().cloned().map(Mutation::InsertEnvironment));
        changeset.push(Mutation::AppendNote(note));
        self.store.commit(changeset).await?;

        info!(
            project_id = %project.id,
            batch_id = %batch.id,
            environments = rooms.len(),
            stage = %first.code,
            actor.id = %actor.id,
            "Project created"
        );

        let view = BatchView::build(&definition, &batch, &project.name, &rooms, now);
        Ok(ProjectView {
            project,
            client,
            environments: rooms,
            batches: vec![view],
        })
    }

    pub async fn project(&self, id: ProjectId) -> Result<ProjectView, WorkflowError> {
        let project = self.require_project(id).await?;
        let client = self
            .store
            .load_client(project.client_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("client", project.client_id))?;
        let environments = self.store.list_environments(id).await?;
        let definition = self.definition().await;
        let now = self.clock.now();
        let batches = self
            .store
            .list_batches(Some(id))
            .await?
            .iter()
            .map(|batch| BatchView::build(&definition, batch, &project.name, &environments, now))
            .collect();
        Ok(ProjectView {
            project,
            client,
            environments,
            batches,
        })
    }

    pub async fn projects(&self) -> Result<Vec<Project>, WorkflowError> {
        Ok(self.store.list_projects().await?)
    }

    /// Moves the batch one stage forward.
    ///
    /// At the terminal stage this fails with `AlreadyTerminal` and nothing is
    /// written; callers then run [`WorkflowService::complete_project`].
    pub async fn advance_batch(
        &self,
        batch_id: BatchId,
        actor: &Actor,
    ) -> Result<BatchView, WorkflowError> {
        let _guard = self.locks.acquire(batch_id).await;
        let batch = self.require_batch(batch_id).await?;
        let project = self.require_project(batch.project_id).await?;
        let engine = self.engine().await;

        let outcome = engine.advance(&batch, actor, self.clock.now())?;
        let mut changeset = outcome.changeset();
        Self::status_change(
            &project,
            LifecycleEvent::PhaseReached {
                phase: outcome.to.phase,
            },
            &mut changeset,
        );
        self.store.commit(changeset).await?;

        self.batch_view(engine.definition(), &outcome.batch, &project)
            .await
    }

    /// Breaks the selected rooms off into a new batch at the re-entry stage
    pub async fn split_batch(
        &self,
        batch_id: BatchId,
        selection: &[EnvironmentId],
        actor: &Actor,
    ) -> Result<SplitView, WorkflowError> {
        let _guard = self.locks.acquire(batch_id).await;
        let batch = self.require_batch(batch_id).await?;
        let project = self.require_project(batch.project_id).await?;
        let engine = self.engine().await;

        let outcome = engine.split(
            &batch,
            selection,
            &self.options.reentry_stage,
            actor,
            self.clock.now(),
        )?;
        let mut changeset = outcome.changeset();
        let reentry_phase = engine
            .definition()
            .stage_at(&outcome.new_batch.current_stage_code)
            .map(|stage| stage.phase)
            .unwrap_or(0);
        Self::status_change(
            &project,
            LifecycleEvent::PhaseReached {
                phase: reentry_phase,
            },
            &mut changeset,
        );
        self.store.commit(changeset).await?;

        let environments = self.store.list_environments(project.id).await?;
        let now = self.clock.now();
        let definition = engine.definition();
        Ok(SplitView {
            new_batch: BatchView::build(
                definition,
                &outcome.new_batch,
                &project.name,
                &environments,
                now,
            ),
            remainder: outcome
                .remainder
                .as_ref()
                .map(|batch| BatchView::build(definition, batch, &project.name, &environments, now)),
            original_batch_id: outcome.original_batch_id,
            original_deleted: outcome.original_deleted(),
        })
    }

    /// Marks the project complete; a no-op when it already is (or is in assistance)
    pub async fn complete_project(
        &self,
        project_id: ProjectId,
        actor: &Actor,
    ) -> Result<Project, WorkflowError> {
        let mut project = self.require_project(project_id).await?;
        let Some(status) = next_status(project.status, project.id, LifecycleEvent::WorkflowFinished)
        else {
            debug!(project_id = %project_id, status = %project.status, "Project already finished");
            return Ok(project);
        };

        let note = AuditNote::system(
            project_id,
            "Projeto concluído.",
            actor,
            AuditEvent::ProjectCompleted,
            self.clock.now(),
        );
        self.store
            .commit(
                Changeset::new()
                    .with(Mutation::SetProjectStatus { project_id, status })
                    .with(Mutation::AppendNote(note)),
            )
            .await?;
        info!(project_id = %project_id, actor.id = %actor.id, "Project completed");

        project.status = status;
        Ok(project)
    }

    pub async fn add_note(
        &self,
        project_id: ProjectId,
        content: &str,
        actor: &Actor,
    ) -> Result<AuditNote, WorkflowError> {
        non_empty(content, "note content")?;
        self.require_project(project_id).await?;

        let note = AuditNote::manual(project_id, content.trim(), actor, self.clock.now());
        self.store
            .commit(Changeset::new().with(Mutation::AppendNote(note.clone())))
            .await?;
        debug!(project_id = %project_id, actor.id = %actor.id, "Manual note added");
        Ok(note)
    }

    pub async fn update_client(
        &self,
        project_id: ProjectId,
        patch: ClientPatch,
        actor: &Actor,
    ) -> Result<Client, WorkflowError> {
        let project = self.require_project(project_id).await?;
        let mut client = self
            .store
            .load_client(project.client_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("client", project.client_id))?;

        let fields = patch.apply(&mut client)?;
        if fields.is_empty() {
            return Err(WorkflowError::validation("patch changes nothing"));
        }

        let note = AuditNote::system(
            project_id,
            format!("Dados do cliente atualizados: {}.", fields.join(", ")),
            actor,
            AuditEvent::ClientUpdated {
                fields: fields.clone(),
            },
            self.clock.now(),
        );
        self.store
            .commit(
                Changeset::new()
                    .with(Mutation::UpdateClient(client.clone()))
                    .with(Mutation::AppendNote(note)),
            )
            .await?;
        info!(project_id = %project_id, fields = ?fields, actor.id = %actor.id, "Client updated");
        Ok(client)
    }

    pub async fn update_environment(
        &self,
        environment_id: EnvironmentId,
        patch: EnvironmentPatch,
        actor: &Actor,
    ) -> Result<Environment, WorkflowError> {
        let mut environment = self.require_environment(environment_id).await?;
        let fields = patch.apply(&mut environment)?;
        if fields.is_empty() {
            return Err(WorkflowError::validation("patch changes nothing"));
        }

        let note = AuditNote::system(
            environment.project_id,
            format!(
                "Ambiente {} atualizado: {}.",
                environment.name,
                fields.join(", ")
            ),
            actor,
            AuditEvent::EnvironmentUpdated {
                environment_id,
                fields: fields.clone(),
            },
            self.clock.now(),
        );
        self.store
            .commit(
                Changeset::new()
                    .with(Mutation::UpdateEnvironment(environment.clone()))
                    .with(Mutation::AppendNote(note)),
            )
            .await?;
        info!(
            project_id = %environment.project_id,
            environment_id = %environment_id,
            fields = ?fields,
            actor.id = %actor.id,
            "Environment updated"
        );
        Ok(environment)
    }

    pub async fn request_factory_part(
        &self,
        project_id: ProjectId,
        environment_id: EnvironmentId,
        description: &str,
        actor: &Actor,
    ) -> Result<FactoryOrder, WorkflowError> {
        non_empty(description, "part description")?;
        self.require_project(project_id).await?;
        let environment = self.require_environment(environment_id).await?;
        if environment.project_id != project_id {
            return Err(WorkflowError::validation(format!(
                "environment {environment_id} does not belong to project {project_id}"
            )));
        }

        let now = self.clock.now();
        let description = description.trim();
        let order = FactoryOrder {
            id: FactoryOrderId::new(),
            project_id,
            environment_id,
            environment_name: environment.name.clone(),
            part_description: description.to_string(),
            status: FactoryOrderStatus::Requested,
            created_at: now,
        };
        let note = AuditNote::system(
            project_id,
            format!("Peça solicitada para fábrica: {description}"),
            actor,
            AuditEvent::FactoryPartRequested {
                order_id: order.id,
                environment_id,
            },
            now,
        );
        self.store
            .commit(
                Changeset::new()
                    .with(Mutation::InsertFactoryOrder(order.clone()))
                    .with(Mutation::AppendNote(note)),
            )
            .await?;
        info!(
            project_id = %project_id,
            environment_id = %environment_id,
            order_id = %order.id,
            "Factory part requested"
        );
        Ok(order)
    }

    pub async fn factory_orders(&self, project_id: ProjectId) -> Result<Vec<FactoryOrder>, WorkflowError> {
        self.require_project(project_id).await?;
        Ok(self.store.list_factory_orders(project_id).await?)
    }

    /// Replaces one stage's SLA; order and codes stay as they are
    pub async fn update_stage_sla(&self, code: &str, sla_days: u32) -> Result<Stage, WorkflowError> {
        let mut definition = self.definition.write().await;
        let updated = definition.with_sla(code, sla_days)?;
        self.store.save_definition(&updated).await?;
        let stage = updated.stage_at(code)?.clone();
        *definition = Arc::new(updated);
        info!(stage = %code, sla_days, "Stage SLA updated");
        Ok(stage)
    }

    /// Every batch (optionally of one project), ordered by stage position then age
    pub async fn board(&self, project: Option<ProjectId>) -> Result<Vec<BatchView>, WorkflowError> {
        let definition = self.definition().await;
        let batches = self.store.list_batches(project).await?;
        let now = self.clock.now();

        let mut projects: HashMap<ProjectId, (Project, Vec<Environment>)> = HashMap::new();
        let mut views = Vec::with_capacity(batches.len());
        for batch in &batches {
            if !projects.contains_key(&batch.project_id) {
                let project = self.require_project(batch.project_id).await?;
                let environments = self.store.list_environments(batch.project_id).await?;
                projects.insert(batch.project_id, (project, environments));
            }
            if let Some((project, environments)) = projects.get(&batch.project_id) {
                if !definition.contains(&batch.current_stage_code) {
                    warn!(
                        batch_id = %batch.id,
                        stage = %batch.current_stage_code,
                        "Batch points at a stage outside the workflow definition"
                    );
                }
                views.push(BatchView::build(
                    &definition,
                    batch,
                    &project.name,
                    environments,
                    now,
                ));
            }
        }

        views.sort_by_key(|view| {
            (
                definition.index_of(&view.stage_code).unwrap_or(usize::MAX),
                view.last_updated,
            )
        });
        Ok(views)
    }

    /// Project notes, newest first
    pub async fn project_notes(&self, project_id: ProjectId) -> Result<Vec<AuditNote>, WorkflowError> {
        self.require_project(project_id).await?;
        let trail = AuditTrail::new(self.store.list_notes(project_id).await?);
        Ok(trail.newest_first().into_iter().cloned().collect())
    }

    pub async fn stage_history(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<StageHistoryEntry>, WorkflowError> {
        self.require_project(project_id).await?;
        let trail = AuditTrail::new(self.store.list_notes(project_id).await?);
        Ok(trail.stage_history())
    }
}
