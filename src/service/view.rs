use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    BatchId, Client, Environment, EnvironmentId, Project, ProjectId, UrgencyLevel,
};
use crate::workflow::{Batch, WorkflowDefinition};

/// Serializable snapshot of one batch, as shown on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchView {
    pub batch_id: BatchId,
    pub project_id: ProjectId,
    pub project_name: String,
    pub batch_name: String,
    pub stage_code: String,
    /// Empty when the stage code is not in the active definition
    pub stage_name: String,
    pub category: String,
    pub owner_role: String,
    pub sla_days: u32,
    pub days_in_stage: i64,
    /// Negative once the SLA is exceeded
    pub days_left: i64,
    pub environment_ids: Vec<EnvironmentId>,
    pub environment_count: usize,
    pub total_area: f64,
    pub highest_urgency: Option<UrgencyLevel>,
    pub last_updated: DateTime<Utc>,
}

impl BatchView {
    pub fn build(
        definition: &WorkflowDefinition,
        batch: &Batch,
        project_name: &str,
        environments: &[Environment],
        now: DateTime<Utc>,
    ) -> Self {
        let members: Vec<&Environment> = environments
            .iter()
            .filter(|env| batch.contains(&env.id))
            .collect();
        let stage = definition.stage_at(&batch.current_stage_code).ok();
        let sla_days = stage.map(|s| s.sla_days).unwrap_or(0);
        let days_in_stage = batch.days_in_stage(now);

        Self {
            batch_id: batch.id,
            project_id: batch.project_id,
            project_name: project_name.to_string(),
            batch_name: batch.name.clone(),
            stage_code: batch.current_stage_code.clone(),
            stage_name: stage.map(|s| s.name.clone()).unwrap_or_default(),
            category: stage.map(|s| s.category.clone()).unwrap_or_default(),
            owner_role: stage.map(|s| s.owner_role.clone()).unwrap_or_default(),
            sla_days,
            days_in_stage,
            days_left: i64::from(sla_days) - days_in_stage,
            environment_ids: batch.members.iter().copied().collect(),
            environment_count: batch.member_count(),
            total_area: members.iter().map(|env| env.area_sqm).sum(),
            highest_urgency: members.iter().map(|env| env.urgency_level).max(),
            last_updated: batch.last_updated,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.days_left < 0
    }
}

/// Result of a split: the new batch plus what is left of the original
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitView {
    pub new_batch: BatchView,
    pub remainder: Option<BatchView>,
    pub original_batch_id: BatchId,
    pub original_deleted: bool,
}

/// A project with its client, rooms and batches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectView {
    pub project: Project,
    pub client: Client,
    pub environments: Vec<Environment>,
    pub batches: Vec<BatchView>,
}
