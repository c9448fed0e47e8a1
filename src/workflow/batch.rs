use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{BatchId, EnvironmentId, ProjectId};

/// A group of environments progressing together through one stage pointer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub project_id: ProjectId,
    pub name: String,
    pub current_stage_code: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Loaded from environment ownership, never written independently of it
    pub members: BTreeSet<EnvironmentId>,
    /// Bumped on every committed change; stores reject stale writes with it
    pub version: u64,
}

impl Batch {
    pub fn seed(
        project_id: ProjectId,
        name: impl Into<String>,
        stage_code: impl Into<String>,
        members: BTreeSet<EnvironmentId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BatchId::new(),
            project_id,
            name: name.into(),
            current_stage_code: stage_code.into(),
            created_at: now,
            last_updated: now,
            members,
            version: 0,
        }
    }

    /// Name for a batch produced by a split, derived from its creation date
    pub fn split_name(now: DateTime<Utc>) -> String {
        format!("Lote - {}", now.format("%d/%m/%Y"))
    }

    pub fn contains(&self, environment_id: &EnvironmentId) -> bool {
        self.members.contains(environment_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whole days spent in the current stage
    pub fn days_in_stage(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_updated).num_days().max(0)
    }
}
