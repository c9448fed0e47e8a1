// Append-only project trail.
//
// Notes are immutable once created. Display order is newest first; anything
// derived from the trail orders by `created_at`, never by insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Actor;
use crate::model::{BatchId, EnvironmentId, FactoryOrderId, NoteId, ProjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NoteKind {
    Manual,
    System,
}

/// Structured payload attached to system notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    ProjectCreated {
        batch_id: BatchId,
        stage_code: String,
        environment_count: usize,
    },
    StageAdvanced {
        batch_id: BatchId,
        from: String,
        to: String,
    },
    BatchSplit {
        original_batch_id: BatchId,
        new_batch_id: BatchId,
        from_stage: String,
        reentry_stage: String,
        environment_ids: Vec<EnvironmentId>,
        original_deleted: bool,
    },
    ClientUpdated {
        fields: Vec<String>,
    },
    EnvironmentUpdated {
        environment_id: EnvironmentId,
        fields: Vec<String>,
    },
    FactoryPartRequested {
        order_id: FactoryOrderId,
        environment_id: EnvironmentId,
    },
    ProjectCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditNote {
    pub id: NoteId,
    pub project_id: ProjectId,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub kind: NoteKind,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<AuditEvent>,
}

impl AuditNote {
    pub fn system(
        project_id: ProjectId,
        content: impl Into<String>,
        actor: &Actor,
        event: AuditEvent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NoteId::new(),
            project_id,
            content: content.into(),
            author_id: actor.id.clone(),
            author_name: actor.display_name.clone(),
            kind: NoteKind::System,
            created_at: now,
            event: Some(event),
        }
    }

    pub fn manual(
        project_id: ProjectId,
        content: impl Into<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NoteId::new(),
            project_id,
            content: content.into(),
            author_id: actor.id.clone(),
            author_name: actor.display_name.clone(),
            kind: NoteKind::Manual,
            created_at: now,
            event: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == NoteKind::System
    }
}

/// One step in a batch's reconstructed path through the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    pub at: DateTime<Utc>,
    pub batch_id: BatchId,
    /// `None` when the batch was born at `to`
    pub from: Option<String>,
    pub to: String,
    pub author_name: String,
}

/// Read-side view over a project's notes
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    notes: Vec<AuditNote>,
}

impl AuditTrail {
    pub fn new(notes: Vec<AuditNote>) -> Self {
        Self { notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn system_count(&self) -> usize {
        self.notes.iter().filter(|note| note.is_system()).count()
    }

    pub fn chronological(&self) -> Vec<&AuditNote> {
        let mut notes: Vec<&AuditNote> = self.notes.iter().collect();
        notes.sort_by_key(|note| note.created_at);
        notes
    }

    /// Reverse of [`AuditTrail::chronological`]: notes sharing a timestamp
    /// come out latest-written first
    pub fn newest_first(&self) -> Vec<&AuditNote> {
        let mut notes = self.chronological();
        notes.reverse();
        notes
    }

    /// Stage transitions for every batch of the project, oldest first
    pub fn stage_history(&self) -> Vec<StageHistoryEntry> {
        self.chronological()
            .into_iter()
            .filter_map(|note| {
                let entry = |batch_id, from: Option<&String>, to: &String| StageHistoryEntry {
                    at: note.created_at,
                    batch_id,
                    from: from.cloned(),
                    to: to.clone(),
                    author_name: note.author_name.clone(),
                };
                match note.event.as_ref()? {
                    AuditEvent::ProjectCreated {
                        batch_id,
                        stage_code,
                        ..
                    } => Some(entry(*batch_id, None, stage_code)),
                    AuditEvent::StageAdvanced { batch_id, from, to } => {
                        Some(entry(*batch_id, Some(from), to))
                    }
                    AuditEvent::BatchSplit {
                        new_batch_id,
                        from_stage,
                        reentry_stage,
                        ..
                    } => Some(entry(*new_batch_id, Some(from_stage), reentry_stage)),
                    _ => None,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_ordering_uses_timestamps_not_insertion() {
        let project = ProjectId::new();
        let actor = Actor::new("u1", "Otton");
        let batch = BatchId::new();
        // written out of sequence
        let notes = vec![
            AuditNote::system(
                project,
                "1.2 → 2.1",
                &actor,
                AuditEvent::StageAdvanced {
                    batch_id: batch,
                    from: "1.2".into(),
                    to: "2.1".into(),
                },
                at(12),
            ),
            AuditNote::manual(project, "Cliente ligou", &actor, at(11)),
            AuditNote::system(
                project,
                "1.1 → 1.2",
                &actor,
                AuditEvent::StageAdvanced {
                    batch_id: batch,
                    from: "1.1".into(),
                    to: "1.2".into(),
                },
                at(10),
            ),
        ];
        let trail = AuditTrail::new(notes);

        let newest: Vec<&str> = trail.newest_first().iter().map(|n| n.content.as_str()).collect();
        assert_eq!(newest, vec!["1.2 → 2.1", "Cliente ligou", "1.1 → 1.2"]);

        let history = trail.stage_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from.as_deref(), Some("1.1"));
        assert_eq!(history[1].to, "2.1");
        assert_eq!(trail.system_count(), 2);
    }

    #[test]
    fn test_equal_timestamps_show_latest_written_first() {
        let project = ProjectId::new();
        let actor = Actor::new("u1", "Otton");
        let trail = AuditTrail::new(vec![
            AuditNote::manual(project, "primeira", &actor, at(9)),
            AuditNote::manual(project, "segunda", &actor, at(9)),
            AuditNote::manual(project, "terceira", &actor, at(9)),
        ]);

        let newest: Vec<&str> = trail.newest_first().iter().map(|n| n.content.as_str()).collect();
        assert_eq!(newest, vec!["terceira", "segunda", "primeira"]);
        let oldest: Vec<&str> = trail.chronological().iter().map(|n| n.content.as_str()).collect();
        assert_eq!(oldest, vec!["primeira", "segunda", "terceira"]);
    }

    #[test]
    fn test_kind_serializes_uppercase() {
        let json = serde_json::to_string(&NoteKind::System).unwrap();
        assert_eq!(json, "\"SYSTEM\"");
    }
}
