// Batch workflow engine.
//
// Stateless: every operation validates against the definition and the loaded
// batch first, then returns an outcome describing the full mutation. Nothing is
// applied until the caller commits the outcome's changeset in one transaction.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::batch::Batch;
use super::definition::{Stage, WorkflowDefinition};
use crate::audit::{AuditEvent, AuditNote};
use crate::errors::WorkflowError;
use crate::identity::Actor;
use crate::model::{BatchId, EnvironmentId};
use crate::store::{Changeset, Mutation};

/// Result of a successful advance, not yet persisted
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub batch: Batch,
    pub from: Stage,
    pub to: Stage,
    pub note: AuditNote,
    expected_version: u64,
}

impl AdvanceOutcome {
    pub fn changeset(&self) -> Changeset {
        Changeset::new()
            .with(Mutation::UpdateBatch {
                batch: self.batch.clone(),
                expected_version: self.expected_version,
            })
            .with(Mutation::AppendNote(self.note.clone()))
    }
}

/// Result of a successful split, not yet persisted
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub new_batch: Batch,
    /// The original batch with its remaining members, `None` when it was emptied
    pub remainder: Option<Batch>,
    pub original_batch_id: BatchId,
    pub moved: BTreeSet<EnvironmentId>,
    pub from_stage: String,
    pub note: AuditNote,
    expected_version: u64,
}

impl SplitOutcome {
    pub fn original_deleted(&self) -> bool {
        self.remainder.is_none()
    }

    pub fn changeset(&self) -> Changeset {
        let mut changeset = Changeset::new().with(Mutation::InsertBatch(self.new_batch.clone()));
        changeset.extend(self.moved.iter().map(|environment_id| Mutation::MoveEnvironment {
            environment_id: *environment_id,
            from: self.original_batch_id,
            to: self.new_batch.id,
        }));
        match &self.remainder {
            Some(remainder) => changeset.push(Mutation::UpdateBatch {
                batch: remainder.clone(),
                expected_version: self.expected_version,
            }),
            None => changeset.push(Mutation::DeleteBatch {
                batch_id: self.original_batch_id,
                expected_version: self.expected_version,
            }),
        };
        changeset.push(Mutation::AppendNote(self.note.clone()));
        changeset
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    definition: Arc<WorkflowDefinition>,
}

impl WorkflowEngine {
    pub fn new(definition: Arc<WorkflowDefinition>) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub fn is_last_stage(&self, code: &str) -> bool {
        self.definition.terminal().code == code
    }

    fn current_stage(&self, batch: &Batch) -> Result<&Stage, WorkflowError> {
        self.definition
            .stage_at(&batch.current_stage_code)
            .map_err(|_| WorkflowError::ConfigIntegrity {
                batch_id: batch.id,
                stage_code: batch.current_stage_code.clone(),
            })
    }

    /// Accepts only a single step forward in definition order
    pub fn validate_transition(&self, from: &str, to: &str) -> Result<(), WorkflowError> {
        let from_position = self.definition.index_of(from)?;
        let to_position = self.definition.index_of(to)?;
        if to_position != from_position + 1 {
            return Err(WorkflowError::validation(format!(
                "transition {from} → {to} is not a single forward step"
            )));
        }
        Ok(())
    }

    pub fn advance(
        &self,
        batch: &Batch,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let from = self.current_stage(batch)?.clone();
        let to = self
            .definition
            .next(&from.code)?
            .cloned()
            .ok_or_else(|| WorkflowError::AlreadyTerminal {
                batch_id: batch.id,
                stage_code: from.code.clone(),
            })?;
        self.validate_transition(&from.code, &to.code)?;

        let mut updated = batch.clone();
        updated.current_stage_code = to.code.clone();
        updated.last_updated = now;
        updated.version = batch.version + 1;

        let note = AuditNote::system(
            batch.project_id,
            format!("{} → {}", from.code, to.code),
            actor,
            AuditEvent::StageAdvanced {
                batch_id: batch.id,
                from: from.code.clone(),
                to: to.code.clone(),
            },
            now,
        );

        info!(
            batch_id = %batch.id,
            project_id = %batch.project_id,
            stage.from = %from.code,
            stage.to = %to.code,
            actor.id = %actor.id,
            "Batch advanced"
        );

        Ok(AdvanceOutcome {
            batch: updated,
            from,
            to,
            note,
            expected_version: batch.version,
        })
    }

    pub fn split(
        &self,
        batch: &Batch,
        selection: &[EnvironmentId],
        reentry_stage_code: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<SplitOutcome, WorkflowError> {
        if selection.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }

        let selected: BTreeSet<EnvironmentId> = selection.iter().copied().collect();
        let strangers: Vec<EnvironmentId> = selected.difference(&batch.members).copied().collect();
        if !strangers.is_empty() {
            return Err(WorkflowError::NotMember {
                batch_id: batch.id,
                environment_ids: strangers,
            });
        }

        let reentry = self
            .definition
            .stage_at(reentry_stage_code)
            .map_err(|_| WorkflowError::UnknownReentryStage {
                code: reentry_stage_code.to_string(),
            })?;
        let from_stage = self.current_stage(batch)?.code.clone();

        let new_batch = Batch::seed(
            batch.project_id,
            Batch::split_name(now),
            reentry.code.clone(),
            selected.clone(),
            now,
        );

        let remaining: BTreeSet<EnvironmentId> =
            batch.members.difference(&selected).copied().collect();
        let remainder = if remaining.is_empty() {
            None
        } else {
            let mut remainder = batch.clone();
            remainder.members = remaining;
            remainder.last_updated = now;
            remainder.version = batch.version + 1;
            Some(remainder)
        };

        let count = selected.len();
        let content = if count == 1 {
            format!(
                "1 ambiente separado da etapa {from_stage} para novo lote na etapa {}.",
                reentry.code
            )
        } else {
            format!(
                "{count} ambientes separados da etapa {from_stage} para novo lote na etapa {}.",
                reentry.code
            )
        };
        let note = AuditNote::system(
            batch.project_id,
            content,
            actor,
            AuditEvent::BatchSplit {
                original_batch_id: batch.id,
                new_batch_id: new_batch.id,
                from_stage: from_stage.clone(),
                reentry_stage: reentry.code.clone(),
                environment_ids: selected.iter().copied().collect(),
                original_deleted: remainder.is_none(),
            },
            now,
        );

        debug!(
            batch_id = %batch.id,
            remaining = remainder.as_ref().map(Batch::member_count).unwrap_or(0),
            "Split membership computed"
        );
        info!(
            batch_id = %batch.id,
            new_batch_id = %new_batch.id,
            project_id = %batch.project_id,
            environments = count,
            stage.from = %from_stage,
            stage.reentry = %reentry.code,
            actor.id = %actor.id,
            "Batch split"
        );

        Ok(SplitOutcome {
            new_batch,
            remainder,
            original_batch_id: batch.id,
            moved: selected,
            from_stage,
            note,
            expected_version: batch.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectId;
    use chrono::TimeZone;

    fn engine(codes: &[&str]) -> WorkflowEngine {
        let stages = codes
            .iter()
            .map(|code| Stage::new(code, code, "Vendedor", 1))
            .collect();
        WorkflowEngine::new(Arc::new(WorkflowDefinition::new(stages).unwrap()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 12, 10, 0, 0).unwrap()
    }

    fn batch_at(code: &str, members: &[EnvironmentId]) -> Batch {
        let created = Utc.with_ymd_and_hms(2024, 10, 1, 10, 0, 0).unwrap();
        Batch::seed(
            ProjectId::new(),
            "Projeto Completo",
            code,
            members.iter().copied().collect(),
            created,
        )
    }

    #[test]
    fn test_advance_walks_to_terminal() {
        let engine = engine(&["1.1", "1.2", "2.1"]);
        let actor = Actor::new("u1", "Otton");
        let batch = batch_at("1.1", &[EnvironmentId::new()]);

        let first = engine.advance(&batch, &actor, now()).unwrap();
        assert_eq!(first.batch.current_stage_code, "1.2");
        assert_eq!(first.note.content, "1.1 → 1.2");
        assert_eq!(first.note.author_id, "u1");
        assert_eq!(first.batch.last_updated, now());

        let second = engine.advance(&first.batch, &actor, now()).unwrap();
        assert_eq!(second.batch.current_stage_code, "2.1");

        let third = engine.advance(&second.batch, &actor, now());
        assert!(matches!(
            third,
            Err(WorkflowError::AlreadyTerminal { ref stage_code, .. }) if stage_code == "2.1"
        ));
    }

    #[test]
    fn test_advance_changeset_carries_one_note() {
        let engine = engine(&["1.1", "1.2"]);
        let batch = batch_at("1.1", &[EnvironmentId::new()]);
        let outcome = engine.advance(&batch, &Actor::system(), now()).unwrap();
        let changeset = outcome.changeset();
        assert_eq!(changeset.notes().count(), 1);
        assert!(matches!(
            changeset.mutations()[0],
            Mutation::UpdateBatch { expected_version: 0, .. }
        ));
    }

    #[test]
    fn test_unknown_current_stage_is_integrity_error() {
        let engine = engine(&["1.1", "1.2"]);
        let batch = batch_at("4.7", &[EnvironmentId::new()]);
        assert!(matches!(
            engine.advance(&batch, &Actor::system(), now()),
            Err(WorkflowError::ConfigIntegrity { .. })
        ));
    }

    #[test]
    fn test_validate_transition_rejects_skips_and_rewinds() {
        let engine = engine(&["1.1", "1.2", "2.1"]);
        assert!(engine.validate_transition("1.1", "1.2").is_ok());
        assert!(engine.validate_transition("1.1", "2.1").is_err());
        assert!(engine.validate_transition("2.1", "1.2").is_err());
    }

    #[test]
    fn test_split_partial_selection() {
        let engine = engine(&["3.1", "3.2", "4.1", "4.2"]);
        let (a, b, c) = (EnvironmentId::new(), EnvironmentId::new(), EnvironmentId::new());
        let batch = batch_at("3.2", &[a, b, c]);

        let outcome = engine
            .split(&batch, &[b, c], "4.1", &Actor::system(), now())
            .unwrap();

        assert_eq!(outcome.new_batch.current_stage_code, "4.1");
        assert_eq!(outcome.new_batch.members, [b, c].into_iter().collect());
        assert_ne!(outcome.new_batch.id, batch.id);
        assert_eq!(outcome.new_batch.name, "Lote - 12/10/2024");
        let remainder = outcome.remainder.as_ref().unwrap();
        assert_eq!(remainder.members, [a].into_iter().collect());
        assert_eq!(remainder.current_stage_code, "3.2");
        assert!(outcome.note.content.starts_with("2 ambientes"));
        assert!(outcome.note.content.contains("etapa 3.2"));
    }

    #[test]
    fn test_split_everything_deletes_original() {
        let engine = engine(&["3.2", "4.1"]);
        let a = EnvironmentId::new();
        let batch = batch_at("3.2", &[a]);

        let outcome = engine.split(&batch, &[a], "4.1", &Actor::system(), now()).unwrap();
        assert!(outcome.original_deleted());
        let changeset = outcome.changeset();
        assert!(changeset
            .mutations()
            .iter()
            .any(|m| matches!(m, Mutation::DeleteBatch { batch_id, .. } if *batch_id == batch.id)));
    }

    #[test]
    fn test_split_validation_errors() {
        let engine = engine(&["3.2", "4.1"]);
        let a = EnvironmentId::new();
        let batch = batch_at("3.2", &[a]);
        let actor = Actor::system();

        assert!(matches!(
            engine.split(&batch, &[], "4.1", &actor, now()),
            Err(WorkflowError::EmptySelection)
        ));

        let stranger = EnvironmentId::new();
        match engine.split(&batch, &[a, stranger], "4.1", &actor, now()) {
            Err(WorkflowError::NotMember { environment_ids, .. }) => {
                assert_eq!(environment_ids, vec![stranger]);
            }
            other => panic!("expected NotMember, got {other:?}"),
        }

        assert!(matches!(
            engine.split(&batch, &[a], "99.9", &actor, now()),
            Err(WorkflowError::UnknownReentryStage { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_in_selection_count_once() {
        let engine = engine(&["3.2", "4.1"]);
        let (a, b) = (EnvironmentId::new(), EnvironmentId::new());
        let batch = batch_at("3.2", &[a, b]);
        let outcome = engine
            .split(&batch, &[a, a], "4.1", &Actor::system(), now())
            .unwrap();
        assert_eq!(outcome.moved.len(), 1);
        assert!(outcome.note.content.starts_with("1 ambiente separado"));
    }
}
