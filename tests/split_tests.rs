//! Integration tests for splitting rooms off a batch
//!
//! Covers the re-entry stage, deletion of emptied batches, rejected
//! selections and the one-owner-per-environment rule across repeated splits.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_test::assert_ok;

use fluxo_erp::model::{BatchId, EnvironmentId};
use fluxo_erp::{
    AuditEvent, FixedClock, InMemoryStore, ServiceOptions, WorkflowError, WorkflowService,
    WorkflowStore,
};

mod fixtures;
use fixtures::{definition, harness, harness_with_options, Harness};

/// Asserts every environment of the store is owned by exactly one batch and
/// that batch lists it as a member
async fn assert_single_owner(store: &dyn WorkflowStore, project: fluxo_erp::model::ProjectId) {
    let environments = store.list_environments(project).await.unwrap();
    let batches = store.list_batches(Some(project)).await.unwrap();

    let mut owners: HashMap<EnvironmentId, Vec<BatchId>> = HashMap::new();
    for batch in &batches {
        assert!(batch.member_count() > 0, "batch {} is empty", batch.id);
        for member in &batch.members {
            owners.entry(*member).or_default().push(batch.id);
        }
    }
    for env in &environments {
        let owned_by = owners.get(&env.id).cloned().unwrap_or_default();
        assert_eq!(owned_by.len(), 1, "{} owned by {:?}", env.name, owned_by);
        assert_eq!(env.batch_id, Some(owned_by[0]));
    }
}

#[tokio::test]
async fn test_split_two_of_three_rooms() {
    let h = harness(definition(&["3.2", "4.1", "4.2"])).await;
    let project = h.project_with_rooms(&["A", "B", "C"]).await;
    let original = project.batches[0].batch_id;
    let b = Harness::room_id(&project, "B");
    let c = Harness::room_id(&project, "C");
    let a = Harness::room_id(&project, "A");

    let split = assert_ok!(h.service.split_batch(original, &[b, c], &h.actor).await);
    assert_eq!(split.original_batch_id, original);
    assert!(!split.original_deleted);
    assert_eq!(split.new_batch.stage_code, "4.1");
    assert_eq!(split.new_batch.environment_count, 2);
    assert_eq!(split.new_batch.batch_name, "Lote - 01/10/2024");

    let remainder = split.remainder.expect("remainder survives");
    assert_eq!(remainder.stage_code, "3.2");
    assert_eq!(remainder.environment_ids, vec![a]);

    let stored = h.store.load_batch_with_members(original).await.unwrap().unwrap();
    assert_eq!(stored.members.iter().copied().collect::<Vec<_>>(), vec![a]);
    assert_eq!(stored.current_stage_code, "3.2");

    let notes = h.service.project_notes(project.project.id).await.unwrap();
    let note = &notes[0];
    assert!(note.is_system());
    assert!(note.content.contains('2'));
    assert!(note.content.contains("3.2"));
    assert!(note.content.contains("4.1"));
    match &note.event {
        Some(AuditEvent::BatchSplit {
            original_batch_id,
            original_deleted,
            environment_ids,
            ..
        }) => {
            assert_eq!(*original_batch_id, original);
            assert!(!original_deleted);
            assert_eq!(environment_ids.len(), 2);
        }
        other => panic!("expected split event, got {other:?}"),
    }

    assert_single_owner(&*h.store, project.project.id).await;
}

#[tokio::test]
async fn test_split_of_every_room_deletes_original() {
    let h = harness(definition(&["3.2", "4.1"])).await;
    let project = h.project_with_rooms(&["A", "B"]).await;
    let original = project.batches[0].batch_id;
    let all: Vec<EnvironmentId> = project.environments.iter().map(|env| env.id).collect();

    let split = h.service.split_batch(original, &all, &h.actor).await.unwrap();
    assert!(split.original_deleted);
    assert!(split.remainder.is_none());

    assert!(h.store.load_batch_with_members(original).await.unwrap().is_none());
    assert!(matches!(
        h.service.advance_batch(original, &h.actor).await,
        Err(WorkflowError::NotFound { .. })
    ));

    let batches = h.store.list_batches(Some(project.project.id)).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].id, split.new_batch.batch_id);
    assert_single_owner(&*h.store, project.project.id).await;
}

#[tokio::test]
async fn test_rejected_splits_leave_state_untouched() {
    let h = harness(definition(&["3.2", "4.1"])).await;
    let project = h.project_with_rooms(&["A", "B"]).await;
    let other = h.project_with_rooms(&["Intrusa"]).await;
    let batch = project.batches[0].batch_id;
    let before = h.store.snapshot().await;

    assert!(matches!(
        h.service.split_batch(batch, &[], &h.actor).await,
        Err(WorkflowError::EmptySelection)
    ));

    let stranger = Harness::room_id(&other, "Intrusa");
    let a = Harness::room_id(&project, "A");
    match h.service.split_batch(batch, &[a, stranger], &h.actor).await {
        Err(WorkflowError::NotMember { environment_ids, .. }) => {
            assert_eq!(environment_ids, vec![stranger])
        }
        other => panic!("expected NotMember, got {other:?}"),
    }

    let after = h.store.snapshot().await;
    assert_eq!(before.batches, after.batches);
    assert_eq!(before.environments, after.environments);
    assert_eq!(before.notes.len(), after.notes.len());
}

#[tokio::test]
async fn test_missing_reentry_stage_is_reported() {
    let options = ServiceOptions {
        reentry_stage: "4.1".into(),
        ..Default::default()
    };
    let h = harness_with_options(definition(&["3.1", "3.2"]), options).await;
    let project = h.project_with_rooms(&["A", "B"]).await;
    let a = Harness::room_id(&project, "A");

    match h.service.split_batch(project.batches[0].batch_id, &[a], &h.actor).await {
        Err(WorkflowError::UnknownReentryStage { code }) => assert_eq!(code, "4.1"),
        other => panic!("expected UnknownReentryStage, got {other:?}"),
    }
    assert_eq!(h.store.count_batches().await.unwrap(), 1);
}

#[tokio::test]
async fn test_repeated_splits_keep_one_owner_per_room() {
    let h = harness(definition(&["3.2", "4.1", "4.2", "4.3"])).await;
    let project = h.project_with_rooms(&["A", "B", "C", "D"]).await;
    let original = project.batches[0].batch_id;
    let ids: HashMap<&str, EnvironmentId> = ["A", "B", "C", "D"]
        .into_iter()
        .map(|name| (name, Harness::room_id(&project, name)))
        .collect();

    let first = h
        .service
        .split_batch(original, &[ids["C"], ids["D"]], &h.actor)
        .await
        .unwrap();
    h.service
        .advance_batch(first.new_batch.batch_id, &h.actor)
        .await
        .unwrap();
    let second = h
        .service
        .split_batch(first.new_batch.batch_id, &[ids["D"]], &h.actor)
        .await
        .unwrap();
    assert_eq!(second.new_batch.stage_code, "4.1");
    assert_eq!(second.remainder.as_ref().unwrap().stage_code, "4.2");

    // moving a room twice from the same source fails
    assert!(h
        .service
        .split_batch(first.new_batch.batch_id, &[ids["D"]], &h.actor)
        .await
        .is_err());

    assert_eq!(h.store.count_batches().await.unwrap(), 3);
    assert_single_owner(&*h.store, project.project.id).await;

    let history = h.service.stage_history(project.project.id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.batch_id, second.new_batch.batch_id);
    assert_eq!(last.from.as_deref(), Some("4.2"));
    assert_eq!(last.to, "4.1");
}

#[tokio::test]
async fn test_split_survives_reopening_the_snapshot() {
    let dir = std::env::temp_dir().join(format!("fluxo-split-{}", uuid::Uuid::new_v4()));
    let path = dir.join("store.json");

    let (project_id, new_batch) = {
        let store = Arc::new(InMemoryStore::open(&path).await.unwrap());
        store
            .save_definition(&definition(&["3.2", "4.1"]))
            .await
            .unwrap();
        let clock = Arc::new(FixedClock::new(fixtures::start_time()));
        let service = WorkflowService::load(store.clone(), ServiceOptions::default())
            .await
            .unwrap()
            .with_clock(clock.clone());
        let h = Harness {
            store,
            clock,
            service,
            actor: fluxo_erp::Actor::new("u-otton", "Otton"),
        };
        let project = h.project_with_rooms(&["A", "B"]).await;
        let a = Harness::room_id(&project, "A");
        let split = h
            .service
            .split_batch(project.batches[0].batch_id, &[a], &h.actor)
            .await
            .unwrap();
        (project.project.id, split.new_batch.batch_id)
    };

    let reopened = InMemoryStore::open(&path).await.unwrap();
    let batch = reopened.load_batch_with_members(new_batch).await.unwrap().unwrap();
    assert_eq!(batch.current_stage_code, "4.1");
    assert_eq!(batch.member_count(), 1);
    assert_eq!(reopened.list_notes(project_id).await.unwrap().len(), 2);
    assert_single_owner(&reopened, project_id).await;

    let _ = std::fs::remove_dir_all(&dir);
}
