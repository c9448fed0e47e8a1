//! Integration tests for client and room edits, manual notes and factory orders

use tokio_test::assert_err;

use fluxo_erp::model::{FactoryOrderStatus, UrgencyLevel};
use fluxo_erp::{AuditEvent, ClientPatch, EnvironmentPatch, NoteKind, WorkflowError, WorkflowStore};

mod fixtures;
use fixtures::{definition, harness, Harness};

#[tokio::test]
async fn test_client_update_records_changed_fields() {
    let h = harness(definition(&["1.1", "1.2"])).await;
    let project = h.project_with_rooms(&["Sala"]).await;

    let patch = ClientPatch {
        phone: Some("11 99999-0000".into()),
        origin: Some("Instagram".into()),
        ..Default::default()
    };
    let client = h
        .service
        .update_client(project.project.id, patch, &h.actor)
        .await
        .unwrap();
    assert_eq!(client.phone, "11 99999-0000");
    assert_eq!(client.origin.as_deref(), Some("Instagram"));

    let stored = h.store.load_client(client.id).await.unwrap().unwrap();
    assert_eq!(stored, client);

    let notes = h.service.project_notes(project.project.id).await.unwrap();
    assert_eq!(notes[0].content, "Dados do cliente atualizados: phone, origin.");
    assert!(matches!(
        notes[0].event,
        Some(AuditEvent::ClientUpdated { ref fields }) if fields.len() == 2
    ));
}

#[tokio::test]
async fn test_client_update_without_changes_is_rejected() {
    let h = harness(definition(&["1.1", "1.2"])).await;
    let project = h.project_with_rooms(&["Sala"]).await;

    let same_name = ClientPatch {
        name: Some("Ana Souza".into()),
        ..Default::default()
    };
    assert!(matches!(
        h.service.update_client(project.project.id, same_name, &h.actor).await,
        Err(WorkflowError::Validation { .. })
    ));

    let bad_email = ClientPatch {
        email: Some("ana.souza".into()),
        ..Default::default()
    };
    assert_err!(h.service.update_client(project.project.id, bad_email, &h.actor).await);
    assert_eq!(h.service.project_notes(project.project.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_environment_update_keeps_batch_membership() {
    let h = harness(definition(&["1.1", "1.2"])).await;
    let project = h.project_with_rooms(&["Cozinha", "Sala"]).await;
    let kitchen = Harness::room_id(&project, "Cozinha");

    let patch = EnvironmentPatch {
        area_sqm: Some(14.5),
        urgency_level: Some(UrgencyLevel::High),
        ..Default::default()
    };
    let updated = h
        .service
        .update_environment(kitchen, patch, &h.actor)
        .await
        .unwrap();
    assert_eq!(updated.area_sqm, 14.5);
    assert_eq!(updated.batch_id, Some(project.batches[0].batch_id));

    let notes = h.service.project_notes(project.project.id).await.unwrap();
    assert_eq!(notes[0].content, "Ambiente Cozinha atualizado: area_sqm, urgency_level.");

    let board = h.service.board(Some(project.project.id)).await.unwrap();
    assert_eq!(board[0].highest_urgency, Some(UrgencyLevel::High));
    assert_eq!(board[0].total_area, 24.5);

    let invalid = EnvironmentPatch {
        area_sqm: Some(0.0),
        ..Default::default()
    };
    assert!(matches!(
        h.service.update_environment(kitchen, invalid, &h.actor).await,
        Err(WorkflowError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_manual_notes_are_listed_newest_first() {
    let h = harness(definition(&["1.1", "1.2"])).await;
    let project = h.project_with_rooms(&["Sala"]).await;

    h.clock.advance(chrono::Duration::minutes(5));
    h.service
        .add_note(project.project.id, "Cliente pediu orçamento revisado", &h.actor)
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::minutes(5));
    h.service
        .add_note(project.project.id, "  Visita marcada  ", &h.actor)
        .await
        .unwrap();

    let notes = h.service.project_notes(project.project.id).await.unwrap();
    assert_eq!(notes.len(), 3);
    assert_eq!(notes[0].content, "Visita marcada");
    assert_eq!(notes[0].kind, NoteKind::Manual);
    assert!(notes[0].event.is_none());
    assert_eq!(notes[2].content, "Projeto iniciado.");

    assert_err!(h.service.add_note(project.project.id, "   ", &h.actor).await);
}

#[tokio::test]
async fn test_factory_part_request() {
    let h = harness(definition(&["1.1", "1.2"])).await;
    let project = h.project_with_rooms(&["Cozinha"]).await;
    let other = h.project_with_rooms(&["Quarto"]).await;
    let kitchen = Harness::room_id(&project, "Cozinha");

    let order = h
        .service
        .request_factory_part(project.project.id, kitchen, "Porta do armário riscada", &h.actor)
        .await
        .unwrap();
    assert_eq!(order.status, FactoryOrderStatus::Requested);
    assert_eq!(order.environment_name, "Cozinha");

    let orders = h.service.factory_orders(project.project.id).await.unwrap();
    assert_eq!(orders, vec![order]);
    let notes = h.service.project_notes(project.project.id).await.unwrap();
    assert_eq!(notes[0].content, "Peça solicitada para fábrica: Porta do armário riscada");

    // room of another project
    let quarto = Harness::room_id(&other, "Quarto");
    assert!(matches!(
        h.service
            .request_factory_part(project.project.id, quarto, "Puxador", &h.actor)
            .await,
        Err(WorkflowError::Validation { .. })
    ));
    assert!(h.store.list_factory_orders(other.project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_project_creation_validates_input() {
    let h = harness(definition(&["1.1", "1.2"])).await;
    let client = fluxo_erp::model::NewClient {
        name: "Ana".into(),
        ..Default::default()
    };

    assert_err!(
        h.service
            .create_project(client.clone(), vec![], "Carlos", &h.actor)
            .await
    );
    assert_err!(
        h.service
            .create_project(client, vec![fixtures::room("Sala", -1.0)], "Carlos", &h.actor)
            .await
    );
    assert!(h.service.projects().await.unwrap().is_empty());
}
