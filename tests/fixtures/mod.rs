//! Shared harness: a service over an in-memory store with a controllable clock
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use fluxo_erp::model::{EnvironmentId, NewClient, NewEnvironment, UrgencyLevel};
use fluxo_erp::{
    Actor, FixedClock, InMemoryStore, ProjectView, ServiceOptions, Stage, WorkflowDefinition,
    WorkflowService, WorkflowStore,
};

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub service: WorkflowService,
    pub actor: Actor,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap()
}

/// Definition made of bare codes, one day of SLA each
pub fn definition(codes: &[&str]) -> WorkflowDefinition {
    WorkflowDefinition::new(
        codes
            .iter()
            .map(|code| Stage::new(code, &format!("Etapa {code}"), "Vendedor", 1))
            .collect(),
    )
    .unwrap()
}

pub async fn harness(definition: WorkflowDefinition) -> Harness {
    harness_with_options(definition, ServiceOptions::default()).await
}

pub async fn harness_with_options(
    definition: WorkflowDefinition,
    options: ServiceOptions,
) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    store.save_definition(&definition).await.unwrap();
    let clock = Arc::new(FixedClock::new(start_time()));
    let service = WorkflowService::load(store.clone(), options)
        .await
        .unwrap()
        .with_clock(clock.clone());
    Harness {
        store,
        clock,
        service,
        actor: Actor::new("u-otton", "Otton"),
    }
}

pub fn room(name: &str, area: f64) -> NewEnvironment {
    NewEnvironment {
        name: name.to_string(),
        area_sqm: area,
        urgency_level: UrgencyLevel::Normal,
        estimated_value: 0.0,
        observations: String::new(),
    }
}

impl Harness {
    pub async fn project_with_rooms(&self, rooms: &[&str]) -> ProjectView {
        let client = NewClient {
            name: "Ana Souza".into(),
            ..Default::default()
        };
        let rooms = rooms.iter().map(|name| room(name, 10.0)).collect();
        self.service
            .create_project(client, rooms, "Carlos", &self.actor)
            .await
            .unwrap()
    }

    /// Room ids in creation order, by name
    pub fn room_id(view: &ProjectView, name: &str) -> EnvironmentId {
        view.environments
            .iter()
            .find(|env| env.name == name)
            .map(|env| env.id)
            .unwrap()
    }
}
