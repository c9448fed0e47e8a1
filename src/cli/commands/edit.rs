use anyhow::Result;

use super::{print_json, with_service};
use crate::cli::{ClientFields, EnvironmentFields};
use crate::config::FluxoConfig;
use crate::model::{EnvironmentId, ProjectId};
use crate::patch::{ClientPatch, EnvironmentPatch};

impl From<&ClientFields> for ClientPatch {
    fn from(fields: &ClientFields) -> Self {
        Self {
            name: fields.name.clone(),
            phone: fields.phone.clone(),
            email: fields.email.clone(),
            address: fields.address.clone(),
            cpf: fields.cpf.clone(),
            origin: fields.origin.clone(),
            store_unit: fields.store_unit.clone(),
            salesperson: fields.salesperson.clone(),
            property_type: fields.property_type.clone(),
            move_in_date: fields.move_in_date.clone(),
            budget_expectation: fields.budget,
        }
    }
}

impl From<&EnvironmentFields> for EnvironmentPatch {
    fn from(fields: &EnvironmentFields) -> Self {
        Self {
            name: fields.name.clone(),
            area_sqm: fields.area,
            urgency_level: fields.urgency,
            estimated_value: fields.value,
            observations: fields.observations.clone(),
            status: fields.status,
        }
    }
}

pub struct ClientCommand {
    pub project: ProjectId,
    pub patch: ClientPatch,
    pub json: bool,
}

impl ClientCommand {
    pub fn new(project: ProjectId, fields: &ClientFields, json: bool) -> Self {
        Self {
            project,
            patch: fields.into(),
            json,
        }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (project_id, json) = (self.project, self.json);
        let patch = self.patch.clone();
        with_service(config, |service, actor| async move {
            let client = service.update_client(project_id, patch, &actor).await?;
            if json {
                return print_json(&client);
            }
            println!("👤 Client {} updated", client.name);
            Ok(())
        })
        .await
    }
}

pub struct EnvironmentCommand {
    pub environment: EnvironmentId,
    pub patch: EnvironmentPatch,
    pub json: bool,
}

impl EnvironmentCommand {
    pub fn new(environment: EnvironmentId, fields: &EnvironmentFields, json: bool) -> Self {
        Self {
            environment,
            patch: fields.into(),
            json,
        }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (environment_id, json) = (self.environment, self.json);
        let patch = self.patch.clone();
        with_service(config, |service, actor| async move {
            let environment = service
                .update_environment(environment_id, patch, &actor)
                .await?;
            if json {
                return print_json(&environment);
            }
            println!("🚪 Environment {} updated", environment.name);
            Ok(())
        })
        .await
    }
}

pub struct FactoryPartCommand {
    pub project: ProjectId,
    pub environment: EnvironmentId,
    pub description: String,
    pub json: bool,
}

impl FactoryPartCommand {
    pub fn new(
        project: ProjectId,
        environment: EnvironmentId,
        description: String,
        json: bool,
    ) -> Self {
        Self {
            project,
            environment,
            description,
            json,
        }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (project_id, environment_id, json) = (self.project, self.environment, self.json);
        let description = self.description.clone();
        with_service(config, |service, actor| async move {
            let order = service
                .request_factory_part(project_id, environment_id, &description, &actor)
                .await?;
            if json {
                return print_json(&order);
            }
            println!(
                "🏭 Part requested for {}: {}",
                order.environment_name, order.part_description
            );
            Ok(())
        })
        .await
    }
}
