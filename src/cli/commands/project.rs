use anyhow::{anyhow, Result};
use serde::Serialize;

use super::board::print_batch;
use super::{print_json, with_service};
use crate::config::FluxoConfig;
use crate::model::{FactoryOrder, NewClient, NewEnvironment, ProjectId};
use crate::service::ProjectView;

#[derive(Serialize)]
struct ProjectDetails<'a> {
    project: &'a ProjectView,
    factory_orders: &'a [FactoryOrder],
}

pub struct CreateProjectCommand {
    pub client: NewClient,
    pub seller: String,
    pub environments: Vec<String>,
    pub json: bool,
}

impl CreateProjectCommand {
    pub fn new(client: NewClient, seller: String, environments: Vec<String>, json: bool) -> Self {
        Self {
            client,
            seller,
            environments,
            json,
        }
    }

    fn parse_environments(&self) -> Result<Vec<NewEnvironment>> {
        self.environments
            .iter()
            .map(|spec| {
                NewEnvironment::parse_spec(spec)
                    .ok_or_else(|| anyhow!("invalid environment {spec:?}, expected name:area[:urgency[:value]]"))
            })
            .collect()
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let environments = self.parse_environments()?;
        let client = self.client.clone();
        let seller = self.seller.clone();
        let json = self.json;

        with_service(config, |service, actor| async move {
            let view = service
                .create_project(client, environments, &seller, &actor)
                .await?;
            if json {
                return print_json(&view);
            }
            println!("🆕 {} created [{}]", view.project.name, view.project.id);
            for env in &view.environments {
                println!("   🚪 {} ({} m²) [{}]", env.name, env.area_sqm, env.id);
            }
            for batch in &view.batches {
                print_batch(batch);
            }
            Ok(())
        })
        .await
    }
}

pub struct ShowProjectCommand {
    pub project: ProjectId,
    pub json: bool,
}

impl ShowProjectCommand {
    pub fn new(project: ProjectId, json: bool) -> Self {
        Self { project, json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (project_id, json) = (self.project, self.json);
        with_service(config, |service, _actor| async move {
            let view = service.project(project_id).await?;
            let orders = service.factory_orders(project_id).await?;
            if json {
                return print_json(&ProjectDetails {
                    project: &view,
                    factory_orders: &orders,
                });
            }

            println!("📁 {} [{}] - {}", view.project.name, view.project.id, view.project.status);
            println!("   Client: {} {} {}", view.client.name, view.client.phone, view.client.email);
            println!("   Seller: {}", view.project.seller_name);
            for env in &view.environments {
                println!(
                    "   🚪 {} ({} m², {}, {:?}) [{}]",
                    env.name, env.area_sqm, env.urgency_level, env.status, env.id
                );
            }
            for batch in &view.batches {
                print_batch(batch);
            }
            for order in &orders {
                println!(
                    "   🏭 {}: {} ({:?})",
                    order.environment_name, order.part_description, order.status
                );
            }
            Ok(())
        })
        .await
    }
}

pub struct ListProjectsCommand {
    pub json: bool,
}

impl ListProjectsCommand {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let json = self.json;
        with_service(config, |service, _actor| async move {
            let projects = service.projects().await?;
            if json {
                return print_json(&projects);
            }
            if projects.is_empty() {
                println!("📋 No projects yet");
            }
            for project in &projects {
                println!(
                    "📁 {} [{}] {} - {}",
                    project.name,
                    project.id,
                    project.status,
                    project.created_at.format("%d/%m/%Y")
                );
            }
            Ok(())
        })
        .await
    }
}
