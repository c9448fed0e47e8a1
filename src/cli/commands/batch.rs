use anyhow::Result;

use super::board::print_batch;
use super::{print_json, with_service};
use crate::config::FluxoConfig;
use crate::errors::WorkflowError;
use crate::model::{BatchId, EnvironmentId};

pub struct AdvanceCommand {
    pub batch: BatchId,
    pub json: bool,
}

impl AdvanceCommand {
    pub fn new(batch: BatchId, json: bool) -> Self {
        Self { batch, json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (batch_id, json) = (self.batch, self.json);
        with_service(config, |service, actor| async move {
            match service.advance_batch(batch_id, &actor).await {
                Ok(view) => {
                    if json {
                        return print_json(&view);
                    }
                    println!("➡️  Batch advanced to {} {}", view.stage_code, view.stage_name);
                    print_batch(&view);
                    Ok(())
                }
                Err(WorkflowError::AlreadyTerminal { stage_code, .. }) => {
                    // the terminal stage finishes the owning project
                    let batch = service
                        .store()
                        .load_batch_with_members(batch_id)
                        .await?
                        .ok_or_else(|| WorkflowError::not_found("batch", batch_id))?;
                    let project = service.complete_project(batch.project_id, &actor).await?;
                    if json {
                        return print_json(&project);
                    }
                    println!("🏁 Batch is already at the last stage ({stage_code})");
                    println!("   Project {} is now {}", project.name, project.status);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

pub struct SplitCommand {
    pub batch: BatchId,
    pub environments: Vec<EnvironmentId>,
    pub json: bool,
}

impl SplitCommand {
    pub fn new(batch: BatchId, environments: Vec<EnvironmentId>, json: bool) -> Self {
        Self {
            batch,
            environments,
            json,
        }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (batch_id, json) = (self.batch, self.json);
        let selection = self.environments.clone();
        with_service(config, |service, actor| async move {
            let view = service.split_batch(batch_id, &selection, &actor).await?;
            if json {
                return print_json(&view);
            }
            println!(
                "✂️  {} environments moved to a new batch at {}",
                view.new_batch.environment_count, view.new_batch.stage_code
            );
            print_batch(&view.new_batch);
            match &view.remainder {
                Some(remainder) => print_batch(remainder),
                None => println!("   Original batch {} was emptied and removed", view.original_batch_id),
            }
            Ok(())
        })
        .await
    }
}
