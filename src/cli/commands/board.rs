use anyhow::Result;

use super::{print_json, with_service};
use crate::config::FluxoConfig;
use crate::model::ProjectId;
use crate::service::BatchView;

pub struct BoardCommand {
    pub project: Option<ProjectId>,
    pub json: bool,
}

impl BoardCommand {
    pub fn new(project: Option<ProjectId>, json: bool) -> Self {
        Self { project, json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (project, json) = (self.project, self.json);
        with_service(config, |service, _actor| async move {
            let views = service.board(project).await?;
            if json {
                return print_json(&views);
            }
            if views.is_empty() {
                println!("📋 No batches yet");
                println!("   💡 Create one with: fluxo project create --client <name> --seller <name> --env Sala:20");
                return Ok(());
            }
            for view in &views {
                print_batch(view);
            }
            Ok(())
        })
        .await
    }
}

pub(crate) fn print_batch(view: &BatchView) {
    let sla = if view.is_overdue() {
        format!("🔴 {} days late", -view.days_left)
    } else {
        format!("🟢 {} days left", view.days_left)
    };
    println!(
        "📦 {} / {} [{}]",
        view.project_name, view.batch_name, view.batch_id
    );
    println!(
        "   Stage {} {} ({}), {} days in stage, {}",
        view.stage_code, view.stage_name, view.owner_role, view.days_in_stage, sla
    );
    let urgency = view
        .highest_urgency
        .map(|u| u.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "   {} environments, {:.1} m², urgency {}",
        view.environment_count, view.total_area, urgency
    );
}
