use anyhow::Result;

use super::{print_json, with_service};
use crate::config::FluxoConfig;

pub struct StagesCommand {
    pub json: bool,
}

impl StagesCommand {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let json = self.json;
        with_service(config, |service, _actor| async move {
            let definition = service.definition().await;
            if json {
                return print_json(&definition.stages());
            }

            let mut category = "";
            for stage in definition.stages() {
                if stage.category != category {
                    category = &stage.category;
                    println!();
                    println!("📂 {category}");
                }
                println!(
                    "   {:<6} {:<28} {:<18} SLA {}d",
                    stage.code, stage.name, stage.owner_role, stage.sla_days
                );
            }
            Ok(())
        })
        .await
    }
}

pub struct SlaCommand {
    pub code: String,
    pub days: u32,
    pub json: bool,
}

impl SlaCommand {
    pub fn new(code: String, days: u32, json: bool) -> Self {
        Self { code, days, json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (code, days, json) = (self.code.clone(), self.days, self.json);
        with_service(config, |service, _actor| async move {
            let stage = service.update_stage_sla(&code, days).await?;
            if json {
                return print_json(&stage);
            }
            println!("⏱️  {} {} now has an SLA of {} days", stage.code, stage.name, stage.sla_days);
            Ok(())
        })
        .await
    }
}
