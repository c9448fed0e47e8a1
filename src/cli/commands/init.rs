use anyhow::Result;

use super::{load_definition, print_json, with_store};
use crate::bootstrap::{initialize, DefinitionChange};
use crate::config::FluxoConfig;

pub struct InitCommand {
    pub json: bool,
}

impl InitCommand {
    pub fn new() -> Self {
        Self { json: false }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let definition = load_definition(config)?;
        let admin = config.admin_spec();

        let report = with_store(config, |store| async move {
            Ok(initialize(store.as_ref(), &definition, Some(&admin)).await?)
        })
        .await?;

        if self.json {
            return print_json(&report);
        }

        let outcome = match report.definition {
            DefinitionChange::Created => "created",
            DefinitionChange::Unchanged => "already up to date",
            DefinitionChange::MetadataRefreshed => "metadata refreshed",
            DefinitionChange::Replaced => "replaced",
        };
        println!("✅ Workflow definition {outcome} ({} stages)", report.stage_count);
        if report.admin_created {
            println!("👤 Admin user {} created", config.admin.email);
        }
        Ok(())
    }
}

impl Default for InitCommand {
    fn default() -> Self {
        Self::new()
    }
}
