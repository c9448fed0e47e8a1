use anyhow::Result;
use std::path::PathBuf;

use super::print_json;
use crate::config::FluxoConfig;

pub struct ConfigCommand {
    pub write: Option<PathBuf>,
    pub json: bool,
}

impl ConfigCommand {
    pub fn new(write: Option<PathBuf>, json: bool) -> Self {
        Self { write, json }
    }

    pub fn execute(&self, config: &FluxoConfig) -> Result<()> {
        if let Some(path) = &self.write {
            config.save_to_file(path)?;
            println!("💾 Configuration written to {}", path.display());
            return Ok(());
        }
        if self.json {
            return print_json(config);
        }
        print!("{}", toml::to_string_pretty(config)?);
        Ok(())
    }
}
