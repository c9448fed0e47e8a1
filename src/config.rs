use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bootstrap::AdminSpec;
use crate::identity::Actor;
use crate::service::ServiceOptions;
use crate::workflow::{DEFAULT_INITIAL_BATCH_NAME, DEFAULT_REENTRY_STAGE};

/// Main configuration structure for Fluxo
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FluxoConfig {
    /// Workflow tunables
    pub workflow: WorkflowConfig,
    /// File-backed store settings
    pub storage: StorageConfig,
    /// Database settings (optional, takes precedence over the snapshot file)
    pub database: Option<DatabaseConfig>,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Who the CLI acts as
    pub identity: IdentityConfig,
    /// Admin user created by `fluxo init`
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Stage where split-off environments restart
    pub reentry_stage: String,
    /// Name of the batch created with each project
    pub initial_batch_name: String,
    /// TOML stage catalog replacing the built-in one
    pub catalog_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// JSON snapshot used when no database is configured
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON lines instead of compact text
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdentityConfig {
    pub actor_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    pub role: String,
}

impl Default for FluxoConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig {
                reentry_stage: DEFAULT_REENTRY_STAGE.to_string(),
                initial_batch_name: DEFAULT_INITIAL_BATCH_NAME.to_string(),
                catalog_file: None,
            },
            storage: StorageConfig {
                snapshot_path: PathBuf::from(".fluxo/store.json"),
            },
            database: None,
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            identity: IdentityConfig {
                actor_id: "admin".to_string(),
                display_name: "Administrador".to_string(),
            },
            admin: AdminConfig {
                name: "Administrador".to_string(),
                email: "admin@fluxo.local".to_string(),
                role: "Administrador".to_string(),
            },
        }
    }
}

impl FluxoConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (fluxo.toml, .fluxo-rc)
    /// 3. Environment variables (prefixed with FLUXO_, nested with __)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`FluxoConfig::load`] with config files looked up in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_file = dir.join("fluxo.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".fluxo-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("FLUXO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            reentry_stage: self.workflow.reentry_stage.clone(),
            initial_batch_name: self.workflow.initial_batch_name.clone(),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(&self.identity.actor_id, &self.identity.display_name)
    }

    pub fn admin_spec(&self) -> AdminSpec {
        AdminSpec {
            name: self.admin.name.clone(),
            email: self.admin.email.clone(),
            role: self.admin.role.clone(),
        }
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<FluxoConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = FluxoConfig::load_env_file();
        FluxoConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static FluxoConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fluxo-config-{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = scratch_dir("defaults");
        let config = FluxoConfig::load_from(&dir).unwrap();
        assert_eq!(config.workflow.reentry_stage, "4.1");
        assert_eq!(config.workflow.initial_batch_name, "Projeto Completo");
        assert!(config.database.is_none());
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = scratch_dir("toml");
        std::fs::write(
            dir.join("fluxo.toml"),
            "[workflow]\nreentry_stage = \"4.3\"\n\n[observability]\njson_logs = true\n",
        )
        .unwrap();
        let config = FluxoConfig::load_from(&dir).unwrap();
        assert_eq!(config.workflow.reentry_stage, "4.3");
        assert!(config.observability.json_logs);
        assert_eq!(config.identity.actor_id, "admin");
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = scratch_dir("save");
        let mut original = FluxoConfig::default();
        original.identity.display_name = "Otton".into();
        original.save_to_file(dir.join("fluxo.toml")).unwrap();
        let loaded = FluxoConfig::load_from(&dir).unwrap();
        assert_eq!(loaded.identity.display_name, "Otton");
        assert_eq!(loaded.service_options(), original.service_options());
    }
}
