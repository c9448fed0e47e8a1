use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::debug;

use crate::config::FluxoConfig;
use crate::identity::{ConfiguredIdentity, IdentityProvider};
use crate::service::WorkflowService;
use crate::store::{InMemoryStore, WorkflowStore};
use crate::workflow::{default_definition, StageCatalogFile, WorkflowDefinition};

pub mod batch;
pub mod board;
pub mod config;
pub mod edit;
pub mod init;
pub mod notes;
pub mod project;
pub mod stages;

pub use batch::{AdvanceCommand, SplitCommand};
pub use board::BoardCommand;
pub use config::ConfigCommand;
pub use edit::{ClientCommand, EnvironmentCommand, FactoryPartCommand};
pub use init::InitCommand;
pub use notes::{HistoryCommand, NoteCommand, NotesCommand};
pub use project::{CreateProjectCommand, ListProjectsCommand, ShowProjectCommand};
pub use stages::{SlaCommand, StagesCommand};

/// Stage catalog from the configured TOML file, or the built-in one
pub fn load_definition(config: &FluxoConfig) -> Result<WorkflowDefinition> {
    match &config.workflow.catalog_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading stage catalog {}", path.display()))?;
            StageCatalogFile::parse(&content)
        }
        None => Ok(default_definition()?),
    }
}

pub async fn open_store(config: &FluxoConfig) -> Result<Arc<dyn WorkflowStore>> {
    #[cfg(feature = "database")]
    if let Some(database) = &config.database {
        let store = crate::store::SqliteStore::connect(
            &database.url,
            database.max_connections,
            database.auto_migrate,
        )
        .await?;
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "database"))]
    if config.database.is_some() {
        tracing::warn!("Database configured but this build lacks the `database` feature; using the snapshot file");
    }

    let store = InMemoryStore::open(&config.storage.snapshot_path).await?;
    Ok(Arc::new(store))
}

/// Runs `f` with an exclusive lock on the store so concurrent CLI
/// invocations never interleave their read-modify-write cycles.
pub async fn with_store<F, Fut, R>(config: &FluxoConfig, f: F) -> Result<R>
where
    F: FnOnce(Arc<dyn WorkflowStore>) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let lock_path = config.storage.snapshot_path.with_extension("lock");
    if let Some(parent) = lock_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("opening lock file {}", lock_path.display()))?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock.write().context("acquiring store lock")?;
    debug!("Store lock acquired at {}", lock_path.display());

    let store = open_store(config).await?;
    f(store).await
}

/// Like [`with_store`] but hands over a ready service and the configured actor
pub async fn with_service<F, Fut, R>(config: &FluxoConfig, f: F) -> Result<R>
where
    F: FnOnce(WorkflowService, crate::identity::Actor) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let actor = ConfiguredIdentity::new(config.actor()).current_actor();
    let options = config.service_options();
    with_store(config, |store| async move {
        let service = WorkflowService::load(store, options)
            .await
            .context("workflow not initialized; run 'fluxo init' first")?;
        f(service, actor).await
    })
    .await
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
