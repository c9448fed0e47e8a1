// Idempotent startup seeding: workflow definition and the first admin user

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::WorkflowError;
use crate::model::{User, UserId};
use crate::store::{Changeset, Mutation, WorkflowStore};
use crate::workflow::WorkflowDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSpec {
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionChange {
    /// Nothing was stored before
    Created,
    Unchanged,
    /// Same order, new names or SLAs
    MetadataRefreshed,
    /// Different order accepted because no batch exists yet
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub definition: DefinitionChange,
    pub stage_count: usize,
    pub admin_created: bool,
}

/// Seeds the store. Safe to run on every start.
///
/// A definition whose order differs from the stored one is only accepted
/// while no batch exists; otherwise existing stage pointers could change
/// meaning, so it fails with `DefinitionConflict`.
pub async fn initialize(
    store: &dyn WorkflowStore,
    definition: &WorkflowDefinition,
    admin: Option<&AdminSpec>,
) -> Result<BootstrapReport, WorkflowError> {
    let change = match store.load_definition().await? {
        None => {
            store.save_definition(definition).await?;
            DefinitionChange::Created
        }
        Some(existing) if existing == *definition => DefinitionChange::Unchanged,
        Some(existing) if existing.same_order(definition) => {
            store.save_definition(definition).await?;
            DefinitionChange::MetadataRefreshed
        }
        Some(existing) => {
            let batches = store.count_batches().await?;
            if batches > 0 {
                let missing: Vec<&str> = existing
                    .codes()
                    .filter(|code| !definition.contains(code))
                    .collect();
                let reason = if missing.is_empty() {
                    format!("stages were reordered while {batches} batches exist")
                } else {
                    format!(
                        "stages {} would be removed while {batches} batches exist",
                        missing.join(", ")
                    )
                };
                return Err(WorkflowError::DefinitionConflict { reason });
            }
            store.save_definition(definition).await?;
            DefinitionChange::Replaced
        }
    };

    let admin_created = match admin {
        Some(admin) => ensure_admin(store, admin).await?,
        None => false,
    };

    info!(
        definition = ?change,
        stages = definition.len(),
        admin_created,
        "Store initialized"
    );

    Ok(BootstrapReport {
        definition: change,
        stage_count: definition.len(),
        admin_created,
    })
}

async fn ensure_admin(store: &dyn WorkflowStore, admin: &AdminSpec) -> Result<bool, WorkflowError> {
    let email = admin.email.trim();
    if !email.contains('@') {
        return Err(WorkflowError::validation(format!(
            "invalid admin email: {email:?}"
        )));
    }
    if admin.name.trim().is_empty() {
        return Err(WorkflowError::validation("admin name cannot be empty"));
    }
    if store.find_user_by_email(email).await?.is_some() {
        return Ok(false);
    }

    let user = User {
        id: UserId::new(),
        name: admin.name.trim().to_string(),
        email: email.to_string(),
        role: admin.role.clone(),
        is_system_user: false,
    };
    store
        .commit(Changeset::new().with(Mutation::InsertUser(user)))
        .await?;
    Ok(true)
}
