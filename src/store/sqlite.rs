use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use tracing::{debug, info};

use super::{Changeset, Mutation, StoreError, WorkflowStore};
use crate::audit::AuditNote;
use crate::model::{
    BatchId, Client, ClientId, Environment, EnvironmentId, FactoryOrder, Project, ProjectId,
    ProjectStatus, User,
};
use crate::workflow::{Batch, Stage, WorkflowDefinition};

/// SQLite-backed store. Each changeset runs in a single transaction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn corrupt(reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        reason: reason.into(),
    }
}

fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| corrupt(format!("invalid {entity} id {raw:?}")))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("invalid timestamp {raw:?}: {e}")))
}

fn encode_enum<T: Serialize>(value: &T) -> Result<String, StoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(corrupt(format!("expected string enum, got {other}"))),
    }
}

fn decode_enum<T: DeserializeOwned>(raw: String) -> Result<T, StoreError> {
    Ok(serde_json::from_value(serde_json::Value::String(raw))?)
}

fn stage_from_row(row: &SqliteRow) -> Result<Stage, StoreError> {
    let phase: i64 = row.try_get("phase")?;
    let sla_days: i64 = row.try_get("sla_days")?;
    Ok(Stage {
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        phase: u8::try_from(phase).map_err(|_| corrupt(format!("phase out of range: {phase}")))?,
        owner_role: row.try_get("owner_role")?,
        sla_days: u32::try_from(sla_days)
            .map_err(|_| corrupt(format!("sla_days out of range: {sla_days}")))?,
    })
}

fn client_from_row(row: &SqliteRow) -> Result<Client, StoreError> {
    let id: String = row.try_get("id")?;
    Ok(Client {
        id: parse_id(&id, "client")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        cpf: row.try_get("cpf")?,
        origin: row.try_get("origin")?,
        store_unit: row.try_get("store_unit")?,
        salesperson: row.try_get("salesperson")?,
        property_type: row.try_get("property_type")?,
        move_in_date: row.try_get("move_in_date")?,
        budget_expectation: row.try_get("budget_expectation")?,
    })
}

fn project_from_row(row: &SqliteRow) -> Result<Project, StoreError> {
    let id: String = row.try_get("id")?;
    let client_id: String = row.try_get("client_id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Project {
        id: parse_id(&id, "project")?,
        client_id: parse_id(&client_id, "client")?,
        name: row.try_get("name")?,
        seller_name: row.try_get("seller_name")?,
        status: ProjectStatus::parse(&status)
            .ok_or_else(|| corrupt(format!("unknown project status {status:?}")))?,
        created_at: parse_time(&created_at)?,
    })
}

fn environment_from_row(row: &SqliteRow) -> Result<Environment, StoreError> {
    let id: String = row.try_get("id")?;
    let project_id: String = row.try_get("project_id")?;
    let batch_id: Option<String> = row.try_get("batch_id")?;
    Ok(Environment {
        id: parse_id(&id, "environment")?,
        project_id: parse_id(&project_id, "project")?,
        name: row.try_get("name")?,
        area_sqm: row.try_get("area_sqm")?,
        urgency_level: decode_enum(row.try_get("urgency_level")?)?,
        estimated_value: row.try_get("estimated_value")?,
        observations: row.try_get("observations")?,
        status: decode_enum(row.try_get("status")?)?,
        batch_id: batch_id.map(|raw| parse_id(&raw, "batch")).transpose()?,
    })
}

fn batch_from_row(row: &SqliteRow, members: BTreeSet<EnvironmentId>) -> Result<Batch, StoreError> {
    let id: String = row.try_get("id")?;
    let project_id: String = row.try_get("project_id")?;
    let created_at: String = row.try_get("created_at")?;
    let last_updated: String = row.try_get("last_updated")?;
    let version: i64 = row.try_get("version")?;
    Ok(Batch {
        id: parse_id(&id, "batch")?,
        project_id: parse_id(&project_id, "project")?,
        name: row.try_get("name")?,
        current_stage_code: row.try_get("current_stage_code")?,
        created_at: parse_time(&created_at)?,
        last_updated: parse_time(&last_updated)?,
        members,
        version: u64::try_from(version).map_err(|_| corrupt("negative batch version"))?,
    })
}

fn note_from_row(row: &SqliteRow) -> Result<AuditNote, StoreError> {
    let id: String = row.try_get("id")?;
    let project_id: String = row.try_get("project_id")?;
    let created_at: String = row.try_get("created_at")?;
    let event: Option<String> = row.try_get("event")?;
    Ok(AuditNote {
        id: parse_id(&id, "note")?,
        project_id: parse_id(&project_id, "project")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        kind: decode_enum(row.try_get("kind")?)?,
        created_at: parse_time(&created_at)?,
        event: event.map(|raw| serde_json::from_str(&raw)).transpose()?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let id: String = row.try_get("id")?;
    let is_system_user: i64 = row.try_get("is_system_user")?;
    Ok(User {
        id: parse_id(&id, "user")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: row.try_get("role")?,
        is_system_user: is_system_user != 0,
    })
}

fn factory_order_from_row(row: &SqliteRow) -> Result<FactoryOrder, StoreError> {
    let id: String = row.try_get("id")?;
    let project_id: String = row.try_get("project_id")?;
    let environment_id: String = row.try_get("environment_id")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(FactoryOrder {
        id: parse_id(&id, "factory order")?,
        project_id: parse_id(&project_id, "project")?,
        environment_id: parse_id(&environment_id, "environment")?,
        environment_name: row.try_get("environment_name")?,
        part_description: row.try_get("part_description")?,
        status: decode_enum(row.try_get("status")?)?,
        created_at: parse_time(&created_at)?,
    })
}

/// Maps a primary key collision to the same conflict the in-memory store reports
fn unique_conflict(error: sqlx::Error, entity: &'static str, id: impl ToString) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::conflict(entity, id, "already exists")
        }
        _ => error.into(),
    }
}

async fn members_of(
    conn: &mut SqliteConnection,
    batch_id: &str,
) -> Result<BTreeSet<EnvironmentId>, StoreError> {
    let rows = sqlx::query("SELECT id FROM environments WHERE batch_id = ?1")
        .bind(batch_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            parse_id::<EnvironmentId>(&id, "environment")
        })
        .collect()
}

async fn batch_version(conn: &mut SqliteConnection, batch_id: BatchId) -> Result<u64, StoreError> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM batches WHERE id = ?1")
        .bind(batch_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    let version = version.ok_or_else(|| StoreError::missing("batch", batch_id))?;
    u64::try_from(version).map_err(|_| corrupt("negative batch version"))
}

async fn check_version(
    conn: &mut SqliteConnection,
    batch_id: BatchId,
    expected: u64,
) -> Result<(), StoreError> {
    let found = batch_version(conn, batch_id).await?;
    if found != expected {
        return Err(StoreError::conflict(
            "batch",
            batch_id,
            format!("expected version {expected}, found {found}"),
        ));
    }
    Ok(())
}

async fn insert_environment(
    conn: &mut SqliteConnection,
    environment: &Environment,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO environments
            (id, project_id, name, area_sqm, urgency_level, estimated_value, observations, status, batch_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(environment.id.to_string())
    .bind(environment.project_id.to_string())
    .bind(&environment.name)
    .bind(environment.area_sqm)
    .bind(encode_enum(&environment.urgency_level)?)
    .bind(environment.estimated_value)
    .bind(&environment.observations)
    .bind(encode_enum(&environment.status)?)
    .bind(environment.batch_id.map(|id| id.to_string()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Editable fields only; ownership changes go through moves
async fn update_environment(
    conn: &mut SqliteConnection,
    environment: &Environment,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE environments
        SET name = ?2, area_sqm = ?3, urgency_level = ?4, estimated_value = ?5,
            observations = ?6, status = ?7
        WHERE id = ?1
        "#,
    )
    .bind(environment.id.to_string())
    .bind(&environment.name)
    .bind(environment.area_sqm)
    .bind(encode_enum(&environment.urgency_level)?)
    .bind(environment.estimated_value)
    .bind(&environment.observations)
    .bind(encode_enum(&environment.status)?)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::missing("environment", environment.id));
    }
    Ok(())
}

async fn apply(
    conn: &mut SqliteConnection,
    mutation: Mutation,
    touched: &mut HashSet<BatchId>,
) -> Result<(), StoreError> {
    match mutation {
        Mutation::InsertClient(client) => {
            sqlx::query(
                r#"
                INSERT INTO clients
                    (id, name, phone, email, address, cpf, origin, store_unit, salesperson,
                     property_type, move_in_date, budget_expectation)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(client.id.to_string())
            .bind(&client.name)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(&client.address)
            .bind(&client.cpf)
            .bind(&client.origin)
            .bind(&client.store_unit)
            .bind(&client.salesperson)
            .bind(&client.property_type)
            .bind(&client.move_in_date)
            .bind(client.budget_expectation)
            .execute(&mut *conn)
            .await
            .map_err(|e| unique_conflict(e, "client", client.id))?;
        }
        Mutation::UpdateClient(client) => {
            let result = sqlx::query(
                r#"
                UPDATE clients SET
                    name = ?2, phone = ?3, email = ?4, address = ?5, cpf = ?6, origin = ?7,
                    store_unit = ?8, salesperson = ?9, property_type = ?10, move_in_date = ?11,
                    budget_expectation = ?12
                WHERE id = ?1
                "#,
            )
            .bind(client.id.to_string())
            .bind(&client.name)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(&client.address)
            .bind(&client.cpf)
            .bind(&client.origin)
            .bind(&client.store_unit)
            .bind(&client.salesperson)
            .bind(&client.property_type)
            .bind(&client.move_in_date)
            .bind(client.budget_expectation)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::missing("client", client.id));
            }
        }
        Mutation::InsertProject(project) => {
            sqlx::query(
                r#"
                INSERT INTO projects (id, client_id, name, seller_name, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(project.id.to_string())
            .bind(project.client_id.to_string())
            .bind(&project.name)
            .bind(&project.seller_name)
            .bind(project.status.as_str())
            .bind(project.created_at.to_rfc3339())
            .execute(&mut *conn)
            .await?;
        }
        Mutation::SetProjectStatus { project_id, status } => {
            let stored: Option<String> = sqlx::query_scalar("SELECT status FROM projects WHERE id = ?1")
                .bind(project_id.to_string())
                .fetch_optional(&mut *conn)
                .await?;
            let stored = stored.ok_or_else(|| StoreError::missing("project", project_id))?;
            let stored = ProjectStatus::parse(&stored)
                .ok_or_else(|| corrupt(format!("unknown project status {stored:?}")))?;
            // status never moves backward
            if status.rank() > stored.rank() {
                sqlx::query("UPDATE projects SET status = ?2 WHERE id = ?1")
                    .bind(project_id.to_string())
                    .bind(status.as_str())
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Mutation::InsertEnvironment(environment) => {
            if let Some(batch_id) = environment.batch_id {
                touched.insert(batch_id);
            }
            insert_environment(conn, &environment).await?;
        }
        Mutation::UpdateEnvironment(environment) => {
            update_environment(conn, &environment).await?;
        }
        Mutation::MoveEnvironment {
            environment_id,
            from,
            to,
        } => {
            let result = sqlx::query(
                "UPDATE environments SET batch_id = ?3 WHERE id = ?1 AND batch_id = ?2",
            )
            .bind(environment_id.to_string())
            .bind(from.to_string())
            .bind(to.to_string())
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::conflict(
                    "environment",
                    environment_id,
                    format!("no longer owned by batch {from}"),
                ));
            }
            touched.insert(from);
            touched.insert(to);
        }
        Mutation::InsertBatch(batch) => {
            sqlx::query(
                r#"
                INSERT INTO batches (id, project_id, name, current_stage_code, created_at, last_updated, version)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(batch.id.to_string())
            .bind(batch.project_id.to_string())
            .bind(&batch.name)
            .bind(&batch.current_stage_code)
            .bind(batch.created_at.to_rfc3339())
            .bind(batch.last_updated.to_rfc3339())
            .bind(batch.version as i64)
            .execute(&mut *conn)
            .await?;
            touched.insert(batch.id);
        }
        Mutation::UpdateBatch {
            batch,
            expected_version,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE batches
                SET name = ?2, current_stage_code = ?3, last_updated = ?4, version = version + 1
                WHERE id = ?1 AND version = ?5
                "#,
            )
            .bind(batch.id.to_string())
            .bind(&batch.name)
            .bind(&batch.current_stage_code)
            .bind(batch.last_updated.to_rfc3339())
            .bind(expected_version as i64)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                // distinguishes a stale version from a missing row
                check_version(conn, batch.id, expected_version).await?;
                return Err(StoreError::missing("batch", batch.id));
            }
            touched.insert(batch.id);
        }
        Mutation::DeleteBatch {
            batch_id,
            expected_version,
        } => {
            check_version(conn, batch_id, expected_version).await?;
            if !members_of(conn, &batch_id.to_string()).await?.is_empty() {
                return Err(StoreError::conflict("batch", batch_id, "still has members"));
            }
            sqlx::query("DELETE FROM batches WHERE id = ?1")
                .bind(batch_id.to_string())
                .execute(&mut *conn)
                .await?;
            touched.remove(&batch_id);
        }
        Mutation::AppendNote(note) => {
            let event = note.event.as_ref().map(serde_json::to_string).transpose()?;
            sqlx::query(
                r#"
                INSERT INTO notes (id, project_id, content, author_id, author_name, kind, created_at, event)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(note.id.to_string())
            .bind(note.project_id.to_string())
            .bind(&note.content)
            .bind(&note.author_id)
            .bind(&note.author_name)
            .bind(encode_enum(&note.kind)?)
            .bind(note.created_at.to_rfc3339())
            .bind(event)
            .execute(&mut *conn)
            .await?;
        }
        Mutation::InsertFactoryOrder(order) => {
            sqlx::query(
                r#"
                INSERT INTO factory_orders
                    (id, project_id, environment_id, environment_name, part_description, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(order.id.to_string())
            .bind(order.project_id.to_string())
            .bind(order.environment_id.to_string())
            .bind(&order.environment_name)
            .bind(&order.part_description)
            .bind(encode_enum(&order.status)?)
            .bind(order.created_at.to_rfc3339())
            .execute(&mut *conn)
            .await?;
        }
        Mutation::InsertUser(user) => {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, email, role, is_system_user)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(user.id.to_string())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.role)
            .bind(user.is_system_user as i64)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

impl SqliteStore {
    /// Opens (creating if needed) the database and optionally runs migrations
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        let store = Self { pool };

        if auto_migrate {
            store.migrate().await?;
        }
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn load_definition(&self) -> Result<Option<WorkflowDefinition>, StoreError> {
        let rows = sqlx::query(
            "SELECT code, name, category, phase, owner_role, sla_days FROM workflow_stages ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let stages = rows.iter().map(stage_from_row).collect::<Result<Vec<_>, _>>()?;
        WorkflowDefinition::new(stages)
            .map(Some)
            .map_err(|e| corrupt(format!("stored workflow definition is invalid: {e}")))
    }

    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM workflow_stages")
            .execute(&mut *tx)
            .await?;
        for (position, stage) in definition.stages().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO workflow_stages (position, code, name, category, phase, owner_role, sla_days)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(position as i64)
            .bind(&stage.code)
            .bind(&stage.name)
            .bind(&stage.category)
            .bind(stage.phase as i64)
            .bind(&stage.owner_role)
            .bind(stage.sla_days as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(stages = definition.len(), "Workflow definition saved");
        Ok(())
    }

    async fn load_batch_with_members(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query("SELECT * FROM batches WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => {
                let members = members_of(&mut *conn, &id.to_string()).await?;
                batch_from_row(&row, members).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_batches(&self, project: Option<ProjectId>) -> Result<Vec<Batch>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            r#"
            SELECT * FROM batches
            WHERE ?1 IS NULL OR project_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(project.map(|p| p.to_string()))
        .fetch_all(&mut *conn)
        .await?;

        let mut batches = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id")?;
            let members = members_of(&mut *conn, &id).await?;
            batches.push(batch_from_row(row, members)?);
        }
        Ok(batches)
    }

    async fn count_batches(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM batches")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn load_environment(&self, id: EnvironmentId) -> Result<Option<Environment>, StoreError> {
        sqlx::query("SELECT * FROM environments WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(environment_from_row)
            .transpose()
    }

    async fn list_environments(&self, project: ProjectId) -> Result<Vec<Environment>, StoreError> {
        sqlx::query("SELECT * FROM environments WHERE project_id = ?1 ORDER BY rowid")
            .bind(project.to_string())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(environment_from_row)
            .collect()
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        sqlx::query("SELECT * FROM projects WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(project_from_row)
            .transpose()
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        sqlx::query("SELECT * FROM projects ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(project_from_row)
            .collect()
    }

    async fn load_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        sqlx::query("SELECT * FROM clients WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(client_from_row)
            .transpose()
    }

    async fn list_notes(&self, project: ProjectId) -> Result<Vec<AuditNote>, StoreError> {
        sqlx::query("SELECT * FROM notes WHERE project_id = ?1 ORDER BY rowid")
            .bind(project.to_string())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(note_from_row)
            .collect()
    }

    async fn list_factory_orders(&self, project: ProjectId) -> Result<Vec<FactoryOrder>, StoreError> {
        sqlx::query("SELECT * FROM factory_orders WHERE project_id = ?1 ORDER BY created_at")
            .bind(project.to_string())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(factory_order_from_row)
            .collect()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query("SELECT * FROM users WHERE email = ?1 COLLATE NOCASE")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        let count = changeset.len();
        let mut tx = self.pool.begin().await?;
        let mut touched = HashSet::new();

        for mutation in changeset.into_mutations() {
            let label = mutation.label();
            if let Err(e) = apply(&mut *tx, mutation, &mut touched).await {
                debug!(mutation = label, error = %e, "Changeset rejected, rolling back");
                return Err(e);
            }
        }

        for batch_id in touched {
            let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM batches WHERE id = ?1")
                .bind(batch_id.to_string())
                .fetch_one(&mut *tx)
                .await?
                > 0;
            if exists && members_of(&mut *tx, &batch_id.to_string()).await?.is_empty() {
                return Err(StoreError::conflict(
                    "batch",
                    batch_id,
                    "commit would leave the batch without members",
                ));
            }
        }

        tx.commit().await?;
        debug!(mutations = count, "Changeset committed");
        Ok(())
    }
}
