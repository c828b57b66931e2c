/// SQLite implementation of the store traits
///
/// One database file holds every tenant; isolation is by `user_id` on
/// workflows and by `workflow_id` on everything below them. Foreign keys are
/// switched on for every connection so deleting a workflow cascades to its
/// triggers, actions, runs and run logs.

use crate::auth::types::{User, UserRecord};
use crate::store::{Pinger, RunQueue, StoreError, UserStore, WorkflowStore};
use crate::workflow::types::{
    Action, NewRunLog, RunLog, RunStatus, Trigger, Workflow, WorkflowRun,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workflows (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        is_enabled INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS triggers (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
        trigger_type TEXT NOT NULL,
        config BLOB NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS actions (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
        action_type TEXT NOT NULL,
        position INTEGER NOT NULL,
        config BLOB NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workflow_runs (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
        status TEXT NOT NULL CHECK (status IN ('pending', 'running', 'success', 'failed')),
        trigger_type TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    // action_id is a snapshot, not a foreign key: logs outlive edited actions
    r#"
    CREATE TABLE IF NOT EXISTS workflow_run_logs (
        id TEXT PRIMARY KEY,
        run_id TEXT NOT NULL REFERENCES workflow_runs(id) ON DELETE CASCADE,
        action_id TEXT NOT NULL,
        action_position INTEGER NOT NULL,
        success INTEGER NOT NULL,
        message TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_workflows_user ON workflows(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_triggers_workflow ON triggers(workflow_id)",
    "CREATE INDEX IF NOT EXISTS idx_actions_workflow ON actions(workflow_id, position)",
    "CREATE INDEX IF NOT EXISTS idx_runs_workflow ON workflow_runs(workflow_id)",
    "CREATE INDEX IF NOT EXISTS idx_runs_status ON workflow_runs(status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_run_logs_run ON workflow_run_logs(run_id)",
];

const WORKFLOW_COLUMNS: &str = "id, user_id, name, is_enabled, created_at, updated_at";
const TRIGGER_COLUMNS: &str = "id, workflow_id, trigger_type, config, created_at";
const ACTION_COLUMNS: &str = "id, workflow_id, action_type, position, config, created_at";
const RUN_COLUMNS: &str = "id, workflow_id, status, trigger_type, started_at, finished_at, created_at";

/// SQLite-backed store shared by the API and the worker
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. The caller is responsible for [`init_schema`](Self::init_schema).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database file and initialize the schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        tracing::info!("🗄️ Opening database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Private in-memory database on a single long-lived connection
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Create tables and indexes. Safe to call repeatedly.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_actions(&self, workflow_id: &str) -> Result<Vec<Action>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions WHERE workflow_id = ? ORDER BY position ASC, rowid ASC"
        ))
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(action_from_row).collect()
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let now = Utc::now();
        let user = User {
            id: new_id(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(UserRecord {
            user: user_from_row(&row)?,
            password_hash: row.try_get("password_hash")?,
        })
    }

    async fn get_user_by_id(&self, id: &str) -> Result<User, StoreError> {
        let row = sqlx::query("SELECT id, email, created_at, updated_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        user_from_row(&row)
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn create_workflow(&self, user_id: &str, name: &str) -> Result<Workflow, StoreError> {
        let now = Utc::now();
        let workflow = Workflow {
            id: new_id(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO workflows (id, user_id, name, is_enabled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&workflow.id)
        .bind(&workflow.user_id)
        .bind(&workflow.name)
        .bind(workflow.is_enabled)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(workflow)
    }

    async fn list_workflows_by_user(&self, user_id: &str) -> Result<Vec<Workflow>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(workflow_from_row).collect()
    }

    async fn get_workflow(&self, id: &str, user_id: &str) -> Result<Workflow, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        workflow_from_row(&row)
    }

    async fn update_workflow(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
        is_enabled: bool,
    ) -> Result<Workflow, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE workflows SET name = ?, is_enabled = ?, updated_at = ? \
             WHERE id = ? AND user_id = ? RETURNING {WORKFLOW_COLUMNS}"
        ))
        .bind(name)
        .bind(is_enabled)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        workflow_from_row(&row)
    }

    async fn delete_workflow(&self, id: &str, user_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        expect_affected(result.rows_affected())
    }

    async fn create_trigger(
        &self,
        workflow_id: &str,
        trigger_type: &str,
        config: &[u8],
    ) -> Result<Trigger, StoreError> {
        let trigger = Trigger {
            id: new_id(),
            workflow_id: workflow_id.to_string(),
            trigger_type: trigger_type.to_string(),
            config: config.to_vec(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO triggers (id, workflow_id, trigger_type, config, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&trigger.id)
        .bind(&trigger.workflow_id)
        .bind(&trigger.trigger_type)
        .bind(&trigger.config)
        .bind(trigger.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(trigger)
    }

    async fn list_triggers_by_workflow(&self, workflow_id: &str) -> Result<Vec<Trigger>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIGGER_COLUMNS} FROM triggers WHERE workflow_id = ? ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(trigger_from_row).collect()
    }

    async fn update_trigger(
        &self,
        id: &str,
        workflow_id: &str,
        trigger_type: &str,
        config: &[u8],
    ) -> Result<Trigger, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE triggers SET trigger_type = ?, config = ? \
             WHERE id = ? AND workflow_id = ? RETURNING {TRIGGER_COLUMNS}"
        ))
        .bind(trigger_type)
        .bind(config)
        .bind(id)
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        trigger_from_row(&row)
    }

    async fn delete_trigger(&self, id: &str, workflow_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM triggers WHERE id = ? AND workflow_id = ?")
            .bind(id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;

        expect_affected(result.rows_affected())
    }

    async fn create_action(
        &self,
        workflow_id: &str,
        action_type: &str,
        position: i32,
        config: &[u8],
    ) -> Result<Action, StoreError> {
        let action = Action {
            id: new_id(),
            workflow_id: workflow_id.to_string(),
            action_type: action_type.to_string(),
            position,
            config: config.to_vec(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO actions (id, workflow_id, action_type, position, config, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&action.id)
        .bind(&action.workflow_id)
        .bind(&action.action_type)
        .bind(action.position)
        .bind(&action.config)
        .bind(action.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(action)
    }

    async fn list_actions_by_workflow(&self, workflow_id: &str) -> Result<Vec<Action>, StoreError> {
        self.fetch_actions(workflow_id).await
    }

    async fn update_action(
        &self,
        id: &str,
        workflow_id: &str,
        action_type: &str,
        position: i32,
        config: &[u8],
    ) -> Result<Action, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE actions SET action_type = ?, position = ?, config = ? \
             WHERE id = ? AND workflow_id = ? RETURNING {ACTION_COLUMNS}"
        ))
        .bind(action_type)
        .bind(position)
        .bind(config)
        .bind(id)
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        action_from_row(&row)
    }

    async fn delete_action(&self, id: &str, workflow_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM actions WHERE id = ? AND workflow_id = ?")
            .bind(id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;

        expect_affected(result.rows_affected())
    }

    async fn create_run(&self, workflow_id: &str, trigger_type: &str) -> Result<WorkflowRun, StoreError> {
        let run = WorkflowRun {
            id: new_id(),
            workflow_id: workflow_id.to_string(),
            status: RunStatus::Pending,
            trigger_type: trigger_type.to_string(),
            started_at: None,
            finished_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO workflow_runs (id, workflow_id, status, trigger_type, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(&run.workflow_id)
        .bind(run.status.as_str())
        .bind(&run.trigger_type)
        .bind(run.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(run)
    }

    async fn list_runs_by_workflow(&self, workflow_id: &str) -> Result<Vec<WorkflowRun>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE workflow_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_from_row).collect()
    }

    async fn get_run(&self, id: &str, workflow_id: &str) -> Result<WorkflowRun, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = ? AND workflow_id = ?"
        ))
        .bind(id)
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        run_from_row(&row)
    }

    async fn list_run_logs(&self, run_id: &str) -> Result<Vec<RunLog>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, run_id, action_id, action_position, success, message, created_at \
             FROM workflow_run_logs WHERE run_id = ? ORDER BY rowid ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_log_from_row).collect()
    }
}

#[async_trait]
impl RunQueue for SqliteStore {
    async fn list_pending_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE status = 'pending' \
             ORDER BY created_at ASC, rowid ASC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_from_row).collect()
    }

    async fn start_run(&self, id: &str, started_at: DateTime<Utc>) -> Result<WorkflowRun, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE workflow_runs SET status = 'running', started_at = ? \
             WHERE id = ? AND status = 'pending' RETURNING {RUN_COLUMNS}"
        ))
        .bind(started_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        run_from_row(&row)
    }

    async fn list_actions_by_workflow(&self, workflow_id: &str) -> Result<Vec<Action>, StoreError> {
        self.fetch_actions(workflow_id).await
    }

    async fn insert_run_log(&self, log: &NewRunLog) -> Result<RunLog, StoreError> {
        let entry = RunLog {
            id: new_id(),
            run_id: log.run_id.clone(),
            action_id: log.action_id.clone(),
            action_position: log.action_position,
            success: log.success,
            message: log.message.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO workflow_run_logs (id, run_id, action_id, action_position, success, message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.run_id)
        .bind(&entry.action_id)
        .bind(entry.action_position)
        .bind(entry.success)
        .bind(&entry.message)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(entry)
    }

    async fn finish_run(
        &self,
        id: &str,
        status: RunStatus,
        finished_at: DateTime<Utc>,
    ) -> Result<WorkflowRun, StoreError> {
        if !RunStatus::Running.can_transition_to(status) {
            return Err(StoreError::Conflict(format!(
                "'{}' is not a terminal run status",
                status
            )));
        }

        let row = sqlx::query(&format!(
            "UPDATE workflow_runs SET status = ?, finished_at = ? \
             WHERE id = ? AND status = 'running' RETURNING {RUN_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(finished_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        run_from_row(&row)
    }
}

#[async_trait]
impl Pinger for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn expect_affected(rows: u64) -> Result<(), StoreError> {
    if rows == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

/// Unique violations become conflicts; a dangling parent reference is
/// reported the same as a missing parent row.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::NotFound;
        }
    }
    StoreError::Database(err)
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn workflow_from_row(row: &SqliteRow) -> Result<Workflow, StoreError> {
    Ok(Workflow {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        is_enabled: row.try_get("is_enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn trigger_from_row(row: &SqliteRow) -> Result<Trigger, StoreError> {
    Ok(Trigger {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        trigger_type: row.try_get("trigger_type")?,
        config: row.try_get("config")?,
        created_at: row.try_get("created_at")?,
    })
}

fn action_from_row(row: &SqliteRow) -> Result<Action, StoreError> {
    Ok(Action {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        action_type: row.try_get("action_type")?,
        position: row.try_get("position")?,
        config: row.try_get("config")?,
        created_at: row.try_get("created_at")?,
    })
}

fn run_from_row(row: &SqliteRow) -> Result<WorkflowRun, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<RunStatus>().map_err(StoreError::Corrupt)?;

    Ok(WorkflowRun {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        status,
        trigger_type: row.try_get("trigger_type")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn run_log_from_row(row: &SqliteRow) -> Result<RunLog, StoreError> {
    Ok(RunLog {
        id: row.try_get("id")?,
        run_id: row.try_get("run_id")?,
        action_id: row.try_get("action_id")?,
        action_position: row.try_get("action_position")?,
        success: row.try_get("success")?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
    })
}
