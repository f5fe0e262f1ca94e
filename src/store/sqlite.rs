use super::types::{
    ArtifactClaim, CloseAttributes, Execution, ExecutionStatus, Validation, Workflow,
    WorkflowStatus,
};
use super::RecordStore;
use crate::error::{LoomError, RecorderError, Result, StoreError};
use crate::hooks::{HookEvent, HookRegistration};
use anyhow::anyhow;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, types::Type};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// SQLite-backed record store.
///
/// Every operation is a short synchronous transaction behind one connection;
/// the mutex serializes writers and the group insert commits atomically so
/// readers never observe a partial sibling set.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "PRAGMA foreign_keys = ON;
     CREATE TABLE IF NOT EXISTS workflows (
         id TEXT PRIMARY KEY,
         command TEXT NOT NULL,
         project TEXT NOT NULL,
         started_at TEXT NOT NULL,
         ended_at TEXT,
         status TEXT NOT NULL DEFAULT 'running',
         git_branch TEXT,
         git_commit TEXT
     );

     CREATE TABLE IF NOT EXISTS executions (
         id TEXT PRIMARY KEY,
         workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
         parent_execution_id TEXT REFERENCES executions(id) ON DELETE CASCADE,
         agent_name TEXT NOT NULL,
         task_description TEXT NOT NULL,
         started_at TEXT NOT NULL,
         ended_at TEXT,
         duration_ms INTEGER,
         status TEXT NOT NULL DEFAULT 'running',
         tokens_input INTEGER NOT NULL DEFAULT 0,
         tokens_output INTEGER NOT NULL DEFAULT 0,
         cost_units REAL NOT NULL DEFAULT 0,
         claimed_outputs TEXT NOT NULL DEFAULT '[]',
         error_message TEXT
     );

     CREATE UNIQUE INDEX IF NOT EXISTS idx_executions_root
         ON executions(workflow_id) WHERE parent_execution_id IS NULL;
     CREATE INDEX IF NOT EXISTS idx_executions_agent
         ON executions(agent_name, started_at);
     CREATE INDEX IF NOT EXISTS idx_executions_status
         ON executions(status, started_at);

     CREATE TABLE IF NOT EXISTS validations (
         id TEXT PRIMARY KEY,
         execution_id TEXT NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
         claimed_outputs TEXT NOT NULL,
         actual_outputs TEXT NOT NULL,
         passed INTEGER NOT NULL,
         checked_at TEXT NOT NULL
     );

     CREATE INDEX IF NOT EXISTS idx_validations_execution
         ON validations(execution_id, checked_at);

     CREATE TABLE IF NOT EXISTS hook_registrations (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         event TEXT NOT NULL,
         handler_ref TEXT NOT NULL,
         blocking INTEGER NOT NULL DEFAULT 0,
         timeout_ms INTEGER NOT NULL,
         filters TEXT NOT NULL DEFAULT '[]'
     );";

impl SqliteRecordStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(|e| StoreError::Open {
            path: db_path.display().to_string(),
            message: e.to_string(),
        })?;
        conn.execute_batch(SCHEMA).map_err(StoreError::Sqlite)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        conn.execute_batch(SCHEMA).map_err(StoreError::Sqlite)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LoomError::Other(anyhow!("record store lock poisoned")))
    }
}

// ─── Row mapping ────────────────────────────────────────────────────────────

fn ts_to_db(ts: DateTime<Utc>) -> String {
    // Fixed-width millisecond format so lexicographic ordering in SQL matches
    // chronological ordering.
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ts_from_db(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn conversion_err(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        Box::<dyn std::error::Error + Send + Sync>::from(message),
    )
}

fn claims_from_db(s: &str) -> rusqlite::Result<Vec<ArtifactClaim>> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn claims_to_db(claims: &[ArtifactClaim]) -> Result<String> {
    serde_json::to_string(claims).map_err(|e| LoomError::Other(e.into()))
}

fn row_to_workflow(row: &Row<'_>) -> rusqlite::Result<Workflow> {
    let status: String = row.get("status")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    Ok(Workflow {
        id: row.get("id")?,
        command: row.get("command")?,
        project: row.get("project")?,
        started_at: ts_from_db(&row.get::<_, String>("started_at")?)?,
        ended_at: ended_at.as_deref().map(ts_from_db).transpose()?,
        status: WorkflowStatus::parse(&status)
            .ok_or_else(|| conversion_err(format!("unknown workflow status {status}")))?,
        git_branch: row.get("git_branch")?,
        git_commit: row.get("git_commit")?,
    })
}

fn row_to_execution(row: &Row<'_>) -> rusqlite::Result<Execution> {
    let status: String = row.get("status")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    Ok(Execution {
        id: row.get("id")?,
        workflow_id: row.get("workflow_id")?,
        parent_execution_id: row.get("parent_execution_id")?,
        agent_name: row.get("agent_name")?,
        task_description: row.get("task_description")?,
        started_at: ts_from_db(&row.get::<_, String>("started_at")?)?,
        ended_at: ended_at.as_deref().map(ts_from_db).transpose()?,
        duration_ms: row.get("duration_ms")?,
        status: ExecutionStatus::parse(&status)
            .ok_or_else(|| conversion_err(format!("unknown execution status {status}")))?,
        tokens_input: row.get("tokens_input")?,
        tokens_output: row.get("tokens_output")?,
        cost_units: row.get("cost_units")?,
        claimed_outputs: claims_from_db(&row.get::<_, String>("claimed_outputs")?)?,
        error_message: row.get("error_message")?,
    })
}

fn row_to_validation(row: &Row<'_>) -> rusqlite::Result<Validation> {
    Ok(Validation {
        id: row.get("id")?,
        execution_id: row.get("execution_id")?,
        claimed_outputs: claims_from_db(&row.get::<_, String>("claimed_outputs")?)?,
        actual_outputs: claims_from_db(&row.get::<_, String>("actual_outputs")?)?,
        passed: row.get::<_, i64>("passed")? != 0,
        checked_at: ts_from_db(&row.get::<_, String>("checked_at")?)?,
    })
}

fn fetch_execution(conn: &Connection, id: &str) -> Result<Option<Execution>> {
    conn.query_row(
        "SELECT * FROM executions WHERE id = ?1",
        [id],
        row_to_execution,
    )
    .optional()
    .map_err(|e| StoreError::Sqlite(e).into())
}

/// Parent liveness check shared by the single and group insert paths.
///
/// A parent that closed within the grace window is still accepted so a racy
/// caller can finish reporting a sibling set; beyond the window the open is
/// treated as a leak and rejected.
fn check_parent(
    conn: &Connection,
    workflow_id: &str,
    parent_id: &str,
    grace_window_ms: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let parent = fetch_execution(conn, parent_id)?.ok_or_else(|| {
        RecorderError::InvalidParent {
            parent_id: parent_id.to_string(),
            reason: "no such execution".into(),
        }
    })?;

    if parent.workflow_id != workflow_id {
        return Err(RecorderError::InvalidParent {
            parent_id: parent_id.to_string(),
            reason: format!("belongs to workflow {}", parent.workflow_id),
        }
        .into());
    }

    if parent.status.is_terminal() {
        let ended_at = parent.ended_at.unwrap_or(now);
        let age_ms = (now - ended_at).num_milliseconds();
        if age_ms > grace_window_ms {
            return Err(RecorderError::InvalidParent {
                parent_id: parent_id.to_string(),
                reason: format!("terminal for {age_ms}ms, beyond the {grace_window_ms}ms grace window"),
            }
            .into());
        }
    }

    Ok(())
}

fn check_workflow_running(conn: &Connection, workflow_id: &str) -> Result<()> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM workflows WHERE id = ?1",
            [workflow_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(StoreError::Sqlite)?;

    match status.as_deref() {
        None => Err(StoreError::NotFound {
            kind: "workflow",
            id: workflow_id.to_string(),
        }
        .into()),
        Some("running") => Ok(()),
        Some(_) => Err(RecorderError::WorkflowClosed(workflow_id.to_string()).into()),
    }
}

fn insert_execution_row(conn: &Connection, execution: &Execution) -> Result<()> {
    conn.execute(
        "INSERT INTO executions
             (id, workflow_id, parent_execution_id, agent_name, task_description,
              started_at, status, claimed_outputs)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]')",
        params![
            execution.id,
            execution.workflow_id,
            execution.parent_execution_id,
            execution.agent_name,
            execution.task_description,
            ts_to_db(execution.started_at),
            execution.status.as_str(),
        ],
    )
    .map_err(StoreError::Sqlite)?;
    Ok(())
}

fn new_execution(
    workflow_id: &str,
    parent_execution_id: Option<&str>,
    agent_name: &str,
    task_description: &str,
    now: DateTime<Utc>,
) -> Execution {
    Execution {
        id: format!("exec_{}", Uuid::new_v4()),
        workflow_id: workflow_id.to_string(),
        parent_execution_id: parent_execution_id.map(str::to_string),
        agent_name: agent_name.to_string(),
        task_description: task_description.to_string(),
        started_at: now,
        ended_at: None,
        duration_ms: None,
        status: ExecutionStatus::Running,
        tokens_input: 0,
        tokens_output: 0,
        cost_units: 0.0,
        claimed_outputs: Vec::new(),
        error_message: None,
    }
}

// ─── RecordStore implementation ─────────────────────────────────────────────

impl RecordStore for SqliteRecordStore {
    fn create_workflow(
        &self,
        command: &str,
        project: &str,
        git_branch: Option<&str>,
        git_commit: Option<&str>,
    ) -> Result<Workflow> {
        let conn = self.lock_connection()?;
        let workflow = Workflow {
            id: format!("wf_{}", Uuid::new_v4()),
            command: command.to_string(),
            project: project.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: WorkflowStatus::Running,
            git_branch: git_branch.map(str::to_string),
            git_commit: git_commit.map(str::to_string),
        };
        conn.execute(
            "INSERT INTO workflows (id, command, project, started_at, status, git_branch, git_commit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                workflow.id,
                workflow.command,
                workflow.project,
                ts_to_db(workflow.started_at),
                workflow.status.as_str(),
                workflow.git_branch,
                workflow.git_commit,
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(workflow)
    }

    fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        let conn = self.lock_connection()?;
        conn.query_row("SELECT * FROM workflows WHERE id = ?1", [id], row_to_workflow)
            .optional()
            .map_err(|e| StoreError::Sqlite(e).into())
    }

    fn close_workflow(&self, id: &str, status: WorkflowStatus) -> Result<Workflow> {
        if !status.is_terminal() {
            return Err(RecorderError::NotTerminalStatus(status.as_str().to_string()).into());
        }

        let conn = self.lock_connection()?;
        let changed = conn
            .execute(
                "UPDATE workflows SET status = ?1, ended_at = ?2
                 WHERE id = ?3 AND status = 'running'",
                params![status.as_str(), ts_to_db(Utc::now()), id],
            )
            .map_err(StoreError::Sqlite)?;

        if changed == 0 {
            let exists: bool = conn
                .query_row("SELECT 1 FROM workflows WHERE id = ?1", [id], |_| Ok(true))
                .optional()
                .map_err(StoreError::Sqlite)?
                .unwrap_or(false);
            return if exists {
                Err(RecorderError::WorkflowClosed(id.to_string()).into())
            } else {
                Err(StoreError::NotFound {
                    kind: "workflow",
                    id: id.to_string(),
                }
                .into())
            };
        }

        conn.query_row("SELECT * FROM workflows WHERE id = ?1", [id], row_to_workflow)
            .map_err(|e| StoreError::Sqlite(e).into())
    }

    fn list_workflows(&self, limit: usize) -> Result<Vec<Workflow>> {
        let conn = self.lock_connection()?;
        let mut stmt = conn
            .prepare("SELECT * FROM workflows ORDER BY started_at DESC, rowid DESC LIMIT ?1")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([limit], row_to_workflow)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    fn insert_execution(
        &self,
        workflow_id: &str,
        parent_execution_id: Option<&str>,
        agent_name: &str,
        task_description: &str,
        grace_window_ms: i64,
    ) -> Result<Execution> {
        let now = Utc::now();
        let mut conn = self.lock_connection()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;

        check_workflow_running(&tx, workflow_id)?;

        match parent_execution_id {
            None => {
                let roots: i64 = tx
                    .query_row(
                        "SELECT COUNT(*) FROM executions
                         WHERE workflow_id = ?1 AND parent_execution_id IS NULL",
                        [workflow_id],
                        |r| r.get(0),
                    )
                    .map_err(StoreError::Sqlite)?;
                if roots > 0 {
                    return Err(RecorderError::RootExists(workflow_id.to_string()).into());
                }
            }
            Some(parent_id) => check_parent(&tx, workflow_id, parent_id, grace_window_ms, now)?,
        }

        let execution = new_execution(
            workflow_id,
            parent_execution_id,
            agent_name,
            task_description,
            now,
        );
        insert_execution_row(&tx, &execution)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(execution)
    }

    fn insert_execution_group(
        &self,
        workflow_id: &str,
        parent_execution_id: &str,
        agents: &[(String, String)],
        grace_window_ms: i64,
    ) -> Result<Vec<Execution>> {
        let now = Utc::now();
        let mut conn = self.lock_connection()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;

        check_workflow_running(&tx, workflow_id)?;
        check_parent(&tx, workflow_id, parent_execution_id, grace_window_ms, now)?;

        let mut group = Vec::with_capacity(agents.len());
        for (agent_name, task_description) in agents {
            let execution = new_execution(
                workflow_id,
                Some(parent_execution_id),
                agent_name,
                task_description,
                now,
            );
            insert_execution_row(&tx, &execution)?;
            group.push(execution);
        }

        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(group)
    }

    fn get_execution(&self, id: &str) -> Result<Option<Execution>> {
        let conn = self.lock_connection()?;
        fetch_execution(&conn, id)
    }

    fn root_execution(&self, workflow_id: &str) -> Result<Option<Execution>> {
        let conn = self.lock_connection()?;
        conn.query_row(
            "SELECT * FROM executions
             WHERE workflow_id = ?1 AND parent_execution_id IS NULL",
            [workflow_id],
            row_to_execution,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite(e).into())
    }

    fn close_execution(
        &self,
        id: &str,
        status: ExecutionStatus,
        attributes: &CloseAttributes,
    ) -> Result<Execution> {
        if !status.is_terminal() {
            return Err(RecorderError::NotTerminalStatus(status.as_str().to_string()).into());
        }

        let now = Utc::now();
        let claimed = claims_to_db(&attributes.claimed_outputs)?;
        let mut conn = self.lock_connection()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;

        let current = fetch_execution(&tx, id)?.ok_or_else(|| StoreError::NotFound {
            kind: "execution",
            id: id.to_string(),
        })?;
        if current.status.is_terminal() {
            return Err(RecorderError::AlreadyClosed(id.to_string()).into());
        }

        let duration_ms = (now - current.started_at).num_milliseconds().max(0);
        let changed = tx
            .execute(
                "UPDATE executions
                 SET ended_at = ?1, duration_ms = ?2, status = ?3,
                     tokens_input = ?4, tokens_output = ?5, cost_units = ?6,
                     claimed_outputs = ?7, error_message = ?8
                 WHERE id = ?9 AND status = 'running'",
                params![
                    ts_to_db(now),
                    duration_ms,
                    status.as_str(),
                    attributes.tokens_input,
                    attributes.tokens_output,
                    attributes.cost_units,
                    claimed,
                    attributes.error_message,
                    id,
                ],
            )
            .map_err(StoreError::Sqlite)?;
        if changed == 0 {
            return Err(RecorderError::AlreadyClosed(id.to_string()).into());
        }

        let closed = fetch_execution(&tx, id)?.ok_or_else(|| StoreError::NotFound {
            kind: "execution",
            id: id.to_string(),
        })?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(closed)
    }

    fn list_recent_executions(&self, limit: usize, failed_only: bool) -> Result<Vec<Execution>> {
        let conn = self.lock_connection()?;
        let sql = if failed_only {
            "SELECT * FROM executions WHERE status = 'failed'
             ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        } else {
            "SELECT * FROM executions ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        };
        let mut stmt = conn.prepare(sql).map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([limit], row_to_execution)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    fn list_executions_since(&self, since: DateTime<Utc>) -> Result<Vec<Execution>> {
        let conn = self.lock_connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM executions WHERE started_at >= ?1
                 ORDER BY started_at ASC, rowid ASC",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([ts_to_db(since)], row_to_execution)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    fn list_children(&self, parent_execution_id: &str) -> Result<Vec<Execution>> {
        let conn = self.lock_connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM executions WHERE parent_execution_id = ?1
                 ORDER BY started_at ASC, rowid ASC",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([parent_execution_id], row_to_execution)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    fn running_executions_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Execution>> {
        let conn = self.lock_connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM executions
                 WHERE status = 'running' AND started_at < ?1
                 ORDER BY started_at ASC, rowid ASC",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([ts_to_db(cutoff)], row_to_execution)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    fn insert_validation(
        &self,
        execution_id: &str,
        claimed: &[ArtifactClaim],
        actual: &[ArtifactClaim],
        passed: bool,
    ) -> Result<Validation> {
        let conn = self.lock_connection()?;
        let validation = Validation {
            id: format!("val_{}", Uuid::new_v4()),
            execution_id: execution_id.to_string(),
            claimed_outputs: claimed.to_vec(),
            actual_outputs: actual.to_vec(),
            passed,
            checked_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO validations (id, execution_id, claimed_outputs, actual_outputs, passed, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                validation.id,
                validation.execution_id,
                claims_to_db(&validation.claimed_outputs)?,
                claims_to_db(&validation.actual_outputs)?,
                i64::from(validation.passed),
                ts_to_db(validation.checked_at),
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(validation)
    }

    fn latest_validation(&self, execution_id: &str) -> Result<Option<Validation>> {
        let conn = self.lock_connection()?;
        conn.query_row(
            "SELECT * FROM validations WHERE execution_id = ?1
             ORDER BY checked_at DESC, rowid DESC LIMIT 1",
            [execution_id],
            row_to_validation,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite(e).into())
    }

    fn list_validations(&self, execution_id: &str) -> Result<Vec<Validation>> {
        let conn = self.lock_connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM validations WHERE execution_id = ?1
                 ORDER BY checked_at ASC, rowid ASC",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([execution_id], row_to_validation)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    fn replace_hook_registrations(&self, registrations: &[HookRegistration]) -> Result<()> {
        let mut conn = self.lock_connection()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        tx.execute("DELETE FROM hook_registrations", [])
            .map_err(StoreError::Sqlite)?;
        for reg in registrations {
            let filters =
                serde_json::to_string(&reg.filters).map_err(|e| LoomError::Other(e.into()))?;
            tx.execute(
                "INSERT INTO hook_registrations (event, handler_ref, blocking, timeout_ms, filters)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    reg.event.to_string(),
                    reg.handler_ref,
                    i64::from(reg.blocking),
                    reg.timeout_ms as i64,
                    filters,
                ],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    fn load_hook_registrations(&self) -> Result<Vec<HookRegistration>> {
        let conn = self.lock_connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT event, handler_ref, blocking, timeout_ms, filters
                 FROM hook_registrations ORDER BY id ASC",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([], |row| {
                let event: String = row.get("event")?;
                let filters: String = row.get("filters")?;
                Ok(HookRegistration {
                    event: HookEvent::from_str(&event)
                        .map_err(|_| conversion_err(format!("unknown hook event {event}")))?,
                    handler_ref: row.get("handler_ref")?,
                    blocking: row.get::<_, i64>("blocking")? != 0,
                    timeout_ms: row.get::<_, i64>("timeout_ms")? as u64,
                    filters: serde_json::from_str(&filters).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                    })?,
                })
            })
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    fn purge_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = ts_to_db(Utc::now() - Duration::days(days));
        let mut conn = self.lock_connection()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;

        let doomed: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM executions WHERE workflow_id IN
                     (SELECT id FROM workflows WHERE started_at < ?1 AND status != 'running')",
                [&cutoff],
                |r| r.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        tx.execute(
            "DELETE FROM workflows WHERE started_at < ?1 AND status != 'running'",
            [&cutoff],
        )
        .map_err(StoreError::Sqlite)?;

        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(usize::try_from(doomed).unwrap_or(0))
    }

    fn vacuum(&self) -> Result<()> {
        let conn = self.lock_connection()?;
        conn.execute_batch("VACUUM").map_err(StoreError::Sqlite)?;
        Ok(())
    }
}
