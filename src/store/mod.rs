pub mod sqlite;
pub mod types;

pub use sqlite::SqliteRecordStore;
pub use types::{
    ArtifactClaim, CloseAttributes, Execution, ExecutionStatus, Validation, Workflow,
    WorkflowStatus,
};

use crate::error::Result;
use crate::hooks::HookRegistration;
use chrono::{DateTime, Utc};

/// Durable storage for workflows, executions, validations, and hook
/// registrations. The single source of truth shared by every component; all
/// writers go through this trait so the invariants can be enforced at write
/// time.
pub trait RecordStore: Send + Sync {
    // ── Workflows ────────────────────────────────────────────────────────

    fn create_workflow(
        &self,
        command: &str,
        project: &str,
        git_branch: Option<&str>,
        git_commit: Option<&str>,
    ) -> Result<Workflow>;

    fn get_workflow(&self, id: &str) -> Result<Option<Workflow>>;

    /// Set a terminal status and `ended_at` together. Rejects a second close.
    fn close_workflow(&self, id: &str, status: WorkflowStatus) -> Result<Workflow>;

    fn list_workflows(&self, limit: usize) -> Result<Vec<Workflow>>;

    // ── Executions ───────────────────────────────────────────────────────

    /// Insert a running execution. Rejects a missing or foreign-workflow
    /// parent, a parent terminal beyond the grace window, and a second root.
    fn insert_execution(
        &self,
        workflow_id: &str,
        parent_execution_id: Option<&str>,
        agent_name: &str,
        task_description: &str,
        grace_window_ms: i64,
    ) -> Result<Execution>;

    /// Insert sibling executions under one parent in a single transaction so
    /// readers observe either none or all of the group.
    fn insert_execution_group(
        &self,
        workflow_id: &str,
        parent_execution_id: &str,
        agents: &[(String, String)],
        grace_window_ms: i64,
    ) -> Result<Vec<Execution>>;

    fn get_execution(&self, id: &str) -> Result<Option<Execution>>;

    /// The one execution of a workflow with no parent, if opened yet.
    fn root_execution(&self, workflow_id: &str) -> Result<Option<Execution>>;

    /// Close a running execution with a terminal status, computing
    /// `duration_ms` and persisting the close attributes. Fails with
    /// `AlreadyClosed` on a second call; the first write is left untouched.
    fn close_execution(
        &self,
        id: &str,
        status: ExecutionStatus,
        attributes: &CloseAttributes,
    ) -> Result<Execution>;

    fn list_recent_executions(&self, limit: usize, failed_only: bool) -> Result<Vec<Execution>>;

    fn list_executions_since(&self, since: DateTime<Utc>) -> Result<Vec<Execution>>;

    fn list_children(&self, parent_execution_id: &str) -> Result<Vec<Execution>>;

    fn running_executions_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Execution>>;

    // ── Validations ──────────────────────────────────────────────────────

    fn insert_validation(
        &self,
        execution_id: &str,
        claimed: &[ArtifactClaim],
        actual: &[ArtifactClaim],
        passed: bool,
    ) -> Result<Validation>;

    fn latest_validation(&self, execution_id: &str) -> Result<Option<Validation>>;

    fn list_validations(&self, execution_id: &str) -> Result<Vec<Validation>>;

    // ── Hook registrations ───────────────────────────────────────────────

    /// Mirror the startup configuration into the store, replacing any
    /// previous snapshot. Registrations are immutable for the session.
    fn replace_hook_registrations(&self, registrations: &[HookRegistration]) -> Result<()>;

    fn load_hook_registrations(&self) -> Result<Vec<HookRegistration>>;

    // ── Maintenance ──────────────────────────────────────────────────────

    /// Delete terminal data older than `days`. Returns removed executions.
    fn purge_older_than(&self, days: i64) -> Result<usize>;

    fn vacuum(&self) -> Result<()>;
}
