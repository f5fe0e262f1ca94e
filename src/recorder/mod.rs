pub mod sweep;

pub use sweep::run_sweeper;

use crate::config::RecorderConfig;
use crate::error::Result;
use crate::store::{
    CloseAttributes, Execution, ExecutionStatus, RecordStore, Workflow, WorkflowStatus,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// API used by task runners to open and close execution spans.
///
/// Thin layer over the record store: the structural invariants (parent
/// liveness, grace window, single root, terminal immutability) are enforced
/// at write time inside the store's transactions; the recorder owns the
/// policy knobs and the orphan sweep.
pub struct SpanRecorder {
    store: Arc<dyn RecordStore>,
    grace_window_ms: i64,
    max_running_age_secs: i64,
}

impl SpanRecorder {
    pub fn new(store: Arc<dyn RecordStore>, config: &RecorderConfig) -> Self {
        Self {
            store,
            grace_window_ms: config.grace_window_ms,
            max_running_age_secs: config.max_running_age_secs,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Open a workflow for one top-level invocation.
    pub fn open_workflow(&self, command: &str, project: &str) -> Result<Workflow> {
        let workflow = self.store.create_workflow(command, project, None, None)?;
        info!(workflow = %workflow.id, command, "workflow opened");
        Ok(workflow)
    }

    /// Open a single execution span. Pass `None` as the parent only for the
    /// workflow's root.
    pub fn open_execution(
        &self,
        workflow_id: &str,
        parent_execution_id: Option<&str>,
        agent_name: &str,
        task_description: &str,
    ) -> Result<Execution> {
        let execution = self.store.insert_execution(
            workflow_id,
            parent_execution_id,
            agent_name,
            task_description,
            self.grace_window_ms,
        )?;
        debug!(
            execution = %execution.id,
            agent = agent_name,
            parent = parent_execution_id.unwrap_or("-"),
            "execution opened"
        );
        Ok(execution)
    }

    /// Open N sibling spans under one parent in one logical step. Readers see
    /// either the whole group or nothing.
    pub fn open_parallel_group(
        &self,
        workflow_id: &str,
        parent_execution_id: &str,
        agents: &[(String, String)],
    ) -> Result<Vec<Execution>> {
        let group = self.store.insert_execution_group(
            workflow_id,
            parent_execution_id,
            agents,
            self.grace_window_ms,
        )?;
        debug!(
            parent = parent_execution_id,
            size = group.len(),
            "parallel group opened"
        );
        Ok(group)
    }

    /// Close a span with a terminal status. Double closes fail with
    /// `AlreadyClosed` and leave the first write untouched.
    pub fn close_execution(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        attributes: CloseAttributes,
    ) -> Result<Execution> {
        let execution = self.store.close_execution(execution_id, status, &attributes)?;
        debug!(
            execution = %execution.id,
            status = status.as_str(),
            duration_ms = execution.duration_ms.unwrap_or(0),
            "execution closed"
        );
        Ok(execution)
    }

    /// Close a workflow, deriving its terminal status from the root
    /// execution: completed iff the root succeeded. A workflow that never
    /// opened a root closes as completed.
    pub fn close_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        let status = match self.store.root_execution(workflow_id)? {
            Some(root) if root.status == ExecutionStatus::Running => {
                return Err(crate::error::RecorderError::RootRunning(root.id).into());
            }
            Some(root) if root.status == ExecutionStatus::Success => WorkflowStatus::Completed,
            Some(_) => WorkflowStatus::Failed,
            None => WorkflowStatus::Completed,
        };
        let workflow = self.store.close_workflow(workflow_id, status)?;
        info!(workflow = %workflow.id, status = status.as_str(), "workflow closed");
        Ok(workflow)
    }

    /// Reclassify spans stuck in `running` beyond the configured maximum age
    /// as cancelled. Bounds the damage of a crashed caller; this is the only
    /// automatic cascading mechanism — explicit cancellation never cascades.
    pub fn sweep_orphans(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let cutoff = now - Duration::seconds(self.max_running_age_secs);
        let orphans = self.store.running_executions_started_before(cutoff)?;

        let mut swept = Vec::with_capacity(orphans.len());
        for orphan in orphans {
            let attrs = CloseAttributes {
                error_message: Some(format!(
                    "orphan sweep: running longer than {}s",
                    self.max_running_age_secs
                )),
                ..CloseAttributes::default()
            };
            match self
                .store
                .close_execution(&orphan.id, ExecutionStatus::Cancelled, &attrs)
            {
                Ok(_) => {
                    info!(execution = %orphan.id, agent = %orphan.agent_name, "orphan swept");
                    swept.push(orphan.id);
                }
                // Lost the race with a late close; the span is terminal now,
                // which is all the sweep wants.
                Err(crate::error::LoomError::Recorder(
                    crate::error::RecorderError::AlreadyClosed(_),
                )) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(swept)
    }
}
