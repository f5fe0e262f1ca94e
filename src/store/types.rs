use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Workflow ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One top-level tracked operation, owning a tree of executions.
///
/// `ended_at` is set iff `status != Running`; the store's close path is the
/// only writer that flips both together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub command: String,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: WorkflowStatus,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
}

// ─── Execution ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// An artifact a task claims to have produced.
///
/// File claims are checked against the real filesystem; command claims carry
/// the exit code the task reported for a build/test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactClaim {
    File { path: String },
    Command { label: String, exit_code: i32 },
}

impl ArtifactClaim {
    pub fn file(path: impl Into<String>) -> Self {
        Self::File { path: path.into() }
    }

    pub fn command(label: impl Into<String>, exit_code: i32) -> Self {
        Self::Command {
            label: label.into(),
            exit_code,
        }
    }
}

/// One tracked unit of work (a span) inside a workflow's execution tree.
///
/// `parent_execution_id` is null only for the root. Terminal rows are
/// immutable: the store refuses any update once `status != Running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub parent_execution_id: Option<String>,
    pub agent_name: String,
    pub task_description: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: ExecutionStatus,
    pub tokens_input: i64,
    pub tokens_output: i64,
    pub cost_units: f64,
    pub claimed_outputs: Vec<ArtifactClaim>,
    pub error_message: Option<String>,
}

impl Execution {
    pub fn is_root(&self) -> bool {
        self.parent_execution_id.is_none()
    }
}

/// Attributes attached when a span closes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseAttributes {
    pub tokens_input: i64,
    pub tokens_output: i64,
    pub cost_units: f64,
    pub claimed_outputs: Vec<ArtifactClaim>,
    pub error_message: Option<String>,
}

// ─── Validation ─────────────────────────────────────────────────────────────

/// A recorded comparison between an execution's claimed outputs and observed
/// reality. Append-only: re-validation inserts a new row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub id: String,
    pub execution_id: String,
    pub claimed_outputs: Vec<ArtifactClaim>,
    pub actual_outputs: Vec<ArtifactClaim>,
    pub passed: bool,
    pub checked_at: DateTime<Utc>,
}
