pub mod engine;
pub mod process;

pub use engine::ImprovementEngine;
pub use process::CommandChangeProcess;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which numeric statistic a candidate wants to move.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Duration,
    SuccessRate,
    Cost,
}

/// One scored optimization opportunity. Derived from the metrics rollup on
/// every cycle; never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementCandidate {
    pub agent_name: String,
    pub metric_kind: MetricKind,
    pub observed_value: f64,
    pub target_value: f64,
    pub frequency_per_period: f64,
    pub severity: f64,
    pub impact_score: f64,
}

/// Request handed to the external change process for the top candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub agent_name: String,
    pub metric_kind: MetricKind,
    pub observed_value: f64,
    pub target_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeResponse {
    pub status: ChangeStatus,
    pub new_observed_value: f64,
}

/// Boundary to whatever implements the fix. Treated as an opaque remote
/// call: no retries here — retrying is the other side's business.
#[async_trait]
pub trait ChangeProcess: Send + Sync {
    async fn apply(&self, request: ChangeRequest) -> anyhow::Result<ChangeResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Every candidate scored below the action threshold. A first-class
    /// result, not an error.
    NoActionNeeded,
    Implemented,
    /// The triggering metric regressed beyond tolerance after the change;
    /// the caller should roll it back.
    NeedsRollback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementedChange {
    pub candidate: ImprovementCandidate,
    pub before_value: f64,
    pub after_value: f64,
    /// Percentage for duration/cost, success-rate points for success rate.
    pub improvement_pct: f64,
}

/// Structured before/after comparison plus the remaining ranked candidates,
/// emitted at the end of every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub generated_at: DateTime<Utc>,
    pub lookback_days: u32,
    pub analyzed_agents: usize,
    pub outcome: CycleOutcome,
    pub implemented: Option<ImplementedChange>,
    pub remaining: Vec<ImprovementCandidate>,
}
