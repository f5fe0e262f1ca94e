use super::SpanRecorder;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{self, Duration};

const MIN_POLL_SECONDS: u64 = 5;

/// Background orphan sweep. Runs until the task is aborted; a failing pass
/// is logged and retried on the next tick rather than killing the worker.
pub async fn run_sweeper(recorder: Arc<SpanRecorder>, poll_secs: u64) -> Result<()> {
    let poll_secs = poll_secs.max(MIN_POLL_SECONDS);
    let mut interval = time::interval(Duration::from_secs(poll_secs));

    loop {
        interval.tick().await;

        match recorder.sweep_orphans(Utc::now()) {
            Ok(swept) if !swept.is_empty() => {
                tracing::info!(count = swept.len(), "orphan sweep cancelled stuck executions");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("orphan sweep failed: {e}");
            }
        }
    }
}
