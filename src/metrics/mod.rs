use crate::error::Result;
use crate::store::{ExecutionStatus, RecordStore};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-agent rollup over terminal executions in a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub agent_name: String,
    pub count: usize,
    pub successes: usize,
    pub avg_duration_ms: f64,
    pub success_rate: f64,
    pub avg_tokens: f64,
    pub total_cost: f64,
}

/// Per-day rollup used for the trend series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub avg_duration_ms: f64,
    pub total_tokens: i64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

/// Read-only rollups over the record store. Safe to run concurrently with
/// any number of writers: only terminal (immutable) executions enter the
/// averages; in-flight spans are excluded.
pub struct MetricsAggregator {
    store: Arc<dyn RecordStore>,
    stability_band: f64,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            stability_band: 0.05,
        }
    }

    pub fn with_stability_band(mut self, band: f64) -> Self {
        self.stability_band = band;
        self
    }

    /// Rollup grouped by agent, restricted to `started_at >= since`.
    pub fn agent_performance(&self, since: DateTime<Utc>) -> Result<Vec<AgentPerformance>> {
        let executions = self.store.list_executions_since(since)?;

        struct Acc {
            count: usize,
            successes: usize,
            duration_ms: i64,
            tokens: i64,
            cost: f64,
        }
        let mut by_agent: BTreeMap<String, Acc> = BTreeMap::new();

        for exec in executions {
            if !exec.status.is_terminal() {
                continue;
            }
            let acc = by_agent.entry(exec.agent_name.clone()).or_insert(Acc {
                count: 0,
                successes: 0,
                duration_ms: 0,
                tokens: 0,
                cost: 0.0,
            });
            acc.count += 1;
            if exec.status == ExecutionStatus::Success {
                acc.successes += 1;
            }
            acc.duration_ms += exec.duration_ms.unwrap_or(0);
            acc.tokens += exec.tokens_input + exec.tokens_output;
            acc.cost += exec.cost_units;
        }

        let mut rollup: Vec<AgentPerformance> = by_agent
            .into_iter()
            .map(|(agent_name, acc)| {
                let count = acc.count as f64;
                AgentPerformance {
                    agent_name,
                    count: acc.count,
                    successes: acc.successes,
                    avg_duration_ms: acc.duration_ms as f64 / count,
                    success_rate: acc.successes as f64 / count,
                    avg_tokens: acc.tokens as f64 / count,
                    total_cost: acc.cost,
                }
            })
            .collect();
        rollup.sort_by(|a, b| b.count.cmp(&a.count).then(a.agent_name.cmp(&b.agent_name)));
        Ok(rollup)
    }

    /// Per-day counts over the last `days`, newest day first. Days without
    /// executions are omitted, matching the rollup a GROUP BY date would
    /// produce.
    pub fn daily_summary(&self, days: u32) -> Result<Vec<DailySummary>> {
        let since = Utc::now() - Duration::days(i64::from(days));
        let executions = self.store.list_executions_since(since)?;

        struct Acc {
            total: usize,
            successes: usize,
            failures: usize,
            duration_ms: i64,
            tokens: i64,
            cost: f64,
        }
        let mut by_day: BTreeMap<NaiveDate, Acc> = BTreeMap::new();

        for exec in executions {
            if !exec.status.is_terminal() {
                continue;
            }
            let acc = by_day.entry(exec.started_at.date_naive()).or_insert(Acc {
                total: 0,
                successes: 0,
                failures: 0,
                duration_ms: 0,
                tokens: 0,
                cost: 0.0,
            });
            acc.total += 1;
            match exec.status {
                ExecutionStatus::Success => acc.successes += 1,
                ExecutionStatus::Failed => acc.failures += 1,
                _ => {}
            }
            acc.duration_ms += exec.duration_ms.unwrap_or(0);
            acc.tokens += exec.tokens_input + exec.tokens_output;
            acc.cost += exec.cost_units;
        }

        Ok(by_day
            .into_iter()
            .rev()
            .map(|(date, acc)| DailySummary {
                date,
                total: acc.total,
                successes: acc.successes,
                failures: acc.failures,
                avg_duration_ms: acc.duration_ms as f64 / acc.total as f64,
                total_tokens: acc.tokens,
                total_cost: acc.cost,
            })
            .collect())
    }

    /// Direction of the daily pass rate over the window: the mean of the
    /// first half of the days compared against the mean of the second half.
    pub fn trend(&self, days: u32) -> Result<Trend> {
        let mut series = self.daily_summary(days)?;
        series.reverse(); // oldest first
        if series.len() < 2 {
            return Ok(Trend::Stable);
        }

        let rates: Vec<f64> = series
            .iter()
            .map(|day| day.successes as f64 / day.total as f64)
            .collect();
        let mid = rates.len() / 2;
        let first = rates[..mid].iter().sum::<f64>() / mid as f64;
        let second = rates[mid..].iter().sum::<f64>() / (rates.len() - mid) as f64;

        let delta = second - first;
        if delta > self.stability_band {
            Ok(Trend::Improving)
        } else if delta < -self.stability_band {
            Ok(Trend::Degrading)
        } else {
            Ok(Trend::Stable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecorderConfig;
    use crate::recorder::SpanRecorder;
    use crate::store::{CloseAttributes, SqliteRecordStore};

    fn fixture() -> (Arc<dyn RecordStore>, SpanRecorder) {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let recorder = SpanRecorder::new(Arc::clone(&store), &RecorderConfig::default());
        (store, recorder)
    }

    fn close(
        recorder: &SpanRecorder,
        id: &str,
        status: ExecutionStatus,
        tokens: i64,
        cost: f64,
    ) {
        recorder
            .close_execution(
                id,
                status,
                CloseAttributes {
                    tokens_input: tokens,
                    tokens_output: tokens,
                    cost_units: cost,
                    ..CloseAttributes::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn running_executions_are_excluded_from_rollups() {
        let (store, recorder) = fixture();
        let wf = recorder.open_workflow("run", "demo").unwrap();
        let root = recorder.open_execution(&wf.id, None, "planner", "plan").unwrap();
        let group = recorder
            .open_parallel_group(
                &wf.id,
                &root.id,
                &[
                    ("worker".into(), "a".into()),
                    ("worker".into(), "b".into()),
                ],
            )
            .unwrap();
        close(&recorder, &group[0].id, ExecutionStatus::Success, 10, 0.5);
        // group[1] and the root stay running.

        let metrics = MetricsAggregator::new(Arc::clone(&store));
        let rollup = metrics.agent_performance(wf.started_at).unwrap();
        assert_eq!(rollup.len(), 1);
        assert_eq!(rollup[0].agent_name, "worker");
        assert_eq!(rollup[0].count, 1);
        assert!((rollup[0].success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rollup_aggregates_tokens_and_cost() {
        let (store, recorder) = fixture();
        let wf = recorder.open_workflow("run", "demo").unwrap();
        let root = recorder.open_execution(&wf.id, None, "planner", "plan").unwrap();
        close(&recorder, &root.id, ExecutionStatus::Success, 100, 2.5);

        let metrics = MetricsAggregator::new(Arc::clone(&store));
        let rollup = metrics.agent_performance(wf.started_at).unwrap();
        assert_eq!(rollup[0].avg_tokens, 200.0);
        assert!((rollup[0].total_cost - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn trend_with_single_day_is_stable() {
        let (store, recorder) = fixture();
        let wf = recorder.open_workflow("run", "demo").unwrap();
        let root = recorder.open_execution(&wf.id, None, "planner", "plan").unwrap();
        close(&recorder, &root.id, ExecutionStatus::Success, 0, 0.0);

        let metrics = MetricsAggregator::new(Arc::clone(&store));
        assert_eq!(metrics.trend(7).unwrap(), Trend::Stable);
    }
}
