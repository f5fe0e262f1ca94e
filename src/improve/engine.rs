use super::{
    ChangeProcess, ChangeRequest, ChangeStatus, CycleOutcome, CycleReport, ImplementedChange,
    ImprovementCandidate, MetricKind,
};
use crate::config::ImproveConfig;
use crate::error::{ImproveError, Result};
use crate::metrics::{AgentPerformance, MetricsAggregator};
use crate::store::RecordStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Closed-loop optimizer: `Collect → Analyze → Prioritize → Implement →
/// Validate → Report`, one full pass per call. Operates purely on the
/// numeric execution statistics — it never looks at task semantics.
pub struct ImprovementEngine {
    store: Arc<dyn RecordStore>,
    config: ImproveConfig,
}

impl ImprovementEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: ImproveConfig) -> Self {
        Self { store, config }
    }

    fn collect(&self) -> Result<Vec<AgentPerformance>> {
        let since = Utc::now() - Duration::days(i64::from(self.config.lookback_days));
        MetricsAggregator::new(Arc::clone(&self.store)).agent_performance(since)
    }

    /// Collect and analyze without implementing anything. Used by the CLI's
    /// dry run and by the report's remaining-candidate list. `metric` narrows
    /// the ranked list to one kind; `None` keeps them all.
    pub fn candidates(&self, metric: Option<MetricKind>) -> Result<Vec<ImprovementCandidate>> {
        let mut candidates = self.analyze(&self.collect()?);
        if let Some(kind) = metric {
            candidates.retain(|c| c.metric_kind == kind);
        }
        Ok(candidates)
    }

    fn analyze(&self, rollup: &[AgentPerformance]) -> Vec<ImprovementCandidate> {
        let period_days = f64::from(self.config.lookback_days.max(1));
        let reliability_floor = self
            .config
            .success_rate_floor
            .unwrap_or_else(|| peer_majority_rate(rollup));

        let mut candidates = Vec::new();
        for agent in rollup {
            let frequency = agent.count as f64 / period_days;

            // Duration above its declared target.
            let target = self.config.duration_target_ms;
            if target > 0.0 && agent.avg_duration_ms > target {
                let severity = agent.avg_duration_ms / target - 1.0;
                candidates.push(self.candidate(
                    agent,
                    MetricKind::Duration,
                    agent.avg_duration_ms,
                    target,
                    frequency,
                    severity,
                ));
            }

            // Success rate below the reliability floor.
            if agent.success_rate < reliability_floor {
                let severity = reliability_floor - agent.success_rate;
                candidates.push(self.candidate(
                    agent,
                    MetricKind::SuccessRate,
                    agent.success_rate,
                    reliability_floor,
                    frequency,
                    severity,
                ));
            }

            // Cost per execution above target, when a target is configured.
            if let Some(cost_target) = self.config.cost_target {
                let avg_cost = agent.total_cost / agent.count as f64;
                if cost_target > 0.0 && avg_cost > cost_target {
                    let severity = avg_cost / cost_target - 1.0;
                    candidates.push(self.candidate(
                        agent,
                        MetricKind::Cost,
                        avg_cost,
                        cost_target,
                        frequency,
                        severity,
                    ));
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.impact_score
                .total_cmp(&a.impact_score)
                .then(b.frequency_per_period.total_cmp(&a.frequency_per_period))
        });
        candidates
    }

    fn candidate(
        &self,
        agent: &AgentPerformance,
        metric_kind: MetricKind,
        observed_value: f64,
        target_value: f64,
        frequency_per_period: f64,
        severity: f64,
    ) -> ImprovementCandidate {
        ImprovementCandidate {
            agent_name: agent.agent_name.clone(),
            metric_kind,
            observed_value,
            target_value,
            frequency_per_period,
            severity,
            impact_score: frequency_per_period * severity * self.config.cost_weight,
        }
    }

    /// Run one full cycle, handing the single top candidate to `change`.
    pub async fn run_cycle(&self, change: &dyn ChangeProcess) -> Result<CycleReport> {
        let rollup = self.collect()?;
        if rollup.is_empty() {
            return Err(ImproveError::EmptyWindow.into());
        }

        let mut candidates = self.analyze(&rollup);
        let actionable = candidates
            .first()
            .is_some_and(|top| top.impact_score >= self.config.min_impact_threshold);
        if !actionable {
            info!(
                candidates = candidates.len(),
                threshold = self.config.min_impact_threshold,
                "no candidate above threshold, cycle ends with no action"
            );
            return Ok(CycleReport {
                generated_at: Utc::now(),
                lookback_days: self.config.lookback_days,
                analyzed_agents: rollup.len(),
                outcome: CycleOutcome::NoActionNeeded,
                implemented: None,
                remaining: candidates,
            });
        }

        let top = candidates.remove(0);
        info!(
            agent = %top.agent_name,
            metric = %top.metric_kind,
            impact = top.impact_score,
            "implementing top candidate"
        );

        let applied_at = Utc::now();
        let response = change
            .apply(ChangeRequest {
                agent_name: top.agent_name.clone(),
                metric_kind: top.metric_kind,
                observed_value: top.observed_value,
                target_value: top.target_value,
            })
            .await
            .map_err(|e| ImproveError::ChangeProcess(e.to_string()))?;
        if response.status == ChangeStatus::Failure {
            return Err(ImproveError::ChangeProcess(format!(
                "external process reported failure for agent {}",
                top.agent_name
            ))
            .into());
        }

        // Post-change measurement: prefer executions recorded after the
        // change; fall back to the value the external process reported when
        // the post window is still empty.
        let after_value = self
            .measure_after(&top, applied_at)?
            .unwrap_or(response.new_observed_value);
        let before_value = top.observed_value;

        let (improvement_pct, regressed) = match top.metric_kind {
            MetricKind::Duration | MetricKind::Cost => {
                let pct = (before_value - after_value) / before_value * 100.0;
                let regressed =
                    after_value > before_value * (1.0 + self.config.regression_tolerance);
                (pct, regressed)
            }
            MetricKind::SuccessRate => {
                let pct = (after_value - before_value) * 100.0;
                let regressed = after_value < before_value - self.config.regression_tolerance;
                (pct, regressed)
            }
        };

        let outcome = if regressed {
            warn!(
                agent = %top.agent_name,
                metric = %top.metric_kind,
                before = before_value,
                after = after_value,
                "metric regressed after change, flagging for rollback"
            );
            CycleOutcome::NeedsRollback
        } else {
            CycleOutcome::Implemented
        };

        Ok(CycleReport {
            generated_at: Utc::now(),
            lookback_days: self.config.lookback_days,
            analyzed_agents: rollup.len(),
            outcome,
            implemented: Some(ImplementedChange {
                candidate: top,
                before_value,
                after_value,
                improvement_pct,
            }),
            remaining: candidates,
        })
    }

    fn measure_after(
        &self,
        candidate: &ImprovementCandidate,
        applied_at: chrono::DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let rollup =
            MetricsAggregator::new(Arc::clone(&self.store)).agent_performance(applied_at)?;
        Ok(rollup
            .iter()
            .find(|a| a.agent_name == candidate.agent_name)
            .map(|agent| match candidate.metric_kind {
                MetricKind::Duration => agent.avg_duration_ms,
                MetricKind::SuccessRate => agent.success_rate,
                MetricKind::Cost => agent.total_cost / agent.count as f64,
            }))
    }
}

/// Reliability floor when none is configured: the median success rate of
/// the peer group.
fn peer_majority_rate(rollup: &[AgentPerformance]) -> f64 {
    if rollup.is_empty() {
        return 0.0;
    }
    let mut rates: Vec<f64> = rollup.iter().map(|a| a.success_rate).collect();
    rates.sort_by(f64::total_cmp);
    rates[rates.len() / 2]
}
