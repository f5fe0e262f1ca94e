use crate::improve::{CycleOutcome, CycleReport, ImprovementCandidate};
use crate::metrics::{AgentPerformance, DailySummary, Trend};
use crate::store::{Execution, Validation};

pub fn format_duration(ms: Option<i64>) -> String {
    match ms {
        None => "N/A".into(),
        Some(ms) if ms < 1_000 => format!("{ms}ms"),
        Some(ms) if ms < 60_000 => format!("{:.1}s", ms as f64 / 1_000.0),
        Some(ms) => format!("{:.1}m", ms as f64 / 60_000.0),
    }
}

pub fn render_executions(executions: &[Execution]) -> String {
    if executions.is_empty() {
        return "No executions found".into();
    }

    let mut out = format!(
        "{:<42} {:<20} {:<10} {:<10} {:<10} {:<20}\n",
        "ID", "Agent", "Status", "Duration", "Tokens", "Started"
    );
    out.push_str(&"-".repeat(114));
    out.push('\n');

    for e in executions {
        let agent: String = e.agent_name.chars().take(19).collect();
        out.push_str(&format!(
            "{:<42} {:<20} {:<10} {:<10} {:<10} {:<20}\n",
            e.id,
            agent,
            e.status.as_str(),
            format_duration(e.duration_ms),
            e.tokens_input + e.tokens_output,
            e.started_at.format("%Y-%m-%d %H:%M:%S"),
        ));
    }
    out
}

pub fn render_execution_detail(
    execution: &Execution,
    children: &[Execution],
    validation: Option<&Validation>,
) -> String {
    let mut out = format!("Execution {}\n\n", execution.id);
    out.push_str(&format!("Agent:    {}\n", execution.agent_name));
    out.push_str(&format!("Status:   {}\n", execution.status.as_str()));
    out.push_str(&format!("Task:     {}\n", execution.task_description));
    out.push_str(&format!("Started:  {}\n", execution.started_at.to_rfc3339()));
    out.push_str(&format!(
        "Duration: {}\n",
        format_duration(execution.duration_ms)
    ));
    out.push_str(&format!(
        "Tokens:   {} in / {} out (cost: {:.4})\n",
        execution.tokens_input, execution.tokens_output, execution.cost_units
    ));
    if let Some(error) = &execution.error_message {
        out.push_str(&format!("Error:    {error}\n"));
    }

    if !children.is_empty() {
        out.push_str(&format!("\nChildren ({}):\n", children.len()));
        for child in children {
            out.push_str(&format!(
                "  {} {} [{}] {}\n",
                child.id,
                child.agent_name,
                child.status.as_str(),
                format_duration(child.duration_ms),
            ));
        }
    }

    if let Some(validation) = validation {
        let verdict = if validation.passed { "PASSED" } else { "FAILED" };
        out.push_str(&format!(
            "\nValidation: {verdict} ({}/{} claims confirmed, checked {})\n",
            validation.actual_outputs.len(),
            validation.claimed_outputs.len(),
            validation.checked_at.to_rfc3339(),
        ));
    }
    out
}

pub fn render_validation(validation: &Validation) -> String {
    let verdict = if validation.passed { "PASSED" } else { "FAILED" };
    let mut out = format!(
        "Validation {verdict} for {} ({}/{} claims confirmed)\n",
        validation.execution_id,
        validation.actual_outputs.len(),
        validation.claimed_outputs.len(),
    );
    for claim in &validation.claimed_outputs {
        let confirmed = validation.actual_outputs.contains(claim);
        let mark = if confirmed { "ok " } else { "MISSING" };
        match claim {
            crate::store::ArtifactClaim::File { path } => {
                out.push_str(&format!("  [{mark}] file {path}\n"));
            }
            crate::store::ArtifactClaim::Command { label, exit_code } => {
                out.push_str(&format!("  [{mark}] command {label} (exit {exit_code})\n"));
            }
        }
    }
    out
}

pub fn render_summary(summary: &[DailySummary], trend: Trend) -> String {
    if summary.is_empty() {
        return "No data available".into();
    }

    let mut out = format!(
        "{:<12} {:<8} {:<8} {:<8} {:<12} {:<10} {:<12}\n",
        "Date", "Total", "Success", "Failed", "Avg Time", "Tokens", "Cost"
    );
    out.push_str(&"-".repeat(74));
    out.push('\n');
    for day in summary {
        out.push_str(&format!(
            "{:<12} {:<8} {:<8} {:<8} {:<12} {:<10} {:<12.4}\n",
            day.date.to_string(),
            day.total,
            day.successes,
            day.failures,
            format_duration(Some(day.avg_duration_ms as i64)),
            day.total_tokens,
            day.total_cost,
        ));
    }
    out.push_str(&format!("\nTrend: {trend:?}\n"));
    out
}

pub fn render_agents(agents: &[AgentPerformance]) -> String {
    if agents.is_empty() {
        return "No agent data available".into();
    }

    let mut out = format!(
        "{:<25} {:<12} {:<14} {:<12} {:<12} {:<12}\n",
        "Agent", "Executions", "Success Rate", "Avg Time", "Avg Tokens", "Total Cost"
    );
    out.push_str(&"-".repeat(90));
    out.push('\n');
    for a in agents {
        let agent: String = a.agent_name.chars().take(24).collect();
        out.push_str(&format!(
            "{:<25} {:<12} {:<14} {:<12} {:<12.0} {:<12.4}\n",
            agent,
            a.count,
            format!("{:.0}%", a.success_rate * 100.0),
            format_duration(Some(a.avg_duration_ms as i64)),
            a.avg_tokens,
            a.total_cost,
        ));
    }
    out
}

pub fn render_candidates(candidates: &[ImprovementCandidate]) -> String {
    if candidates.is_empty() {
        return "No improvement candidates".into();
    }

    let mut out = format!(
        "{:<25} {:<14} {:<12} {:<12} {:<10} {:<10}\n",
        "Agent", "Metric", "Observed", "Target", "Freq/day", "Impact"
    );
    out.push_str(&"-".repeat(86));
    out.push('\n');
    for c in candidates {
        let agent: String = c.agent_name.chars().take(24).collect();
        out.push_str(&format!(
            "{:<25} {:<14} {:<12.2} {:<12.2} {:<10.2} {:<10.2}\n",
            agent,
            c.metric_kind.to_string(),
            c.observed_value,
            c.target_value,
            c.frequency_per_period,
            c.impact_score,
        ));
    }
    out
}

pub fn render_cycle_report(report: &CycleReport) -> String {
    let mut out = String::new();
    match report.outcome {
        CycleOutcome::NoActionNeeded => {
            out.push_str("Cycle result: no action needed\n");
        }
        CycleOutcome::Implemented => {
            out.push_str("Cycle result: change implemented\n");
        }
        CycleOutcome::NeedsRollback => {
            out.push_str("Cycle result: METRIC REGRESSED - needs rollback\n");
        }
    }

    if let Some(change) = &report.implemented {
        out.push_str(&format!(
            "\nAgent {} / {}: {:.2} -> {:.2} ({:+.1}%)\n",
            change.candidate.agent_name,
            change.candidate.metric_kind,
            change.before_value,
            change.after_value,
            change.improvement_pct,
        ));
    }

    out.push_str(&format!(
        "\nRemaining candidates ({}):\n{}",
        report.remaining.len(),
        render_candidates(&report.remaining),
    ));
    out
}
