use crate::app::render;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::LoomError;
use crate::improve::{CommandChangeProcess, ImprovementEngine};
use crate::metrics::MetricsAggregator;
use crate::recorder::{SpanRecorder, run_sweeper};
use crate::store::{RecordStore, SqliteRecordStore};
use crate::validator::Validator;
use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let db_path = config.db_path();
    let store = SqliteRecordStore::open(&db_path)
        .with_context(|| format!("opening record store at {}", db_path.display()))?;
    Ok(Arc::new(store))
}

/// Run one CLI command to completion. The exit code travels back to `main`
/// so the store connection (and any other guards) unwind normally.
#[allow(clippy::too_many_lines)]
pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<ExitCode> {
    let store = open_store(&config)?;

    // The config file owns hook registrations; the table mirrors it so the
    // persisted layout stays complete for external readers.
    store.replace_hook_registrations(&config.hooks.registrations)?;

    match cli.command {
        Commands::Recent { limit, json } => {
            let executions = store.list_recent_executions(limit, false)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&executions)?);
            } else {
                println!("{}", render::render_executions(&executions));
            }
        }

        Commands::Failed { limit, json } => {
            let executions = store.list_recent_executions(limit, true)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&executions)?);
            } else {
                println!("{}", render::render_executions(&executions));
            }
        }

        Commands::Execution { id, json } => {
            let Some(execution) = store.get_execution(&id)? else {
                bail!("execution {id} not found");
            };
            let children = store.list_children(&id)?;
            let validation = store.latest_validation(&id)?;
            if json {
                let detail = serde_json::json!({
                    "execution": execution,
                    "children": children,
                    "latest_validation": validation,
                });
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                println!(
                    "{}",
                    render::render_execution_detail(&execution, &children, validation.as_ref())
                );
            }
        }

        Commands::Summary { days, json } => {
            let aggregator = MetricsAggregator::new(Arc::clone(&store))
                .with_stability_band(config.metrics.stability_band);
            let summary = aggregator.daily_summary(days)?;
            let trend = aggregator.trend(days)?;
            if json {
                let out = serde_json::json!({ "days": summary, "trend": trend });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", render::render_summary(&summary, trend));
            }
        }

        Commands::Agents { since_days, json } => {
            let aggregator = MetricsAggregator::new(Arc::clone(&store));
            let since = Utc::now() - Duration::days(i64::from(since_days));
            let agents = aggregator.agent_performance(since)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
            } else {
                println!("{}", render::render_agents(&agents));
            }
        }

        Commands::Validate { execution_id, json } => {
            let validator = Validator::new(Arc::clone(&store), config.validation_root());
            let validation = validator.validate(&execution_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&validation)?);
            } else {
                println!("{}", render::render_validation(&validation));
            }
            if !validation.passed {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Improve {
            dry_run,
            lookback_days,
            metric,
            json,
        } => {
            let mut improve_config = config.improve.clone();
            if let Some(days) = lookback_days {
                improve_config.lookback_days = days;
            }
            let change_command = improve_config.change_command.clone();
            let engine = ImprovementEngine::new(Arc::clone(&store), improve_config);
            if dry_run || metric.is_some() || change_command.is_none() {
                let candidates = engine.candidates(metric)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&candidates)?);
                } else {
                    println!("{}", render::render_candidates(&candidates));
                }
                return Ok(ExitCode::SUCCESS);
            }

            let change = CommandChangeProcess::new(change_command.unwrap_or_default());
            let report = match engine.run_cycle(&change).await {
                Ok(report) => report,
                Err(LoomError::Improve(crate::error::ImproveError::EmptyWindow)) => {
                    println!("No executions in the lookback window; nothing to improve.");
                    return Ok(ExitCode::SUCCESS);
                }
                Err(e) => return Err(e.into()),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render::render_cycle_report(&report));
            }
        }

        Commands::Sweeper => {
            let recorder = Arc::new(SpanRecorder::new(Arc::clone(&store), &config.recorder));
            let poll_secs = config.recorder.sweep_poll_secs;
            info!(poll_secs, "starting orphan sweeper");
            tokio::select! {
                result = run_sweeper(recorder, poll_secs) => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("sweeper stopped");
                }
            }
        }

        Commands::Cleanup { days, vacuum } => {
            let removed = store.purge_older_than(days)?;
            println!("Removed {removed} executions from workflows older than {days} days");
            if vacuum {
                store.vacuum()?;
                println!("Database vacuumed");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
