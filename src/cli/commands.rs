use crate::improve::MetricKind;
use clap::{Parser, Subcommand};

/// `spanloom` - workflow orchestration and observability engine.
#[derive(Parser, Debug)]
#[command(name = "spanloom")]
#[command(version = "0.1.0")]
#[command(about = "Track, validate, and improve agent task executions.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show recent executions
    Recent {
        /// Number of executions to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show recent failed executions
    Failed {
        /// Number of executions to show
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one execution with its children and latest validation
    Execution {
        /// Execution id
        id: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the daily summary and trend
    Summary {
        /// Number of days to cover
        #[arg(long, default_value = "7")]
        days: u32,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show per-agent performance
    Agents {
        /// Restrict to executions started in the last N days
        #[arg(long, default_value = "30")]
        since_days: u32,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate a terminal execution's claimed outputs
    Validate {
        /// Execution id
        execution_id: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run one improvement cycle
    Improve {
        /// Analyze and rank candidates without applying a change
        #[arg(long)]
        dry_run: bool,

        /// Override the configured analysis window
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Only report candidates for one metric (duration, success_rate, cost)
        #[arg(long)]
        metric: Option<MetricKind>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run the orphan sweeper until interrupted
    Sweeper,

    /// Delete terminal data older than N days
    Cleanup {
        /// Keep data newer than N days
        #[arg(long, default_value = "30")]
        days: i64,

        /// Reclaim file space afterwards
        #[arg(long)]
        vacuum: bool,
    },
}
