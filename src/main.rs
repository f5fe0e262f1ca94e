#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use spanloom::app::dispatch;
use spanloom::{Cli, Config};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = Arc::new(Config::load_or_init()?);
    dispatch::dispatch(cli, config).await
}
