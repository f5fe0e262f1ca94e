#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod hooks;
pub mod improve;
pub mod metrics;
pub mod recorder;
pub mod store;
pub mod validator;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{LoomError, Result};
pub use recorder::SpanRecorder;
pub use store::{RecordStore, SqliteRecordStore};
