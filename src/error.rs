use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `spanloom`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum LoomError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Record store ─────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Span recorder ────────────────────────────────────────────────────
    #[error("recorder: {0}")]
    Recorder(#[from] RecorderError),

    // ── Validator ────────────────────────────────────────────────────────
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    // ── Hook dispatch ────────────────────────────────────────────────────
    #[error("hook: {0}")]
    Hook(#[from] HookError),

    // ── Improvement engine ───────────────────────────────────────────────
    #[error("improve: {0}")]
    Improve(#[from] ImproveError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Record store errors ────────────────────────────────────────────────────

/// Storage failures are fatal to the calling operation and always propagate;
/// metrics and validation integrity depend on complete data.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {message}")]
    Open { path: String, message: String },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("corrupt {kind} row {id}: {message}")]
    CorruptRow {
        kind: &'static str,
        id: String,
        message: String,
    },
}

// ─── Span recorder errors ───────────────────────────────────────────────────

/// Structural misuse by the caller. Surfaced synchronously, never retried.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("invalid parent {parent_id}: {reason}")]
    InvalidParent { parent_id: String, reason: String },

    #[error("execution {0} is already closed")]
    AlreadyClosed(String),

    #[error("{0} is not a terminal status")]
    NotTerminalStatus(String),

    #[error("workflow {0} is not running")]
    WorkflowClosed(String),

    #[error("workflow {0} already has a root execution")]
    RootExists(String),

    #[error("root execution {0} is still running")]
    RootRunning(String),
}

// ─── Validator errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("execution {0} has not reached a terminal status")]
    NotTerminal(String),
}

// ─── Hook dispatch errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HookError {
    #[error("unknown handler: {0}")]
    UnknownHandler(String),

    #[error("blocking handler {handler} failed: {reason}")]
    BlockingFailure { handler: String, reason: String },

    #[error("blocking handler {handler} exceeded {timeout_ms}ms")]
    BlockingTimeout { handler: String, timeout_ms: u64 },
}

// ─── Improvement engine errors ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ImproveError {
    #[error("change process failed: {0}")]
    ChangeProcess(String),

    #[error("no executions recorded in the lookback window")]
    EmptyWindow,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, LoomError>;
