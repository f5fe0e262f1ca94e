use crate::error::{ConfigError, Result};
use crate::hooks::HookRegistration;
use anyhow::Context;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Free-text label attached to workflows opened by this process.
    #[serde(default = "default_project")]
    pub project: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,

    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub improve: ImproveConfig,
}

fn default_project() -> String {
    "default".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Defaults to `<workspace>/spanloom.db` when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// How long after a parent closes that late children are still accepted.
    #[serde(default = "default_grace_window_ms")]
    pub grace_window_ms: i64,

    /// Running spans older than this are cancelled by the orphan sweep.
    #[serde(default = "default_max_running_age_secs")]
    pub max_running_age_secs: i64,

    #[serde(default = "default_sweep_poll_secs")]
    pub sweep_poll_secs: u64,
}

fn default_grace_window_ms() -> i64 {
    5_000
}

fn default_max_running_age_secs() -> i64 {
    3_600
}

fn default_sweep_poll_secs() -> u64 {
    60
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: default_grace_window_ms(),
            max_running_age_secs: default_max_running_age_secs(),
            sweep_poll_secs: default_sweep_poll_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Loaded once at startup; immutable for the session.
    #[serde(default)]
    pub registrations: Vec<HookRegistration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Anchor for relative file claims. Defaults to the current directory.
    #[serde(default)]
    pub validation_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Success-rate delta below which the trend counts as stable.
    #[serde(default = "default_stability_band")]
    pub stability_band: f64,
}

fn default_stability_band() -> f64 {
    0.05
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            stability_band: default_stability_band(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImproveConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Declared duration target applied to every agent, in milliseconds.
    #[serde(default = "default_duration_target_ms")]
    pub duration_target_ms: f64,

    /// Absolute reliability floor. Unset means the peer-majority rate.
    #[serde(default)]
    pub success_rate_floor: Option<f64>,

    /// Cost-per-execution target. Unset disables cost candidates.
    #[serde(default)]
    pub cost_target: Option<f64>,

    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,

    /// Candidates scoring below this end the cycle with "no action needed".
    #[serde(default = "default_min_impact_threshold")]
    pub min_impact_threshold: f64,

    /// Relative regression beyond which a change is flagged for rollback.
    #[serde(default = "default_regression_tolerance")]
    pub regression_tolerance: f64,

    /// External change process invoked with the top candidate. Unset makes
    /// `improve` analyze-only.
    #[serde(default)]
    pub change_command: Option<String>,
}

fn default_lookback_days() -> u32 {
    30
}

fn default_duration_target_ms() -> f64 {
    60_000.0
}

fn default_cost_weight() -> f64 {
    1.0
}

fn default_min_impact_threshold() -> f64 {
    1.0
}

fn default_regression_tolerance() -> f64 {
    0.05
}

impl Default for ImproveConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            duration_target_ms: default_duration_target_ms(),
            success_rate_floor: None,
            cost_target: None,
            cost_weight: default_cost_weight(),
            min_impact_threshold: default_min_impact_threshold(),
            regression_tolerance: default_regression_tolerance(),
            change_command: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            project: default_project(),
            store: StoreConfig::default(),
            recorder: RecorderConfig::default(),
            hooks: HooksConfig::default(),
            validator: ValidatorConfig::default(),
            metrics: MetricsConfig::default(),
            improve: ImproveConfig::default(),
        }
    }
}

impl Config {
    /// Load `~/.spanloom/config.toml`, writing a default one on first run.
    pub fn load_or_init() -> Result<Self> {
        let user_dirs = UserDirs::new()
            .ok_or_else(|| ConfigError::Load("could not determine home directory".into()))?;
        let workspace_dir = user_dirs.home_dir().join(".spanloom");
        Self::load_from_workspace(&workspace_dir)
    }

    /// Load from an explicit workspace directory. Used directly by tests.
    pub fn load_from_workspace(workspace_dir: &Path) -> Result<Self> {
        let config_path = workspace_dir.join("config.toml");

        let mut config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str::<Self>(&raw)
                .map_err(|e| ConfigError::Load(format!("{}: {e}", config_path.display())))?
        } else {
            fs::create_dir_all(workspace_dir)
                .with_context(|| format!("creating {}", workspace_dir.display()))?;
            let config = Self::default();
            let raw = toml::to_string_pretty(&config)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
            fs::write(&config_path, raw)
                .with_context(|| format!("writing {}", config_path.display()))?;
            config
        };

        config.workspace_dir = workspace_dir.to_path_buf();
        config.config_path = config_path;
        config.validate()?;
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.store
            .db_path
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("spanloom.db"))
    }

    pub fn validation_root(&self) -> PathBuf {
        self.validator
            .validation_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn validate(&self) -> Result<()> {
        if self.recorder.grace_window_ms < 0 {
            return Err(
                ConfigError::Validation("recorder.grace_window_ms must be >= 0".into()).into(),
            );
        }
        if self.recorder.max_running_age_secs <= 0 {
            return Err(ConfigError::Validation(
                "recorder.max_running_age_secs must be > 0".into(),
            )
            .into());
        }
        if let Some(floor) = self.improve.success_rate_floor {
            if !(0.0..=1.0).contains(&floor) {
                return Err(ConfigError::Validation(
                    "improve.success_rate_floor must be within 0..=1".into(),
                )
                .into());
            }
        }
        if self.improve.regression_tolerance < 0.0 {
            return Err(ConfigError::Validation(
                "improve.regression_tolerance must be >= 0".into(),
            )
            .into());
        }
        Ok(())
    }
}
