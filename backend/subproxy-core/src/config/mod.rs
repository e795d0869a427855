use crate::channel::DEFAULT_MAX_FRAME_BYTES;
use crate::error::config::ConfigError;
use crate::{ENV_MAX_FRAME_BYTES, ENV_STRATEGIES, ENV_TERMINATION_SIGNAL, ENV_WORKER_PROGRAM};

use common::ErrorLocation;

use std::env::VarError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const DOTENV_FILE_NAME: &str = ".env";
const STRATEGY_SEPARATOR: char = ',';

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// How a worker process is created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStrategy {
    /// Start a fresh worker host program; nothing is inherited from the parent.
    Exec,
    /// `fork(2)` the current process; the child inherits the parent's memory.
    ///
    /// Only the forking thread exists in the child, so any lock another thread held at fork
    /// time stays held there. The child therefore logs nothing, and targets built by local
    /// constructors must not take locks shared with other parent threads.
    Fork,
}

impl Display for SpawnStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SpawnStrategy::Exec => write!(f, "exec"),
            SpawnStrategy::Fork => write!(f, "fork"),
        }
    }
}

impl FromStr for SpawnStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exec" => Ok(SpawnStrategy::Exec),
            "fork" => Ok(SpawnStrategy::Fork),
            other => Err(format!("unknown spawn strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TerminationSignal {
    #[default]
    Term,
    Kill,
}

impl Display for TerminationSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TerminationSignal::Term => write!(f, "SIGTERM"),
            TerminationSignal::Kill => write!(f, "SIGKILL"),
        }
    }
}

impl FromStr for TerminationSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "term" | "sigterm" => Ok(TerminationSignal::Term),
            "kill" | "sigkill" => Ok(TerminationSignal::Kill),
            other => Err(format!("unknown termination signal '{other}'")),
        }
    }
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    #[serde(default = "default_strategies")]
    pub strategies: Vec<SpawnStrategy>,

    /// Worker host program for the exec strategy; the current executable when unset.
    #[serde(default)]
    pub worker_program: Option<PathBuf>,

    #[serde(default)]
    pub termination_signal: TerminationSignal,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            worker_program: None,
            termination_signal: TerminationSignal::default(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_strategies() -> Vec<SpawnStrategy> {
    vec![SpawnStrategy::Exec, SpawnStrategy::Fork]
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ProxyConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read proxy config {}: {e}", path.display());
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        let config: ProxyConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse proxy config {}: {e}", path.display());
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Proxy config loaded from {}", path.display());
        Ok(config)
    }

    /// Defaults overlaid with `SUBPROXY_*` environment variables.
    ///
    /// A `.env` file is loaded first, from the current directory or next to the executable.
    pub fn from_env() -> Result<Self, ConfigError> {
        try_load_dotenv();
        Self::default().apply_env(|key| std::env::var(key))
    }

    /// Overlay values produced by `lookup`, keyed by the `SUBPROXY_*` variable names.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        if let Some(raw) = read_var(&lookup, ENV_STRATEGIES)? {
            self.strategies = raw
                .split(STRATEGY_SEPARATOR)
                .filter(|s| !s.trim().is_empty())
                .map(SpawnStrategy::from_str)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|reason| env_error(ENV_STRATEGIES, reason))?;
        }

        if let Some(raw) = read_var(&lookup, ENV_WORKER_PROGRAM)? {
            self.worker_program = Some(PathBuf::from(raw));
        }

        if let Some(raw) = read_var(&lookup, ENV_TERMINATION_SIGNAL)? {
            self.termination_signal = raw
                .parse()
                .map_err(|reason| env_error(ENV_TERMINATION_SIGNAL, reason))?;
        }

        if let Some(raw) = read_var(&lookup, ENV_MAX_FRAME_BYTES)? {
            self.max_frame_bytes = raw
                .trim()
                .parse()
                .map_err(|e| env_error(ENV_MAX_FRAME_BYTES, format!("{e}")))?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn with_strategies(mut self, strategies: Vec<SpawnStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    pub fn with_termination_signal(mut self, signal: TerminationSignal) -> Self {
        self.termination_signal = signal;
        self
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "at least one spawn strategy is required".to_string(),
            });
        }

        for (index, strategy) in self.strategies.iter().enumerate() {
            if self.strategies[..index].contains(strategy) {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("spawn strategy '{strategy}' is listed more than once"),
                });
            }
        }

        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "max_frame_bytes must be greater than zero".to_string(),
            });
        }

        if let Some(program) = &self.worker_program
            && program.as_os_str().is_empty()
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "worker_program cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[track_caller]
fn read_var<F>(lookup: &F, key: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match lookup(key) {
        Ok(value) => {
            debug!("{key} set from environment");
            Ok(Some(value))
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(e @ VarError::NotUnicode(_)) => Err(env_error(key, e.to_string())),
    }
}

#[track_caller]
fn env_error(variable: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::EnvError {
        location: ErrorLocation::from(Location::caller()),
        variable: variable.to_string(),
        reason: reason.into(),
    }
}

fn try_load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return Some(path);
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        let env_path = exe_dir.join(DOTENV_FILE_NAME);
        if env_path.exists() {
            match dotenvy::from_path(&env_path) {
                Ok(()) => {
                    info!("Loaded .env from: {:?}", env_path);
                    return Some(env_path);
                }
                Err(e) => warn!("Failed to parse .env at {:?}: {}", env_path, e),
            }
        }
    }

    None
}
