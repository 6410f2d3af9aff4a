//! Configuration loading for the Mind runtime
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--config`, `--port`, `--service-url`)
//! 2. Environment variable `MIND_CONFIG` (path to a TOML file)
//! 3. `<config_dir>/mind/config.toml`
//! 4. Built-in defaults
//!
//! A missing config file is never fatal: a warning is logged and defaults
//! are used. A file that exists but fails to parse is an error.

use crate::error::{Error, Result};
use crate::timing::Meter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MIND_CONFIG";

/// Runtime configuration loaded from TOML
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the generation/resolution service
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// HTTP control surface port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport tempo in BPM
    #[serde(default = "default_tempo")]
    pub tempo: f64,

    #[serde(default = "default_time_signature")]
    pub time_signature: String,

    /// Anchor pitch sent with generation requests
    #[serde(default = "default_anchor_midi")]
    pub anchor_midi: u8,

    /// Role sent with generation requests
    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default = "default_generate_debounce_ms")]
    pub generate_debounce_ms: u64,

    #[serde(default = "default_resolve_debounce_ms")]
    pub resolve_debounce_ms: u64,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Input slots of newly created gate nodes
    #[serde(default = "default_gate_inputs")]
    pub gate_inputs: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_service_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_tempo() -> f64 {
    120.0
}

fn default_time_signature() -> String {
    "4/4".to_string()
}

fn default_anchor_midi() -> u8 {
    60
}

fn default_role() -> String {
    "lead".to_string()
}

fn default_generate_debounce_ms() -> u64 {
    500
}

fn default_resolve_debounce_ms() -> u64 {
    300
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_gate_inputs() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            port: default_port(),
            tempo: default_tempo(),
            time_signature: default_time_signature(),
            anchor_midi: default_anchor_midi(),
            role: default_role(),
            generate_debounce_ms: default_generate_debounce_ms(),
            resolve_debounce_ms: default_resolve_debounce_ms(),
            event_bus_capacity: default_event_bus_capacity(),
            gate_inputs: default_gate_inputs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load from the resolved path, or defaults if there is no file
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::resolve(cli_path)?;
        source.log();
        Ok(config)
    }

    /// Like [`TomlConfig::load_or_default`], but reports where the config came
    /// from instead of logging it (for callers that log once tracing is up)
    pub fn resolve(cli_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        match ConfigResolver::from_env().resolve(cli_path) {
            Some(path) if path.exists() => {
                let config = Self::load(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            Some(path) => Ok((Self::default(), ConfigSource::Missing(path))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    fn check(&self) -> Result<()> {
        self.meter().map_err(|e| Error::Config(e.to_string()))?;
        if self.gate_inputs == 0 {
            return Err(Error::Config("gate_inputs must be at least 1".to_string()));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config(
                "event_bus_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport meter built from `tempo` and `time_signature`
    pub fn meter(&self) -> Result<Meter> {
        Meter::from_time_signature(self.tempo, &self.time_signature)
    }

    pub fn generate_debounce(&self) -> Duration {
        Duration::from_millis(self.generate_debounce_ms)
    }

    pub fn resolve_debounce(&self) -> Duration {
        Duration::from_millis(self.resolve_debounce_ms)
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The resolved file does not exist; built-in defaults are in use
    Missing(PathBuf),
    /// No config directory on this platform; built-in defaults are in use
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            ),
            ConfigSource::Defaults => {
                warn!("No config directory available, using built-in defaults")
            }
        }
    }
}

/// Decides which config file to read
///
/// Environment and platform lookups are captured at construction so the
/// priority logic can be exercised without touching process state.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    env_path: Option<PathBuf>,
    config_dir: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(env_path: Option<PathBuf>, config_dir: Option<PathBuf>) -> Self {
        Self {
            env_path,
            config_dir,
        }
    }

    pub fn from_env() -> Self {
        let env_path = std::env::var_os(CONFIG_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(env_path, dirs::config_dir())
    }

    /// Pick the config path: CLI, then environment, then the user config dir
    pub fn resolve(&self, cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_path {
            return Some(path.to_path_buf());
        }
        if let Some(path) = &self.env_path {
            return Some(path.clone());
        }
        self.config_dir
            .as_ref()
            .map(|dir| dir.join("mind").join("config.toml"))
    }
}
