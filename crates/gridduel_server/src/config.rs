//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `GRIDDUEL_*` environment variables, then command-line flags.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use gridduel_rules::Geometry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "GRIDDUEL_";

/// Configuration for the game server and its single session.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[serde(default)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    /// Host to bind to.
    #[setters(into)]
    host: String,

    /// Port to bind to.
    port: u16,

    /// Board edge length N.
    board_size: usize,

    /// Marks in a line needed to win (K).
    run_length: usize,

    /// Delay between a terminal outcome and the automatic reset.
    reset_delay_ms: u64,

    /// Interval between liveness probes.
    ping_interval_ms: u64,

    /// Probes that may go unanswered before a connection is dropped.
    max_missed_pongs: u32,

    /// Reject a connection whose client id is already bound to a player.
    reject_duplicate_clients: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            board_size: 3,
            run_length: 3,
            reset_delay_ms: 2000,
            ping_interval_ms: 500,
            max_missed_pongs: 10,
            reject_duplicate_clients: true,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Keys missing from the file keep their defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Loads the file when given, otherwise starts from defaults.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Applies `GRIDDUEL_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies `GRIDDUEL_*` overrides from `lookup`.
    #[instrument(skip(self, lookup))]
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup(&format!("{ENV_PREFIX}HOST")) {
            self.host = host;
        }
        if let Some(port) = parse_override(&lookup, "PORT")? {
            self.port = port;
        }
        if let Some(size) = parse_override(&lookup, "BOARD_SIZE")? {
            self.board_size = size;
        }
        if let Some(run_length) = parse_override(&lookup, "RUN_LENGTH")? {
            self.run_length = run_length;
        }
        if let Some(delay) = parse_override(&lookup, "RESET_DELAY_MS")? {
            self.reset_delay_ms = delay;
        }
        if let Some(interval) = parse_override(&lookup, "PING_INTERVAL_MS")? {
            self.ping_interval_ms = interval;
        }
        if let Some(missed) = parse_override(&lookup, "MAX_MISSED_PONGS")? {
            self.max_missed_pongs = missed;
        }
        if let Some(reject) = parse_override(&lookup, "REJECT_DUPLICATE_CLIENTS")? {
            self.reject_duplicate_clients = reject;
        }
        Ok(self)
    }

    /// Checks that the values describe a runnable session.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry()?;
        if self.ping_interval_ms == 0 {
            return Err(ConfigError::new(
                "ping_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Board geometry described by `board_size` and `run_length`.
    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        Geometry::new(self.board_size, self.run_length)
            .map_err(|e| ConfigError::new(format!("Invalid board: {}", e.message)))
    }

    /// Reset delay as a [`Duration`].
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    /// Ping interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to render config: {}", e)))
    }
}

fn parse_override<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    lookup(&key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid {}={:?}: {}", key, raw, e)))
        })
        .transpose()
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
