//! Application configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock SQLite and Python tool servers. String values may reference
//! environment variables as `${NAME}`; an unset variable is an error rather
//! than an empty string.

use crate::tool_connection::adapters::StdioLauncherSettings;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has unexpected fields.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `${NAME}` reference names an unset environment variable.
    #[error("environment variable not set: {0}")]
    UndefinedVariable(String),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Model identifier used by every agent, in `provider/model` form.
    pub model: String,
    /// SQLite database file passed to the SQLite tool server.
    pub database_path: String,
    /// Seconds a tool server may take to finish the MCP handshake.
    pub handshake_timeout_secs: u64,
    /// Milliseconds to wait between shutdown escalation steps.
    pub close_grace_millis: u64,
    /// Optional `minijinja` template replacing the stock routing instruction.
    pub route_instruction_template: Option<String>,
    /// Overrides for the SQLite tool server.
    pub sqlite: ServerSection,
    /// Overrides for the Python execution tool server.
    pub python: ServerSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: "azure/gpt-4o-mini".to_owned(),
            database_path: "mydb.sqlite".to_owned(),
            handshake_timeout_secs: 30,
            close_grace_millis: 2_000,
            route_instruction_template: None,
            sqlite: ServerSection::default(),
            python: ServerSection::default(),
        }
    }
}

/// Per-server overrides. Unset fields keep the stock value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// Executable to launch.
    pub command: Option<String>,
    /// Arguments replacing the stock argument list.
    pub args: Option<Vec<String>>,
    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,
    /// Working directory for the child process.
    pub working_directory: Option<String>,
    /// Instruction replacing the stock sub-agent instruction.
    pub instruction: Option<String>,
    /// Capability description replacing the stock one.
    pub description: Option<String>,
}

impl AppConfig {
    /// Loads configuration from a TOML file, expanding `${NAME}` from the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, a variable is
    /// unset, the TOML is invalid, or a value is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, |name| std::env::var(name).ok())
    }

    /// Parses configuration from TOML text, resolving `${NAME}` through
    /// `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is unset, the TOML is invalid,
    /// or a value is out of range.
    pub fn from_toml_str(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_variables(content, lookup)?;
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the handshake timeout.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Returns the grace period between shutdown escalation steps.
    #[must_use]
    pub const fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_millis)
    }

    /// Returns stdio launcher settings derived from this configuration.
    #[must_use]
    pub const fn launcher_settings(&self) -> StdioLauncherSettings {
        StdioLauncherSettings::new(self.handshake_timeout(), self.close_grace())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "handshake_timeout_secs must be positive".to_owned(),
            ));
        }
        if self.close_grace_millis == 0 {
            return Err(ConfigError::Invalid(
                "close_grace_millis must be positive".to_owned(),
            ));
        }
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

fn expand_variables(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|error| ConfigError::Invalid(error.to_string()))?;

    let missing = pattern
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str())
        .find(|name| lookup(name).is_none());
    if let Some(name) = missing {
        return Err(ConfigError::UndefinedVariable(name.to_owned()));
    }

    let expanded = pattern.replace_all(content, |captures: &Captures<'_>| {
        captures
            .get(1)
            .and_then(|name| lookup(name.as_str()))
            .unwrap_or_default()
    });
    Ok(expanded.into_owned())
}
