//! Launch specification for a stdio tool server subprocess.

use super::ToolConnectionDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Command line and process settings identifying one tool server to start.
///
/// Values are validated on construction and on deserialization, and are
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawServerLaunchSpec")]
pub struct ServerLaunchSpec {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_directory: Option<String>,
}

#[derive(Deserialize)]
struct RawServerLaunchSpec {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    working_directory: Option<String>,
}

impl TryFrom<RawServerLaunchSpec> for ServerLaunchSpec {
    type Error = ToolConnectionDomainError;

    fn try_from(raw: RawServerLaunchSpec) -> Result<Self, Self::Error> {
        let spec = Self::new(raw.command)?.with_args(raw.args).with_env(raw.env);
        match raw.working_directory {
            Some(directory) => spec.with_working_directory(directory),
            None => Ok(spec),
        }
    }
}

impl ServerLaunchSpec {
    /// Creates a launch specification for `command` with no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionDomainError::EmptyLaunchCommand`] when
    /// `command` is empty after trimming.
    pub fn new(command: impl Into<String>) -> Result<Self, ToolConnectionDomainError> {
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(ToolConnectionDomainError::EmptyLaunchCommand);
        }

        Ok(Self {
            command: normalized_command,
            args: Vec::new(),
            env: BTreeMap::new(),
            working_directory: None,
        })
    }

    /// Replaces command-line arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = values.into_iter().map(Into::into).collect();
        self
    }

    /// Appends command-line arguments after the existing ones.
    #[must_use]
    pub fn with_extra_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Replaces extra environment variables passed to the process.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Sets an explicit working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionDomainError::EmptyWorkingDirectory`] when the
    /// provided value is empty after trimming.
    pub fn with_working_directory(
        mut self,
        value: impl Into<String>,
    ) -> Result<Self, ToolConnectionDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(ToolConnectionDomainError::EmptyWorkingDirectory);
        }

        self.working_directory = Some(normalized);
        Ok(self)
    }

    /// Returns the executable command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns extra environment variables.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the optional working directory.
    #[must_use]
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }
}

impl fmt::Display for ServerLaunchSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.command)?;
        for arg in &self.args {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}
