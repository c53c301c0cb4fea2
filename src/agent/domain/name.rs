//! Validated agent name and model identifier types.

use super::AgentDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for an agent name.
const MAX_NAME_LENGTH: usize = 100;

/// Validated, lowercase alphanumeric-plus-underscores agent identifier.
///
/// The routing instruction refers to sub-agents by this name (for example
/// `sqlite_agent`), so it must stay stable and readable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    /// Creates a validated agent name.
    ///
    /// The input is trimmed and lowercased. Only characters in `[a-z0-9_]` are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::EmptyAgentName`] when the value is empty
    /// after trimming, [`AgentDomainError::InvalidAgentName`] when it contains
    /// characters outside `[a-z0-9_]`, or
    /// [`AgentDomainError::AgentNameTooLong`] when it exceeds 100 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, AgentDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(AgentDomainError::EmptyAgentName);
        }

        if normalized.len() > MAX_NAME_LENGTH {
            return Err(AgentDomainError::AgentNameTooLong(raw));
        }

        let is_valid = normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !is_valid {
            return Err(AgentDomainError::InvalidAgentName(raw));
        }

        Ok(Self(normalized))
    }

    /// Returns the agent name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentName {
    type Error = AgentDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.0
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model identifier in `provider/model` form, e.g. `azure/gpt-4o-mini`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Creates a validated model identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::EmptyModelId`] for blank input and
    /// [`AgentDomainError::InvalidModelId`] when either side of the first `/`
    /// is empty or the value contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, AgentDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(AgentDomainError::EmptyModelId);
        }

        let is_valid = normalized
            .split_once('/')
            .is_some_and(|(provider, model)| !provider.is_empty() && !model.is_empty())
            && !normalized.contains(char::is_whitespace);
        if !is_valid {
            return Err(AgentDomainError::InvalidModelId(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the full identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the provider segment, e.g. `azure`.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.segments().0
    }

    /// Returns the model segment, e.g. `gpt-4o-mini`.
    #[must_use]
    pub fn model(&self) -> &str {
        self.segments().1
    }

    fn segments(&self) -> (&str, &str) {
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }
}

impl TryFrom<String> for ModelId {
    type Error = AgentDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
