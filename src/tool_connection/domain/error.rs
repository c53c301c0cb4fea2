//! Error types for tool-connection domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing tool-connection domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolConnectionDomainError {
    /// The server name is empty after trimming.
    #[error("tool server name must not be empty")]
    EmptyServerName,

    /// The server name contains characters outside `[a-z0-9_]`.
    #[error(
        "tool server name '{0}' contains invalid characters (only lowercase alphanumeric and underscores allowed)"
    )]
    InvalidServerName(String),

    /// The server name exceeds the 100-character limit.
    #[error("tool server name exceeds 100 character limit: {0}")]
    ServerNameTooLong(String),

    /// The launch command is empty.
    #[error("launch command must not be empty")]
    EmptyLaunchCommand,

    /// The working directory is empty after trimming.
    #[error("working directory must not be empty when provided")]
    EmptyWorkingDirectory,

    /// A tool descriptor name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,

    /// A tool descriptor name has leading or trailing whitespace.
    #[error("tool name '{0}' has surrounding whitespace")]
    PaddedToolName(String),

    /// Two descriptors in one catalog share a name.
    #[error("tool name '{0}' is advertised more than once")]
    DuplicateToolName(String),

    /// A tool input schema is not a JSON object.
    #[error("input schema for tool '{0}' must be a JSON object")]
    InvalidInputSchema(String),

    /// Transitioning between two lifecycle states is invalid.
    #[error("invalid tool connection lifecycle transition: {from} -> {to}")]
    InvalidLifecycleTransition {
        /// Current lifecycle state.
        from: String,
        /// Requested target lifecycle state.
        to: String,
    },
}

/// Error returned while parsing a connection state from its text form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown tool connection state: {0}")]
pub struct ParseConnectionStateError(pub String);
