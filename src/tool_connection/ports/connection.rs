//! Handle port for a live tool-server connection.

use crate::tool_connection::domain::{
    ConnectionId, ConnectionInfo, ConnectionState, ServerName, ToolCallOutcome, ToolCatalog,
    ToolConnectionDomainError,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for tool connection operations.
pub type ToolConnectionResult<T> = Result<T, ToolConnectionError>;

/// Owned handle to one tool server.
///
/// Implementations own their subprocess exclusively. `close` must be
/// idempotent and must release the subprocess even when it is unresponsive.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Returns identity and provenance of the handle.
    fn info(&self) -> ConnectionInfo;

    /// Returns the current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Returns the tools advertised during the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionError::InvalidState`] unless the handle is
    /// `ready`.
    fn list_tools(&self) -> ToolConnectionResult<ToolCatalog>;

    /// Invokes a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionError::InvalidState`] unless the handle is
    /// `ready`, [`ToolConnectionError::UnknownTool`] for names outside the
    /// catalog, or transport and server errors.
    async fn call_tool(&self, tool_name: &str, arguments: Value)
    -> ToolConnectionResult<ToolCallOutcome>;

    /// Releases the subprocess and its pipes.
    ///
    /// Calling `close` on a closed handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionError::Close`] when the subprocess could not
    /// be terminated cleanly. The handle is `closed` afterwards regardless.
    async fn close(&self) -> ToolConnectionResult<()>;
}

/// Reason a tool server handshake did not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// The server did not answer within the handshake timeout.
    #[error("no response within {0:?}")]
    TimedOut(Duration),

    /// The server answered with something that is not a valid reply.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The server answered with a JSON-RPC error.
    #[error("server rejected {method} ({code}): {message}")]
    Rejected {
        /// Method that was rejected.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Server-provided message.
        message: String,
    },

    /// The server closed its output before answering.
    #[error("server closed the connection")]
    ServerClosed,

    /// Reading or writing the pipes failed.
    #[error("pipe I/O failed: {0}")]
    Io(String),

    /// The advertised tools failed validation.
    #[error("invalid tool catalog: {0}")]
    InvalidCatalog(#[from] ToolConnectionDomainError),
}

/// Errors returned by tool connection handles and launchers.
#[derive(Debug, Clone, Error)]
pub enum ToolConnectionError {
    /// The subprocess could not be started.
    #[error("failed to launch tool server {server} (`{command}`): {reason}")]
    Launch {
        /// Server that failed to start.
        server: ServerName,
        /// Executable that was attempted.
        command: String,
        /// Underlying spawn failure.
        #[source]
        reason: Arc<std::io::Error>,
    },

    /// The subprocess started but did not complete the handshake.
    ///
    /// The subprocess has been terminated when this error is returned.
    #[error("handshake with tool server {server} failed: {failure}")]
    Handshake {
        /// Server whose handshake failed.
        server: ServerName,
        /// OS process id of the terminated subprocess, when known.
        process_id: Option<u32>,
        /// Failure details.
        #[source]
        failure: HandshakeFailure,
    },

    /// An operation was invoked in the wrong lifecycle state.
    #[error("cannot {operation} on tool connection {connection_id} while it is {state}")]
    InvalidState {
        /// Handle the operation targeted.
        connection_id: ConnectionId,
        /// Operation that was attempted.
        operation: &'static str,
        /// State the handle was in.
        state: ConnectionState,
    },

    /// The requested tool is not in the connection's catalog.
    #[error("tool server {server} does not provide tool '{tool}'")]
    UnknownTool {
        /// Server that was asked.
        server: ServerName,
        /// Requested tool name.
        tool: String,
    },

    /// The server answered a tool call with a JSON-RPC error.
    #[error("tool '{tool}' on server {server} failed ({code}): {message}")]
    ToolCall {
        /// Server that was asked.
        server: ServerName,
        /// Tool that was called.
        tool: String,
        /// JSON-RPC error code.
        code: i64,
        /// Server-provided message.
        message: String,
    },

    /// Pipe or framing failure on a ready connection.
    #[error("transport failure on tool server {server}: {reason}")]
    Transport {
        /// Server whose pipes failed.
        server: ServerName,
        /// Failure details.
        reason: String,
    },

    /// The subprocess could not be released cleanly.
    #[error("failed to close tool server {server}: {reason}")]
    Close {
        /// Server that failed to close.
        server: ServerName,
        /// Failure details.
        reason: String,
    },
}

impl ToolConnectionError {
    /// Wraps a spawn failure.
    pub fn launch(server: ServerName, command: impl Into<String>, err: std::io::Error) -> Self {
        Self::Launch {
            server,
            command: command.into(),
            reason: Arc::new(err),
        }
    }
}
