//! Port contracts for tool-server connections.

mod connection;
mod launcher;

#[cfg(test)]
pub(crate) use connection::MockToolConnection;
pub use connection::{HandshakeFailure, ToolConnection, ToolConnectionError, ToolConnectionResult};
pub use launcher::ToolServerLauncher;
