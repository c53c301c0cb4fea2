//! Stdio adapter: tool servers as child processes speaking MCP.
//!
//! Frames are newline-delimited JSON-RPC 2.0. Shutdown follows the MCP stdio
//! convention: close the child's stdin, then escalate to `SIGTERM` and a
//! forced kill if it does not exit.

mod channel;
mod connection;
mod launcher;
mod process;
pub mod protocol;

pub use connection::StdioToolConnection;
pub use launcher::{StdioLauncherSettings, StdioToolServerLauncher};
