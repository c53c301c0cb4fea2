//! Adapter implementations for tool connection ports.

pub mod memory;
pub mod stdio;

pub use memory::{InMemoryToolConnection, InMemoryToolServerLauncher};
pub use stdio::{StdioLauncherSettings, StdioToolConnection, StdioToolServerLauncher};
