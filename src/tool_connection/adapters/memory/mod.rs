//! In-memory tool connection adapters.
//!
//! These adapters model the connection lifecycle without spawning external
//! processes. They back unit and integration tests of the lifecycle stack
//! and agent assembly.

mod connection;
mod launcher;

pub use connection::{CloseJournal, InMemoryToolConnection};
pub use launcher::{InMemoryToolServerLauncher, LaunchFault};
