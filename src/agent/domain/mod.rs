//! Domain model for agent configuration.
//!
//! Values here are pure: they validate names and wiring but never touch
//! processes or the agent runtime.

mod config;
mod error;
pub mod instructions;
mod name;

pub use config::{AgentConfig, AgentConfigBuilder};
pub use error::AgentDomainError;
pub use name::{AgentName, ModelId};
