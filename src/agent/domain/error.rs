//! Error types for agent configuration validation.

use thiserror::Error;

/// Errors returned while constructing agent domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentDomainError {
    /// The agent name is empty after trimming.
    #[error("agent name must not be empty")]
    EmptyAgentName,

    /// The agent name contains characters outside `[a-z0-9_]`.
    #[error(
        "agent name '{0}' contains invalid characters (only lowercase alphanumeric and underscores allowed)"
    )]
    InvalidAgentName(String),

    /// The agent name exceeds 100 characters.
    #[error("agent name exceeds 100 character limit: {0}")]
    AgentNameTooLong(String),

    /// The model identifier is empty after trimming.
    #[error("model identifier must not be empty")]
    EmptyModelId,

    /// The model identifier is not of the form `provider/model`.
    #[error("model identifier '{0}' must have the form provider/model")]
    InvalidModelId(String),

    /// The agent has no instruction text.
    #[error("agent '{agent}' has an empty instruction")]
    EmptyInstruction {
        /// Agent being built.
        agent: String,
    },

    /// Two tools with the same name were attached to one agent.
    #[error("agent '{agent}' has duplicate tool '{tool}'")]
    DuplicateTool {
        /// Agent being built.
        agent: String,
        /// Repeated tool name.
        tool: String,
    },

    /// Two sub-agents with the same name were attached to one agent.
    #[error("agent '{agent}' has duplicate sub-agent '{sub_agent}'")]
    DuplicateSubAgent {
        /// Agent being built.
        agent: String,
        /// Repeated sub-agent name.
        sub_agent: String,
    },

    /// An agent tree uses one name for two different agents.
    #[error("agent '{0}' appears more than once in the agent tree")]
    NameReused(String),

    /// The instruction template failed to render.
    #[error("failed to render instruction for agent '{agent}': {reason}")]
    TemplateRender {
        /// Agent whose instruction was being rendered.
        agent: String,
        /// Renderer error text.
        reason: String,
    },
}
