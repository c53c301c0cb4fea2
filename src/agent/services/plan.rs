//! Declarative description of an agent tree to assemble.

use crate::agent::domain::{AgentDomainError, AgentName, ModelId, instructions};
use crate::config::{AppConfig, ServerSection};
use crate::tool_connection::domain::{ServerLaunchSpec, ServerName, ToolConnectionDomainError};
use thiserror::Error;

/// Errors raised while turning configuration into an [`AssemblyPlan`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// An agent name or model identifier is invalid.
    #[error(transparent)]
    Agent(#[from] AgentDomainError),

    /// A server name or launch specification is invalid.
    #[error(transparent)]
    ToolServer(#[from] ToolConnectionDomainError),
}

/// One sub-agent and the tool server backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAgentPlan {
    /// Sub-agent name.
    pub name: AgentName,
    /// Model used by the sub-agent.
    pub model: ModelId,
    /// Capability description shown to the routing agent.
    pub description: Option<String>,
    /// Sub-agent instruction text.
    pub instruction: String,
    /// Name of the tool server.
    pub server: ServerName,
    /// How to start the tool server.
    pub launch: ServerLaunchSpec,
}

/// Routing agent plus the sub-agents it delegates to, in launch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyPlan {
    /// Routing agent name.
    pub name: AgentName,
    /// Model used by the routing agent.
    pub model: ModelId,
    /// `minijinja` template for the routing instruction.
    pub instruction_template: String,
    /// Sub-agents, launched in this order and released in reverse.
    pub sub_agents: Vec<SubAgentPlan>,
}

const SQLITE_COMMAND: &str = "uvx";
const SQLITE_ARGS: &[&str] = &["mcp-server-sqlite"];
const PYTHON_COMMAND: &str = "deno";
const PYTHON_ARGS: &[&str] = &[
    "run",
    "-N",
    "-R=node_modules",
    "-W=node_modules",
    "--node-modules-dir=auto",
    "jsr:@pydantic/mcp-run-python",
    "stdio",
];

/// Builds the stock plan: `main_agent` routing to `sqlite_agent` and
/// `python_agent`.
///
/// The SQLite server always receives `--db-path <database_path>` after its
/// arguments, including overridden ones.
///
/// # Errors
///
/// Returns [`PlanError`] when the configured model, commands or working
/// directories are invalid.
pub fn default_plan(config: &AppConfig) -> Result<AssemblyPlan, PlanError> {
    let model = ModelId::new(config.model.as_str())?;

    let sqlite_launch = launch_spec(&config.sqlite, SQLITE_COMMAND, SQLITE_ARGS)?
        .with_extra_args(["--db-path", config.database_path.as_str()]);
    let sqlite = SubAgentPlan {
        name: AgentName::new(instructions::SQLITE_AGENT)?,
        model: model.clone(),
        description: Some(section_text(
            config.sqlite.description.as_deref(),
            instructions::SQLITE_DESCRIPTION,
        )),
        instruction: section_text(
            config.sqlite.instruction.as_deref(),
            instructions::SQLITE_INSTRUCTION,
        ),
        server: ServerName::new("sqlite")?,
        launch: sqlite_launch,
    };

    let python = SubAgentPlan {
        name: AgentName::new(instructions::PYTHON_AGENT)?,
        model: model.clone(),
        description: Some(section_text(
            config.python.description.as_deref(),
            instructions::PYTHON_DESCRIPTION,
        )),
        instruction: section_text(
            config.python.instruction.as_deref(),
            instructions::PYTHON_INSTRUCTION,
        ),
        server: ServerName::new("python")?,
        launch: launch_spec(&config.python, PYTHON_COMMAND, PYTHON_ARGS)?,
    };

    Ok(AssemblyPlan {
        name: AgentName::new(instructions::MAIN_AGENT)?,
        model,
        instruction_template: section_text(
            config.route_instruction_template.as_deref(),
            instructions::ROUTE_INSTRUCTION_TEMPLATE,
        ),
        sub_agents: vec![sqlite, python],
    })
}

fn launch_spec(
    section: &ServerSection,
    stock_command: &str,
    stock_args: &[&str],
) -> Result<ServerLaunchSpec, ToolConnectionDomainError> {
    let base = ServerLaunchSpec::new(section.command.as_deref().unwrap_or(stock_command))?;
    let spec = match &section.args {
        Some(args) => base.with_args(args),
        None => base.with_args(stock_args.iter().copied()),
    }
    .with_env(section.env.clone());

    match &section.working_directory {
        Some(directory) => spec.with_working_directory(directory.as_str()),
        None => Ok(spec),
    }
}

fn section_text(configured: Option<&str>, stock: &str) -> String {
    configured.unwrap_or(stock).to_owned()
}
