//! Assembles the agent tree and optionally calls one tool.
//!
//! Usage:
//!
//! ```text
//! switchboard [--config <path>] [--json] [call <agent> <tool> [--arguments <json>]]
//! ```
//!
//! Without a subcommand the assembled tree is printed and every tool server
//! is shut down again. `SIGTERM` or `SIGINT` during assembly or a tool call
//! stops the work and still shuts every tool server down before exiting.
//! Logs go to stderr and are filtered by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use switchboard::agent::domain::{AgentConfig, AgentName};
use switchboard::agent::services::{AgentAssemblyService, AssembledAgent, default_plan};
use switchboard::config::AppConfig;
use switchboard::tool_connection::adapters::StdioToolServerLauncher;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Switchboard CLI.
#[derive(Debug, Parser)]
#[command(name = "switchboard")]
#[command(about = "Assemble agents over MCP tool servers")]
#[command(version)]
struct Cli {
    /// Configuration file path; stock settings apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Call one tool through a sub-agent's tool server
    Call {
        /// Sub-agent that owns the tool
        agent: String,

        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        arguments: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("agent '{0}' has no tool server")]
    NoToolServer(AgentName),

    #[error("tool arguments must be a JSON object")]
    ArgumentsNotObject,

    #[error("tool '{0}' reported an error")]
    ToolFailed(String),

    #[error("interrupted by {0}")]
    Interrupted(&'static str),
}

/// Listens for the signals that ask switchboard to stop.
#[cfg(unix)]
struct ShutdownSignal {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Resolves with the name of the first signal received.
    async fn received(&mut self) -> &'static str {
        let name = tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        };
        warn!(signal = name, "shutdown requested");
        name
    }
}

#[cfg(not(unix))]
struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    const fn register() -> io::Result<Self> {
        Ok(Self)
    }

    async fn received(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        warn!(signal = "ctrl-c", "shutdown requested");
        "ctrl-c"
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "switchboard failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let mut signals = ShutdownSignal::register()?;
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let plan = default_plan(&config)?;
    let launcher = StdioToolServerLauncher::new(config.launcher_settings(), Arc::new(DefaultClock));
    let service = AgentAssemblyService::new(Arc::new(launcher));

    let assembled = service
        .assemble_until(plan, async {
            signals.received().await;
        })
        .await?;
    info!(
        connections = assembled.connection_count(),
        "tool servers ready"
    );

    let outcome = match cli.command {
        Some(Commands::Call {
            agent,
            tool,
            arguments,
        }) => tokio::select! {
            outcome = call_tool(&assembled, &agent, &tool, &arguments, cli.json) => outcome,
            name = signals.received() => Err(CliError::Interrupted(name).into()),
        },
        None => print_tree(assembled.config(), cli.json),
    };
    let shutdown = assembled.shutdown().await;

    outcome?;
    shutdown?;
    Ok(())
}

async fn call_tool(
    assembled: &AssembledAgent,
    agent_name: &str,
    tool: &str,
    raw_arguments: &str,
    json: bool,
) -> Result<(), BoxError> {
    let agent = AgentName::new(agent_name)?;
    let arguments: Value = serde_json::from_str(raw_arguments)?;
    if !arguments.is_object() {
        return Err(CliError::ArgumentsNotObject.into());
    }
    let connection = assembled
        .connection_for(&agent)
        .ok_or_else(|| CliError::NoToolServer(agent.clone()))?;

    let outcome = connection.call_tool(tool, arguments).await?;
    let mut stdout = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &outcome)?;
        writeln!(stdout)?;
    } else {
        writeln!(stdout, "{}", outcome.joined_text())?;
    }

    if outcome.is_error {
        return Err(CliError::ToolFailed(tool.to_owned()).into());
    }
    Ok(())
}

fn print_tree(config: &AgentConfig, json: bool) -> Result<(), BoxError> {
    let mut stdout = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, config)?;
        writeln!(stdout)?;
        return Ok(());
    }
    write_agent(&mut stdout, config, 0)?;
    Ok(())
}

fn write_agent(out: &mut impl Write, config: &AgentConfig, depth: usize) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    match config.tool_server() {
        Some(server) => writeln!(
            out,
            "{indent}{} ({}) via {server}: {} tool(s)",
            config.name(),
            config.model(),
            config.tools().len()
        )?,
        None => writeln!(out, "{indent}{} ({})", config.name(), config.model())?,
    }
    for tool in config.tools() {
        match tool.description() {
            Some(description) => writeln!(out, "{indent}  - {}: {description}", tool.name())?,
            None => writeln!(out, "{indent}  - {}", tool.name())?,
        }
    }
    for sub_agent in config.sub_agents() {
        write_agent(out, sub_agent, depth + 1)?;
    }
    Ok(())
}
