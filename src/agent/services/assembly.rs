//! Agent assembly service.

use super::instruction::render_route_instruction;
use super::plan::{AssemblyPlan, SubAgentPlan};
use crate::agent::domain::{AgentConfig, AgentDomainError, AgentName};
use crate::tool_connection::{
    ports::{ToolConnection, ToolConnectionError, ToolServerLauncher},
    services::{CloseFailure, LifecycleStack, LifecycleStackError, ShutdownError},
};
use std::collections::BTreeMap;
use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Step of an assembly that failed.
#[derive(Debug, Clone, Error)]
pub enum AssemblyFailure {
    /// A sub-agent's tool server failed to launch or answer.
    #[error("tool server for agent '{agent}' failed: {source}")]
    ToolServer {
        /// Sub-agent whose server failed.
        agent: AgentName,
        /// Launcher or connection error.
        #[source]
        source: ToolConnectionError,
    },

    /// An agent configuration was rejected.
    #[error(transparent)]
    Domain(#[from] AgentDomainError),

    /// A handle could not be registered for shutdown.
    #[error(transparent)]
    Registration(#[from] LifecycleStackError),

    /// Assembly was cancelled before every tool server was ready.
    #[error("agent assembly was cancelled")]
    Cancelled,
}

/// Assembly failure, after every connection opened so far has been closed.
#[derive(Debug, Clone, Error)]
#[error("agent assembly failed: {cause}")]
pub struct AssemblyError {
    #[source]
    cause: AssemblyFailure,
    rollback_failures: Vec<CloseFailure>,
}

impl AssemblyError {
    /// Returns the step that failed.
    #[must_use]
    pub const fn cause(&self) -> &AssemblyFailure {
        &self.cause
    }

    /// Returns connections that also failed to close during rollback.
    #[must_use]
    pub fn rollback_failures(&self) -> &[CloseFailure] {
        &self.rollback_failures
    }
}

/// An assembled agent tree with the live tool connections it depends on.
///
/// The connections stay open until [`AssembledAgent::shutdown`] is called.
pub struct AssembledAgent {
    config: AgentConfig,
    stack: LifecycleStack,
    connections: BTreeMap<AgentName, Arc<dyn ToolConnection>>,
}

impl AssembledAgent {
    /// Returns the root agent configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the tool connection serving `agent`'s tools.
    #[must_use]
    pub fn connection_for(&self, agent: &AgentName) -> Option<Arc<dyn ToolConnection>> {
        self.connections.get(agent).cloned()
    }

    /// Returns the number of open tool connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.stack.len()
    }

    /// Closes every tool connection in reverse launch order.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] listing each connection that failed to close.
    /// Every connection gets a close attempt regardless.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        info!(agent = %self.config.name(), "shutting down agent");
        drop(self.connections);
        self.stack.shutdown().await
    }
}

impl fmt::Debug for AssembledAgent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AssembledAgent")
            .field("config", &self.config)
            .field("stack", &self.stack)
            .field("agents_with_tools", &self.connections.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds agent trees, launching one tool server per sub-agent.
#[derive(Clone)]
pub struct AgentAssemblyService<L>
where
    L: ToolServerLauncher,
{
    launcher: Arc<L>,
}

impl<L> AgentAssemblyService<L>
where
    L: ToolServerLauncher,
{
    /// Creates an assembly service.
    #[must_use]
    pub const fn new(launcher: Arc<L>) -> Self {
        Self { launcher }
    }

    /// Launches every sub-agent's tool server and builds the agent tree.
    ///
    /// All or nothing: when any step fails, every connection opened so far is
    /// closed in reverse order before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] describing the failed step and any
    /// connection that also failed to close during rollback.
    pub async fn assemble(&self, plan: AssemblyPlan) -> Result<AssembledAgent, AssemblyError> {
        self.assemble_until(plan, std::future::pending()).await
    }

    /// Like [`Self::assemble`], but gives up once `cancel` completes.
    ///
    /// A launch still in flight is dropped, which kills its process, and
    /// every connection opened so far is closed in reverse order.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] with [`AssemblyFailure::Cancelled`] when
    /// `cancel` wins, or the failure of any other step.
    pub async fn assemble_until(
        &self,
        plan: AssemblyPlan,
        cancel: impl Future<Output = ()>,
    ) -> Result<AssembledAgent, AssemblyError> {
        let mut cancel = pin!(cancel);
        info!(
            agent = %plan.name,
            sub_agents = plan.sub_agents.len(),
            "assembling agent"
        );
        let mut stack = LifecycleStack::new();
        let mut connections = BTreeMap::new();
        let mut sub_agents = Vec::with_capacity(plan.sub_agents.len());

        for sub_agent in &plan.sub_agents {
            let attached = tokio::select! {
                biased;
                () = &mut cancel => Err(AssemblyFailure::Cancelled),
                attached = self.attach(&mut stack, sub_agent) => attached,
            };
            match attached {
                Ok((config, connection)) => {
                    connections.insert(sub_agent.name.clone(), connection);
                    sub_agents.push(config);
                }
                Err(cause) => return Err(rollback(stack, cause).await),
            }
        }

        let root = render_route_instruction(&plan.instruction_template, &plan.name, &sub_agents)
            .and_then(|instruction| {
                sub_agents
                    .into_iter()
                    .fold(
                        AgentConfig::builder(plan.name, plan.model).instruction(instruction),
                        |builder, sub_agent| builder.sub_agent(sub_agent),
                    )
                    .build()
            });
        let config = match root {
            Ok(config) => config,
            Err(error) => return Err(rollback(stack, error.into()).await),
        };

        info!(
            agent = %config.name(),
            connections = stack.len(),
            "agent assembled"
        );
        Ok(AssembledAgent {
            config,
            stack,
            connections,
        })
    }

    async fn attach(
        &self,
        stack: &mut LifecycleStack,
        sub_agent: &SubAgentPlan,
    ) -> Result<(AgentConfig, Arc<dyn ToolConnection>), AssemblyFailure> {
        let tool_server_failure = |source| AssemblyFailure::ToolServer {
            agent: sub_agent.name.clone(),
            source,
        };

        let connection = self
            .launcher
            .launch(&sub_agent.server, &sub_agent.launch)
            .await
            .map_err(tool_server_failure)?;
        stack.register(Arc::clone(&connection))?;
        let catalog = connection.list_tools().map_err(tool_server_failure)?;

        let mut builder = AgentConfig::builder(sub_agent.name.clone(), sub_agent.model.clone())
            .instruction(sub_agent.instruction.as_str())
            .tools(sub_agent.server.clone(), catalog.into_tools());
        if let Some(description) = &sub_agent.description {
            builder = builder.description(description.as_str());
        }
        Ok((builder.build()?, connection))
    }
}

async fn rollback(mut stack: LifecycleStack, cause: AssemblyFailure) -> AssemblyError {
    warn!(%cause, opened = stack.len(), "agent assembly failed; rolling back");
    let rollback_failures = stack.close_all().await;
    for failure in &rollback_failures {
        warn!(%failure, "tool connection failed to close during rollback");
    }
    AssemblyError {
        cause,
        rollback_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::domain::{ModelId, instructions::ROUTE_INSTRUCTION_TEMPLATE};
    use crate::tool_connection::adapters::memory::{InMemoryToolServerLauncher, LaunchFault};
    use crate::tool_connection::domain::{ServerLaunchSpec, ServerName, ToolDescriptor};
    use crate::tool_connection::ports::HandshakeFailure;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::time::Duration;

    fn server(name: &str) -> ServerName {
        ServerName::new(name).expect("server name should be valid")
    }

    fn agent(name: &str) -> AgentName {
        AgentName::new(name).expect("agent name should be valid")
    }

    fn model() -> ModelId {
        ModelId::new("azure/gpt-4o-mini").expect("model id should be valid")
    }

    fn sub_agent(name: &str, server_name: &str) -> SubAgentPlan {
        SubAgentPlan {
            name: agent(name),
            model: model(),
            description: Some(format!("{name} capability")),
            instruction: format!("You are {name}."),
            server: server(server_name),
            launch: ServerLaunchSpec::new(format!("{server_name}-server"))
                .expect("launch spec should be valid"),
        }
    }

    fn plan(sub_agents: Vec<SubAgentPlan>) -> AssemblyPlan {
        AssemblyPlan {
            name: agent("main_agent"),
            model: model(),
            instruction_template: ROUTE_INSTRUCTION_TEMPLATE.to_owned(),
            sub_agents,
        }
    }

    fn tool(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, json!({"type": "object"})).expect("tool should be valid")
    }

    #[fixture]
    fn launcher() -> Arc<InMemoryToolServerLauncher> {
        let launcher = InMemoryToolServerLauncher::new();
        launcher.set_tool_catalog(server("alpha"), vec![tool("read_query")]);
        launcher.set_tool_catalog(server("bravo"), vec![tool("run_python")]);
        launcher.set_tool_catalog(server("charlie"), vec![tool("search")]);
        Arc::new(launcher)
    }

    fn three_agents() -> Vec<SubAgentPlan> {
        vec![
            sub_agent("alpha_agent", "alpha"),
            sub_agent("bravo_agent", "bravo"),
            sub_agent("charlie_agent", "charlie"),
        ]
    }

    #[rstest]
    #[tokio::test]
    async fn assemble_builds_tree_with_tools(launcher: Arc<InMemoryToolServerLauncher>) {
        let service = AgentAssemblyService::new(Arc::clone(&launcher));

        let assembled = service
            .assemble(plan(three_agents()))
            .await
            .expect("assembly should succeed");

        let config = assembled.config();
        assert_eq!(config.sub_agents().len(), 3);
        assert!(config.instruction().contains("- `bravo_agent`: bravo_agent capability"));
        let bravo = config
            .find(&agent("bravo_agent"))
            .expect("bravo agent should exist");
        assert_eq!(bravo.tools()[0].name(), "run_python");
        assert_eq!(assembled.connection_count(), 3);

        let connection = assembled
            .connection_for(&agent("bravo_agent"))
            .expect("connection should exist");
        let outcome = connection
            .call_tool("run_python", json!({"code": "1 + 1"}))
            .await
            .expect("tool call should succeed");
        assert!(outcome.joined_text().starts_with("run_python:"));

        assembled.shutdown().await.expect("shutdown should succeed");
        let closed: Vec<_> = launcher.journal().entries();
        assert_eq!(closed, vec![server("charlie"), server("bravo"), server("alpha")]);
    }

    #[rstest]
    #[case(LaunchFault::Spawn)]
    #[case(LaunchFault::Handshake(HandshakeFailure::TimedOut(Duration::from_secs(30))))]
    #[tokio::test]
    async fn failed_launch_rolls_back_opened_connections(
        launcher: Arc<InMemoryToolServerLauncher>,
        #[case] fault: LaunchFault,
    ) {
        launcher.fail_launch(server("bravo"), fault);
        let service = AgentAssemblyService::new(Arc::clone(&launcher));

        let error = service
            .assemble(plan(three_agents()))
            .await
            .expect_err("assembly should fail");

        assert!(matches!(
            error.cause(),
            AssemblyFailure::ToolServer { agent, .. } if agent.as_str() == "bravo_agent"
        ));
        assert!(error.rollback_failures().is_empty());
        let closed = launcher.journal().entries();
        assert!(closed.contains(&server("alpha")));
        assert!(!closed.contains(&server("charlie")));
        assert!(
            launcher
                .launched()
                .iter()
                .all(|connection| !connection.state().can_use_tools())
        );
    }

    #[rstest]
    #[tokio::test]
    async fn cancellation_drops_pending_launch_and_closes_opened(
        launcher: Arc<InMemoryToolServerLauncher>,
    ) {
        launcher.fail_launch(server("bravo"), LaunchFault::Unresponsive);
        let service = AgentAssemblyService::new(Arc::clone(&launcher));

        let error = service
            .assemble_until(
                plan(three_agents()),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .expect_err("assembly should be cancelled");

        assert!(matches!(error.cause(), AssemblyFailure::Cancelled));
        assert_eq!(launcher.journal().entries(), vec![server("alpha")]);
        assert_eq!(launcher.launched().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn cancellation_before_start_launches_nothing(
        launcher: Arc<InMemoryToolServerLauncher>,
    ) {
        let service = AgentAssemblyService::new(Arc::clone(&launcher));

        let error = service
            .assemble_until(plan(three_agents()), std::future::ready(()))
            .await
            .expect_err("assembly should be cancelled");

        assert!(matches!(error.cause(), AssemblyFailure::Cancelled));
        assert!(launcher.launched().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn rollback_reports_close_failures(launcher: Arc<InMemoryToolServerLauncher>) {
        launcher.fail_close(server("alpha"), "pipe broken");
        launcher.fail_launch(server("charlie"), LaunchFault::Spawn);
        let service = AgentAssemblyService::new(Arc::clone(&launcher));

        let error = service
            .assemble(plan(three_agents()))
            .await
            .expect_err("assembly should fail");

        let failed: Vec<_> = error
            .rollback_failures()
            .iter()
            .map(|failure| failure.server.clone())
            .collect();
        assert_eq!(failed, vec![server("alpha")]);
    }

    #[rstest]
    #[tokio::test]
    async fn invalid_root_rolls_back(launcher: Arc<InMemoryToolServerLauncher>) {
        let service = AgentAssemblyService::new(Arc::clone(&launcher));
        let duplicated = vec![
            sub_agent("alpha_agent", "alpha"),
            sub_agent("alpha_agent", "bravo"),
        ];

        let error = service
            .assemble(plan(duplicated))
            .await
            .expect_err("assembly should fail");

        assert!(matches!(
            error.cause(),
            AssemblyFailure::Domain(AgentDomainError::DuplicateSubAgent { .. })
        ));
        assert_eq!(
            launcher.journal().entries(),
            vec![server("bravo"), server("alpha")]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn broken_template_rolls_back(launcher: Arc<InMemoryToolServerLauncher>) {
        let service = AgentAssemblyService::new(Arc::clone(&launcher));
        let mut broken = plan(vec![sub_agent("alpha_agent", "alpha")]);
        broken.instruction_template = "{% if %}".to_owned();

        let error = service
            .assemble(broken)
            .await
            .expect_err("assembly should fail");

        assert!(matches!(
            error.cause(),
            AssemblyFailure::Domain(AgentDomainError::TemplateRender { .. })
        ));
        assert_eq!(launcher.journal().entries(), vec![server("alpha")]);
    }
}
