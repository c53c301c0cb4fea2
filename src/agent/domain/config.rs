//! Agent configuration handed to the agent runtime.

use super::{AgentDomainError, AgentName, ModelId};
use crate::tool_connection::domain::{ServerName, ToolDescriptor};
use serde::Serialize;
use std::collections::BTreeSet;

/// Immutable configuration of one agent and its sub-agents.
///
/// Built through [`AgentConfigBuilder`], which validates the wiring. Agent
/// names are unique across the whole tree, so the runtime can address any
/// agent by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentConfig {
    name: AgentName,
    model: ModelId,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_server: Option<ServerName>,
    tools: Vec<ToolDescriptor>,
    sub_agents: Vec<AgentConfig>,
}

impl AgentConfig {
    /// Starts building an agent configuration.
    #[must_use]
    pub fn builder(name: AgentName, model: ModelId) -> AgentConfigBuilder {
        AgentConfigBuilder {
            name,
            model,
            description: None,
            instruction: String::new(),
            tool_server: None,
            tools: Vec::new(),
            sub_agents: Vec::new(),
        }
    }

    /// Returns the agent name.
    #[must_use]
    pub const fn name(&self) -> &AgentName {
        &self.name
    }

    /// Returns the model identifier.
    #[must_use]
    pub const fn model(&self) -> &ModelId {
        &self.model
    }

    /// Returns the capability description shown to a routing agent.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the instruction text.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Returns the tool server providing this agent's tools, if any.
    #[must_use]
    pub const fn tool_server(&self) -> Option<&ServerName> {
        self.tool_server.as_ref()
    }

    /// Returns the tools attached to this agent.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Returns the direct sub-agents.
    #[must_use]
    pub fn sub_agents(&self) -> &[Self] {
        &self.sub_agents
    }

    /// Finds an agent by name in this tree, including `self`.
    #[must_use]
    pub fn find(&self, name: &AgentName) -> Option<&Self> {
        if &self.name == name {
            return Some(self);
        }
        self.sub_agents.iter().find_map(|agent| agent.find(name))
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a AgentName>) {
        names.push(&self.name);
        for agent in &self.sub_agents {
            agent.collect_names(names);
        }
    }
}

/// Validating builder for [`AgentConfig`].
#[derive(Debug, Clone)]
pub struct AgentConfigBuilder {
    name: AgentName,
    model: ModelId,
    description: Option<String>,
    instruction: String,
    tool_server: Option<ServerName>,
    tools: Vec<ToolDescriptor>,
    sub_agents: Vec<AgentConfig>,
}

impl AgentConfigBuilder {
    /// Sets the instruction text.
    #[must_use]
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Sets the capability description. Blank text clears it.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        let text = description.into();
        self.description = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Attaches the tools of one tool server.
    #[must_use]
    pub fn tools(
        mut self,
        server: ServerName,
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Self {
        self.tool_server = Some(server);
        self.tools.extend(tools);
        self
    }

    /// Appends a sub-agent.
    #[must_use]
    pub fn sub_agent(mut self, agent: AgentConfig) -> Self {
        self.sub_agents.push(agent);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::EmptyInstruction`] for blank instructions,
    /// [`AgentDomainError::DuplicateTool`] or
    /// [`AgentDomainError::DuplicateSubAgent`] for repeated names, and
    /// [`AgentDomainError::NameReused`] when a name occurs twice anywhere in
    /// the tree.
    pub fn build(self) -> Result<AgentConfig, AgentDomainError> {
        let agent = self.name.to_string();
        if self.instruction.trim().is_empty() {
            return Err(AgentDomainError::EmptyInstruction { agent });
        }

        let mut tool_names = BTreeSet::new();
        for tool in &self.tools {
            if !tool_names.insert(tool.name()) {
                return Err(AgentDomainError::DuplicateTool {
                    agent,
                    tool: tool.name().to_owned(),
                });
            }
        }

        let mut sub_agent_names = BTreeSet::new();
        for sub_agent in &self.sub_agents {
            if !sub_agent_names.insert(sub_agent.name()) {
                return Err(AgentDomainError::DuplicateSubAgent {
                    agent,
                    sub_agent: sub_agent.name().to_string(),
                });
            }
        }

        let config = AgentConfig {
            name: self.name,
            model: self.model,
            description: self.description,
            instruction: self.instruction,
            tool_server: self.tool_server,
            tools: self.tools,
            sub_agents: self.sub_agents,
        };

        let mut names = Vec::new();
        config.collect_names(&mut names);
        let mut seen = BTreeSet::new();
        if let Some(reused) = names.into_iter().find(|name| !seen.insert(*name)) {
            return Err(AgentDomainError::NameReused(reused.to_string()));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn model() -> ModelId {
        ModelId::new("azure/gpt-4o-mini").expect("model id should be valid")
    }

    fn name(value: &str) -> AgentName {
        AgentName::new(value).expect("agent name should be valid")
    }

    fn tool(value: &str) -> ToolDescriptor {
        ToolDescriptor::new(value, json!({"type": "object"})).expect("tool should be valid")
    }

    fn server() -> ServerName {
        ServerName::new("sqlite").expect("server name should be valid")
    }

    fn leaf(agent: &str, model: &ModelId) -> AgentConfig {
        AgentConfig::builder(name(agent), model.clone())
            .instruction("do one thing")
            .build()
            .expect("leaf agent should build")
    }

    #[rstest]
    fn builder_assembles_tree(model: ModelId) {
        let sqlite = AgentConfig::builder(name("sqlite_agent"), model.clone())
            .instruction("query the database")
            .description("Database access.")
            .tools(server(), [tool("read_query"), tool("list_tables")])
            .build()
            .expect("sqlite agent should build");

        let root = AgentConfig::builder(name("main_agent"), model)
            .instruction("route requests")
            .sub_agent(sqlite)
            .build()
            .expect("root agent should build");

        assert_eq!(root.sub_agents().len(), 1);
        let found = root
            .find(&name("sqlite_agent"))
            .expect("sub-agent should be found");
        assert_eq!(found.tools().len(), 2);
        assert_eq!(found.tool_server(), Some(&server()));
        assert_eq!(found.description(), Some("Database access."));
    }

    #[rstest]
    #[case("")]
    #[case("  \n ")]
    fn builder_rejects_blank_instruction(model: ModelId, #[case] instruction: &str) {
        let result = AgentConfig::builder(name("main_agent"), model)
            .instruction(instruction)
            .build();

        assert_eq!(
            result,
            Err(AgentDomainError::EmptyInstruction {
                agent: "main_agent".to_owned()
            })
        );
    }

    #[rstest]
    fn builder_rejects_duplicate_tools(model: ModelId) {
        let result = AgentConfig::builder(name("sqlite_agent"), model)
            .instruction("query")
            .tools(server(), [tool("read_query"), tool("read_query")])
            .build();

        assert!(matches!(result, Err(AgentDomainError::DuplicateTool { tool, .. }) if tool == "read_query"));
    }

    #[rstest]
    fn builder_rejects_duplicate_sub_agents(model: ModelId) {
        let result = AgentConfig::builder(name("main_agent"), model.clone())
            .instruction("route")
            .sub_agent(leaf("python_agent", &model))
            .sub_agent(leaf("python_agent", &model))
            .build();

        assert!(matches!(
            result,
            Err(AgentDomainError::DuplicateSubAgent { sub_agent, .. }) if sub_agent == "python_agent"
        ));
    }

    #[rstest]
    fn builder_rejects_self_reference(model: ModelId) {
        let result = AgentConfig::builder(name("main_agent"), model.clone())
            .instruction("route")
            .sub_agent(leaf("main_agent", &model))
            .build();

        assert_eq!(
            result,
            Err(AgentDomainError::NameReused("main_agent".to_owned()))
        );
    }

    #[rstest]
    fn blank_description_is_dropped(model: ModelId) {
        let agent = AgentConfig::builder(name("python_agent"), model)
            .instruction("run code")
            .description("   ")
            .build()
            .expect("agent should build");

        assert_eq!(agent.description(), None);
    }

    #[rstest]
    fn config_serializes_for_runtime(model: ModelId) {
        let agent = AgentConfig::builder(name("python_agent"), model)
            .instruction("run code")
            .build()
            .expect("agent should build");

        let encoded = serde_json::to_value(&agent).expect("config should serialize");

        assert_eq!(
            encoded,
            json!({
                "name": "python_agent",
                "model": "azure/gpt-4o-mini",
                "instruction": "run code",
                "tools": [],
                "sub_agents": []
            })
        );
    }
}
