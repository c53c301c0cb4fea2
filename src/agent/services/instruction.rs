//! Rendering of routing-agent instructions.

use crate::agent::domain::{AgentConfig, AgentDomainError, AgentName};
use minijinja::Environment;
use serde_json::{Map, Value};

/// Placeholder used for sub-agents that carry no description.
const MISSING_DESCRIPTION: &str = "No capability description provided.";

/// Renders a routing instruction listing `sub_agents` in order.
///
/// # Errors
///
/// Returns [`AgentDomainError::TemplateRender`] when the template is invalid
/// or fails to render.
pub fn render_route_instruction(
    template: &str,
    agent: &AgentName,
    sub_agents: &[AgentConfig],
) -> Result<String, AgentDomainError> {
    let environment = Environment::new();
    environment
        .render_str(template, build_context(agent, sub_agents))
        .map_err(|error| AgentDomainError::TemplateRender {
            agent: agent.to_string(),
            reason: error.to_string(),
        })
}

fn build_context(agent: &AgentName, sub_agents: &[AgentConfig]) -> Map<String, Value> {
    let entries = sub_agents
        .iter()
        .map(|sub_agent| {
            let mut entry = Map::new();
            entry.insert(
                "name".to_owned(),
                Value::String(sub_agent.name().to_string()),
            );
            entry.insert(
                "description".to_owned(),
                Value::String(
                    sub_agent
                        .description()
                        .unwrap_or(MISSING_DESCRIPTION)
                        .to_owned(),
                ),
            );
            Value::Object(entry)
        })
        .collect();

    let mut context = Map::new();
    context.insert("agent".to_owned(), Value::String(agent.to_string()));
    context.insert("sub_agents".to_owned(), Value::Array(entries));
    context
}
