//! Tool descriptor value objects advertised by tool servers.

use super::ToolConnectionDomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Validated metadata for one tool exposed by a tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    name: String,
    description: Option<String>,
    input_schema: Value,
}

impl ToolDescriptor {
    /// Creates a tool descriptor.
    ///
    /// The name is kept exactly as given, because it is sent back verbatim
    /// in `tools/call`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionDomainError::EmptyToolName`] when the name is
    /// blank, [`ToolConnectionDomainError::PaddedToolName`] when it has
    /// surrounding whitespace, or
    /// [`ToolConnectionDomainError::InvalidInputSchema`] when the schema is
    /// not a JSON object.
    pub fn new(
        name: impl Into<String>,
        input_schema: Value,
    ) -> Result<Self, ToolConnectionDomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ToolConnectionDomainError::EmptyToolName);
        }
        if name.trim().len() != name.len() {
            return Err(ToolConnectionDomainError::PaddedToolName(name));
        }

        if !input_schema.is_object() {
            return Err(ToolConnectionDomainError::InvalidInputSchema(name));
        }

        Ok(Self {
            name,
            description: None,
            input_schema,
        })
    }

    /// Sets the human-readable description. Blank descriptions are dropped.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let normalized = description.into().trim().to_owned();
        self.description = (!normalized.is_empty()).then_some(normalized);
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the JSON schema describing tool arguments.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

/// Ordered set of tool descriptors from one connection, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Builds a catalog, preserving the advertised order.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionDomainError::DuplicateToolName`] when two
    /// descriptors share a name.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, ToolConnectionDomainError> {
        let mut seen = HashSet::with_capacity(tools.len());
        for tool in &tools {
            if !seen.insert(tool.name()) {
                return Err(ToolConnectionDomainError::DuplicateToolName(
                    tool.name().to_owned(),
                ));
            }
        }
        Ok(Self { tools })
    }

    /// Creates an empty catalog.
    #[must_use]
    pub const fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// Returns descriptors in advertised order.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Finds a descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Returns whether a tool with `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the tool names in advertised order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(ToolDescriptor::name)
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Consumes the catalog and returns its descriptors.
    #[must_use]
    pub fn into_tools(self) -> Vec<ToolDescriptor> {
        self.tools
    }
}
