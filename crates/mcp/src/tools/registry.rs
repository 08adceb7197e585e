// Tool registry: the immutable name -> definition table of one server

use super::ToolName;
use crate::protocol::ToolSchema;
use crate::service::Service;
use genmedia_core::{ToolError, ToolResult};
use serde_json::Value;
use std::collections::HashMap;

/// A registered tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: ToolName,
    pub description: &'static str,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: ToolName) -> Self {
        Self {
            name,
            description: name.description(),
            input_schema: name.input_schema(),
        }
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.as_str().to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Tools in registration order, with a name index for lookups.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every tool of `service`.
    pub fn for_service(service: Service) -> Self {
        let mut registry = Self::new();
        for tool in service.tools() {
            // Service tool lists hold no duplicates.
            let _ = registry.register(ToolDefinition::new(*tool));
        }
        registry
    }

    /// Register a tool. Names are unique.
    pub fn register(&mut self, definition: ToolDefinition) -> ToolResult<()> {
        let name = definition.name.as_str();
        if self.index.contains_key(name) {
            return Err(ToolError::Internal(format!("tool {} registered twice", name)));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(definition);
        Ok(())
    }

    /// Look up a tool by its wire name.
    pub fn resolve(&self, name: &str) -> ToolResult<&ToolDefinition> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Schemas in registration order.
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(ToolDefinition::schema).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
