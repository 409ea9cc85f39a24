//! ToolRegistry: name → definition lookup plus the executor.
//!
//! The registry never fails: unknown tools and handler errors both come back as failed
//! `ToolResult`s.

use std::sync::Arc;

use super::builtin::{self, ToolContext};
use super::docs::generate_tools_documentation;
use super::ToolDefinition;
use crate::error::ToolError;
use crate::runtime::{HttpFetcher, Workspace};
use crate::types::{ToolCall, ToolResult};

pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    workspace: Arc<dyn Workspace>,
    http: Arc<dyn HttpFetcher>,
}

impl ToolRegistry {
    /// Empty registry bound to its collaborators. Use `register` to add tools.
    pub fn new(workspace: Arc<dyn Workspace>, http: Arc<dyn HttpFetcher>) -> Self {
        Self {
            definitions: Vec::new(),
            workspace,
            http,
        }
    }

    /// Registry with every built-in tool.
    pub fn with_builtins(workspace: Arc<dyn Workspace>, http: Arc<dyn HttpFetcher>) -> Self {
        let mut registry = Self::new(workspace, http);
        for def in builtin::definitions() {
            registry.register(def);
        }
        registry
    }

    /// Add a definition. A definition with the same name replaces the old one in place.
    pub fn register(&mut self, def: ToolDefinition) {
        match self.definitions.iter_mut().find(|d| d.kind == def.kind) {
            Some(existing) => *existing = def,
            None => self.definitions.push(def),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name() == name)
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.definitions.iter().map(ToolDefinition::name).collect()
    }

    pub fn workspace(&self) -> &Arc<dyn Workspace> {
        &self.workspace
    }

    pub fn documentation(&self) -> String {
        generate_tools_documentation(&self.definitions)
    }

    /// Execute one call.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(def) = self.get(&call.tool) else {
            tracing::warn!(tool = %call.tool, "Unknown tool");
            return ToolResult::failure(ToolError::UnknownTool(call.tool.clone()).to_string());
        };

        let ctx = ToolContext {
            workspace: self.workspace.as_ref(),
            http: self.http.as_ref(),
        };
        match builtin::execute(def.kind, &call.parameters, &ctx).await {
            Ok(data) => {
                tracing::debug!(tool = %call.tool, "Tool succeeded");
                ToolResult::ok(data)
            }
            Err(e) => {
                tracing::warn!(tool = %call.tool, error = %e, "Tool failed");
                ToolResult::failure(e.to_string())
            }
        }
    }

    /// Execute calls strictly in order; a later call may depend on an earlier one's effects.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }
}
