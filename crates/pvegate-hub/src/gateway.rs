//! Tool boundary — nothing raised beneath it escapes as an error.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use pvegate_core::config::ConnectionConfig;
use pvegate_core::error::Result;
use pvegate_core::tool::{ToolDefinition, ToolRegistry, ToolResult};

use crate::classify::describe;
use crate::client::ApiClient;
use crate::tools;

/// All guest tools behind one call surface.
pub struct Gateway {
    registry: ToolRegistry,
    host: String,
}

impl Gateway {
    /// Build the dispatcher and register every guest tool.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let host = config.host().to_string();
        let client = Arc::new(ApiClient::new(config)?);

        let mut registry = ToolRegistry::new();
        tools::register_all(&mut registry, client);

        Ok(Self { registry, host })
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn tool_count(&self) -> usize {
        self.registry.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Run one tool call. Failures come back as `is_error` results carrying
    /// a classified diagnostic.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult {
        let args = if args.is_null() { Value::Object(Default::default()) } else { args };

        match self.registry.execute(name, args).await {
            Ok(text) => ToolResult::ok(text),
            Err(e) => {
                let text = describe(&e, &self.host);
                debug!("Tool {} returned error result: {}", name, text);
                ToolResult::error(text)
            }
        }
    }
}
