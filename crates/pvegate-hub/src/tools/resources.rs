//! Cluster resources tool — every node, guest, and storage in one list.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pvegate_core::error::{GatewayError, Result};
use pvegate_core::tool::Tool;

use super::{pretty, unwrap_data};
use crate::client::ApiClient;

const RESOURCE_TYPES: [&str; 4] = ["vm", "storage", "node", "sdn"];

pub struct ListResourcesTool {
    client: Arc<ApiClient>,
}

impl ListResourcesTool {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListResourcesTool {
    fn name(&self) -> &str {
        "list_all_resources"
    }

    fn description(&self) -> &str {
        "List all cluster resources (nodes, VMs, containers, storage) with their status and usage."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": RESOURCE_TYPES,
                    "description": "Only list resources of this type. Default: all"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let query = match args.get("type").and_then(Value::as_str) {
            Some(kind) if RESOURCE_TYPES.contains(&kind) => vec![("type", kind.to_string())],
            Some(kind) => {
                return Err(GatewayError::invalid(
                    self.name(),
                    format!("invalid type '{}', expected one of: {}", kind, RESOURCE_TYPES.join(", ")),
                ));
            }
            None => Vec::new(),
        };

        let envelope = self.client.get_with_query("cluster/resources", &query).await?;
        pretty(&unwrap_data(envelope))
    }
}
