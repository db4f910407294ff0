//! Resource health tool — memory/swap pressure and thrashing risk for a
//! container or VM.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pvegate_core::error::Result;
use pvegate_core::guest::GuestRef;
use pvegate_core::tool::Tool;

use super::unwrap_data;
use crate::client::ApiClient;
use crate::health::{HealthSnapshot, summarize};

pub struct ResourceHealthTool {
    client: Arc<ApiClient>,
}

impl ResourceHealthTool {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ResourceHealthTool {
    fn name(&self) -> &str {
        "get_resource_health"
    }

    fn description(&self) -> &str {
        "Summarize the health of a container or VM: memory and swap usage, disk I/O, uptime, and a warning when it is at risk of thrashing."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vmid": {
                    "type": "string",
                    "description": "Guest ID, e.g. '101'"
                },
                "node": {
                    "type": "string",
                    "description": format!("Cluster node name. Default: '{}'", self.client.config().default_node)
                },
                "kind": {
                    "type": "string",
                    "enum": ["container", "vm"],
                    "description": "Guest kind. Default: 'container'"
                }
            },
            "required": ["vmid"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let guest = GuestRef::from_args(self.name(), &args, &self.client.config().default_node)?;

        let envelope = self.client.get(&guest.status_path()).await?;
        let snapshot = HealthSnapshot::from_data(&unwrap_data(envelope));

        Ok(summarize(&snapshot, &guest.vmid, &guest.node, guest.kind))
    }
}
