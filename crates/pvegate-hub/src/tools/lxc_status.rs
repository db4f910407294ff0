//! Container status tool — raw telemetry for one LXC guest.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pvegate_core::error::Result;
use pvegate_core::guest::{GuestKind, GuestRef, node_arg, vmid_arg};
use pvegate_core::tool::Tool;

use super::{pretty, unwrap_data};
use crate::client::ApiClient;

pub struct LxcStatusTool {
    client: Arc<ApiClient>,
}

impl LxcStatusTool {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for LxcStatusTool {
    fn name(&self) -> &str {
        "get_lxc_status"
    }

    fn description(&self) -> &str {
        "Get the current status of an LXC container: state, CPU, memory, swap, disk and network counters, uptime."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vmid": {
                    "type": "string",
                    "description": "Container ID, e.g. '101'"
                },
                "node": {
                    "type": "string",
                    "description": format!("Cluster node name. Default: '{}'", self.client.config().default_node)
                }
            },
            "required": ["vmid"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let guest = GuestRef {
            vmid: vmid_arg(self.name(), &args)?,
            node: node_arg(self.name(), &args, &self.client.config().default_node)?,
            kind: GuestKind::Container,
        };

        let envelope = self.client.get(&guest.status_path()).await?;
        pretty(&unwrap_data(envelope))
    }
}
