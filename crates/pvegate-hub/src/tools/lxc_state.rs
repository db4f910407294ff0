//! Container power tool — start or stop an LXC guest.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pvegate_core::error::{GatewayError, Result};
use pvegate_core::guest::{PowerAction, node_arg, vmid_arg};
use pvegate_core::tool::Tool;

use super::unwrap_data;
use crate::client::ApiClient;

pub struct SetLxcStateTool {
    client: Arc<ApiClient>,
}

impl SetLxcStateTool {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SetLxcStateTool {
    fn name(&self) -> &str {
        "set_lxc_state"
    }

    fn description(&self) -> &str {
        "Start or stop an LXC container. Returns the task UPID, which can be passed to get_task_logs."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vmid": {
                    "type": "string",
                    "description": "Container ID, e.g. '101'"
                },
                "state": {
                    "type": "string",
                    "enum": ["start", "stop"],
                    "description": "Requested power state"
                },
                "node": {
                    "type": "string",
                    "description": format!("Cluster node name. Default: '{}'", self.client.config().default_node)
                }
            },
            "required": ["vmid", "state"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let vmid = vmid_arg(self.name(), &args)?;
        let node = node_arg(self.name(), &args, &self.client.config().default_node)?;
        let action: PowerAction = args
            .get("state")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::invalid(self.name(), "'state' is required"))?
            .parse::<PowerAction>()
            .map_err(|e| GatewayError::invalid(self.name(), e))?;

        let path = format!("nodes/{}/lxc/{}/status/{}", node, vmid, action);
        let envelope = self.client.post(&path, None).await?;

        let mut output = format!("✅ Container {} {} requested on {}", vmid, action, node);
        if let Some(upid) = unwrap_data(envelope).as_str() {
            output.push_str(&format!("\nTask: {}", upid));
        }
        Ok(output)
    }
}
