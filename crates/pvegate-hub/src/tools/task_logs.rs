//! Task log tool — read the output of an asynchronous cluster task.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pvegate_core::error::{GatewayError, Result};
use pvegate_core::guest::TaskRef;
use pvegate_core::tool::Tool;

use super::unwrap_data;
use crate::client::ApiClient;

pub struct TaskLogsTool {
    client: Arc<ApiClient>,
}

impl TaskLogsTool {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TaskLogsTool {
    fn name(&self) -> &str {
        "get_task_logs"
    }

    fn description(&self) -> &str {
        "Read the log of a cluster task (backup, start, stop, migration...) by its UPID."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "upid": {
                    "type": "string",
                    "description": "Task ID, e.g. 'UPID:pve:0000A1B2:...'"
                },
                "node": {
                    "type": "string",
                    "description": format!("Cluster node name. Default: '{}'", self.client.config().default_node)
                },
                "limit": {
                    "type": "integer",
                    "description": "Max log lines to return. Default: server default"
                }
            },
            "required": ["upid"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let task = TaskRef::from_args(self.name(), &args, &self.client.config().default_node)?;

        let query = match args.get("limit") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => {
                let limit = raw
                    .as_u64()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| GatewayError::invalid(self.name(), "'limit' must be a positive integer"))?;
                vec![("limit", limit.to_string())]
            }
        };

        let envelope = self.client.get_with_query(&task.log_path(), &query).await?;
        let lines = log_lines(&unwrap_data(envelope));

        if lines.is_empty() {
            return Ok(format!("No log entries found for task {}.", task.upid));
        }
        Ok(lines.join("\n"))
    }
}

/// Entries look like `{ "n": 1, "t": "starting task" }`.
fn log_lines(data: &Value) -> Vec<String> {
    data.as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(s) => Some(s.clone()),
                    _ => entry.get("t").and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}
