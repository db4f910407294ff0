//! Guest tools — thin adapters over the request dispatcher.

pub mod lxc_state;
pub mod lxc_status;
pub mod resource_health;
pub mod resources;
pub mod task_logs;

pub use lxc_state::SetLxcStateTool;
pub use lxc_status::LxcStatusTool;
pub use resource_health::ResourceHealthTool;
pub use resources::ListResourcesTool;
pub use task_logs::TaskLogsTool;

use std::sync::Arc;

use serde_json::Value;

use pvegate_core::error::Result;
use pvegate_core::tool::ToolRegistry;

use crate::client::ApiClient;

/// Register every guest tool against one shared client.
pub fn register_all(registry: &mut ToolRegistry, client: Arc<ApiClient>) {
    registry.register(LxcStatusTool::new(client.clone()));
    registry.register(SetLxcStateTool::new(client.clone()));
    registry.register(ListResourcesTool::new(client.clone()));
    registry.register(ResourceHealthTool::new(client.clone()));
    registry.register(TaskLogsTool::new(client));
}

/// The API wraps every payload as `{ "data": ... }`.
pub(crate) fn unwrap_data(envelope: Value) -> Value {
    match envelope {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub(crate) fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
