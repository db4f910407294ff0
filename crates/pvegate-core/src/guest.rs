//! Guest and task identifiers — what a tool call points at.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Kind of guest managed by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    #[default]
    Container,
    Vm,
}

impl GuestKind {
    /// Path segment used by the management API.
    pub fn api_segment(self) -> &'static str {
        match self {
            GuestKind::Container => "lxc",
            GuestKind::Vm => "qemu",
        }
    }
}

impl fmt::Display for GuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestKind::Container => write!(f, "container"),
            GuestKind::Vm => write!(f, "vm"),
        }
    }
}

impl FromStr for GuestKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "container" | "lxc" => Ok(GuestKind::Container),
            "vm" | "qemu" => Ok(GuestKind::Vm),
            _ => Err(format!("invalid kind '{}', expected one of: container, vm", s)),
        }
    }
}

/// Power state a container can be asked to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
}

impl PowerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(PowerAction::Start),
            "stop" => Ok(PowerAction::Stop),
            _ => Err(format!("invalid state '{}', expected one of: start, stop", s)),
        }
    }
}

/// Identifies a target guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRef {
    pub vmid: String,
    pub node: String,
    pub kind: GuestKind,
}

impl GuestRef {
    /// Read `vmid`, `node`, and `kind` from tool arguments.
    ///
    /// `node` falls back to `default_node`, `kind` to container.
    pub fn from_args(tool: &str, args: &Value, default_node: &str) -> Result<Self> {
        let kind = match args.get("kind").and_then(Value::as_str) {
            Some(raw) => raw.parse::<GuestKind>().map_err(|e| GatewayError::invalid(tool, e))?,
            None => GuestKind::default(),
        };

        Ok(Self {
            vmid: vmid_arg(tool, args)?,
            node: node_arg(tool, args, default_node)?,
            kind,
        })
    }

    /// `nodes/{node}/{lxc|qemu}/{vmid}/status/current`
    pub fn status_path(&self) -> String {
        format!(
            "nodes/{}/{}/{}/status/current",
            self.node,
            self.kind.api_segment(),
            self.vmid
        )
    }
}

/// Identifies an asynchronous cluster task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub upid: String,
    pub node: String,
}

impl TaskRef {
    pub fn from_args(tool: &str, args: &Value, default_node: &str) -> Result<Self> {
        let upid = args
            .get("upid")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::invalid(tool, "'upid' is required"))?;
        if !is_path_safe(upid) {
            return Err(GatewayError::invalid(tool, format!("invalid upid '{}'", upid)));
        }

        Ok(Self {
            upid: upid.to_string(),
            node: node_arg(tool, args, default_node)?,
        })
    }

    /// `nodes/{node}/tasks/{upid}/log`
    pub fn log_path(&self) -> String {
        format!("nodes/{}/tasks/{}/log", self.node, self.upid)
    }
}

/// Accepts a JSON string or integer; must be all digits.
pub fn vmid_arg(tool: &str, args: &Value) -> Result<String> {
    let vmid = match args.get("vmid") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) if n.is_u64() => n.to_string(),
        Some(other) if !other.is_null() => {
            return Err(GatewayError::invalid(
                tool,
                format!("'vmid' must be a string or integer, got {}", other),
            ));
        }
        _ => return Err(GatewayError::invalid(tool, "'vmid' is required")),
    };

    if vmid.is_empty() || !vmid.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::invalid(
            tool,
            format!("'vmid' must be numeric, got '{}'", vmid),
        ));
    }
    Ok(vmid)
}

pub fn node_arg(tool: &str, args: &Value, default_node: &str) -> Result<String> {
    match args.get("node") {
        None | Some(Value::Null) => Ok(default_node.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            let node = s.trim();
            if !is_path_safe(node) {
                return Err(GatewayError::invalid(tool, format!("invalid node name '{}'", node)));
            }
            Ok(node.to_string())
        }
        Some(_) => Err(GatewayError::invalid(tool, "'node' must be a non-empty string")),
    }
}

/// Values spliced into an endpoint path must stay a single segment.
fn is_path_safe(segment: &str) -> bool {
    !segment.contains(['/', '?', '#', '\\']) && !segment.chars().any(char::is_whitespace)
}
