//! Stdio JSON-RPC server — one request per line in, one response per line
//! out. Each tool call runs on its own task; the gateway is the only thing
//! they share.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use pvegate_core::error::Result;
use pvegate_core::tool::ToolResult;

use crate::gateway::Gateway;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Serves the gateway's tools to one client over a line-delimited stream.
pub struct McpServer {
    gateway: Arc<Gateway>,
}

impl McpServer {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    /// Serve on stdin/stdout until stdin closes.
    pub async fn run(&self) -> Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve on any line-oriented reader/writer pair until the reader hits EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("pvegate server started with {} tools", self.gateway.tool_count());

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let output = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut calls = InFlight::default();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let input = line.trim().to_string();
            if input.is_empty() {
                continue;
            }

            let gateway = self.gateway.clone();
            let tx = tx.clone();
            calls.spawn(async move {
                if let Some(response) = handle_line(&gateway, &input).await {
                    if tx.send(response).is_err() {
                        warn!("Output closed before response could be written");
                    }
                }
            });
            debug!("{} calls in flight", calls.len());
        }

        calls.drain().await;
        drop(tx);

        match output.await {
            Ok(result) => result?,
            Err(e) => error!("Output task failed: {}", e),
        }
        info!("Input stream closed. Shutting down.");
        Ok(())
    }
}

/// Calls still running. Finished calls are reaped on every spawn so the
/// set stays bounded by the number of calls actually in flight.
#[derive(Default)]
struct InFlight {
    tasks: JoinSet<()>,
}

impl InFlight {
    fn spawn<F>(&mut self, call: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        while let Some(joined) = self.tasks.try_join_next() {
            log_join(joined);
        }
        self.tasks.spawn(call);
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            log_join(joined);
        }
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("Tool call task failed: {}", e);
    }
}

/// Handle one raw input line. Returns the serialized response, or `None`
/// for notifications and unparseable input.
pub async fn handle_line(gateway: &Gateway, input: &str) -> Option<String> {
    debug!("Received: {}", input);

    let request = match serde_json::from_str::<JsonRpcRequest>(input) {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse JSON-RPC: {}", e);
            return None;
        }
    };

    if request.jsonrpc != "2.0" {
        debug!("Request without jsonrpc 2.0 marker: {}", request.method);
    }

    let Some(id) = request.id.clone() else {
        debug!("Notification: {}", request.method);
        return None;
    };

    let response = match handle_request(gateway, &request).await {
        Ok(result) => JsonRpcResponse::result(id, result),
        Err((code, message)) => JsonRpcResponse::error(id, code, message),
    };

    match serde_json::to_string(&response) {
        Ok(out) => Some(out),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            None
        }
    }
}

async fn handle_request(
    gateway: &Gateway,
    req: &JsonRpcRequest,
) -> std::result::Result<Value, (i64, String)> {
    match req.method.as_str() {
        "initialize" => {
            let version = req
                .params
                .as_ref()
                .and_then(|p| p.get("protocolVersion"))
                .and_then(Value::as_str)
                .unwrap_or(PROTOCOL_VERSION);

            Ok(json!({
                "protocolVersion": version,
                "serverInfo": {
                    "name": "pvegate",
                    "version": env!("CARGO_PKG_VERSION")
                },
                "capabilities": {
                    "tools": {}
                }
            }))
        }
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": gateway.definitions() })),
        "tools/call" => {
            let params = req
                .params
                .as_ref()
                .ok_or((INVALID_PARAMS, "Missing params for tools/call".to_string()))?;
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .ok_or((INVALID_PARAMS, "Missing tool name".to_string()))?;
            let args = params.get("arguments").cloned().unwrap_or(Value::Null);

            info!("Tool call: {}", name);
            Ok(call_result(gateway.invoke(name, args).await))
        }
        other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
    }
}

fn call_result(result: ToolResult) -> Value {
    json!({
        "content": [{ "type": "text", "text": result.text }],
        "isError": result.is_error
    })
}
