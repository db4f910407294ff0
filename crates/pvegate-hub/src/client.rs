//! Request dispatcher — one authenticated HTTP call per tool invocation.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use pvegate_core::config::ConnectionConfig;
use pvegate_core::error::{ApiFailure, GatewayError, Result, TransportCode};

/// Longest body excerpt written to the log on a non-success status.
const LOG_BODY_LIMIT: usize = 200;

/// Sends requests to the management API.
///
/// Holds only the static connection settings; no retries, caching, or
/// shared mutable state.
pub struct ApiClient {
    client: Client,
    config: ConnectionConfig,
}

impl ApiClient {
    /// Build a client for the given connection.
    ///
    /// Certificate verification follows `config.verify_tls`. It is off by
    /// default because clusters usually serve a self-signed certificate.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// No timeout beyond the transport's own unless `timeout` is given.
    fn build(config: ConnectionConfig, timeout: Option<Duration>) -> Result<Self> {
        if !config.verify_tls {
            warn!("TLS certificate verification is disabled for {}", config.host());
        }

        let mut builder = Client::builder().danger_accept_invalid_certs(!config.verify_tls);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn get(&self, path: &str) -> std::result::Result<Value, ApiFailure> {
        self.dispatch(path, Method::GET, &[], None).await
    }

    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, ApiFailure> {
        self.dispatch(path, Method::GET, query, None).await
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> std::result::Result<Value, ApiFailure> {
        self.dispatch(path, Method::POST, &[], body).await
    }

    /// Send one request and return the parsed JSON envelope.
    ///
    /// `path` is the endpoint path only; `query` pairs are URL-encoded
    /// onto it.
    pub async fn dispatch(
        &self,
        path: &str,
        method: Method,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> std::result::Result<Value, ApiFailure> {
        let url = join_url(&self.config.base_url, path);
        debug!("{} {}", method, path);

        let mut request = self.client.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", token);
        }
        if let Some(body) = body {
            // .json() sets the JSON content type
            request = request.json(body);
        }

        let resp = request.send().await.map_err(transport_failure)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport_failure)?;

        if !status.is_success() {
            warn!(
                "{} {} returned {}: {}",
                method,
                path,
                status.as_u16(),
                truncate(&text, LOG_BODY_LIMIT)
            );
            return Err(ApiFailure::Status {
                status: status.as_u16(),
                body: (!text.is_empty()).then_some(text),
                message: format!(
                    "{} {} failed: {}",
                    method,
                    path,
                    status.canonical_reason().unwrap_or("Unknown status")
                ),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiFailure::Decode {
            message: format!("{} {}: {}", method, path, e),
        })
    }
}

/// Join base URL and endpoint path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Cut `text` to at most `limit` characters.
pub fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn transport_failure(err: reqwest::Error) -> ApiFailure {
    ApiFailure::Transport {
        code: transport_code(&err),
        message: error_chain(&err),
    }
}

/// Map a reqwest error to the low-level failure code behind it.
fn transport_code(err: &reqwest::Error) -> TransportCode {
    if err.is_timeout() {
        return TransportCode::TimedOut;
    }

    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return TransportCode::ConnectionRefused,
                io::ErrorKind::TimedOut => return TransportCode::TimedOut,
                _ => {}
            }
        }
        source = cause.source();
    }

    let chain = error_chain(err).to_lowercase();
    if chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
    {
        TransportCode::NameNotFound
    } else if chain.contains("connection refused") {
        TransportCode::ConnectionRefused
    } else if chain.contains("timed out") {
        TransportCode::TimedOut
    } else if err.is_connect() {
        TransportCode::Other("ECONNECT".to_string())
    } else {
        TransportCode::Other("EREQUEST".to_string())
    }
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_join_url_normalizes_slashes() {
        let expected = "https://pve:8006/api2/json/cluster/resources";
        for base in ["https://pve:8006/api2/json", "https://pve:8006/api2/json/"] {
            for path in ["cluster/resources", "/cluster/resources", "//cluster/resources"] {
                assert_eq!(join_url(base, path), expected);
            }
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 200), "abc");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ééé", 2), "éé");
        assert_eq!(truncate(&"x".repeat(500), 200).len(), 200);
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_code() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = ApiClient::new(
            ConnectionConfig::new(&format!("http://127.0.0.1:{}/api2/json", port), Some("token"))
                .unwrap(),
        )
        .unwrap();

        let failure = client.get("cluster/resources").await.unwrap_err();
        assert_eq!(failure.transport_code(), Some(&TransportCode::ConnectionRefused));
        assert_eq!(failure.status(), None);
    }

    #[tokio::test]
    async fn test_unresolvable_host_maps_to_name_not_found() {
        // .invalid never resolves
        let config = ConnectionConfig::new("http://pve.invalid:8006/api2/json", Some("token")).unwrap();
        let client = ApiClient::new(config).unwrap();

        let failure = client.get("cluster/resources").await.unwrap_err();
        assert_eq!(failure.transport_code(), Some(&TransportCode::NameNotFound));
        assert_eq!(
            classify(&failure, client.config().host()),
            "DNS resolution failed for pve.invalid. Check PVE_API_URL."
        );
    }

    #[tokio::test]
    async fn test_slow_response_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": []}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = ConnectionConfig::new(&format!("{}/api2/json", server.uri()), Some("token")).unwrap();
        let client = ApiClient::build(config, Some(Duration::from_millis(200))).unwrap();

        let failure = client.get("cluster/resources").await.unwrap_err();
        assert_eq!(failure.transport_code(), Some(&TransportCode::TimedOut));
        let text = classify(&failure, client.config().host());
        assert!(text.starts_with("Host unreachable:") && text.contains("timed out"));
    }

    #[tokio::test]
    async fn test_query_pairs_are_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/json/cluster/resources"))
            .and(query_param("type", "vm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let config = ConnectionConfig::new(&format!("{}/api2/json", server.uri()), Some("token")).unwrap();
        let client = ApiClient::new(config).unwrap();

        let envelope = client
            .get_with_query("cluster/resources", &[("type", "vm".to_string())])
            .await
            .unwrap();
        assert_eq!(envelope, serde_json::json!({"data": []}));
    }
}
