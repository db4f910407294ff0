//! Configuration management for pvegate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use url::{Host, Url};

use crate::error::{GatewayError, Result};

pub const DEFAULT_BASE_URL: &str = "https://localhost:8006/api2/json";
pub const DEFAULT_NODE: &str = "pve";

pub const ENV_API_URL: &str = "PVE_API_URL";
pub const ENV_API_TOKEN: &str = "PVE_API_TOKEN";
pub const ENV_VERIFY_TLS: &str = "PVE_VERIFY_TLS";
pub const ENV_DEFAULT_NODE: &str = "PVE_DEFAULT_NODE";

/// Top-level pvegate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Management API settings.
    #[serde(default)]
    pub api: ApiSettings,
}

/// Management API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL, e.g. `https://pve.lan:8006/api2/json`.
    pub base_url: Option<String>,

    /// Sent verbatim as the `Authorization` header. A blank value counts
    /// as no token.
    pub token: Option<String>,

    /// Verify the server certificate. Off by default: clusters usually
    /// serve a self-signed certificate.
    #[serde(default)]
    pub verify_tls: bool,

    /// Node used when a tool call omits `node`.
    #[serde(default = "default_node")]
    pub default_node: String,
}

fn default_node() -> String {
    DEFAULT_NODE.to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            verify_tls: false,
            default_node: default_node(),
        }
    }
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .field("default_node", &self.default_node)
            .finish()
    }
}

impl GatewayConfig {
    /// Load config from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("Failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GatewayError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pvegate")
            .join("config.toml")
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from any variable source. Empty values are ignored.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api.base_url = Some(url);
        }
        if let Some(token) = get(ENV_API_TOKEN) {
            self.api.token = Some(token);
        }
        if let Some(node) = get(ENV_DEFAULT_NODE) {
            self.api.default_node = node;
        }
        if let Some(raw) = get(ENV_VERIFY_TLS) {
            self.api.verify_tls = parse_bool(&raw).ok_or_else(|| {
                GatewayError::Config(format!("{} must be true or false, got '{}'", ENV_VERIFY_TLS, raw))
            })?;
        }
        Ok(())
    }

    /// Build the immutable connection settings for the dispatcher.
    ///
    /// Fails when the base URL is not an absolute http(s) URL.
    pub fn connection(&self) -> Result<ConnectionConfig> {
        let base_url = self.api.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        let mut connection = ConnectionConfig::new(base_url, self.api.token.as_deref())?;
        connection.verify_tls = self.api.verify_tls;
        connection.default_node = self.api.default_node.clone();

        if connection.auth_token.is_none() {
            tracing::warn!("No API token configured; every call will be rejected as unauthorized");
        }
        Ok(connection)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Process-wide connection settings, fixed after startup.
///
/// `base_url` is an absolute http(s) URL that never ends with a slash.
/// The token never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub verify_tls: bool,
    pub default_node: String,
    host: String,
}

impl ConnectionConfig {
    /// Validate `base_url` and keep `auth_token` as given. A blank token
    /// counts as absent.
    pub fn new(base_url: &str, auth_token: Option<&str>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        let url = Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::Config(format!(
                "API base URL '{}' must use http or https, got scheme '{}'",
                base_url,
                url.scheme()
            )));
        }
        let host = match url.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(other) => other.to_string(),
            None => {
                return Err(GatewayError::Config(format!(
                    "API base URL '{}' has no host",
                    base_url
                )));
            }
        };

        Ok(Self {
            base_url: base_url.to_string(),
            auth_token: auth_token
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string),
            verify_tls: false,
            default_node: default_node(),
            host,
        })
    }

    /// Host part of the base URL, used in diagnostics.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .field("default_node", &self.default_node)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.api.base_url.is_none());
        assert!(!config.api.verify_tls);
        assert_eq!(config.api.default_node, "pve");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = GatewayConfig::default();
        config.api.base_url = Some("https://pve.lan:8006/api2/json/".to_string());
        config.api.default_node = "node1".to_string();
        config.save(&path).unwrap();

        let loaded = GatewayConfig::load(&path).unwrap();
        assert_eq!(loaded.api.default_node, "node1");
        assert_eq!(loaded.connection().unwrap().base_url, "https://pve.lan:8006/api2/json");
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_URL, "https://10.0.0.5:8006/api2/json"),
            (ENV_API_TOKEN, "PVEAPIToken=root@pam!mcp=abc"),
            (ENV_VERIFY_TLS, "yes"),
            (ENV_DEFAULT_NODE, ""),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        config
            .apply_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        let conn = config.connection().unwrap();
        assert_eq!(conn.base_url, "https://10.0.0.5:8006/api2/json");
        assert_eq!(conn.auth_token.as_deref(), Some("PVEAPIToken=root@pam!mcp=abc"));
        assert!(conn.verify_tls);
        assert_eq!(conn.default_node, "pve");
    }

    #[test]
    fn test_bad_verify_flag() {
        let mut config = GatewayConfig::default();
        let result = config.apply_vars(|k| (k == ENV_VERIFY_TLS).then(|| "maybe".to_string()));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let conn = ConnectionConfig::new("https://pve:8006/api2/json", Some("secret-token")).unwrap();
        let shown = format!("{:?}", conn);
        assert!(!shown.contains("secret-token"));
        assert!(shown.contains("<redacted>"));

        let mut config = GatewayConfig::default();
        config.api.token = Some("secret-token".to_string());
        assert!(!format!("{:?}", config).contains("secret-token"));
    }

    #[test]
    fn test_host_extraction() {
        let host = |url: &str| ConnectionConfig::new(url, None).unwrap().host().to_string();
        assert_eq!(host("https://pve.lan:8006/api2/json"), "pve.lan");
        assert_eq!(host("http://10.0.0.2/api2/json/"), "10.0.0.2");
        assert_eq!(host("https://[fe80::1]:8006"), "fe80::1");
        assert_eq!(host("https://user@pve.lan:8006"), "pve.lan");
    }

    #[test]
    fn test_base_url_rejected_at_startup() {
        for bad in ["pve.local:8006/api2/json", "ftp://pve.lan/api2/json", "not a url", ""] {
            let result = ConnectionConfig::new(bad, Some("t"));
            assert!(matches!(result, Err(GatewayError::Config(_))), "accepted '{}'", bad);
        }

        let mut config = GatewayConfig::default();
        config.api.base_url = Some("pve.local:8006/api2/json".to_string());
        assert!(matches!(config.connection(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_token_kept_verbatim() {
        let conn = ConnectionConfig::new(DEFAULT_BASE_URL, Some(" PVEAPIToken=a@pam!b=c ")).unwrap();
        assert_eq!(conn.auth_token.as_deref(), Some(" PVEAPIToken=a@pam!b=c "));

        let blank = ConnectionConfig::new(DEFAULT_BASE_URL, Some("   ")).unwrap();
        assert!(blank.auth_token.is_none());
    }
}
