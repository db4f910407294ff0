//! Error classifier — one actionable diagnostic per failure.
//!
//! Rules are checked in order and the first match wins. Status-based rules
//! come before transport-based ones, and a failure carries one or the
//! other, never both.

use pvegate_core::error::{ApiFailure, GatewayError, TransportCode};

use crate::client::truncate;

/// Longest response body excerpt included in a diagnostic.
const BODY_EXCERPT_LIMIT: usize = 300;

/// Diagnostic category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AuthenticationFailure,
    AuthorizationFailure,
    ServerFailure,
    OtherApiFailure,
    HostUnreachable,
    NameResolutionFailure,
    UnknownTransportFailure,
}

/// Category of a failure, following the rule order of [`classify`].
pub fn kind_of(failure: &ApiFailure) -> FailureKind {
    match failure {
        ApiFailure::Status { status: 401, .. } => FailureKind::AuthenticationFailure,
        ApiFailure::Status { status: 403, .. } => FailureKind::AuthorizationFailure,
        ApiFailure::Status { status, .. } if *status >= 500 => FailureKind::ServerFailure,
        ApiFailure::Status { .. } => FailureKind::OtherApiFailure,
        ApiFailure::Transport {
            code: TransportCode::ConnectionRefused | TransportCode::TimedOut,
            ..
        } => FailureKind::HostUnreachable,
        ApiFailure::Transport {
            code: TransportCode::NameNotFound,
            ..
        } => FailureKind::NameResolutionFailure,
        ApiFailure::Transport { .. } | ApiFailure::Decode { .. } => {
            FailureKind::UnknownTransportFailure
        }
    }
}

/// Turn a failure into a human-readable diagnostic. `host` is the
/// configured API host.
///
/// Pure: the same input always gives the same text, and nothing from the
/// request headers is ever included.
pub fn classify(failure: &ApiFailure, host: &str) -> String {
    match failure {
        ApiFailure::Status { status: 401, .. } => {
            "Authentication failed (401 Unauthorized): the API token is expired or invalid. \
             Check PVE_API_TOKEN and that the token has not been revoked."
                .to_string()
        }
        ApiFailure::Status { status: 403, .. } => {
            "Permission denied (403 Forbidden): the API token does not have the privileges \
             required for this action."
                .to_string()
        }
        ApiFailure::Status { status, .. } if *status >= 500 => format!(
            "Proxmox server error ({}): the API may be overloaded or temporarily unavailable. \
             Try again shortly.",
            status
        ),
        ApiFailure::Status {
            status,
            body,
            message,
        } => {
            let detail = body.as_deref().unwrap_or(message);
            format!(
                "Proxmox API error ({}): {}",
                status,
                truncate(detail, BODY_EXCERPT_LIMIT)
            )
        }
        ApiFailure::Transport {
            code: TransportCode::ConnectionRefused,
            ..
        } => format!(
            "Host unreachable: connection refused by {}. Is the Proxmox API running?",
            host
        ),
        ApiFailure::Transport {
            code: TransportCode::TimedOut,
            ..
        } => format!("Host unreachable: request to {} timed out.", host),
        ApiFailure::Transport {
            code: TransportCode::NameNotFound,
            ..
        } => format!(
            "DNS resolution failed for {}. Check PVE_API_URL.",
            host
        ),
        ApiFailure::Transport { message, .. } | ApiFailure::Decode { message } => {
            format!("Request failed: {}", message)
        }
    }
}

/// Diagnostic for any error raised beneath a tool handler.
pub fn describe(err: &GatewayError, host: &str) -> String {
    match err {
        GatewayError::Api(failure) => classify(failure, host),
        GatewayError::InvalidArguments { .. } | GatewayError::ToolNotFound(_) => err.to_string(),
        other => format!("Request failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "pve.lan";

    fn status(code: u16, body: Option<&str>) -> ApiFailure {
        ApiFailure::Status {
            status: code,
            body: body.map(str::to_string),
            message: format!("GET x failed: {}", code),
        }
    }

    fn transport(code: TransportCode) -> ApiFailure {
        ApiFailure::Transport {
            code,
            message: "error sending request".to_string(),
        }
    }

    #[test]
    fn test_status_rules() {
        let auth = classify(&status(401, None), HOST);
        assert!(auth.contains("401") && auth.contains("Unauthorized"));
        assert!(auth.contains("expired or invalid"));

        let forbidden = classify(&status(403, None), HOST);
        assert!(forbidden.contains("403") && forbidden.contains("privileges"));

        for code in [500, 503] {
            let server = classify(&status(code, Some("boom")), HOST);
            assert!(server.contains(&code.to_string()));
            assert!(server.contains("overloaded"));
            assert!(!server.contains("boom"));
        }

        let teapot = classify(&status(418, Some("short and stout")), HOST);
        assert_eq!(teapot, "Proxmox API error (418): short and stout");
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(kind_of(&status(499, None)), FailureKind::OtherApiFailure);
        assert_eq!(kind_of(&status(500, None)), FailureKind::ServerFailure);
        assert_eq!(kind_of(&status(400, None)), FailureKind::OtherApiFailure);
        assert_eq!(kind_of(&status(402, None)), FailureKind::OtherApiFailure);
        assert_eq!(kind_of(&status(404, None)), FailureKind::OtherApiFailure);
    }

    #[test]
    fn test_other_status_body_excerpt() {
        let long = "e".repeat(1000);
        let text = classify(&status(400, Some(&long)), HOST);
        assert_eq!(text, format!("Proxmox API error (400): {}", "e".repeat(300)));

        let fallback = classify(&status(404, None), HOST);
        assert!(fallback.ends_with("GET x failed: 404"));
    }

    #[test]
    fn test_transport_rules() {
        let refused = classify(&transport(TransportCode::ConnectionRefused), HOST);
        assert!(refused.contains("unreachable") && refused.contains("connection refused"));

        let timeout = classify(&transport(TransportCode::TimedOut), HOST);
        assert!(timeout.contains("unreachable") && timeout.contains("timed out"));

        let dns = classify(&transport(TransportCode::NameNotFound), HOST);
        assert!(dns.contains("DNS resolution failed") && dns.contains(HOST));

        let other = classify(&transport(TransportCode::Other("ECONNRESET".into())), HOST);
        assert_eq!(other, "Request failed: error sending request");

        let decode = classify(&ApiFailure::Decode { message: "bad json".into() }, HOST);
        assert_eq!(decode, "Request failed: bad json");
    }

    #[test]
    fn test_status_takes_precedence_over_transport_text() {
        // A status failure whose message reads like a transport error still
        // classifies by its status.
        let failure = ApiFailure::Status {
            status: 401,
            body: Some("connection refused".to_string()),
            message: "ECONNREFUSED".to_string(),
        };
        assert_eq!(kind_of(&failure), FailureKind::AuthenticationFailure);
        assert!(classify(&failure, HOST).starts_with("Authentication failed"));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let failure = status(502, Some("bad gateway"));
        assert_eq!(classify(&failure, HOST), classify(&failure, HOST));
    }

    #[test]
    fn test_describe_non_api_errors() {
        let err = GatewayError::invalid("set_lxc_state", "'state' is required");
        assert_eq!(
            describe(&err, HOST),
            "Invalid arguments for set_lxc_state: 'state' is required"
        );

        let err = GatewayError::Config("bad".into());
        assert!(describe(&err, HOST).starts_with("Request failed:"));
    }
}
