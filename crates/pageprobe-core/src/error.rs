//! Error types for pageprobe-core.
//!
//! Capture itself never fails; these cover configuration, the outbound API
//! and credential checks.

use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML could not be parsed.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A capacity was zero.
    #[error("capacity for {log} must be at least 1")]
    ZeroCapacity {
        /// Which log
        log: &'static str,
    },

    /// Slow-resource threshold was zero, negative or not finite.
    #[error("slow resource threshold must be positive, got {0}")]
    InvalidThreshold(f64),

    /// API base URL did not parse.
    #[error("invalid API base URL {url:?}: {source}")]
    InvalidBaseUrl {
        /// The rejected value
        url: String,
        /// Parse failure
        source: url::ParseError,
    },
}

/// Failure of the transport itself (no response received).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// No transport is available in this environment.
    #[error("transport unavailable")]
    Unavailable,
}

/// Outbound API failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No `api` section in the configuration.
    #[error("backend API is not configured")]
    NotConfigured,

    /// Transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Backend rejected the credential.
    #[error("unauthorized")]
    Unauthorized,

    /// Backend returned another non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status
        status: u16,
        /// Response body text
        body: String,
    },

    /// Payload or response body failed to (de)serialize.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Credential check failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Credential missing or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// No credential is stored for the project.
    #[error("unknown project: {0}")]
    UnknownProject(String),
}

/// Any pageprobe error.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// API error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Credential error.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ZeroCapacity { log: "console" };
        assert_eq!(err.to_string(), "capacity for console must be at least 1");

        let err = ConfigError::InvalidThreshold(-1.0);
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_json_error_from() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConfigError = parse.into();
        assert!(err.to_string().starts_with("invalid JSON config"));
    }

    #[test]
    fn test_api_error_transparent_transport() {
        let err: ApiError = TransportError::Network("offline".into()).into();
        assert_eq!(err.to_string(), "network error: offline");
    }

    #[test]
    fn test_api_status_error() {
        let err = ApiError::Status { status: 500, body: "boom".into() };
        assert_eq!(err.to_string(), "unexpected status 500: boom");
    }

    #[test]
    fn test_probe_error_wraps() {
        let err: ProbeError = AuthError::UnknownProject("p1".into()).into();
        assert!(matches!(err, ProbeError::Auth(_)));
        assert_eq!(err.to_string(), "unknown project: p1");
    }
}
