//! Probe configuration.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```
//! use pageprobe_core::config::ProbeConfig;
//!
//! let config = ProbeConfig::from_json_str(r#"{"capacities": {"console": 50}}"#).unwrap();
//! assert_eq!(config.capacities.console, 50);
//! assert_eq!(config.capacities.network, 200);
//! ```

use crate::console::CONSOLE_CAPACITY;
use crate::error::ConfigError;
use crate::errors::ERROR_CAPACITY;
use crate::health::{HEALTH_CAPACITY, SLOW_RESOURCE_MS};
use crate::network::NETWORK_CAPACITY;
use crate::perf::PERF_CAPACITY;
use crate::report::ReportLimits;
use serde::{Deserialize, Serialize};
use url::Url;

/// Retained entries per log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Capacities {
    /// Console log
    pub console: usize,
    /// Network log
    pub network: usize,
    /// Error log
    pub errors: usize,
    /// Perf log
    pub perf: usize,
    /// Health log
    pub health: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            console: CONSOLE_CAPACITY,
            network: NETWORK_CAPACITY,
            errors: ERROR_CAPACITY,
            perf: PERF_CAPACITY,
            health: HEALTH_CAPACITY,
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Backend origin, e.g. `https://bugs.example.com`
    pub base_url: String,
    /// Pre-shared project credential
    pub api_key: String,
    /// Project the artifacts belong to
    pub project_id: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Log capacities
    pub capacities: Capacities,
    /// Slow-resource threshold (ms)
    pub slow_resource_ms: f64,
    /// Entries per report section
    pub report: ReportLimits,
    /// Backend settings; reporting is disabled without them
    pub api: Option<ApiConfig>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            capacities: Capacities::default(),
            slow_resource_ms: SLOW_RESOURCE_MS,
            report: ReportLimits::default(),
            api: None,
        }
    }
}

impl ProbeConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML config.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitors cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let caps = &self.capacities;
        for (log, capacity) in [
            ("console", caps.console),
            ("network", caps.network),
            ("errors", caps.errors),
            ("perf", caps.perf),
            ("health", caps.health),
        ] {
            if capacity == 0 {
                return Err(ConfigError::ZeroCapacity { log });
            }
        }

        if !self.slow_resource_ms.is_finite() || self.slow_resource_ms <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.slow_resource_ms));
        }

        if let Some(api) = &self.api {
            Url::parse(&api.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
                url: api.base_url.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.capacities.console, 500);
        assert_eq!(config.capacities.network, 200);
        assert_eq!(config.capacities.errors, 100);
        assert_eq!(config.capacities.perf, 100);
        assert_eq!(config.capacities.health, 200);
        assert_eq!(config.slow_resource_ms, 2000.0);
        assert!(config.api.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ProbeConfig::from_json_str("{}").unwrap(), ProbeConfig::default());
    }

    #[test]
    fn test_json_camel_case() {
        let config = ProbeConfig::from_json_str(
            r#"{
                "slowResourceMs": 1500,
                "report": {"console": 3},
                "api": {"baseUrl": "https://bugs.example.com", "apiKey": "k", "projectId": "p"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.slow_resource_ms, 1500.0);
        assert_eq!(config.report.console, 3);
        assert_eq!(config.report.network, ReportLimits::default().network);
        assert_eq!(config.api.unwrap().project_id, "p");
    }

    #[test]
    fn test_toml() {
        let config = ProbeConfig::from_toml_str(
            r#"
            slowResourceMs = 3000.0

            [capacities]
            network = 50

            [api]
            baseUrl = "http://localhost:8080"
            apiKey = "secret"
            projectId = "demo"
            "#,
        )
        .unwrap();
        assert_eq!(config.capacities.network, 50);
        assert_eq!(config.capacities.console, 500);
        assert_eq!(config.api.unwrap().base_url, "http://localhost:8080");
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = ProbeConfig::from_json_str(r#"{"capacities": {"perf": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity { log: "perf" }));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = ProbeConfig {
            slow_resource_ms: 0.0,
            ..ProbeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = ProbeConfig::from_json_str(
            r#"{"api": {"baseUrl": "not a url", "apiKey": "k", "projectId": "p"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ProbeConfig::from_json_str("{capacities"),
            Err(ConfigError::Json(_))
        ));
    }
}
