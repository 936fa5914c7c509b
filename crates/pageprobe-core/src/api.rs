//! Client for the bug-tracking backend.
//!
//! The HTTP mechanism is a [`Transport`]; the browser runtime issues requests
//! with the page's original `fetch`, tests use an in-memory fake.

use crate::config::ApiConfig;
use crate::console::ConsoleEntry;
use crate::error::{ApiError, TransportError};
use crate::errors::ErrorEntry;
use crate::health::HealthIssue;
use crate::network::NetworkEntry;
use crate::perf::PerfEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::Future;
use url::Url;

/// Header carrying the pre-shared project credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Bug submission endpoint.
pub const BUGS_PATH: &str = "/api/bugs";

/// Report upload endpoint.
pub const REPORTS_PATH: &str = "/api/reports";

/// One outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// HTTP method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Header pairs
    pub headers: Vec<(String, String)>,
    /// Body text
    pub body: Option<String>,
}

impl OutboundRequest {
    /// First header value with the given (case-insensitive) name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundResponse {
    /// HTTP status
    pub status: u16,
    /// Body text
    pub body: String,
}

impl OutboundResponse {
    /// 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends requests and resolves with the response.
pub trait Transport {
    /// Issue one request.
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<OutboundResponse, TransportError>>;
}

/// A user-filed bug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugReport {
    /// Short title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Page the bug was filed on
    pub page_url: String,
    /// Browser user agent
    pub user_agent: Option<String>,
    /// Rendered text report attached to the bug
    pub report: Option<String>,
}

/// Captured artifacts uploaded in one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUpload {
    /// Page URL
    pub page_url: String,
    /// Rendered text report
    pub report: String,
    /// Console entries
    pub console: Vec<ConsoleEntry>,
    /// Network entries
    pub network: Vec<NetworkEntry>,
    /// Error entries
    pub errors: Vec<ErrorEntry>,
    /// Perf entries
    pub perf: Vec<PerfEntry>,
    /// Health issues
    pub health: Vec<HealthIssue>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a, P> {
    project_id: &'a str,
    #[serde(flatten)]
    payload: &'a P,
}

/// Backend client.
#[derive(Debug)]
pub struct ApiClient<T> {
    config: ApiConfig,
    base: Url,
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    /// Create a client; fails when the base URL does not parse.
    pub fn new(config: ApiConfig, transport: T) -> Result<Self, ApiError> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self {
            config,
            base,
            transport,
        })
    }

    /// The client's configuration.
    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `POST /api/bugs`
    pub async fn submit_bug(&self, bug: &BugReport) -> Result<JsonValue, ApiError> {
        self.post(BUGS_PATH, bug).await
    }

    /// `POST /api/reports`
    pub async fn submit_report(&self, upload: &ReportUpload) -> Result<JsonValue, ApiError> {
        self.post(REPORTS_PATH, upload).await
    }

    async fn post<P: Serialize>(&self, path: &str, payload: &P) -> Result<JsonValue, ApiError> {
        let url = self.base.join(path)?;
        let body = serde_json::to_string(&Envelope {
            project_id: &self.config.project_id,
            payload,
        })?;
        let request = OutboundRequest {
            method: "POST".to_string(),
            url: url.to_string(),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                (API_KEY_HEADER.to_string(), self.config.api_key.clone()),
            ],
            body: Some(body),
        };

        tracing::debug!(url = %request.url, "submitting to backend");
        let response = self.transport.send(request).await?;
        match response.status {
            401 => Err(ApiError::Unauthorized),
            _ if !response.is_success() => Err(ApiError::Status {
                status: response.status,
                body: response.body,
            }),
            _ if response.body.trim().is_empty() => Ok(JsonValue::Null),
            _ => Ok(serde_json::from_str(&response.body)?),
        }
    }
}
