//! The set of monitors a page is instrumented with.

use crate::api::{ApiClient, ReportUpload, Transport};
use crate::clock::Clock;
use crate::config::ProbeConfig;
use crate::console::ConsoleMonitor;
use crate::error::ApiError;
use crate::errors::ErrorMonitor;
use crate::health::HealthMonitor;
use crate::network::NetworkMonitor;
use crate::perf::PerfMonitor;
use crate::report::{ReportBuilder, ReportInput};
use crate::snapshot::StorageInspector;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Interceptors that patch the environment and must do so only once.
///
/// Health checks carry their own guard in [`HealthMonitor::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interceptor {
    /// Console methods
    Console,
    /// `fetch` and XHR
    Network,
    /// Global error and rejection notifications
    Errors,
    /// Performance observers
    Performance,
}

impl Interceptor {
    /// Every guarded interceptor.
    pub const ALL: [Self; 4] = [Self::Console, Self::Network, Self::Errors, Self::Performance];

    const fn index(self) -> usize {
        match self {
            Self::Console => 0,
            Self::Network => 1,
            Self::Errors => 2,
            Self::Performance => 3,
        }
    }
}

/// Every monitor of one page, built from one config.
pub struct Probe {
    config: ProbeConfig,
    clock: Rc<dyn Clock>,
    console: ConsoleMonitor,
    network: NetworkMonitor,
    errors: ErrorMonitor,
    perf: PerfMonitor,
    health: HealthMonitor,
    storage: StorageInspector,
    installed: [Cell<bool>; 4],
}

impl Probe {
    /// Build every monitor.
    #[must_use]
    pub fn new(config: ProbeConfig, clock: Rc<dyn Clock>) -> Self {
        let caps = config.capacities;
        Self {
            console: ConsoleMonitor::new(caps.console, Rc::clone(&clock)),
            network: NetworkMonitor::new(caps.network, Rc::clone(&clock)),
            errors: ErrorMonitor::new(caps.errors, Rc::clone(&clock)),
            perf: PerfMonitor::new(caps.perf, Rc::clone(&clock)),
            health: HealthMonitor::new(caps.health, config.slow_resource_ms, Rc::clone(&clock)),
            storage: StorageInspector::new(Rc::clone(&clock)),
            installed: Default::default(),
            config,
            clock,
        }
    }

    /// Mark an interceptor installed. Returns `true` only the first time.
    pub fn claim(&self, interceptor: Interceptor) -> bool {
        !self.installed[interceptor.index()].replace(true)
    }

    /// Check if an interceptor has been claimed.
    #[must_use]
    pub fn is_installed(&self, interceptor: Interceptor) -> bool {
        self.installed[interceptor.index()].get()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Time source shared by all monitors.
    #[must_use]
    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    /// Console monitor.
    #[must_use]
    pub const fn console(&self) -> &ConsoleMonitor {
        &self.console
    }

    /// Network monitor.
    #[must_use]
    pub const fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Error monitor.
    #[must_use]
    pub const fn errors(&self) -> &ErrorMonitor {
        &self.errors
    }

    /// Perf monitor.
    #[must_use]
    pub const fn perf(&self) -> &PerfMonitor {
        &self.perf
    }

    /// Health monitor.
    #[must_use]
    pub const fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Storage inspector.
    #[must_use]
    pub const fn storage(&self) -> &StorageInspector {
        &self.storage
    }

    /// Render the full text report for the page at `page_url`.
    #[must_use]
    pub fn report(&self, page_url: &str) -> String {
        let console = self.console.entries();
        let network = self.network.entries();
        let errors = self.errors.entries();
        let perf = self.perf.entries();
        let health = self.health.entries();
        let storage = self.storage.latest();

        ReportBuilder::new(self.config.report).build(&ReportInput {
            page_url,
            generated_at: self.clock.epoch_millis(),
            console: &console,
            network: &network,
            errors: &errors,
            perf: &perf,
            health: &health,
            storage: storage.as_ref(),
        })
    }

    /// Rendered report plus every captured entry.
    #[must_use]
    pub fn upload(&self, page_url: &str) -> ReportUpload {
        ReportUpload {
            page_url: page_url.to_string(),
            report: self.report(page_url),
            console: self.console.entries(),
            network: self.network.entries(),
            errors: self.errors.entries(),
            perf: self.perf.entries(),
            health: self.health.entries(),
        }
    }

    /// Backend client over `transport`, when the config has an `api` section.
    pub fn api_client<T: Transport>(&self, transport: T) -> Result<ApiClient<T>, ApiError> {
        let api = self.config.api.clone().ok_or(ApiError::NotConfigured)?;
        ApiClient::new(api, transport)
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("console", &self.console)
            .field("network", &self.network)
            .field("errors", &self.errors)
            .field("perf", &self.perf)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{OutboundRequest, OutboundResponse};
    use crate::clock::ManualClock;
    use crate::config::Capacities;
    use crate::console::ConsoleLevel;
    use crate::error::TransportError;
    use std::future::{ready, Future};

    struct NullTransport;

    impl Transport for NullTransport {
        fn send(
            &self,
            _request: OutboundRequest,
        ) -> impl Future<Output = Result<OutboundResponse, TransportError>> {
            ready(Err(TransportError::Unavailable))
        }
    }

    fn probe(config: ProbeConfig) -> Probe {
        Probe::new(config, Rc::new(ManualClock::new(1_709_296_496_789.0)))
    }

    #[test]
    fn test_claim_once_per_interceptor() {
        let probe = probe(ProbeConfig::default());
        for interceptor in Interceptor::ALL {
            assert!(!probe.is_installed(interceptor));
            assert!(probe.claim(interceptor));
            assert!(!probe.claim(interceptor));
            assert!(probe.is_installed(interceptor));
        }
    }

    #[test]
    fn test_capacities_from_config() {
        let probe = probe(ProbeConfig {
            capacities: Capacities { console: 2, ..Capacities::default() },
            ..ProbeConfig::default()
        });
        for i in 0..3 {
            probe.console().record(ConsoleLevel::Log, &[format!("{i}").into()]);
        }
        assert_eq!(probe.console().entries().len(), 2);
        assert_eq!(probe.console().log().capacity(), 2);
        assert_eq!(probe.network().log().capacity(), 200);
    }

    #[test]
    fn test_report_and_upload() {
        let probe = probe(ProbeConfig::default());
        probe.console().record(ConsoleLevel::Error, &["checkout failed".into()]);
        let upload = probe.upload("https://shop.example.com/");
        assert!(upload.report.contains("ERROR checkout failed"));
        assert!(upload.report.contains("Generated: 2024-03-01T12:34:56.789Z"));
        assert_eq!(upload.console.len(), 1);
    }

    #[test]
    fn test_api_client_requires_config() {
        let probe = probe(ProbeConfig::default());
        assert!(matches!(probe.api_client(NullTransport), Err(ApiError::NotConfigured)));
    }
}
