use std::sync::Arc;

use rt_adapters::{Logger, PrometheusAdapter, RequestsAdapter, SentryAdapter, SpanAdapter, ZipkinAdapter};
use rt_core::{Application, ConfigSource, EnvSource};

/// Assembles an [`Application`] from configuration, the way a hand-written
/// `main.rs` would wire components together, kept reusable so tests and
/// real binaries share one construction path.
pub struct RuntimeBuilder {
    config: Arc<dyn ConfigSource>,
    adapters: Vec<Arc<dyn SpanAdapter>>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        RuntimeBuilder { config: Arc::new(EnvSource), adapters: Vec::new() }
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: Arc<dyn ConfigSource>) -> Self {
        self.config = config;
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SpanAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Adds each well-known adapter when its configuration is present,
    /// skipping the rest, rather than requiring every sink to be configured
    /// up front.
    pub fn with_well_known_adapters(mut self) -> anyhow::Result<Self> {
        let service_name = self.config.get("SERVICE_NAME").unwrap_or_else(|| "rt".to_string());

        if let Some(endpoint) = self.config.get("ZIPKIN_URL") {
            self.adapters.push(Arc::new(ZipkinAdapter::new(service_name.clone(), endpoint)));
        }
        if self.config.get("PROMETHEUS_ENABLED").as_deref() == Some("1") {
            self.adapters.push(Arc::new(PrometheusAdapter::new()?));
        }
        if let (Some(endpoint), Some(public_key)) =
            (self.config.get("SENTRY_STORE_ENDPOINT"), self.config.get("SENTRY_PUBLIC_KEY"))
        {
            self.adapters.push(Arc::new(SentryAdapter::new(service_name, endpoint, public_key)));
        }
        if self.config.get("REQUESTS_LOG_DISABLED").as_deref() != Some("1") {
            self.adapters.push(Arc::new(RequestsAdapter::new()));
        }
        Ok(self)
    }

    pub fn build(self) -> Arc<Application> {
        Arc::new(Application::with_logger(Logger::new(self.adapters)))
    }
}
