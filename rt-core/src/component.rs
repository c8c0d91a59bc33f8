use async_trait::async_trait;

/// A unit the orchestrator can start, stop, and health-check.
///
/// Generalizes the usual plugin-style component lifecycle (start/shutdown)
/// into an application-level `prepare`/`start`/`stop`/`health` quartet.
#[async_trait]
pub trait Component: std::fmt::Debug + Send + Sync {
    /// Runs before any component's `start`; used to validate configuration
    /// and acquire resources that do not yet need to serve traffic.
    async fn prepare(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    /// Begins serving. Called after every component has `prepare`d.
    async fn start(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    /// Releases resources. Errors are logged, never propagated.
    async fn stop(&self) {}

    /// `Ok(())` if healthy; `Err` carries a human-readable diagnosis.
    async fn health(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
