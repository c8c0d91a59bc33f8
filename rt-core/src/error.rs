use std::fmt;

/// Fatal at startup: a duplicate component name, an unknown `stop_after`
/// dependency, or any other wiring mistake the builder can catch before a
/// single component runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("component {0:?} is already registered")]
    DuplicateComponent(String),
    #[error("component {0:?} declares stop_after on unknown component {1:?}")]
    UnknownDependency(String, String),
}

/// Wraps the failure of a single component's `prepare`/`start`, with the
/// number of components that had already come up before the failure.
#[derive(Debug, thiserror::Error)]
#[error("component {component:?} failed to {stage} (after {started_count} component(s) came up): {source}")]
pub struct PrepareError {
    pub component: String,
    pub stage: &'static str,
    pub started_count: usize,
    #[source]
    pub source: anyhow::Error,
}

/// Raised by user code to request an orderly shutdown from inside `run()`.
#[derive(Debug)]
pub struct GracefulExit {
    pub code: i32,
}

impl fmt::Display for GracefulExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graceful exit requested with code {}", self.code)
    }
}

impl std::error::Error for GracefulExit {}
