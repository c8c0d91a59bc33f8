#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("adapter {adapter} failed to start: {source}")]
    Start { adapter: &'static str, #[source] source: anyhow::Error },
    #[error("adapter {adapter} transport error: {source}")]
    Transport { adapter: &'static str, #[source] source: anyhow::Error },
}
