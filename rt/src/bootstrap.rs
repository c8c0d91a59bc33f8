use std::sync::Arc;

use rt_core::Application;

/// Initializes the tracing subscriber from `RUST_LOG` (`info` by default),
/// emitting structured JSON lines the way the framework's own adapters emit
/// spans.
pub fn init_tracing() {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

/// Starts `app`, then runs it until a shutdown signal arrives, returning the
/// process exit code a binary's `main` should propagate.
pub async fn bootstrap(app: Arc<Application>) -> i32 {
    if let Err(err) = app.start().await {
        tracing::error!(error = %err, "application failed to start");
        return 1;
    }
    app.run().await
}
