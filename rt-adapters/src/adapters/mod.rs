mod prometheus;
mod requests;
mod sentry;
mod zipkin;

pub use prometheus::PrometheusAdapter;
pub use requests::RequestsAdapter;
pub use sentry::SentryAdapter;
pub use zipkin::ZipkinAdapter;
