//! Component lifecycle orchestration and the ambient task-local context that
//! every other crate in this workspace reads from: "the current span",
//! "the current app", "the current request".

mod application;
mod component;
pub mod config;
pub mod context;
mod error;

pub use application::Application;
pub use component::Component;
pub use config::{ConfigSource, EnvSource};
pub use error::{ConfigurationError, GracefulExit, PrepareError};
