//! A minimal seam for application configuration. A full loader (files,
//! secret managers, remote config services) is out of scope here; this
//! module only fixes the shape a loader plugs into and ships the
//! `std::env`-backed default every component actually runs against.

use std::env;

pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

pub fn get_or<T: std::str::FromStr>(source: &dyn ConfigSource, key: &str, default: T) -> T {
    source.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
