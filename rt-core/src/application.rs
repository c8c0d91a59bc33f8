use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use futures::future::join_all;
use rt_adapters::Logger;
use tokio::signal::unix::{signal, SignalKind};

use crate::component::Component;
use crate::error::{ConfigurationError, PrepareError};

struct Registration {
    component: Arc<dyn Component>,
    stop_after: Vec<String>,
}

struct Registry {
    order: Vec<String>,
    by_name: HashMap<String, Registration>,
}

/// The component lifecycle orchestrator.
///
/// `add` is synchronous bookkeeping done while building the application;
/// `start`/`stop`/`health` are the async lifecycle operations driven by
/// [`Application::run`] or directly by a caller that wants finer control.
#[derive(Debug)]
pub struct Application {
    registry: RwLock<Registry>,
    logger: Arc<Logger>,
    start_stamp: RwLock<Option<SystemTime>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("order", &self.order).finish()
    }
}

impl Application {
    /// An application with no adapters wired into its logger; mainly useful
    /// for tests and for the facade crate to layer a configured logger onto.
    pub fn new() -> Self {
        Application::with_logger(Logger::new(Vec::new()))
    }

    pub fn with_logger(logger: Arc<Logger>) -> Self {
        Application { registry: RwLock::new(Registry { order: Vec::new(), by_name: HashMap::new() }), logger, start_stamp: RwLock::new(None) }
    }

    pub fn logger(&self) -> Arc<Logger> {
        self.logger.clone()
    }

    pub fn start_stamp(&self) -> Option<SystemTime> {
        *self.start_stamp.read().unwrap()
    }

    /// Registers a component under `name`, which must stop only after every
    /// name in `stop_after` has already stopped.
    pub fn add(
        &self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
        stop_after: Vec<String>,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        let mut registry = self.registry.write().unwrap();
        if registry.by_name.contains_key(&name) {
            return Err(ConfigurationError::DuplicateComponent(name));
        }
        for dep in &stop_after {
            if !registry.by_name.contains_key(dep) {
                return Err(ConfigurationError::UnknownDependency(name, dep.clone()));
            }
        }
        registry.order.push(name.clone());
        registry.by_name.insert(name, Registration { component, stop_after });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.registry.read().unwrap().by_name.get(name).map(|r| r.component.clone())
    }

    fn components_snapshot(&self) -> Vec<(String, Arc<dyn Component>)> {
        let registry = self.registry.read().unwrap();
        registry.order.iter().map(|name| (name.clone(), registry.by_name[name].component.clone())).collect()
    }

    /// `logger.start`, then `prepare` on all components concurrently, then
    /// record the start stamp, then `start` on all components concurrently.
    /// Any failure tears down whatever had already come up.
    pub async fn start(&self) -> Result<(), PrepareError> {
        self.logger.start().await.map_err(|e| PrepareError {
            component: "logger".to_string(),
            stage: "start",
            started_count: 0,
            source: anyhow::Error::new(e),
        })?;

        let components = self.components_snapshot();

        let prepared = join_all(components.iter().map(|(_, c)| c.prepare())).await;
        if let Some((idx, err)) = prepared.into_iter().enumerate().find_map(|(i, r)| r.err().map(|e| (i, e))) {
            self.teardown(&components[..idx]).await;
            return Err(PrepareError {
                component: components[idx].0.clone(),
                stage: "prepare",
                started_count: 0,
                source: err,
            });
        }

        *self.start_stamp.write().unwrap() = Some(SystemTime::now());

        let started = join_all(components.iter().map(|(_, c)| c.start())).await;
        if let Some((idx, err)) = started.into_iter().enumerate().find_map(|(i, r)| r.err().map(|e| (i, e))) {
            self.teardown(&components).await;
            return Err(PrepareError {
                component: components[idx].0.clone(),
                stage: "start",
                started_count: idx,
                source: err,
            });
        }

        Ok(())
    }

    async fn teardown(&self, components: &[(String, Arc<dyn Component>)]) {
        join_all(components.iter().map(|(_, c)| c.stop())).await;
        self.logger.stop().await;
    }

    /// Stops components in registration order; each component's `stop_after`
    /// dependencies are stopped first (memoized so a shared dependency is
    /// only stopped once), then the component itself. Finally stops the
    /// logger. Stop errors are not surfaced by this API (`Component::stop`
    /// itself cannot fail); adapter/component-internal errors are logged.
    pub async fn stop(&self) {
        let (order, by_name): (Vec<String>, HashMap<String, (Arc<dyn Component>, Vec<String>)>) = {
            let registry = self.registry.read().unwrap();
            let by_name = registry
                .by_name
                .iter()
                .map(|(k, v)| (k.clone(), (v.component.clone(), v.stop_after.clone())))
                .collect();
            (registry.order.clone(), by_name)
        };

        let mut stopped = HashSet::new();
        for name in &order {
            stop_with_deps(name, &by_name, &mut stopped).await;
        }

        self.logger.stop().await;
    }

    /// Probes every component; `None` means healthy, `Some(message)` means sick.
    pub async fn health(&self) -> HashMap<String, Option<String>> {
        let components = self.components_snapshot();
        let results = join_all(components.iter().map(|(_, c)| c.health())).await;
        components.into_iter().zip(results).map(|((name, _), r)| (name, r.err().map(|e| e.to_string()))).collect()
    }

    /// Starts the application, blocks until SIGINT or SIGTERM, then stops it.
    /// Returns the process exit code: 0 on clean shutdown, 1 if `start`
    /// failed or a termination signal arrived before it completed.
    pub async fn run(self: &Arc<Self>) -> i32 {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                return 1;
            }
        };

        let start_result = tokio::select! {
            result = self.start() => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted before start completed");
                return 1;
            }
            _ = sigterm.recv() => {
                tracing::warn!("terminated before start completed");
                return 1;
            }
        };

        if let Err(err) = start_result {
            tracing::error!(error = %err, "application failed to start");
            return 1;
        }

        tracing::info!("application started");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }

        self.stop().await;
        tracing::info!("application stopped");
        0
    }
}

impl Default for Application {
    fn default() -> Self {
        Application::new()
    }
}

fn stop_with_deps<'a>(
    name: &'a str,
    by_name: &'a HashMap<String, (Arc<dyn Component>, Vec<String>)>,
    stopped: &'a mut HashSet<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
    Box::pin(async move {
        if stopped.contains(name) {
            return;
        }
        let Some((component, deps)) = by_name.get(name) else {
            return;
        };
        for dep in deps {
            stop_with_deps(dep, by_name, stopped).await;
        }
        component.stop().await;
        stopped.insert(name.to_string());
    })
}
