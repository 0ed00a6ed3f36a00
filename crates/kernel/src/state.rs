//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use trellis_sdk::{HttpMethod, Plugin};

use crate::auth::{CapabilityResolver, StaticIdentityProvider};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::metrics::Metrics;
use crate::plugin::{PluginError, PluginHost};
use crate::registry::{CoreRoute, EndpointRegistry};

/// Routes served by the kernel itself. Plugins may not shadow these.
pub const CORE_ROUTES: &[(HttpMethod, &str)] = &[
    (HttpMethod::Get, "/health"),
    (HttpMethod::Get, "/metrics"),
    (HttpMethod::Get, "/openapi.json"),
    (HttpMethod::Get, "/endpoints"),
    (HttpMethod::Post, "/auth/token"),
    (HttpMethod::Get, "/plugins"),
    (HttpMethod::Post, "/plugins/{id}/enable"),
    (HttpMethod::Post, "/plugins/{id}/disable"),
    (HttpMethod::Post, "/plugins/{id}/reload"),
];

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Verifies keys and tokens; also issues tokens for `/auth/token`.
    identity: Arc<StaticIdentityProvider>,

    resolver: CapabilityResolver,

    registry: Arc<EndpointRegistry>,

    plugins: PluginHost,

    dispatcher: Dispatcher,

    metrics: Arc<Metrics>,
}

impl AppState {
    /// Build state from configuration, with no plugins installed.
    pub fn new(config: Config) -> Result<Self> {
        let identity = Arc::new(
            config
                .identity_provider()
                .context("failed to build identity provider")?,
        );
        Ok(Self::with_identity(config, identity))
    }

    /// Build state around an explicit identity provider.
    pub fn with_identity(config: Config, identity: Arc<StaticIdentityProvider>) -> Self {
        let core_routes = CORE_ROUTES
            .iter()
            .filter_map(|(method, path)| CoreRoute::new(*method, path).ok())
            .collect();
        let registry = Arc::new(EndpointRegistry::new(core_routes));
        let metrics = Arc::new(Metrics::new());
        let resolver = CapabilityResolver::new(identity.clone());
        let dispatcher = Dispatcher::new(registry.clone(), resolver.clone(), metrics.clone());
        let plugins = PluginHost::new(registry.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                resolver,
                registry,
                plugins,
                dispatcher,
                metrics,
            }),
        }
    }

    /// Install plugins and enable those that should start enabled.
    pub fn start_plugins(&self, plugins: Vec<Arc<dyn Plugin>>) -> Result<Vec<String>> {
        for plugin in plugins {
            self.inner
                .plugins
                .install(plugin)
                .context("failed to install plugin")?;
        }
        let started = self.inner.plugins.start(&self.inner.config.disabled_plugins);
        self.refresh_route_gauge();
        info!(
            plugins = started.len(),
            routes = self.inner.registry.snapshot().len(),
            "plugins started"
        );
        Ok(started)
    }

    pub fn enable_plugin(&self, id: &str) -> Result<usize, PluginError> {
        let result = self.inner.plugins.enable(id);
        self.after_lifecycle(id, "enable", result.is_ok());
        result
    }

    pub fn disable_plugin(&self, id: &str) -> Result<usize, PluginError> {
        let result = self.inner.plugins.disable(id);
        self.after_lifecycle(id, "disable", result.is_ok());
        result
    }

    pub fn reload_plugin(&self, id: &str) -> Result<usize, PluginError> {
        let result = self.inner.plugins.reload(id);
        self.after_lifecycle(id, "reload", result.is_ok());
        result
    }

    fn after_lifecycle(&self, id: &str, action: &str, ok: bool) {
        self.inner.metrics.record_lifecycle(id, action, ok);
        self.refresh_route_gauge();
    }

    fn refresh_route_gauge(&self) {
        self.inner
            .metrics
            .set_live_routes(self.inner.registry.snapshot().len());
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn identity(&self) -> &StaticIdentityProvider {
        &self.inner.identity
    }

    pub fn resolver(&self) -> &CapabilityResolver {
        &self.inner.resolver
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.inner.registry
    }

    pub fn plugins(&self) -> &PluginHost {
        &self.inner.plugins
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }
}
