//! Prometheus metrics collection.
//!
//! Dispatch outcomes, handler latency and route-table size, in Prometheus
//! text format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Per-request dispatch labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DispatchLabels {
    /// Owning plugin, or empty for unmatched requests.
    pub plugin: String,
    pub outcome: String,
}

/// Handler latency labels. `route` is the template, not the concrete path.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HandlerLabels {
    pub plugin: String,
    pub method: String,
    pub route: String,
}

/// Plugin lifecycle labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LifecycleLabels {
    pub plugin: String,
    pub action: String,
    pub result: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// Dispatched requests by owning plugin and outcome.
    pub dispatch_requests: Family<DispatchLabels, Counter>,

    /// Handler invocation duration.
    pub handler_duration_seconds: Family<HandlerLabels, Histogram>,

    /// Enable/disable/reload attempts.
    pub plugin_lifecycle: Family<LifecycleLabels, Counter>,

    /// Routes in the live dispatch table.
    pub live_routes: Gauge,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let dispatch_requests = Family::<DispatchLabels, Counter>::default();
        registry.register(
            "trellis_dispatch_requests",
            "Plugin route requests by outcome",
            dispatch_requests.clone(),
        );

        let handler_duration_seconds =
            Family::<HandlerLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0005, 2.0, 14))
            });
        registry.register(
            "trellis_handler_duration_seconds",
            "Plugin handler duration in seconds",
            handler_duration_seconds.clone(),
        );

        let plugin_lifecycle = Family::<LifecycleLabels, Counter>::default();
        registry.register(
            "trellis_plugin_lifecycle",
            "Plugin enable, disable and reload attempts",
            plugin_lifecycle.clone(),
        );

        let live_routes = Gauge::default();
        registry.register(
            "trellis_live_routes",
            "Routes in the live dispatch table",
            live_routes.clone(),
        );

        Self {
            registry,
            dispatch_requests,
            handler_duration_seconds,
            plugin_lifecycle,
            live_routes,
        }
    }

    /// Record the outcome of one dispatched request.
    pub fn record_dispatch(&self, plugin: &str, outcome: &str) {
        self.dispatch_requests
            .get_or_create(&DispatchLabels {
                plugin: plugin.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Record a handler invocation.
    pub fn record_handler(&self, plugin: &str, method: &str, route: &str, duration_secs: f64) {
        self.handler_duration_seconds
            .get_or_create(&HandlerLabels {
                plugin: plugin.to_string(),
                method: method.to_string(),
                route: route.to_string(),
            })
            .observe(duration_secs);
    }

    pub fn record_lifecycle(&self, plugin: &str, action: &str, ok: bool) {
        self.plugin_lifecycle
            .get_or_create(&LifecycleLabels {
                plugin: plugin.to_string(),
                action: action.to_string(),
                result: if ok { "ok" } else { "error" }.to_string(),
            })
            .inc();
    }

    pub fn set_live_routes(&self, routes: usize) {
        self.live_routes
            .set(i64::try_from(routes).unwrap_or(i64::MAX));
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible, and all metric
    /// labels use derived `EncodeLabelSet` impls.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}
