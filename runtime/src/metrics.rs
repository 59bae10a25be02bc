//! Prometheus metrics for observability and monitoring.
//!
//! The store and the persistence layer record through the `metrics` facade
//! unconditionally; nothing is exported until a [`MetricsServer`] installs a
//! recorder. Covered:
//! - Store dispatch, fold duration and effect execution
//! - Subscription gating (actions dropped after cancellation)
//! - Persistence operations and their retries
//!
//! # Example
//!
//! ```rust,no_run
//! use rexlist_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Expose metrics on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and start serving `/metrics`.
    ///
    /// Must be called from inside a tokio runtime; the HTTP listener runs on
    /// a spawned task.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or the recorder cannot
    /// be installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs
    /// a warning and leaves the existing recorder in place.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5,
                    1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                register_metrics();
                tokio::spawn(async move {
                    if exporter.await.is_err() {
                        tracing::error!("Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Store Metrics
    describe_counter!("store.commands.total", "Total number of actions dispatched to the store");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken to run middleware and fold one action"
    );
    describe_counter!("store.effects.executed", "Total number of effects executed, by type");
    describe_counter!(
        "store.subscription.dropped_actions",
        "Actions from cancelled effects that were discarded before folding"
    );
    describe_counter!("store.shutdown.initiated", "Number of shutdowns started");
    describe_counter!("store.shutdown.completed", "Number of shutdowns that drained in time");
    describe_counter!("store.shutdown.timeout", "Number of shutdowns that timed out");
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );

    // Persistence Metrics
    describe_counter!(
        "persistence.operations.total",
        "Total number of persistence operations attempted, by operation"
    );
    describe_counter!(
        "persistence.operations.failed",
        "Persistence operations that failed after all retries, by operation"
    );
    describe_histogram!(
        "persistence.operation.duration_seconds",
        "Time taken by one persistence operation, retries included"
    );

    // Retry Metrics
    describe_counter!("retry.attempt", "Total number of retry attempts");
    describe_counter!("retry.success", "Total number of operations that succeeded after retry");
    describe_counter!("retry.exhausted", "Total number of operations that exhausted their retries");
}

/// Persistence operation metrics recorder.
pub struct PersistenceMetrics;

impl PersistenceMetrics {
    /// Record a finished operation.
    pub fn record_operation(operation: &'static str, duration: Duration, succeeded: bool) {
        counter!("persistence.operations.total", "operation" => operation).increment(1);
        histogram!("persistence.operation.duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
        if !succeeded {
            counter!("persistence.operations.failed", "operation" => operation).increment(1);
        }
    }
}
