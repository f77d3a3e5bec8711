/*!
Observability infrastructure for PAK archives.

This module provides:
- Structured logging setup through `tracing-subscriber`
- Prometheus metrics for archive operations (behind the `metrics` feature)
*/

#[cfg(feature = "metrics")]
use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
#[cfg(feature = "metrics")]
use std::time::Instant;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{PakError, Result};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "pak_core=info";

#[cfg(feature = "metrics")]
static METRICS: OnceLock<Option<PakMetrics>> = OnceLock::new();

/// Metrics collection for archive operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct PakMetrics {
    /// Completed operations, labelled by `operation` (load, save)
    pub operations_total: CounterVec,
    /// Failed operations, labelled by `operation`
    pub failures_total: CounterVec,
    pub operation_latency_seconds: HistogramVec,
    /// On-disk archive size seen by loads and saves
    pub archive_size_bytes: Histogram,

    registry: Registry,
}

#[cfg(feature = "metrics")]
impl PakMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let operations_total = CounterVec::new(
            Opts::new("pak_operations_total", "Total archive operations"),
            &["operation"],
        )
        .map_err(|e| PakError::storage(format!("Failed to create operations_total metric: {e}")))?;

        let failures_total = CounterVec::new(
            Opts::new("pak_failures_total", "Total failed archive operations"),
            &["operation"],
        )
        .map_err(|e| PakError::storage(format!("Failed to create failures_total metric: {e}")))?;

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pak_operation_latency_seconds",
                "Duration of archive operations in seconds",
            ),
            &["operation"],
        )
        .map_err(|e| {
            PakError::storage(format!("Failed to create operation_latency_seconds metric: {e}"))
        })?;

        let archive_size_bytes = Histogram::with_opts(HistogramOpts::new(
            "pak_archive_size_bytes",
            "Size of archive files in bytes",
        ))
        .map_err(|e| PakError::storage(format!("Failed to create archive_size_bytes metric: {e}")))?;

        registry
            .register(Box::new(operations_total.clone()))
            .map_err(|e| PakError::storage(format!("Failed to register operations_total: {e}")))?;
        registry
            .register(Box::new(failures_total.clone()))
            .map_err(|e| PakError::storage(format!("Failed to register failures_total: {e}")))?;
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .map_err(|e| {
                PakError::storage(format!("Failed to register operation_latency_seconds: {e}"))
            })?;
        registry
            .register(Box::new(archive_size_bytes.clone()))
            .map_err(|e| PakError::storage(format!("Failed to register archive_size_bytes: {e}")))?;

        Ok(Self {
            operations_total,
            failures_total,
            operation_latency_seconds,
            archive_size_bytes,
            registry,
        })
    }

    /// Get or initialize the global metrics instance
    ///
    /// Returns `None` if the metrics could not be registered; recording is then a no-op.
    pub fn global() -> Option<&'static PakMetrics> {
        METRICS
            .get_or_init(|| match Self::new() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to initialize PAK metrics");
                    None
                }
            })
            .as_ref()
    }

    pub fn record_operation(&self, operation: &str) {
        self.operations_total.with_label_values(&[operation]).inc();
    }

    pub fn record_failure(&self, operation: &str) {
        self.failures_total.with_label_values(&[operation]).inc();
    }

    pub fn record_latency(&self, operation: &str, duration: std::time::Duration) {
        self.operation_latency_seconds
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    pub fn record_archive_size(&self, size_bytes: usize) {
        self.archive_size_bytes.observe(size_bytes as f64);
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| PakError::storage(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| PakError::storage(format!("Failed to convert metrics to string: {e}")))
    }
}

/// Record the archive size if metrics are available
#[cfg(feature = "metrics")]
pub fn record_archive_size(size_bytes: usize) {
    if let Some(metrics) = PakMetrics::global() {
        metrics.record_archive_size(size_bytes);
    }
}

/// Gather the global metrics in Prometheus text format
#[cfg(feature = "metrics")]
pub fn gather_metrics() -> Result<String> {
    PakMetrics::global()
        .ok_or_else(|| PakError::storage("Metrics are not initialized"))?
        .gather_metrics()
}

/// Metrics timer helper for measuring operation durations
#[cfg(feature = "metrics")]
pub struct MetricsTimer {
    start: Instant,
    operation: &'static str,
}

#[cfg(feature = "metrics")]
impl MetricsTimer {
    /// Start a new timer for the given operation
    pub fn new(operation: &'static str) -> Self {
        if let Some(metrics) = PakMetrics::global() {
            metrics.record_operation(operation);
        }
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Complete the timer, recording success latency
    pub fn finish(self) {
        if let Some(metrics) = PakMetrics::global() {
            metrics.record_latency(self.operation, self.start.elapsed());
        }
    }

    /// Complete the timer with an error, recording both latency and failure
    pub fn finish_with_error(self) {
        if let Some(metrics) = PakMetrics::global() {
            metrics.record_latency(self.operation, self.start.elapsed());
            metrics.record_failure(self.operation);
        }
    }
}

/// Initialize the global logging system
///
/// The filter comes from `RUST_LOG` and falls back to [`DEFAULT_LOG_FILTER`].
///
/// # Arguments
/// * `json` - Emit JSON lines instead of human-readable output
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_observability(json: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    PakMetrics::global();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_LOG_FILTER)
            .map_err(|e| PakError::validation(format!("Invalid log filter: {e}")))?,
    };

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    };

    result.map_err(|e| PakError::storage(format!("Failed to set global tracing subscriber: {e}")))?;

    tracing::info!("PAK observability initialized");
    Ok(())
}

/// Initialize observability with default settings (JSON output)
pub fn init_default_observability() -> Result<()> {
    init_observability(true)
}
