//! Telemetry lifecycle and request correlation
//!
//! `Telemetry` is created once at process start and passed by `Arc` to
//! every collaborator that records metrics. It owns the tracing
//! subscriber installation and the prometheus registry, so no component
//! relies on hidden process-wide initialization state.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::MonitoringConfig;

/// Metrics for the submission path.
pub struct Metrics {
    registry: Registry,

    // Counters
    pub submissions_total: IntCounter,
    pub submissions_confirmed: IntCounter,
    pub submissions_expired: IntCounter,
    pub submissions_failed_on_chain: IntCounter,
    pub broadcast_attempts: IntCounter,
    pub broadcast_errors: IntCounter,
    pub fee_fallbacks: IntCounter,
    pub confirmation_checks: IntCounter,

    // Gauges
    pub inflight_submissions: IntGauge,

    // Histograms
    pub submit_latency: Histogram,
    pub balance_poll_attempts: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total =
            IntCounter::with_opts(Opts::new("submissions_total", "Submissions started"))?;
        let submissions_confirmed = IntCounter::with_opts(Opts::new(
            "submissions_confirmed",
            "Submissions that reached the requested commitment",
        ))?;
        let submissions_expired = IntCounter::with_opts(Opts::new(
            "submissions_expired",
            "Submissions whose validity window closed unconfirmed",
        ))?;
        let submissions_failed_on_chain = IntCounter::with_opts(Opts::new(
            "submissions_failed_on_chain",
            "Submissions included with an execution error",
        ))?;
        let broadcast_attempts =
            IntCounter::with_opts(Opts::new("broadcast_attempts", "sendTransaction calls"))?;
        let broadcast_errors = IntCounter::with_opts(Opts::new(
            "broadcast_errors",
            "sendTransaction calls that errored (absorbed per attempt)",
        ))?;
        let fee_fallbacks = IntCounter::with_opts(Opts::new(
            "fee_fallbacks",
            "Fee estimations that used the fallback schedule",
        ))?;
        let confirmation_checks =
            IntCounter::with_opts(Opts::new("confirmation_checks", "Oracle checks issued"))?;

        let inflight_submissions = IntGauge::with_opts(Opts::new(
            "inflight_submissions",
            "Submissions currently inside the retry loop",
        ))?;

        let submit_latency = Histogram::with_opts(
            HistogramOpts::new("submit_latency_seconds", "Submission wall time")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 60.0]),
        )?;
        let balance_poll_attempts = Histogram::with_opts(
            HistogramOpts::new(
                "balance_poll_attempts",
                "Balance reads before a delta was observed",
            )
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0, 20.0]),
        )?;

        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submissions_confirmed.clone()))?;
        registry.register(Box::new(submissions_expired.clone()))?;
        registry.register(Box::new(submissions_failed_on_chain.clone()))?;
        registry.register(Box::new(broadcast_attempts.clone()))?;
        registry.register(Box::new(broadcast_errors.clone()))?;
        registry.register(Box::new(fee_fallbacks.clone()))?;
        registry.register(Box::new(confirmation_checks.clone()))?;
        registry.register(Box::new(inflight_submissions.clone()))?;
        registry.register(Box::new(submit_latency.clone()))?;
        registry.register(Box::new(balance_poll_attempts.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            submissions_confirmed,
            submissions_expired,
            submissions_failed_on_chain,
            broadcast_attempts,
            broadcast_errors,
            fee_fallbacks,
            confirmation_checks,
            inflight_submissions,
            submit_latency,
            balance_poll_attempts,
        })
    }

    /// Render the registry in the prometheus text exposition format.
    pub fn export(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Initialization lifecycle object for logging and metrics.
///
/// Construct exactly once at process start and share by `Arc`. A second
/// construction fails on subscriber installation instead of silently
/// re-initializing.
pub struct Telemetry {
    pub metrics: Metrics,
}

impl Telemetry {
    pub fn init(config: &MonitoringConfig) -> anyhow::Result<Self> {
        if config.enable_tracing {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"));
            let builder = tracing_subscriber::fmt().with_env_filter(filter);
            let installed = if config.log_json {
                builder.json().try_init()
            } else {
                builder.try_init()
            };
            installed.map_err(|e| anyhow::anyhow!("tracing subscriber install failed: {}", e))?;
        }

        Ok(Self {
            metrics: Metrics::new()?,
        })
    }

    /// Metrics-only construction for embedding in a host that installs
    /// its own subscriber.
    pub fn metrics_only() -> anyhow::Result<Self> {
        Ok(Self {
            metrics: Metrics::new()?,
        })
    }
}

/// Correlation context for one inbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Unique request ID, shared by all log lines of the request
    pub request_id: String,

    /// Operation name (e.g. "swap", "add_liquidity")
    pub operation: String,

    /// Parent request ID when this operation was spawned by another
    pub parent_request_id: Option<String>,
}

impl OperationContext {
    pub fn new(operation: &str) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            parent_request_id: None,
        }
    }

    /// Derive a child context that stays correlated with this request.
    pub fn child(&self, operation: &str) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            parent_request_id: Some(self.request_id.clone()),
        }
    }
}
