// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts};
use std::{sync::Arc, time::Duration, time::Instant};

pub use prometheus::Registry;

use super::RouteDoc;

/// Default prefix of every metric name
pub const METRICS_PREFIX: &str = "tokenpace";

pub mod request_type {
    pub const UNARY: &str = "unary";
    pub const STREAM: &str = "stream";
}

pub mod status {
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
    pub const CANCELLED: &str = "cancelled";
}

pub struct Metrics {
    request_counter: IntCounterVec,
    inflight_gauge: IntGaugeVec,
    request_duration: HistogramVec,
    time_to_first_token: HistogramVec,
    output_tokens: HistogramVec,
    emitted_units: IntCounterVec,
    cancelled_requests: IntCounterVec,
}

/// RAII object for inflight gauge and request counters
///
/// If this object is dropped without calling `mark_ok` or `mark_cancelled`,
/// the request is counted with the `status` label [`status::ERROR`].
pub struct InflightGuard {
    metrics: Arc<Metrics>,
    model: String,
    request_type: RequestType,
    status: Status,
    timer: Instant,
}

pub enum RequestType {
    /// Buffered JSON response
    Unary,

    /// Server-sent events
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Cancelled,
}

impl Metrics {
    /// Create Metrics with the [`METRICS_PREFIX`] prefix.
    ///
    /// The following metrics will be created:
    /// - `{prefix}_requests_total` - IntCounterVec for the total number of requests processed
    /// - `{prefix}_inflight_requests` - IntGaugeVec for the number of inflight requests
    /// - `{prefix}_request_duration_seconds` - HistogramVec for the duration of requests
    /// - `{prefix}_time_to_first_token_seconds` - HistogramVec for observed time to first token
    /// - `{prefix}_output_tokens` - HistogramVec for the requested output length
    /// - `{prefix}_emitted_units_total` - IntCounterVec for units delivered to clients
    /// - `{prefix}_cancelled_requests_total` - IntCounterVec for requests that ended early
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_prefix(METRICS_PREFIX)
    }

    pub fn with_prefix(prefix: &str) -> Result<Self, prometheus::Error> {
        let metric_name = |suffix: &str| format!("{prefix}_{suffix}");

        let request_counter = IntCounterVec::new(
            Opts::new(
                metric_name("requests_total"),
                "Total number of chat completion requests processed",
            ),
            &["model", "request_type", "status"],
        )?;

        let inflight_gauge = IntGaugeVec::new(
            Opts::new(metric_name("inflight_requests"), "Number of inflight requests"),
            &["model"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                metric_name("request_duration_seconds"),
                "Duration of chat completion requests",
            )
            .buckets(vec![
                0.0, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0,
            ]),
            &["model"],
        )?;

        let time_to_first_token = HistogramVec::new(
            HistogramOpts::new(
                metric_name("time_to_first_token_seconds"),
                "Observed time to first token in seconds",
            )
            .buckets(vec![
                0.0, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0,
                60.0,
            ]),
            &["model"],
        )?;

        let output_tokens = HistogramVec::new(
            HistogramOpts::new(
                metric_name("output_tokens"),
                "Requested output length in tokens",
            )
            .buckets(vec![
                1.0, 10.0, 20.0, 50.0, 100.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
            ]),
            &["model"],
        )?;

        let emitted_units = IntCounterVec::new(
            Opts::new(
                metric_name("emitted_units_total"),
                "Output units delivered to clients",
            ),
            &["model"],
        )?;

        let cancelled_requests = IntCounterVec::new(
            Opts::new(
                metric_name("cancelled_requests_total"),
                "Requests that ended before their final unit",
            ),
            &["model"],
        )?;

        Ok(Metrics {
            request_counter,
            inflight_gauge,
            request_duration,
            time_to_first_token,
            output_tokens,
            emitted_units,
            cancelled_requests,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.request_counter.clone()))?;
        registry.register(Box::new(self.inflight_gauge.clone()))?;
        registry.register(Box::new(self.request_duration.clone()))?;
        registry.register(Box::new(self.time_to_first_token.clone()))?;
        registry.register(Box::new(self.output_tokens.clone()))?;
        registry.register(Box::new(self.emitted_units.clone()))?;
        registry.register(Box::new(self.cancelled_requests.clone()))?;
        Ok(())
    }

    /// Get the number of requests for the given dimensions:
    /// - model
    /// - request type (unary/stream)
    /// - status (success/error/cancelled)
    pub fn get_request_counter(
        &self,
        model: &str,
        request_type: &RequestType,
        status: &Status,
    ) -> u64 {
        self.request_counter
            .with_label_values(&[model, request_type.as_str(), status.as_str()])
            .get()
    }

    fn inc_request_counter(&self, model: &str, request_type: &RequestType, status: &Status) {
        self.request_counter
            .with_label_values(&[model, request_type.as_str(), status.as_str()])
            .inc()
    }

    /// Get the number of inflight requests for the given model
    pub fn get_inflight_count(&self, model: &str) -> i64 {
        self.inflight_gauge.with_label_values(&[model]).get()
    }

    fn inc_inflight_gauge(&self, model: &str) {
        self.inflight_gauge.with_label_values(&[model]).inc()
    }

    fn dec_inflight_gauge(&self, model: &str) {
        self.inflight_gauge.with_label_values(&[model]).dec()
    }

    pub fn observe_time_to_first_token(&self, model: &str, ttft: Duration) {
        self.time_to_first_token
            .with_label_values(&[&model.to_lowercase()])
            .observe(ttft.as_secs_f64());
    }

    pub fn observe_output_tokens(&self, model: &str, requested: usize) {
        self.output_tokens
            .with_label_values(&[&model.to_lowercase()])
            .observe(requested as f64);
    }

    pub fn inc_emitted_units(&self, model: &str, count: u64) {
        self.emitted_units
            .with_label_values(&[&model.to_lowercase()])
            .inc_by(count);
    }

    pub fn get_emitted_units(&self, model: &str) -> u64 {
        self.emitted_units.with_label_values(&[model]).get()
    }

    pub fn get_cancelled_count(&self, model: &str) -> u64 {
        self.cancelled_requests.with_label_values(&[model]).get()
    }

    /// Create a new [`InflightGuard`] for the given model and annotate if it is a streaming request
    ///
    /// The [`InflightGuard`] is an RAII object that handles the inflight gauge and the
    /// request counters.
    pub fn create_inflight_guard(self: Arc<Self>, model: &str, streaming: bool) -> InflightGuard {
        let request_type = if streaming {
            RequestType::Stream
        } else {
            RequestType::Unary
        };

        InflightGuard::new(self, model.to_lowercase(), request_type)
    }
}

impl InflightGuard {
    fn new(metrics: Arc<Metrics>, model: String, request_type: RequestType) -> Self {
        let timer = Instant::now();

        metrics.inc_inflight_gauge(&model);

        InflightGuard {
            metrics,
            model,
            request_type,
            status: Status::Error,
            timer,
        }
    }

    pub(crate) fn mark_ok(&mut self) {
        self.status = Status::Success;
    }

    /// From here on, dropping the guard counts as a cancellation rather than an error.
    pub(crate) fn mark_cancelled(&mut self) {
        self.status = Status::Cancelled;
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let duration = self.timer.elapsed().as_secs_f64();

        self.metrics.dec_inflight_gauge(&self.model);

        self.metrics
            .inc_request_counter(&self.model, &self.request_type, &self.status);

        if self.status == Status::Cancelled {
            self.metrics
                .cancelled_requests
                .with_label_values(&[&self.model])
                .inc();
        }

        self.metrics
            .request_duration
            .with_label_values(&[&self.model])
            .observe(duration);
    }
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Unary => request_type::UNARY,
            RequestType::Stream => request_type::STREAM,
        }
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => status::SUCCESS,
            Status::Error => status::ERROR,
            Status::Cancelled => status::CANCELLED,
        }
    }
}

/// Create a new router with the given path
pub fn router(registry: Registry, path: Option<String>) -> (Vec<RouteDoc>, Router) {
    let registry = Arc::new(registry);
    let path = path.unwrap_or_else(|| "/metrics".to_string());
    let doc = RouteDoc::new(axum::http::Method::GET, &path);
    let route = Router::new()
        .route(&path, get(handler_metrics))
        .with_state(registry);
    (vec![doc], route)
}

/// Metrics Handler
async fn handler_metrics(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    let metrics = match String::from_utf8(buffer) {
        Ok(metrics) => metrics,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response();
        }
    };

    (StatusCode::OK, metrics).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::with_prefix("test").unwrap())
    }

    #[test]
    fn test_guard_counts_error_by_default() {
        let metrics = metrics();
        {
            let _guard = metrics.clone().create_inflight_guard("GPT-4", false);
            assert_eq!(metrics.get_inflight_count("gpt-4"), 1);
        }
        assert_eq!(metrics.get_inflight_count("gpt-4"), 0);
        assert_eq!(
            metrics.get_request_counter("gpt-4", &RequestType::Unary, &Status::Error),
            1
        );
    }

    #[test]
    fn test_guard_statuses() {
        let metrics = metrics();
        let mut ok = metrics.clone().create_inflight_guard("gpt-4", true);
        ok.mark_ok();
        drop(ok);

        let mut cancelled = metrics.clone().create_inflight_guard("gpt-4", true);
        cancelled.mark_cancelled();
        drop(cancelled);

        assert_eq!(
            metrics.get_request_counter("gpt-4", &RequestType::Stream, &Status::Success),
            1
        );
        assert_eq!(
            metrics.get_request_counter("gpt-4", &RequestType::Stream, &Status::Cancelled),
            1
        );
        assert_eq!(metrics.get_cancelled_count("gpt-4"), 1);
    }

    #[test]
    fn test_register_and_gather() {
        let metrics = metrics();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();
        metrics.observe_output_tokens("gpt-4", 25);
        metrics.inc_emitted_units("gpt-4", 25);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.name().to_string())
            .collect();
        assert!(names.contains(&"test_output_tokens".to_string()));
        assert!(names.contains(&"test_emitted_units_total".to_string()));
        assert_eq!(metrics.get_emitted_units("gpt-4"), 25);

        // registering the same collectors twice is rejected
        assert!(metrics.register(&registry).is_err());
    }
}
