// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use derive_builder::Builder;
use tokenpace_runtime::utils::{GracefulShutdownGuard, GracefulShutdownTracker};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::RouteDoc;
use super::metrics::{self, Metrics};
use crate::mocker::engine::MockChatEngine;
use crate::model_registry::ModelRegistry;

/// State shared by every handler
pub struct State {
    engine: MockChatEngine,
    metrics: Arc<Metrics>,
    model_registry: ModelRegistry,
    cancel_token: CancellationToken,
    graceful_shutdown_tracker: Arc<GracefulShutdownTracker>,
}

impl State {
    pub fn new(
        engine: MockChatEngine,
        metrics: Arc<Metrics>,
        cancel_token: CancellationToken,
        graceful_shutdown_tracker: Arc<GracefulShutdownTracker>,
    ) -> Self {
        State {
            engine,
            metrics,
            model_registry: ModelRegistry,
            cancel_token,
            graceful_shutdown_tracker,
        }
    }

    pub fn engine(&self) -> &MockChatEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn metrics_clone(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn model_registry(&self) -> &ModelRegistry {
        &self.model_registry
    }

    /// Cancels every scheduler still running; fires after in-flight work drained.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    pub fn track_inflight(&self) -> GracefulShutdownGuard {
        self.graceful_shutdown_tracker.register()
    }
}

#[derive(Clone)]
pub struct HttpService {
    // The state we share with every request handler
    state: Arc<State>,

    router: Router,
    port: u16,
    host: String,
    route_docs: Vec<RouteDoc>,
}

#[derive(Clone, Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_internal"))]
pub struct HttpServiceConfig {
    #[builder(default = "3000")]
    port: u16,

    #[builder(setter(into), default = "String::from(\"0.0.0.0\")")]
    host: String,

    engine: MockChatEngine,

    /// Request cancellation. Defaults to a token nothing cancels.
    #[builder(default)]
    cancel_token: CancellationToken,

    #[builder(default = "Arc::new(GracefulShutdownTracker::new())")]
    graceful_shutdown_tracker: Arc<GracefulShutdownTracker>,
}

impl HttpService {
    pub fn builder() -> HttpServiceConfigBuilder {
        HttpServiceConfigBuilder::default()
    }

    pub fn state_clone(&self) -> Arc<State> {
        self.state.clone()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn route_docs(&self) -> &[RouteDoc] {
        &self.route_docs
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Spawn [`HttpService::run`] on the current runtime.
    pub async fn spawn(&self, cancel_token: CancellationToken) -> JoinHandle<Result<()>> {
        let this = self.clone();
        tokio::spawn(async move { this.run(cancel_token).await })
    }

    /// Bind the configured address and serve until `cancel_token` fires.
    pub async fn run(&self, cancel_token: CancellationToken) -> Result<()> {
        let address = self.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;
        self.serve(listener, cancel_token).await
    }

    /// Serve on an already bound listener, e.g. one bound to port 0 in tests.
    ///
    /// After `cancel_token` fires no new connections are accepted; open
    /// connections, including running streams, are allowed to finish.
    pub async fn serve(&self, listener: TcpListener, cancel_token: CancellationToken) -> Result<()> {
        let local_addr: SocketAddr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "Starting HTTP service");
        for route in &self.route_docs {
            tracing::debug!("{route}");
        }

        let router = self.router.clone();
        let observer = cancel_token.child_token();

        axum::serve(listener, router)
            .with_graceful_shutdown(observer.cancelled_owned())
            .await
            .inspect_err(|_| cancel_token.cancel())?;

        tracing::info!("HTTP service stopped");
        Ok(())
    }
}

impl HttpServiceConfigBuilder {
    pub fn build(self) -> Result<HttpService> {
        let config: HttpServiceConfig = self.build_internal()?;

        let metrics = Arc::new(Metrics::new()?);
        let registry = metrics::Registry::new();
        metrics.register(&registry)?;

        let state = Arc::new(State::new(
            config.engine,
            metrics,
            config.cancel_token,
            config.graceful_shutdown_tracker,
        ));

        let mut router = Router::new();
        let mut all_docs = Vec::new();

        let routes = vec![
            super::openai::chat_completions_router(state.clone(), None),
            super::openai::list_models_router(state.clone(), None),
            super::health::health_check_router(None),
            super::health::live_check_router(None),
            metrics::router(registry, None),
        ];

        for (route_docs, route) in routes {
            router = router.merge(route);
            all_docs.extend(route_docs);
        }

        Ok(HttpService {
            state,
            router,
            port: config.port,
            host: config.host,
            route_docs: all_docs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocker::protocols::MockEngineArgs;
    use crate::tokenizers::SharedTokenizer;

    fn engine() -> MockChatEngine {
        MockChatEngine::new(SharedTokenizer::cl100k().unwrap(), MockEngineArgs::default()).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let service = HttpService::builder().engine(engine()).build().unwrap();
        assert_eq!(service.address(), "0.0.0.0:3000");

        let paths: Vec<&str> = service.route_docs().iter().map(RouteDoc::path).collect();
        for expected in ["/v1/chat/completions", "/v1/models", "/health", "/live", "/metrics"] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_builder_requires_engine() {
        assert!(HttpService::builder().port(8080).build().is_err());
    }

    #[tokio::test]
    async fn test_spawned_service_stops_on_cancel() {
        let service = HttpService::builder()
            .engine(engine())
            .host("127.0.0.1")
            .port(0)
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        let handle = service.spawn(cancel.clone()).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let service = HttpService::builder()
            .engine(engine())
            .host("127.0.0.1")
            .port(port)
            .build()
            .unwrap();

        let err = service.run(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("failed to bind"));
    }
}
