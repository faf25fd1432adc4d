// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The [Runtime] is the handle services use to reach shared process resources:
//! the tokio thread pool, the primary [`CancellationToken`] and the tracker of
//! in-flight work that must drain before shutdown.
//!
//! Shutdown runs in two phases. The endpoint token is cancelled first so
//! listeners stop accepting; once every tracked request has completed the
//! primary token is cancelled.

use crate::utils::{GracefulShutdownGuard, GracefulShutdownTracker};

use std::sync::Arc;

pub use tokio_util::sync::CancellationToken;

/// Local [Runtime] which provides access to shared resources local to the process.
#[derive(Debug, Clone)]
pub struct Runtime {
    id: Arc<String>,
    primary: tokio::runtime::Handle,
    cancellation_token: CancellationToken,
    endpoint_shutdown_token: CancellationToken,
    graceful_shutdown_tracker: Arc<GracefulShutdownTracker>,
}

impl Runtime {
    pub(crate) fn new(handle: tokio::runtime::Handle) -> Runtime {
        // worker id
        let id = Arc::new(uuid::Uuid::new_v4().to_string());

        let cancellation_token = CancellationToken::new();

        // endpoint shutdown token is a child of the main token
        let endpoint_shutdown_token = cancellation_token.child_token();

        Runtime {
            id,
            primary: handle,
            cancellation_token,
            endpoint_shutdown_token,
            graceful_shutdown_tracker: Arc::new(GracefulShutdownTracker::new()),
        }
    }

    pub fn from_current() -> anyhow::Result<Runtime> {
        let handle = tokio::runtime::Handle::try_current()?;
        Ok(Runtime::from_handle(handle))
    }

    pub fn from_handle(handle: tokio::runtime::Handle) -> Runtime {
        Runtime::new(handle)
    }

    /// Returns the unique identifier for the [`Runtime`]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns a [`tokio::runtime::Handle`] for the application thread pool
    pub fn primary(&self) -> tokio::runtime::Handle {
        self.primary.clone()
    }

    /// Access the primary [`CancellationToken`] for the [`Runtime`]
    pub fn primary_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Creates a child [`CancellationToken`] tied to the life-cycle of the [`Runtime`]'s endpoint shutdown token.
    /// Listeners should stop accepting new work when this token fires.
    pub fn child_token(&self) -> CancellationToken {
        self.endpoint_shutdown_token.child_token()
    }

    pub fn graceful_shutdown_tracker(&self) -> Arc<GracefulShutdownTracker> {
        self.graceful_shutdown_tracker.clone()
    }

    /// Register one unit of in-flight work; shutdown waits until the guard drops.
    pub fn track_inflight(&self) -> GracefulShutdownGuard {
        self.graceful_shutdown_tracker.register()
    }

    /// Shuts down the [`Runtime`] instance
    pub fn shutdown(&self) {
        tracing::info!("Runtime shutdown initiated");

        let tracker = self.graceful_shutdown_tracker.clone();
        let main_token = self.cancellation_token.clone();
        let endpoint_token = self.endpoint_shutdown_token.clone();

        self.primary.spawn(async move {
            // Phase 1: stop accepting new requests
            tracing::info!("Phase 1: Cancelling endpoint shutdown token");
            endpoint_token.cancel();

            // Phase 2: let in-flight requests finish
            let count = tracker.get_count();
            tracing::info!("Phase 2: Waiting for {} in-flight requests to complete", count);
            if count != 0 {
                tracker.wait_for_completion().await;
            }

            tracing::info!("All in-flight requests completed; cancelling primary token");
            main_token.cancel();
        });
    }
}
