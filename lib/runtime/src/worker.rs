// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! A [`Worker`] owns the tokio runtime for a process and drives one
//! application future to completion.
//!
//! SIGINT or SIGTERM starts a graceful [`Runtime::shutdown`]. The application
//! then has [`RuntimeConfig::graceful_shutdown_timeout`] seconds to return
//! before the primary token is cancelled and the task is aborted.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;

use crate::{Runtime, RuntimeConfig};

pub struct Worker {
    runtime: Runtime,
    tokio_runtime: tokio::runtime::Runtime,
    config: RuntimeConfig,
}

impl Worker {
    /// Create a [`Worker`] from [`RuntimeConfig::from_settings`]
    pub fn from_settings() -> Result<Worker> {
        let config = RuntimeConfig::from_settings()?;
        Worker::from_config(config)
    }

    pub fn from_config(config: RuntimeConfig) -> Result<Worker> {
        tracing::debug!("Runtime config: {config}");
        let tokio_runtime = config
            .create_runtime()
            .context("failed to build the tokio runtime")?;
        let runtime = Runtime::new(tokio_runtime.handle().clone());
        Ok(Worker {
            runtime,
            tokio_runtime,
            config,
        })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Run `f` on the primary pool and block until it returns or a shutdown
    /// signal has been fully processed.
    pub fn execute<F, Fut>(self, f: F) -> Result<()>
    where
        F: FnOnce(Runtime) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let Worker {
            runtime,
            tokio_runtime,
            config,
        } = self;

        let timeout = Duration::from_secs(config.graceful_shutdown_timeout);
        let result = tokio_runtime.block_on(execute_internal(runtime, timeout, f));

        // tasks still parked on the pool (signal listeners, stray streams) are dropped here
        tokio_runtime.shutdown_timeout(Duration::from_millis(100));
        result
    }
}

async fn execute_internal<F, Fut>(runtime: Runtime, timeout: Duration, f: F) -> Result<()>
where
    F: FnOnce(Runtime) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut app = tokio::spawn(f(runtime.clone()));

    tokio::select! {
        result = &mut app => {
            return result.context("application task panicked")?;
        }
        _ = signal_handler(runtime.primary_token()) => {
            runtime.shutdown();
        }
    }

    match tokio::time::timeout(timeout, &mut app).await {
        Ok(result) => result.context("application task panicked")?,
        Err(_) => {
            tracing::warn!(
                "Application did not shut down within {}s; cancelling outstanding work",
                timeout.as_secs()
            );
            runtime.primary_token().cancel();
            app.abort();
            anyhow::bail!("graceful shutdown timed out after {}s", timeout.as_secs())
        }
    }
}

/// Resolves when the process receives SIGINT or SIGTERM, or when `cancel_token`
/// is cancelled by the application itself.
async fn signal_handler(cancel_token: tokio_util::sync::CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = sigterm => {
            tracing::info!("SIGTERM received, starting graceful shutdown");
        },
        _ = cancel_token.cancelled() => {
            tracing::debug!("primary token cancelled");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(timeout_secs: u64) -> RuntimeConfig {
        RuntimeConfig::builder()
            .num_worker_threads(Some(2))
            .graceful_shutdown_timeout(timeout_secs)
            .build()
            .unwrap()
    }

    #[test]
    fn test_execute_returns_application_result() {
        let worker = Worker::from_config(test_config(1)).unwrap();
        worker.execute(|_runtime| async move { Ok(()) }).unwrap();

        let worker = Worker::from_config(test_config(1)).unwrap();
        let err = worker
            .execute(|_runtime| async move { anyhow::bail!("boom") })
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_self_initiated_shutdown_drains() {
        let worker = Worker::from_config(test_config(5)).unwrap();
        worker
            .execute(|runtime| async move {
                let endpoint = runtime.child_token();
                let primary = runtime.primary_token();
                runtime.shutdown();
                endpoint.cancelled().await;
                primary.cancelled().await;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_shutdown_times_out_on_stuck_application() {
        let worker = Worker::from_config(test_config(0)).unwrap();
        let result = worker.execute(|runtime| async move {
            runtime.primary_token().cancel();
            std::future::pending::<()>().await;
            Ok(())
        });
        assert!(result.is_err());
    }
}
