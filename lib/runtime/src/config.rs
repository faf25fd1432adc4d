// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use derive_builder::Builder;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

pub mod environment_names;

use environment_names::logging as env_logging;
use environment_names::runtime as env_runtime;

/// System-wide configuration file, lower priority than the environment
const SYSTEM_RUNTIME_CONFIG_PATH: &str = "/etc/tokenpace/runtime.toml";

/// Default grace period, in seconds, granted to the application after a shutdown signal
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration
/// Defines the configuration for the Tokio runtime that hosts the emulator
#[derive(Serialize, Deserialize, Validate, Debug, Builder, Clone)]
#[builder(build_fn(private, name = "build_internal"), derive(Debug, Serialize))]
pub struct RuntimeConfig {
    /// Number of async worker threads
    /// If set to 1, the runtime will run in single-threaded mode
    /// Set this at runtime with environment variable TOKENPACE_RUNTIME_NUM_WORKER_THREADS.
    /// Defaults to number of cores.
    #[validate(range(min = 1))]
    #[builder(default = "None")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub num_worker_threads: Option<usize>,

    /// Maximum number of blocking threads
    /// Set this at runtime with environment variable TOKENPACE_RUNTIME_MAX_BLOCKING_THREADS.
    #[validate(range(min = 1))]
    #[builder(default = "512")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub max_blocking_threads: usize,

    /// Seconds the worker waits for the application future after a shutdown signal
    /// Set this at runtime with environment variable TOKENPACE_RUNTIME_GRACEFUL_SHUTDOWN_TIMEOUT.
    #[builder(default = "DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS")]
    #[builder_field_attr(serde(skip_serializing_if = "Option::is_none"))]
    pub graceful_shutdown_timeout: u64,
}

impl fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If None, it defaults to "number of cores", so we indicate that.
        match self.num_worker_threads {
            Some(val) => write!(f, "num_worker_threads={val}, ")?,
            None => write!(f, "num_worker_threads=default (num_cores), ")?,
        }
        write!(f, "max_blocking_threads={}, ", self.max_blocking_threads)?;
        write!(
            f,
            "graceful_shutdown_timeout={}s",
            self.graceful_shutdown_timeout
        )
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    pub(crate) fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(RuntimeConfig::default()))
            .merge(Toml::file(SYSTEM_RUNTIME_CONFIG_PATH))
            .merge(
                Env::prefixed(env_runtime::TOKENPACE_RUNTIME_PREFIX).filter_map(|k| {
                    let full_key = format!("{}{}", env_runtime::TOKENPACE_RUNTIME_PREFIX, k.as_str());
                    // filters out empty environment variables
                    match std::env::var(&full_key) {
                        Ok(v) if !v.is_empty() => Some(k.into()),
                        _ => None,
                    }
                }),
            )
    }

    /// Load the runtime configuration from the environment and configuration files
    /// Configuration is prioritized in the following order, where the last has the lowest priority:
    /// 1. Environment variables prefixed with `TOKENPACE_RUNTIME_`
    /// 2. /etc/tokenpace/runtime.toml
    /// 3. Built-in defaults
    pub fn from_settings() -> Result<RuntimeConfig> {
        let config: RuntimeConfig = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn single_threaded() -> Self {
        RuntimeConfig {
            num_worker_threads: Some(1),
            max_blocking_threads: 1,
            graceful_shutdown_timeout: DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS,
        }
    }

    pub(crate) fn create_runtime(&self) -> std::io::Result<tokio::runtime::Runtime> {
        let worker_threads = match self.num_worker_threads {
            Some(n) => n,
            None => std::thread::available_parallelism()?.get(),
        };
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .max_blocking_threads(self.max_blocking_threads)
            .enable_all()
            .build()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_worker_threads: None,
            max_blocking_threads: 512,
            graceful_shutdown_timeout: if cfg!(debug_assertions) {
                1 // Debug build: 1 second
            } else {
                DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS
            },
        }
    }
}

impl RuntimeConfigBuilder {
    /// Build and validate the runtime configuration
    pub fn build(&self) -> Result<RuntimeConfig> {
        let config = self.build_internal()?;
        config.validate()?;
        Ok(config)
    }
}

/// Check if a string is truthy
/// This will be used to evaluate environment variables or any other subjective
/// configuration parameters that can be set by the user that should be evaluated
/// as a boolean value.
pub fn is_truthy(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

/// Check if a string is falsey, the opposite of [`is_truthy`]
pub fn is_falsey(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "0" | "false" | "off" | "no")
}

/// Parse a string as a boolean value, returning an error if it is neither truthy nor falsey.
pub fn parse_bool(val: &str) -> Result<bool> {
    if is_truthy(val) {
        Ok(true)
    } else if is_falsey(val) {
        Ok(false)
    } else {
        anyhow::bail!(
            "Invalid boolean value: '{}'. Expected one of: true/false, 1/0, on/off, yes/no",
            val
        )
    }
}

/// Check if an environment variable is truthy. Unset or invalid values are `false`.
pub fn env_is_truthy(env: &str) -> bool {
    match std::env::var(env) {
        Ok(val) => is_truthy(val.as_str()),
        Err(_) => false,
    }
}

/// Check whether JSONL logging is enabled
/// Set the `TOKENPACE_LOGGING_JSONL` environment variable a [`is_truthy`] value
pub fn jsonl_logging_enabled() -> bool {
    env_is_truthy(env_logging::TOKENPACE_LOGGING_JSONL)
}

/// Check whether ANSI terminal colors should be disabled
pub fn disable_ansi_logging() -> bool {
    env_is_truthy(env_logging::TOKENPACE_DISABLE_ANSI_LOGGING)
}

/// Check whether to use local timezone for logging timestamps (default is UTC)
pub fn use_local_timezone() -> bool {
    env_is_truthy(env_logging::TOKENPACE_LOG_USE_LOCAL_TZ)
}
