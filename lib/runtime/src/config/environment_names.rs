// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Environment variable name constants for centralized management across the codebase
//!
//! Environment variables are organized by functional area:
//! - **Logging**: Log level, configuration file, output format
//! - **Runtime**: Tokio runtime configuration and worker shutdown
//! - **Emulator**: Defaults applied when a request carries no timing directive

/// Logging environment variables
pub mod logging {
    /// Log filter directives (e.g., "debug", "tokenpace_llm=trace,info")
    pub const TOKENPACE_LOG: &str = "TOKENPACE_LOG";

    /// Path to logging configuration file
    pub const TOKENPACE_LOGGING_CONFIG_PATH: &str = "TOKENPACE_LOGGING_CONFIG_PATH";

    /// Enable JSONL logging format
    pub const TOKENPACE_LOGGING_JSONL: &str = "TOKENPACE_LOGGING_JSONL";

    /// Disable ANSI terminal colors in logs
    pub const TOKENPACE_DISABLE_ANSI_LOGGING: &str = "TOKENPACE_DISABLE_ANSI_LOGGING";

    /// Use local timezone for logging timestamps (default is UTC)
    pub const TOKENPACE_LOG_USE_LOCAL_TZ: &str = "TOKENPACE_LOG_USE_LOCAL_TZ";
}

/// Runtime configuration environment variables
pub mod runtime {
    /// Prefix for every [`crate::RuntimeConfig`] field
    pub const TOKENPACE_RUNTIME_PREFIX: &str = "TOKENPACE_RUNTIME_";

    /// Number of async worker threads for Tokio runtime
    pub const TOKENPACE_RUNTIME_NUM_WORKER_THREADS: &str = "TOKENPACE_RUNTIME_NUM_WORKER_THREADS";

    /// Maximum number of blocking threads for Tokio runtime
    pub const TOKENPACE_RUNTIME_MAX_BLOCKING_THREADS: &str =
        "TOKENPACE_RUNTIME_MAX_BLOCKING_THREADS";

    /// Seconds to wait for the application to drain after a shutdown signal
    pub const TOKENPACE_RUNTIME_GRACEFUL_SHUTDOWN_TIMEOUT: &str =
        "TOKENPACE_RUNTIME_GRACEFUL_SHUTDOWN_TIMEOUT";
}

/// Emulator defaults, read by the CLI
pub mod emulator {
    pub const TOKENPACE_HTTP_HOST: &str = "TOKENPACE_HTTP_HOST";
    pub const TOKENPACE_HTTP_PORT: &str = "TOKENPACE_HTTP_PORT";
    pub const TOKENPACE_TOKENIZER_PATH: &str = "TOKENPACE_TOKENIZER_PATH";
    pub const TOKENPACE_DEFAULT_TTFT_MS: &str = "TOKENPACE_DEFAULT_TTFT_MS";
    pub const TOKENPACE_DEFAULT_ITL_MS: &str = "TOKENPACE_DEFAULT_ITL_MS";
    pub const TOKENPACE_DEFAULT_OUTPUT_LENGTH: &str = "TOKENPACE_DEFAULT_OUTPUT_LENGTH";
}
