// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! tokenpace runtime: process configuration, logging and the worker lifecycle
//! shared by every tokenpace binary.

pub use anyhow::{
    Context as ErrorContext, Error, Ok as OK, Result, anyhow as error, bail as raise,
};

pub mod config;
pub use config::RuntimeConfig;

pub mod logging;
pub mod runtime;
pub mod utils;
pub mod worker;

pub use runtime::Runtime;
pub use tokio_util::sync::CancellationToken;
pub use worker::Worker;
