// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! HTTP service
//!
//! The service is assembled from independent routers. Each router function
//! returns the [`RouteDoc`]s of the routes it adds next to the
//! [`axum::Router`], so the service can log everything it serves at startup.

use axum::http::Method;

pub mod health;
pub mod metrics;
pub mod openai;
pub mod service_v2;

pub use service_v2::{HttpService, HttpServiceConfig, HttpServiceConfigBuilder};

/// Documentation for a single route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDoc {
    method: Method,
    path: String,
}

impl std::fmt::Display for RouteDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl RouteDoc {
    pub fn new<T: Into<String>>(method: Method, path: T) -> Self {
        RouteDoc {
            method,
            path: path.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
