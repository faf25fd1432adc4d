// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use super::RouteDoc;
use crate::protocols::openai::unix_timestamp;
use axum::{Json, Router, http::Method, http::StatusCode, response::IntoResponse, routing::get};
use serde_json::json;

pub fn health_check_router(path: Option<String>) -> (Vec<RouteDoc>, Router) {
    let health_path = path.unwrap_or_else(|| "/health".to_string());

    let docs: Vec<RouteDoc> = vec![RouteDoc::new(Method::GET, &health_path)];

    let router = Router::new().route(&health_path, get(health_handler));

    (docs, router)
}

pub fn live_check_router(path: Option<String>) -> (Vec<RouteDoc>, Router) {
    let live_path = path.unwrap_or_else(|| "/live".to_string());

    let docs: Vec<RouteDoc> = vec![RouteDoc::new(Method::GET, &live_path)];

    let router = Router::new().route(&live_path, get(live_handler));

    (docs, router)
}

async fn live_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "live",
            "message": "Service is live"
        })),
    )
}

async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": unix_timestamp()
        })),
    )
}
