// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! OpenAI-compatible routes: `POST /v1/chat/completions` and `GET /v1/models`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, Method, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use tokio::time::Instant;

use super::{RouteDoc, service_v2};
use crate::mocker::protocols::EmissionEvent;
use crate::mocker::synthesizer::SynthesisError;
use crate::protocols::common::timing::RequestTimingTracker;
use crate::protocols::openai::ErrorResponse;
use crate::protocols::openai::chat_completions::ChatCompletionRequest;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Unavailable(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = match &self {
            HttpError::BadRequest(msg) => ErrorResponse::invalid_request(msg.clone()),
            HttpError::Internal(msg) | HttpError::Unavailable(msg) => {
                ErrorResponse::server_error(msg.clone())
            }
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::BadRequest(rejection.body_text())
    }
}

impl From<SynthesisError> for HttpError {
    fn from(err: SynthesisError) -> Self {
        HttpError::Internal(err.to_string())
    }
}

pub fn chat_completions_router(
    state: Arc<service_v2::State>,
    path: Option<String>,
) -> (Vec<RouteDoc>, Router) {
    let path = path.unwrap_or_else(|| "/v1/chat/completions".to_string());
    let doc = RouteDoc::new(Method::POST, &path);
    let router = Router::new()
        .route(&path, post(handler_chat_completions))
        .with_state(state);
    (vec![doc], router)
}

pub fn list_models_router(
    state: Arc<service_v2::State>,
    path: Option<String>,
) -> (Vec<RouteDoc>, Router) {
    let path = path.unwrap_or_else(|| "/v1/models".to_string());
    let doc = RouteDoc::new(Method::GET, &path);
    let router = Router::new()
        .route(&path, get(handler_list_models))
        .with_state(state);
    (vec![doc], router)
}

async fn handler_list_models(State(state): State<Arc<service_v2::State>>) -> impl IntoResponse {
    Json(state.model_registry().list())
}

/// Chat completions handler
///
/// Bodies that do not parse are rejected with 400 before any time is spent. Timing
/// directives come from the request headers; a malformed directive silently
/// falls back to its default.
async fn handler_chat_completions(
    State(state): State<Arc<service_v2::State>>,
    headers: HeaderMap,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, HttpError> {
    let received_at = Instant::now();
    let timing = RequestTimingTracker::new();

    let Json(request) = body.inspect_err(|err| {
        tracing::debug!(%err, "rejecting malformed chat completion body");
    })?;

    let engine = state.engine();
    let directives = engine.directives(&headers);
    let streaming = request.stream;

    let mut inflight = state
        .metrics_clone()
        .create_inflight_guard(&request.model, streaming);

    let prepared = engine
        .prepare(received_at, request.prompt_segments(), directives)
        .inspect_err(|err| tracing::error!(%err, model = %request.model, "synthesis failed"))?;

    tracing::debug!(
        model = %request.model,
        streaming,
        ttft_ms = prepared.profile.ttft_ms(),
        itl_ms = prepared.profile.itl_ms(),
        output_length = prepared.output.requested_token_count(),
        expected_duration_ms = prepared
            .profile
            .total_ms(prepared.output.requested_token_count()),
        prompt_tokens = prepared.usage.prompt_tokens,
        "chat completion accepted"
    );

    state
        .metrics()
        .observe_output_tokens(&request.model, prepared.output.requested_token_count());

    // shutdown waits for this guard
    let drain_guard = state.track_inflight();

    let mut generator = request.response_generator();

    if !streaming {
        let completion = engine.run_buffered(prepared, state.cancel_token()).await;
        timing.record_finish();
        drop(drain_guard);

        let Some(finish_reason) = completion.finish_reason else {
            inflight.mark_cancelled();
            return Err(HttpError::Unavailable(
                "server is shutting down".to_string(),
            ));
        };

        state
            .metrics()
            .inc_emitted_units(&request.model, completion.report.emitted as u64);
        inflight.mark_ok();

        tracing::info!(
            id = generator.id(),
            model = %request.model,
            completion_tokens = completion.usage.completion_tokens,
            timing = ?timing.timing_info(),
            "chat completion finished"
        );

        let response = generator.response(completion.text, Some(finish_reason), completion.usage);
        return Ok(Json(response).into_response());
    }

    let mut events = engine.run_streaming(prepared, state.cancel_token());
    let usage = *events.usage();
    let metrics = state.metrics_clone();
    let model = request.model.clone();

    // dropping the stream (client disconnect) counts as a cancellation
    inflight.mark_cancelled();

    let stream = async_stream::stream! {
        let _drain_guard = drain_guard;
        let mut inflight = inflight;
        let mut emitted = 0u64;

        while let Some(event) = events.next().await {
            match event {
                EmissionEvent::Unit(unit) => {
                    if unit.index == 0 {
                        yield Ok::<_, Infallible>(json_event(&generator.role_chunk()));
                        if let Some(ttft) = timing.record_first_unit().then(|| timing.ttft()).flatten() {
                            metrics.observe_time_to_first_token(&model, ttft);
                        }
                    }
                    yield Ok(json_event(&generator.content_chunk(unit.text)));
                    metrics.inc_emitted_units(&model, 1);
                    emitted += 1;
                }
                EmissionEvent::Finished(reason) => {
                    yield Ok(json_event(&generator.closing_chunk(reason)));
                    if let Some(chunk) = generator.usage_chunk(usage) {
                        yield Ok(json_event(&chunk));
                    }
                    yield Ok(Event::default().data(DONE_SENTINEL));
                    inflight.mark_ok();
                }
            }
        }

        timing.record_finish();
        tracing::info!(
            id = generator.id(),
            model = %model,
            emitted,
            status = inflight.status().as_str(),
            timing = ?timing.timing_info(),
            "chat completion stream finished"
        );
    };

    Ok(sse_response(stream))
}

fn sse_response(stream: impl Stream<Item = Result<Event, Infallible>> + Send + 'static) -> Response {
    Sse::new(stream).into_response()
}

/// Serialize a chunk into a `data:` event.
fn json_event<T: serde::Serialize>(chunk: &T) -> Event {
    match serde_json::to_string(chunk) {
        Ok(data) => Event::default().data(data),
        Err(err) => {
            tracing::error!(%err, "failed to serialize stream chunk");
            Event::default().comment("serialization error")
        }
    }
}
