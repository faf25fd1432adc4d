// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context as _;
use tokenpace_llm::http::service::service_v2::HttpService;
use tokenpace_llm::mocker::engine::MockChatEngine;
use tokenpace_llm::tokenizers::SharedTokenizer;
use tokenpace_runtime::Runtime;

mod flags;
pub use flags::Flags;

/// Build the engine and serve it until the runtime shuts down.
///
/// New connections stop when the runtime's endpoint token fires. Running
/// completions finish unless the primary token is cancelled first.
pub async fn run(runtime: Runtime, flags: Flags) -> anyhow::Result<()> {
    let engine_args = flags.engine_args()?;
    let tokenizer = SharedTokenizer::from_path_or_default(flags.tokenizer_path.as_deref())
        .context("failed to load tokenizer")?;
    let engine = MockChatEngine::new(tokenizer, engine_args)?;

    let service = HttpService::builder()
        .host(flags.http_host.clone())
        .port(flags.http_port)
        .engine(engine)
        .cancel_token(runtime.primary_token())
        .graceful_shutdown_tracker(runtime.graceful_shutdown_tracker())
        .build()?;

    service.run(runtime.child_token()).await
}
