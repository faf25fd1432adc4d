// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! # tokenpace LLM
//!
//! An OpenAI-compatible chat completion emulator whose latency is dictated per
//! request: time to first token, inter-token latency and the exact number of
//! output tokens, measured with a real tokenizer.

pub mod http;
pub mod mocker;
pub mod model_registry;
pub mod protocols;
pub mod tokenizers;
