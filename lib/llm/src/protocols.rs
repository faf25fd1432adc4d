// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! # tokenpace LLM Protocols
//!
//! Message formats exchanged over the public HTTP API.

pub mod common;
pub mod openai;
