// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The mock chat engine: directives, synthesis, usage and the emission schedule.

pub mod directives;
pub mod engine;
pub mod protocols;
pub mod scheduler;
pub mod synthesizer;
pub mod usage;
