// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

pub use tokio::time::{Duration, Instant};

pub mod graceful_shutdown;

pub use graceful_shutdown::{GracefulShutdownGuard, GracefulShutdownTracker};
