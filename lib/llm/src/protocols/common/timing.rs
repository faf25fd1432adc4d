// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-request timing tracker.
//!
//! [`RequestTimingTracker`] records when a chat completion was received, when
//! its first unit went out and when it finished. The recorded values feed the
//! TTFT and duration metrics and the completion log line.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Per-request timing tracker.
///
/// `first_unit_time` and `finish_time` are set at most once; later calls are
/// ignored and report `false`.
#[derive(Debug)]
pub struct RequestTimingTracker {
    /// Monotonic receipt time, for durations
    request_received: Instant,

    /// Wall clock receipt time as epoch milliseconds
    request_received_epoch_ms: u64,

    first_unit_time: OnceLock<Instant>,

    finish_time: OnceLock<Instant>,
}

impl RequestTimingTracker {
    pub fn new() -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        RequestTimingTracker {
            request_received: Instant::now(),
            request_received_epoch_ms: epoch_ms,
            first_unit_time: OnceLock::new(),
            finish_time: OnceLock::new(),
        }
    }

    pub fn record_first_unit(&self) -> bool {
        self.first_unit_time.set(Instant::now()).is_ok()
    }

    pub fn record_finish(&self) -> bool {
        self.finish_time.set(Instant::now()).is_ok()
    }

    pub fn ttft(&self) -> Option<Duration> {
        self.first_unit_time
            .get()
            .map(|t| t.duration_since(self.request_received))
    }

    pub fn total_time(&self) -> Option<Duration> {
        self.finish_time
            .get()
            .map(|t| t.duration_since(self.request_received))
    }

    pub fn ttft_ms(&self) -> Option<f64> {
        self.ttft().map(|d| d.as_secs_f64() * 1000.0)
    }

    pub fn total_time_ms(&self) -> Option<f64> {
        self.total_time().map(|d| d.as_secs_f64() * 1000.0)
    }

    pub fn request_received_epoch_ms(&self) -> u64 {
        self.request_received_epoch_ms
    }

    pub fn timing_info(&self) -> TimingInfo {
        TimingInfo {
            request_received_ms: self.request_received_epoch_ms,
            ttft_ms: self.ttft_ms(),
            total_time_ms: self.total_time_ms(),
        }
    }
}

impl Default for RequestTimingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a [`RequestTimingTracker`], logged when a request completes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimingInfo {
    /// When the request was received (epoch milliseconds)
    pub request_received_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttft_ms: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time_ms: Option<f64>,
}
