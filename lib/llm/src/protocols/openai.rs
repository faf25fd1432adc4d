// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! OpenAI-compatible wire types served by the emulator.

use serde::{Deserialize, Serialize};

use crate::mocker::usage::UsageSummary;

pub mod chat_completions;
pub mod models;

/// The `usage` block of a completion response.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<UsageSummary> for CompletionUsage {
    fn from(usage: UsageSummary) -> Self {
        let clamp = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        CompletionUsage {
            prompt_tokens: clamp(usage.prompt_tokens),
            completion_tokens: clamp(usage.completion_tokens),
            total_tokens: clamp(usage.total_tokens),
        }
    }
}

/// OpenAI error envelope: `{"error": {"message", "type", "param", "code"}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        ErrorResponse {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.into(),
                param: None,
                code: None,
            },
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(message, "invalid_request_error")
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(message, "server_error")
    }
}

/// Seconds since the Unix epoch, as used in `created` fields.
pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let json = serde_json::to_value(ErrorResponse::invalid_request("bad body")).unwrap();
        assert_eq!(json["error"]["message"], "bad body");
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert!(json["error"]["param"].is_null());
    }

    #[test]
    fn test_usage_conversion() {
        let usage = CompletionUsage::from(UsageSummary::new(12, 25));
        assert_eq!(
            usage,
            CompletionUsage {
                prompt_tokens: 12,
                completion_tokens: 25,
                total_tokens: 37
            }
        );
    }
}
