// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::tokenizers::SharedTokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl UsageSummary {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        UsageSummary {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Computes the usage block of a request.
///
/// Completion tokens are the requested count, fixed before scheduling starts
/// and never adjusted for what was actually emitted.
#[derive(Debug, Clone)]
pub struct UsageAccountant {
    tokenizer: SharedTokenizer,
}

impl UsageAccountant {
    pub fn new(tokenizer: SharedTokenizer) -> Self {
        UsageAccountant { tokenizer }
    }

    pub fn summarize(&self, prompt_text: &str, requested_token_count: usize) -> UsageSummary {
        self.summarize_segments([prompt_text], requested_token_count)
    }

    /// Like [`UsageAccountant::summarize`], with the prompt split into the text
    /// parts of each message. Segments are counted independently.
    pub fn summarize_segments<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
        requested_token_count: usize,
    ) -> UsageSummary {
        let prompt_tokens = segments
            .into_iter()
            .map(|segment| self.count_prompt(segment))
            .sum();
        UsageSummary::new(prompt_tokens, requested_token_count)
    }

    fn count_prompt(&self, text: &str) -> usize {
        match self.tokenizer.count(text) {
            Ok(count) => count,
            Err(err) => {
                // approximate rather than fail the request
                tracing::warn!(%err, "prompt tokenization failed; estimating from length");
                text.len() / 4
            }
        }
    }
}
