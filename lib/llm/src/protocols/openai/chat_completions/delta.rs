// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use super::{
    ChatChoice, ChatChoiceStream, ChatCompletionDelta, ChatCompletionRequest,
    ChatCompletionResponse, ChatCompletionStreamResponse, Message,
};
use crate::mocker::protocols::FinishReason;
use crate::protocols::openai::{CompletionUsage, unix_timestamp};

const CHAT_COMPLETION_OBJECT: &str = "chat.completion";
const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";

impl ChatCompletionRequest {
    /// Creates the [`DeltaGenerator`] that assembles every response of this request.
    pub fn response_generator(&self) -> DeltaGenerator {
        DeltaGenerator::new(self.model.clone(), self.include_usage())
    }
}

/// Assembles the response documents of one chat completion.
///
/// All documents produced by one generator share the same `id`, `created`
/// and `model`.
#[derive(Debug, Clone)]
pub struct DeltaGenerator {
    /// `chatcmpl-` followed by eight hex digits
    id: String,
    /// Unix seconds
    created: u64,
    model: String,
    enable_usage: bool,
    /// Number of stream chunks issued
    msg_counter: u64,
}

impl DeltaGenerator {
    pub fn new(model: String, enable_usage: bool) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        DeltaGenerator {
            id: format!("chatcmpl-{}", &id[..8]),
            created: unix_timestamp(),
            model,
            enable_usage,
            msg_counter: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_usage_enabled(&self) -> bool {
        self.enable_usage
    }

    pub fn msg_counter(&self) -> u64 {
        self.msg_counter
    }

    /// The opening chunk: `{"role": "assistant", "content": ""}`.
    pub fn role_chunk(&mut self) -> ChatCompletionStreamResponse {
        self.chunk(
            ChatCompletionDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
            },
            None,
        )
    }

    pub fn content_chunk(&mut self, text: impl Into<String>) -> ChatCompletionStreamResponse {
        self.chunk(
            ChatCompletionDelta {
                role: None,
                content: Some(text.into()),
            },
            None,
        )
    }

    /// The closing chunk: an empty delta carrying the finish reason.
    pub fn closing_chunk(&mut self, reason: FinishReason) -> ChatCompletionStreamResponse {
        self.chunk(ChatCompletionDelta::default(), Some(reason))
    }

    /// The usage-only chunk sent after the closing chunk, when requested.
    pub fn usage_chunk(
        &mut self,
        usage: impl Into<CompletionUsage>,
    ) -> Option<ChatCompletionStreamResponse> {
        if !self.enable_usage {
            return None;
        }
        self.msg_counter += 1;
        Some(ChatCompletionStreamResponse {
            id: self.id.clone(),
            object: CHAT_COMPLETION_CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![],
            usage: Some(usage.into()),
        })
    }

    /// The buffered document. Usage is always present.
    pub fn response(
        &self,
        text: String,
        finish_reason: Option<FinishReason>,
        usage: impl Into<CompletionUsage>,
    ) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: self.id.clone(),
            object: CHAT_COMPLETION_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: Message::assistant(text),
                finish_reason: finish_reason.map(|reason| reason.to_string()),
            }],
            usage: usage.into(),
        }
    }

    fn chunk(
        &mut self,
        delta: ChatCompletionDelta,
        finish_reason: Option<FinishReason>,
    ) -> ChatCompletionStreamResponse {
        self.msg_counter += 1;
        ChatCompletionStreamResponse {
            id: self.id.clone(),
            object: CHAT_COMPLETION_CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChoiceStream {
                index: 0,
                delta,
                finish_reason: finish_reason.map(|reason| reason.to_string()),
            }],
            usage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocker::usage::UsageSummary;
    use serde_json::json;

    fn generator(enable_usage: bool) -> DeltaGenerator {
        DeltaGenerator::new("gpt-3.5-turbo".to_string(), enable_usage)
    }

    #[test]
    fn test_id_format() {
        let generator = generator(false);
        let suffix = generator.id().strip_prefix("chatcmpl-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(generator.created() > 0);
    }

    #[test]
    fn test_chunk_sequence_shares_identity() {
        let mut generator = generator(false);
        let role = serde_json::to_value(generator.role_chunk()).unwrap();
        let content = serde_json::to_value(generator.content_chunk("Hello")).unwrap();
        let closing = serde_json::to_value(generator.closing_chunk(FinishReason::Stop)).unwrap();

        assert_eq!(role["choices"][0]["delta"], json!({"role": "assistant", "content": ""}));
        assert_eq!(content["choices"][0]["delta"], json!({"content": "Hello"}));
        assert!(content["choices"][0]["finish_reason"].is_null());
        assert_eq!(closing["choices"][0]["delta"], json!({}));
        assert_eq!(closing["choices"][0]["finish_reason"], "stop");

        for chunk in [&role, &content, &closing] {
            assert_eq!(chunk["id"], generator.id());
            assert_eq!(chunk["object"], "chat.completion.chunk");
            assert_eq!(chunk["model"], "gpt-3.5-turbo");
            assert!(chunk.get("usage").is_none());
        }
        assert_eq!(generator.msg_counter(), 3);
    }

    #[test]
    fn test_usage_chunk_only_when_enabled() {
        let usage = UsageSummary::new(3, 4);
        assert!(generator(false).usage_chunk(usage).is_none());

        let chunk = generator(true).usage_chunk(usage).unwrap();
        assert!(chunk.choices.is_empty());
        assert_eq!(chunk.usage.unwrap().total_tokens, 7);
    }

    #[test]
    fn test_buffered_response() {
        let generator = generator(false);
        let response = generator.response(
            "Hello there".to_string(),
            Some(FinishReason::Stop),
            UsageSummary::new(5, 2),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["message"]["content"], "Hello there");
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["usage"]["completion_tokens"], 2);
    }
}
