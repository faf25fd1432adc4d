// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Deserializer, Serialize};

use super::CompletionUsage;

pub mod delta;

pub use delta::DeltaGenerator;

/// Body of `POST /v1/chat/completions`.
///
/// `max_tokens` and `temperature` are accepted for compatibility only; the
/// output length is governed by the `X-OUTPUT-LENGTH` directive. An empty
/// `messages` list is a valid request with zero prompt tokens.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,

    pub messages: Vec<Message>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub stream: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatCompletionRequest {
    /// The text parts of every message, in order. Image parts carry no text.
    pub fn prompt_segments(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().flat_map(Message::text_segments)
    }

    pub fn include_usage(&self) -> bool {
        self.stream_options
            .as_ref()
            .is_some_and(|opts| opts.include_usage)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamOptions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_usage: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl Message {
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: "assistant".to_string(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    pub fn text_segments(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match &self.content {
            None => Box::new(std::iter::empty()),
            Some(MessageContent::Text(text)) => Box::new(std::iter::once(text.as_str())),
            Some(MessageContent::Parts(parts)) => {
                Box::new(parts.iter().filter_map(ContentPart::text))
            }
        }
    }
}

/// Plain text, or a list of typed multimodal parts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::ImageUrl { .. } => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(
        default = "ImageUrl::default_detail",
        deserialize_with = "ImageUrl::deserialize_detail"
    )]
    pub detail: String,
}

impl ImageUrl {
    fn default_detail() -> String {
        "auto".to_string()
    }

    fn deserialize_detail<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(Self::default_detail))
    }
}

/// An explicit `null` reads as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Buffered response, `object = "chat.completion"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: CompletionUsage,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatChoice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: Option<String>,
}

/// One SSE frame, `object = "chat.completion.chunk"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatCompletionStreamResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoiceStream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatChoiceStream {
    pub index: u32,
    pub delta: ChatCompletionDelta,
    pub finish_reason: Option<String>,
}

/// An empty delta serializes as `{}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ChatCompletionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
