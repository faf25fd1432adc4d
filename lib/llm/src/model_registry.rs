// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The fixed list of models advertised by `GET /v1/models`.
//!
//! Any model name is accepted on `POST /v1/chat/completions` and echoed back;
//! the registry only shapes the listing.

use crate::protocols::openai::models::{ModelInfo, ModelsResponse};
use crate::protocols::openai::unix_timestamp;

pub const OWNED_BY: &str = "openai";

pub const MODEL_IDS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-0301",
    "gpt-3.5-turbo-0613",
    "gpt-3.5-turbo-16k",
    "gpt-4",
    "gpt-4-0314",
    "gpt-4-0613",
    "gpt-4-32k",
    "text-davinci-003",
    "text-davinci-002",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegistry;

impl ModelRegistry {
    pub fn ids(&self) -> &'static [&'static str] {
        MODEL_IDS
    }

    pub fn contains(&self, model: &str) -> bool {
        MODEL_IDS.contains(&model)
    }

    /// The listing, stamped with the current time as `created`.
    pub fn list(&self) -> ModelsResponse {
        let created = unix_timestamp();
        ModelsResponse::new(
            MODEL_IDS
                .iter()
                .map(|id| ModelInfo {
                    id: id.to_string(),
                    object: "model".to_string(),
                    created,
                    owned_by: OWNED_BY.to_string(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing() {
        let listing = ModelRegistry.list();
        assert_eq!(listing.object, "list");
        assert_eq!(listing.data.len(), 10);
        assert_eq!(listing.data[0].id, "gpt-3.5-turbo");
        assert!(listing.data.iter().all(|m| m.owned_by == "openai" && m.object == "model"));
        assert!(ModelRegistry.contains("gpt-4-32k"));
        assert!(!ModelRegistry.contains("llama"));
    }
}
