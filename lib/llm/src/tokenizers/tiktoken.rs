// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use tiktoken_rs::CoreBPE;

use super::{
    Encoding, Error, Result, TokenIdType,
    traits::{Decoder, Encoder, Tokenizer},
};

/// OpenAI BPE vocabularies embedded in `tiktoken-rs`; no network access needed.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// The GPT-3.5 / GPT-4 vocabulary.
    pub fn cl100k_base() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|err| Error::msg(format!("Error loading cl100k_base: {err}")))?;
        Ok(TiktokenTokenizer { bpe })
    }
}

impl Encoder for TiktokenTokenizer {
    fn encode(&self, input: &str) -> Result<Encoding> {
        let ids = self
            .bpe
            .encode_ordinary(input)
            .into_iter()
            .map(|id| id as TokenIdType)
            .collect();
        Ok(Encoding::Bpe(ids))
    }
}

impl Decoder for TiktokenTokenizer {
    // encode_ordinary never yields special tokens, so there is nothing to skip
    fn decode(&self, token_ids: &[TokenIdType], _skip_special_tokens: bool) -> Result<String> {
        self.bpe
            .decode(token_ids.iter().map(|&id| id as _).collect())
            .map_err(|err| Error::msg(format!("Error de-tokenizing input: {err}")))
    }
}

impl Tokenizer for TiktokenTokenizer {}
