// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use tokenizers::tokenizer::Tokenizer as HfTokenizer;

use super::{
    Encoding, Error, Result, TokenIdType,
    traits::{Decoder, Encoder, Tokenizer},
};

pub struct HuggingFaceTokenizer {
    tokenizer: HfTokenizer,
}

impl HuggingFaceTokenizer {
    pub fn from_file(path: &str) -> Result<Self> {
        let tokenizer = HfTokenizer::from_file(path)
            .map_err(|err| Error::msg(format!("Error loading tokenizer: {}", err)))?;

        Ok(HuggingFaceTokenizer { tokenizer })
    }
}

impl Encoder for HuggingFaceTokenizer {
    fn encode(&self, input: &str) -> Result<Encoding> {
        // special tokens are never added: prompt accounting and synthesis both
        // count content tokens only
        let encoding = self
            .tokenizer
            .encode(input, false)
            .map_err(|err| Error::msg(format!("Error tokenizing input: {err}")))?;

        Ok(Encoding::Hf(Box::new(encoding)))
    }
}

impl Decoder for HuggingFaceTokenizer {
    fn decode(&self, token_ids: &[TokenIdType], skip_special_tokens: bool) -> Result<String> {
        let text = self
            .tokenizer
            .decode(token_ids, skip_special_tokens)
            .map_err(|err| Error::msg(format!("Error de-tokenizing input: {err}")))?;

        Ok(text)
    }
}

impl Tokenizer for HuggingFaceTokenizer {}

impl From<HfTokenizer> for HuggingFaceTokenizer {
    fn from(tokenizer: HfTokenizer) -> Self {
        HuggingFaceTokenizer { tokenizer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WORD_LEVEL: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[UNK]": 0, "hello": 1, "world": 2 },
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn test_word_level_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WORD_LEVEL.as_bytes()).unwrap();

        let tokenizer = HuggingFaceTokenizer::from_file(file.path().to_str().unwrap()).unwrap();
        let encoding = tokenizer.encode("hello world").unwrap();
        assert_eq!(encoding.token_ids(), &[1, 2]);
        assert_eq!(tokenizer.count("hello world hello").unwrap(), 3);
        assert_eq!(tokenizer.decode(&[1, 2], false).unwrap(), "hello world");
    }
}
