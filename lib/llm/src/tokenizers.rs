// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Tokenizer backends shared by prompt accounting and the token synthesizer.
//!
//! Two backends are provided: [`TiktokenTokenizer`] (the embedded `cl100k_base`
//! vocabulary, the default) and [`HuggingFaceTokenizer`] (a `tokenizer.json`
//! loaded from disk). Both are read-only after construction and are shared
//! across requests through a [`SharedTokenizer`].

use std::path::Path;
use std::sync::Arc;

pub mod hf;
pub mod tiktoken;

pub use anyhow::{Error, Result};
pub use hf::HuggingFaceTokenizer;
pub use tiktoken::TiktokenTokenizer;

pub type TokenIdType = u32;

/// The output of an [`traits::Encoder`].
#[derive(Debug, Clone)]
pub enum Encoding {
    /// Encoding produced by the HuggingFace `tokenizers` crate
    Hf(Box<tokenizers::tokenizer::Encoding>),
    /// Plain BPE ranks, as produced by tiktoken
    Bpe(Vec<TokenIdType>),
}

impl Encoding {
    pub fn token_ids(&self) -> &[TokenIdType] {
        match self {
            Encoding::Hf(inner) => inner.get_ids(),
            Encoding::Bpe(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.token_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids().is_empty()
    }
}

pub mod traits {
    use super::{Encoding, Result, TokenIdType};

    pub trait Encoder: Send + Sync {
        fn encode(&self, input: &str) -> Result<Encoding>;

        fn encode_batch(&self, inputs: &[&str]) -> Result<Vec<Encoding>> {
            inputs.iter().map(|input| self.encode(input)).collect()
        }
    }

    pub trait Decoder: Send + Sync {
        fn decode(&self, token_ids: &[TokenIdType], skip_special_tokens: bool) -> Result<String>;
    }

    pub trait Tokenizer: Encoder + Decoder {
        /// Number of tokens `text` encodes to.
        fn count(&self, text: &str) -> Result<usize> {
            Ok(self.encode(text)?.len())
        }

        /// The text `token_id` contributes when decoded after `prev`.
        ///
        /// Decoding a lone token and decoding it in context can differ (leading
        /// spaces, merged byte sequences), so the delta is taken from the pair.
        fn decode_delta(&self, prev: Option<TokenIdType>, token_id: TokenIdType) -> Result<String> {
            let Some(prev) = prev else {
                return self.decode(&[token_id], false);
            };
            let prefix = self.decode(&[prev], false)?;
            let joined = self.decode(&[prev, token_id], false)?;
            match joined.strip_prefix(prefix.as_str()) {
                Some(delta) => Ok(delta.to_string()),
                None => self.decode(&[token_id], false),
            }
        }
    }
}

/// Process-wide handle to the configured tokenizer.
#[derive(Clone)]
pub struct SharedTokenizer(Arc<dyn traits::Tokenizer>);

impl SharedTokenizer {
    pub fn new(tokenizer: Arc<dyn traits::Tokenizer>) -> Self {
        SharedTokenizer(tokenizer)
    }

    /// The embedded `cl100k_base` vocabulary.
    pub fn cl100k() -> Result<Self> {
        Ok(SharedTokenizer(Arc::new(TiktokenTokenizer::cl100k_base()?)))
    }

    /// Load a HuggingFace `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::msg(format!("tokenizer path is not utf-8: {}", path.display())))?;
        Ok(SharedTokenizer(Arc::new(HuggingFaceTokenizer::from_file(
            path_str,
        )?)))
    }

    /// `from_file` when a path is given, otherwise [`SharedTokenizer::cl100k`].
    pub fn from_path_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                tracing::info!("Loading tokenizer from {}", path.display());
                Self::from_file(path)
            }
            None => {
                tracing::debug!("Using embedded cl100k_base tokenizer");
                Self::cl100k()
            }
        }
    }
}

impl std::ops::Deref for SharedTokenizer {
    type Target = dyn traits::Tokenizer;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for SharedTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTokenizer").finish_non_exhaustive()
    }
}
