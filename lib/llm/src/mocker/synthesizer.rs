// SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Token synthesizer.
//!
//! Produces exactly `n` output units whose concatenation re-encodes to exactly
//! `n` tokens under the configured tokenizer. Text is assembled from a palette
//! of corpus words that are each a single token in the vocabulary, so the
//! count is exact by construction and then verified by a final re-encode.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::tokenizers::{SharedTokenizer, TokenIdType};

const OPENERS: &[&str] = &[
    "Hello! How can I assist you today?",
    "I'm here to help you with any questions you might have.",
    "That's an interesting question. Let me think about it.",
    "I understand what you're asking. Here's my response:",
    "Thank you for your question. I'd be happy to help.",
    "Based on the information provided, I can offer the following insights:",
    "Let me provide you with a comprehensive answer to your query.",
    "I appreciate you reaching out. Here's what I can tell you:",
];

const FILLERS: &[&str] = &[
    "Additionally, I want to mention that",
    "Furthermore, it's important to note that",
    "Moreover, we should consider that",
    "In fact, this reminds me that",
    "It's worth noting that",
    "Please also consider that",
    "Also, I should add that",
    "On a related note,",
    "To elaborate further,",
    "In this context,",
];

const EXTENSIONS: &[&str] = &[
    "this is a very interesting topic that deserves careful consideration",
    "there are many aspects to explore in this particular area of discussion",
    "we can approach this from multiple different perspectives and viewpoints",
    "the implications of this are quite significant and far-reaching in nature",
    "this subject matter has various nuances that are worth examining closely",
    "there are several factors that contribute to the overall understanding here",
    "the complexity of this issue requires thorough analysis and careful thought",
];

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("the tokenizer vocabulary yields no single-token words")]
    EmptyPalette,

    #[error("cannot synthesize zero tokens")]
    ZeroLength,

    #[error("synthesized text re-encodes to {actual} tokens, expected {requested}")]
    CountMismatch { requested: usize, actual: usize },

    #[error("unit {index} decoded to empty text")]
    EmptyUnit { index: usize },

    #[error("tokenizer failure: {0}")]
    Tokenizer(String),
}

impl SynthesisError {
    fn tokenizer(err: anyhow::Error) -> Self {
        SynthesisError::Tokenizer(err.to_string())
    }
}

/// A corpus word that is a single token both after a space and, optionally, bare.
#[derive(Debug, Clone, Copy)]
struct PaletteWord {
    spaced: TokenIdType,
    bare: Option<TokenIdType>,
}

/// Read-only after construction; shared by every request.
#[derive(Debug)]
pub struct TokenSynthesizer {
    tokenizer: SharedTokenizer,
    openers: Vec<Vec<PaletteWord>>,
    continuations: Vec<Vec<PaletteWord>>,
}

impl TokenSynthesizer {
    pub fn new(tokenizer: SharedTokenizer) -> Result<Self, SynthesisError> {
        let palette = |corpus: &[&str]| -> Result<Vec<Vec<PaletteWord>>, SynthesisError> {
            let mut sentences = Vec::with_capacity(corpus.len());
            for sentence in corpus {
                let mut words = Vec::new();
                for word in sentence.split_whitespace() {
                    if let Some(entry) = palette_word(&tokenizer, word)? {
                        words.push(entry);
                    }
                }
                if !words.is_empty() {
                    sentences.push(words);
                }
            }
            Ok(sentences)
        };

        let openers = palette(OPENERS)?;
        let mut continuations = palette(FILLERS)?;
        continuations.extend(palette(EXTENSIONS)?);

        if continuations.is_empty() {
            return Err(SynthesisError::EmptyPalette);
        }

        tracing::debug!(
            openers = openers.len(),
            continuations = continuations.len(),
            "token synthesizer palette ready"
        );

        Ok(TokenSynthesizer {
            tokenizer,
            openers,
            continuations,
        })
    }

    /// `n` unit texts, chosen with the thread-local RNG.
    pub fn synthesize(&self, n: usize) -> Result<Vec<String>, SynthesisError> {
        self.synthesize_with_rng(n, &mut rand::rng())
    }

    pub fn synthesize_with_rng<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<String>, SynthesisError> {
        if n == 0 {
            return Err(SynthesisError::ZeroLength);
        }

        let ids = self.pick_ids(n, rng);

        let mut units = Vec::with_capacity(n);
        let mut prev = None;
        for (index, &id) in ids.iter().enumerate() {
            let text = self
                .tokenizer
                .decode_delta(prev, id)
                .map_err(SynthesisError::tokenizer)?;
            if text.is_empty() {
                return Err(SynthesisError::EmptyUnit { index });
            }
            units.push(text);
            prev = Some(id);
        }

        let actual = self
            .tokenizer
            .count(&units.concat())
            .map_err(SynthesisError::tokenizer)?;
        if actual != n {
            return Err(SynthesisError::CountMismatch {
                requested: n,
                actual,
            });
        }

        Ok(units)
    }

    /// An opener followed by random continuations, truncated to `n` token ids.
    fn pick_ids<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<TokenIdType> {
        let mut ids = Vec::with_capacity(n);

        let push = |sentence: &[PaletteWord], ids: &mut Vec<TokenIdType>| {
            for word in sentence {
                if ids.len() == n {
                    return;
                }
                let id = match (ids.is_empty(), word.bare) {
                    (true, Some(bare)) => bare,
                    _ => word.spaced,
                };
                ids.push(id);
            }
        };

        if let Some(opener) = self.openers.choose(rng) {
            push(opener, &mut ids);
        }
        while ids.len() < n {
            // never empty: checked in `new`
            if let Some(continuation) = self.continuations.choose(rng) {
                push(continuation, &mut ids);
            }
        }

        ids
    }
}

/// Look up `word` (stripped of punctuation) in the vocabulary.
///
/// The spaced form is checked in context: SentencePiece decoders drop the
/// leading space of a lone token, so `decode(&[id])` alone is not enough.
fn palette_word(
    tokenizer: &SharedTokenizer,
    word: &str,
) -> Result<Option<PaletteWord>, SynthesisError> {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric());
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(None);
    }

    let spaced_text = format!(" {word}");
    let Some(spaced) = single_token(tokenizer, &spaced_text)? else {
        return Ok(None);
    };
    let in_context = tokenizer
        .decode_delta(Some(spaced), spaced)
        .map_err(SynthesisError::tokenizer)?;
    if in_context != spaced_text {
        return Ok(None);
    }

    let bare = match single_token(tokenizer, word)? {
        Some(id) if tokenizer.decode(&[id], false).map_err(SynthesisError::tokenizer)? == word => {
            Some(id)
        }
        _ => None,
    };

    Ok(Some(PaletteWord { spaced, bare }))
}

/// The id of `text` if it encodes to exactly one token.
fn single_token(
    tokenizer: &SharedTokenizer,
    text: &str,
) -> Result<Option<TokenIdType>, SynthesisError> {
    let encoding = tokenizer.encode(text).map_err(SynthesisError::tokenizer)?;
    match encoding.token_ids() {
        [id] => Ok(Some(*id)),
        _ => Ok(None),
    }
}
