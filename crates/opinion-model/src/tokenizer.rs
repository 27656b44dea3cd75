//! Tokenizer/Padder
//!
//! Turns event text into fixed-length token id sequences.

use crate::error::{ModelError, ModelResult};
use crate::vocab::{Vocabulary, PAD_ID};

/// Looks up every whitespace-delimited word of `text`.
pub fn encode(text: &str, vocab: &Vocabulary) -> ModelResult<Vec<u32>> {
    text.split_whitespace()
        .map(|word| {
            vocab.id(word).ok_or_else(|| ModelError::MissingWord {
                word: word.to_string(),
                text: text.to_string(),
            })
        })
        .collect()
}

/// Right-pads `tokens` with [`PAD_ID`] up to `len`.
pub fn pad_to(tokens: &[u32], len: usize) -> ModelResult<Vec<u32>> {
    if tokens.len() > len {
        return Err(ModelError::SequenceTooLong {
            length: tokens.len(),
            max: len,
        });
    }
    let mut padded = Vec::with_capacity(len);
    padded.extend_from_slice(tokens);
    padded.resize(len, PAD_ID);
    Ok(padded)
}

/// A vocabulary paired with the model's fixed sequence length.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: Vocabulary,
    max_len: usize,
}

impl Tokenizer {
    pub fn new(vocab: Vocabulary, max_len: usize) -> Self {
        Self { vocab, max_len }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn encode(&self, text: &str) -> ModelResult<Vec<u32>> {
        encode(text, &self.vocab)
    }

    /// Encodes and pads to `max_len`.
    ///
    /// Length is checked before any lookup, so an over-long text reports
    /// `SequenceTooLong` even when it also contains unknown words.
    pub fn encode_padded(&self, text: &str) -> ModelResult<Vec<u32>> {
        self.check_len(text)?;
        pad_to(&self.encode(text)?, self.max_len)
    }

    /// Fails with `SequenceTooLong` when `text` has more than `max_len` words.
    pub fn check_len(&self, text: &str) -> ModelResult<()> {
        let length = text.split_whitespace().count();
        if length > self.max_len {
            return Err(ModelError::SequenceTooLong {
                length,
                max: self.max_len,
            });
        }
        Ok(())
    }

    /// Words of `text` the vocabulary does not know, in order of appearance.
    pub fn unknown_words<'t>(&self, text: &'t str) -> Vec<&'t str> {
        text.split_whitespace()
            .filter(|w| !self.vocab.contains(w))
            .collect()
    }
}
