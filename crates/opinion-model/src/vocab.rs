//! Vocabulary Builder
//!
//! Word → id table derived from training text. Id 0 is reserved for padding.

use std::collections::{BTreeSet, HashMap};

/// Token id used to right-pad sequences.
pub const PAD_ID: u32 = 0;

/// Placeholder word mapped to [`PAD_ID`].
pub const PAD_TOKEN: &str = "<pad>";

/// Immutable mapping from words to token ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    /// Indexed by id
    words: Vec<String>,
}

impl Vocabulary {
    /// Builds the vocabulary from whitespace-delimited texts.
    ///
    /// Distinct words get ids in sorted order starting at 1.
    pub fn from_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = texts
            .into_iter()
            .flat_map(str::split_whitespace)
            .filter(|w| *w != PAD_TOKEN)
            .collect();

        let mut words = Vec::with_capacity(distinct.len() + 1);
        words.push(PAD_TOKEN.to_string());
        words.extend(distinct.into_iter().map(String::from));

        let ids = words
            .iter()
            .enumerate()
            .map(|(id, word)| (word.clone(), id as u32))
            .collect();

        Self { ids, words }
    }

    /// Vocabulary holding only the padding entry.
    pub fn empty() -> Self {
        Self::from_texts(std::iter::empty())
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.ids.get(word).copied()
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.ids.contains_key(word)
    }

    /// Number of entries, padding included.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Always false: the padding entry is always present.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// `(word, id)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.words
            .iter()
            .enumerate()
            .map(|(id, word)| (word.as_str(), id as u32))
    }
}
