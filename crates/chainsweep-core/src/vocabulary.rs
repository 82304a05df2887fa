//! The fixed word list tasks are drawn from.

use std::collections::HashSet;
use std::path::Path;

use crate::error::SweepError;
use crate::types::WORDS_PER_TASK;

/// An ordered list of distinct words, loaded once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary. Rejects lists shorter than a task and words that
    /// are empty, repeated or contain whitespace.
    pub fn new(words: Vec<String>) -> Result<Self, SweepError> {
        if words.len() < WORDS_PER_TASK {
            return Err(SweepError::Vocabulary(format!(
                "need at least {WORDS_PER_TASK} words, got {}",
                words.len()
            )));
        }
        let mut seen = HashSet::with_capacity(words.len());
        for w in &words {
            if w.is_empty() {
                return Err(SweepError::Vocabulary("empty word in list".into()));
            }
            if w.chars().any(char::is_whitespace) {
                return Err(SweepError::Vocabulary(format!("word '{w}' contains whitespace")));
            }
            if !seen.insert(w.as_str()) {
                return Err(SweepError::Vocabulary(format!("duplicate word '{w}'")));
            }
        }
        Ok(Self { words })
    }

    /// The 2048-word BIP-39 English list.
    pub fn bip39_english() -> Self {
        let words = bip39::Language::English
            .word_list()
            .iter()
            .map(|w| w.to_string())
            .collect();
        Self { words }
    }

    /// Load a newline-separated word file. Blank lines are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SweepError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SweepError::Vocabulary(format!("cannot read {}: {e}", path.display()))
        })?;
        let words = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Self::new(words)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}
