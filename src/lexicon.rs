//! Bidirectional mapping between surface tokens and dense word ids.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Dense lexicon id.
pub type WordId = usize;

/// Grows while the training corpus is ingested, then gets frozen.
///
/// Ids are handed out in insertion order, so id `k` existing implies
/// every id in `0..k` exists.
#[derive(Clone, Debug, Default)]
pub struct Lexicon {
    words: Vec<String>,
    index: HashMap<String, WordId>,
    frozen: bool,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a frozen lexicon from a word list where position = id.
    pub fn from_words(words: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(words.len());
        for (id, w) in words.iter().enumerate() {
            if index.insert(w.clone(), id).is_some() {
                return Err(Error::DuplicateToken(w.clone()));
            }
        }
        Ok(Self {
            words,
            index,
            frozen: true,
        })
    }

    /// Id of `token`, assigning the next free id if it is new.
    ///
    /// Fails with [`Error::UnknownToken`] once the lexicon is frozen.
    pub fn id_of(&mut self, token: &str) -> Result<WordId> {
        if let Some(&id) = self.index.get(token) {
            return Ok(id);
        }
        if self.frozen {
            return Err(Error::UnknownToken(token.to_string()));
        }
        let id = self.words.len();
        self.words.push(token.to_string());
        self.index.insert(token.to_string(), id);
        Ok(id)
    }

    /// Lookup without growth.
    pub fn get(&self, token: &str) -> Option<WordId> {
        self.index.get(token).copied()
    }

    pub fn token_of(&self, id: WordId) -> Result<&str> {
        self.words
            .get(id)
            .map(String::as_str)
            .ok_or(Error::UnknownId(id))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Unfrozen copy for test-time data. Every existing id keeps its token;
    /// new tokens get ids from `len()` upward.
    pub fn extended(&self) -> Self {
        Self {
            words: self.words.clone(),
            index: self.index.clone(),
            frozen: false,
        }
    }

    /// Tokens in id order.
    pub fn words(&self) -> &[String] {
        &self.words
    }
}
