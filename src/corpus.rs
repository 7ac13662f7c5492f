//! Token stream built once from tokenized documents.

use crate::error::Result;
use crate::lexicon::{Lexicon, WordId};

/// Word id carried by end-of-sequence markers. Never issued by a [`Lexicon`].
pub const EOS: WordId = WordId::MAX;

/// One position of the token stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub position: usize,
    pub word: WordId,
    pub document: usize,
    pub sentence: usize,
}

impl Token {
    pub fn is_eos(&self) -> bool {
        self.word == EOS
    }
}

/// Immutable token stream in corpus order, EOS markers included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Corpus {
    words: Vec<WordId>,
    documents: Vec<usize>,
    sentences: Vec<usize>,
    document_count: usize,
    sentence_count: usize,
}

impl Corpus {
    pub fn builder(lexicon: &mut Lexicon) -> CorpusBuilder<'_> {
        CorpusBuilder {
            lexicon,
            corpus: Corpus::default(),
            open_document: false,
        }
    }

    /// Split raw documents into sentences and lowercased words.
    pub fn from_texts(texts: &[&str], lexicon: &mut Lexicon) -> Result<Self> {
        let mut builder = Corpus::builder(lexicon);
        for text in texts {
            builder.document();
            for sentence in split_sentences(text) {
                builder.sequence(sentence.split_whitespace())?;
            }
        }
        Ok(builder.build())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn token(&self, position: usize) -> Token {
        Token {
            position,
            word: self.words[position],
            document: self.documents[position],
            sentence: self.sentences[position],
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        (0..self.len()).map(|i| self.token(i))
    }

    pub fn words(&self) -> &[WordId] {
        &self.words
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn sentence_count(&self) -> usize {
        self.sentence_count
    }

    /// Tokens that are not EOS markers.
    pub fn word_token_count(&self) -> usize {
        self.words.iter().filter(|&&w| w != EOS).count()
    }
}

pub struct CorpusBuilder<'a> {
    lexicon: &'a mut Lexicon,
    corpus: Corpus,
    open_document: bool,
}

impl CorpusBuilder<'_> {
    /// Start a new document. Sequences pushed before the first call land in
    /// document 0.
    pub fn document(&mut self) -> &mut Self {
        if self.open_document {
            self.corpus.document_count += 1;
        }
        self.open_document = true;
        self
    }

    /// Append one sequence of raw words followed by an EOS marker.
    pub fn sequence<'w, I>(&mut self, words: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = &'w str>,
    {
        for raw in words {
            let word = normalize_word(raw);
            if !word.is_empty() {
                self.push(&word)?;
            }
        }
        self.close_sequence();
        Ok(self)
    }

    /// Like [`sequence`](Self::sequence) for `(word, tag)` lines. Words whose
    /// tag does not start with a word character are punctuation and dropped.
    pub fn tagged_sequence<'w, I>(&mut self, lines: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (&'w str, &'w str)>,
    {
        for (raw, tag) in lines {
            if !tag.chars().next().is_some_and(is_word_char) {
                continue;
            }
            let word = normalize_word(raw);
            if !word.is_empty() {
                self.push(&word)?;
            }
        }
        self.close_sequence();
        Ok(self)
    }

    fn push(&mut self, word: &str) -> Result<()> {
        self.open_document = true;
        let id = self.lexicon.id_of(word)?;
        self.corpus.words.push(id);
        self.corpus.documents.push(self.corpus.document_count);
        self.corpus.sentences.push(self.corpus.sentence_count);
        Ok(())
    }

    fn close_sequence(&mut self) {
        self.open_document = true;
        self.corpus.words.push(EOS);
        self.corpus.documents.push(self.corpus.document_count);
        self.corpus.sentences.push(self.corpus.sentence_count);
        self.corpus.sentence_count += 1;
    }

    pub fn build(self) -> Corpus {
        let mut corpus = self.corpus;
        if self.open_document {
            corpus.document_count += 1;
        }
        corpus
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Strip leading and trailing non-word characters. Tokens made only of
/// non-word characters normalize to an empty string.
pub fn normalize_word(raw: &str) -> String {
    raw.trim_matches(|c: char| !is_word_char(c)).to_string()
}

fn split_sentences(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(['.', '!', '?', ';'])
        .map(str::trim)
        .filter(|s| s.split_whitespace().any(|w| !normalize_word(w).is_empty()))
        .map(str::to_string)
        .collect()
}
