//! Generative models resampled by the Gibbs sweep.
//!
//! A model owns the per-token labels and the count tables that are their
//! exact sufficient statistics. The sweep drives it through three steps per
//! token:
//! 1. [`GenerativeModel::retract`] removes the token's current assignment
//!    (emission, incoming and outgoing transition) from the counts.
//! 2. [`GenerativeModel::conditional`] fills one unnormalized weight per
//!    candidate assignment from the remaining counts.
//! 3. [`GenerativeModel::commit`] records the drawn assignment, undoing
//!    exactly what `retract` did.
//!
//! State 0 is the boundary state carried by EOS markers. It is never a
//! candidate.

use crate::config::{Config, Hyperparameters, ModelKind};
use crate::corpus::{Corpus, Token};
use crate::counts::{CountTable, TableKind, Tables};
use crate::error::{Error, Result};

pub type StateId = usize;
pub type TopicId = usize;

/// State carried by EOS markers and implied before every sequence.
pub const BOUNDARY: StateId = 0;

/// HMM-LDA state whose words are drawn from the document's topics.
pub const CONTENT_STATE: StateId = 1;

/// Latent labels of one token. `topic` is always 0 for the plain HMM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub state: StateId,
    pub topic: TopicId,
}

impl Assignment {
    pub fn state(state: StateId) -> Self {
        Self { state, topic: 0 }
    }
}

/// Neighbourhood of the token being resampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    /// State of the preceding token, [`BOUNDARY`] at a sequence start.
    pub previous: StateId,
    /// State of the following token if one exists ([`BOUNDARY`] for EOS).
    /// `None` means no outgoing transition is counted for this token.
    pub next: Option<StateId>,
}

impl Cursor {
    pub fn start() -> Self {
        Self {
            previous: BOUNDARY,
            next: None,
        }
    }
}

pub trait GenerativeModel {
    fn kind(&self) -> ModelKind;

    /// Number of candidate assignments for a word token.
    fn candidates(&self) -> usize;

    /// Assignment behind candidate `index` of [`conditional`](Self::conditional).
    fn candidate(&self, index: usize) -> Assignment;

    fn assignment(&self, position: usize) -> Assignment;

    fn retract(&mut self, token: &Token, cursor: &Cursor) -> Result<Assignment>;

    /// Write one weight per candidate into `weights` (len = `candidates()`).
    fn conditional(&self, token: &Token, cursor: &Cursor, weights: &mut [f64]);

    fn commit(&mut self, token: &Token, cursor: &Cursor, assignment: Assignment) -> Result<()>;

    /// Count the transition into an EOS marker and pin it to [`BOUNDARY`].
    fn close_sequence(&mut self, token: &Token, previous: StateId);

    fn states(&self) -> &[StateId];

    fn topics(&self) -> Option<&[TopicId]>;

    fn count_tables(&self) -> Vec<&CountTable>;

    /// Owned copy of every count table.
    fn tables(&self) -> Tables;
}

/// Build the configured model with empty counts, sized for `corpus`.
pub fn build_model(config: &Config, corpus: &Corpus, vocabulary: usize) -> Box<dyn GenerativeModel> {
    match config.model {
        ModelKind::Hmm => Box::new(StateHmm::new(
            config.states,
            vocabulary,
            corpus.len(),
            config.hyper,
        )),
        ModelKind::HmmLda => Box::new(HmmLda::new(
            config.states,
            config.topics,
            vocabulary,
            corpus.document_count(),
            corpus.len(),
            config.hyper,
        )),
    }
}

/// Model for `corpus` whose tables start from the counts in `base`.
///
/// Word tables are widened to `vocabulary` columns and the document-topic
/// table is sized fresh for `corpus`, so `base` only needs the state and
/// topic dimensions of `config`. Tokens of `corpus` are counted on top of
/// `base` as they are placed.
pub fn build_model_over(
    config: &Config,
    corpus: &Corpus,
    base: &Tables,
    vocabulary: usize,
) -> Result<Box<dyn GenerativeModel>> {
    let states = config.states;
    if base.transitions.rows() != states || base.state_word.rows() != states {
        return Err(Error::snapshot_mismatch(format!(
            "base counts have {} states, model has {states}",
            base.transitions.rows()
        )));
    }
    if base.state_word.cols() > vocabulary {
        return Err(Error::snapshot_mismatch(format!(
            "base counts cover {} words, lexicon has only {vocabulary}",
            base.state_word.cols()
        )));
    }
    let chain = StateHmm {
        hyper: config.hyper,
        states: vec![BOUNDARY; corpus.len()],
        transitions: base.transitions.clone(),
        state_word: base.state_word.widened(vocabulary),
    };
    match config.model {
        ModelKind::Hmm => Ok(Box::new(chain)),
        ModelKind::HmmLda => {
            let topic_word = match &base.topic_word {
                Some(t) if t.rows() == config.topics && t.cols() <= vocabulary => {
                    t.widened(vocabulary)
                }
                _ => {
                    return Err(Error::snapshot_mismatch(format!(
                        "base counts lack a topic-word table for {} topics",
                        config.topics
                    )))
                }
            };
            Ok(Box::new(HmmLda {
                chain,
                topic_labels: vec![0; corpus.len()],
                topic_word,
                document_topic: CountTable::new(
                    TableKind::DocumentTopic,
                    corpus.document_count(),
                    config.topics,
                ),
            }))
        }
    }
}

#[inline]
fn smoothed(table: &CountTable, row: usize, col: usize, pseudo: f64) -> f64 {
    (table.get(row, col) as f64 + pseudo) / (table.row_total(row) as f64 + table.cols() as f64 * pseudo)
}

/// First-order Bayesian HMM over states 1..S.
#[derive(Clone, Debug)]
pub struct StateHmm {
    hyper: Hyperparameters,
    states: Vec<StateId>,
    transitions: CountTable,
    state_word: CountTable,
}

impl StateHmm {
    pub fn new(states: usize, vocabulary: usize, tokens: usize, hyper: Hyperparameters) -> Self {
        Self {
            hyper,
            states: vec![BOUNDARY; tokens],
            transitions: CountTable::new(TableKind::Transitions, states, states),
            state_word: CountTable::new(TableKind::StateWord, states, vocabulary),
        }
    }

    fn state_count(&self) -> usize {
        self.transitions.rows()
    }

    /// Incoming times outgoing transition term for candidate `state`.
    fn transition_weight(&self, cursor: &Cursor, state: StateId) -> f64 {
        let t = &self.transitions;
        let gamma = self.hyper.gamma;
        let incoming = smoothed(t, cursor.previous, state, gamma);
        match cursor.next {
            None => incoming,
            Some(next) => {
                // the candidate's own incoming transition is not in the
                // counts yet but would precede the outgoing one
                let self_loop = cursor.previous == state;
                let numer_bump = if self_loop && state == next { 1.0 } else { 0.0 };
                let denom_bump = if self_loop { 1.0 } else { 0.0 };
                incoming * (t.get(state, next) as f64 + gamma + numer_bump)
                    / (t.row_total(state) as f64 + t.cols() as f64 * gamma + denom_bump)
            }
        }
    }

    fn retract_transitions(&mut self, cursor: &Cursor, state: StateId) -> Result<()> {
        self.transitions.decrement(cursor.previous, state)?;
        if let Some(next) = cursor.next {
            self.transitions.decrement(state, next)?;
        }
        Ok(())
    }

    fn commit_transitions(&mut self, cursor: &Cursor, state: StateId) {
        self.transitions.increment(cursor.previous, state);
        if let Some(next) = cursor.next {
            self.transitions.increment(state, next);
        }
    }
}

impl GenerativeModel for StateHmm {
    fn kind(&self) -> ModelKind {
        ModelKind::Hmm
    }

    fn candidates(&self) -> usize {
        self.state_count() - 1
    }

    fn candidate(&self, index: usize) -> Assignment {
        Assignment::state(index + 1)
    }

    fn assignment(&self, position: usize) -> Assignment {
        Assignment::state(self.states[position])
    }

    fn retract(&mut self, token: &Token, cursor: &Cursor) -> Result<Assignment> {
        let state = self.states[token.position];
        self.retract_transitions(cursor, state)?;
        self.state_word.decrement(state, token.word)?;
        Ok(Assignment::state(state))
    }

    fn conditional(&self, token: &Token, cursor: &Cursor, weights: &mut [f64]) {
        for (i, weight) in weights.iter_mut().enumerate() {
            let state = i + 1;
            *weight = smoothed(&self.state_word, state, token.word, self.hyper.delta)
                * self.transition_weight(cursor, state);
        }
    }

    fn commit(&mut self, token: &Token, cursor: &Cursor, assignment: Assignment) -> Result<()> {
        let state = assignment.state;
        self.commit_transitions(cursor, state);
        self.state_word.increment(state, token.word);
        self.states[token.position] = state;
        Ok(())
    }

    fn close_sequence(&mut self, token: &Token, previous: StateId) {
        self.transitions.increment(previous, BOUNDARY);
        self.states[token.position] = BOUNDARY;
    }

    fn states(&self) -> &[StateId] {
        &self.states
    }

    fn topics(&self) -> Option<&[TopicId]> {
        None
    }

    fn count_tables(&self) -> Vec<&CountTable> {
        vec![&self.transitions, &self.state_word]
    }

    fn tables(&self) -> Tables {
        Tables {
            transitions: self.transitions.clone(),
            state_word: self.state_word.clone(),
            topic_word: None,
            document_topic: None,
        }
    }
}

/// HMM whose [`CONTENT_STATE`] emits through document topics.
///
/// States 2..S are syntactic and emit through the state-word table. Only
/// tokens in the content state are counted in the topic-word and
/// document-topic tables; the topic label of any other token is carried but
/// unconstrained by the counts.
#[derive(Clone, Debug)]
pub struct HmmLda {
    chain: StateHmm,
    topic_labels: Vec<TopicId>,
    topic_word: CountTable,
    document_topic: CountTable,
}

impl HmmLda {
    pub fn new(
        states: usize,
        topics: usize,
        vocabulary: usize,
        documents: usize,
        tokens: usize,
        hyper: Hyperparameters,
    ) -> Self {
        Self {
            chain: StateHmm::new(states, vocabulary, tokens, hyper),
            topic_labels: vec![0; tokens],
            topic_word: CountTable::new(TableKind::TopicWord, topics, vocabulary),
            document_topic: CountTable::new(TableKind::DocumentTopic, documents, topics),
        }
    }

    fn topic_count(&self) -> usize {
        self.topic_word.rows()
    }
}

impl GenerativeModel for HmmLda {
    fn kind(&self) -> ModelKind {
        ModelKind::HmmLda
    }

    fn candidates(&self) -> usize {
        (self.chain.state_count() - 1) * self.topic_count()
    }

    fn candidate(&self, index: usize) -> Assignment {
        let k = self.topic_count();
        Assignment {
            state: index / k + 1,
            topic: index % k,
        }
    }

    fn assignment(&self, position: usize) -> Assignment {
        Assignment {
            state: self.chain.states[position],
            topic: self.topic_labels[position],
        }
    }

    fn retract(&mut self, token: &Token, cursor: &Cursor) -> Result<Assignment> {
        let old = self.assignment(token.position);
        self.chain.retract_transitions(cursor, old.state)?;
        if old.state == CONTENT_STATE {
            self.topic_word.decrement(old.topic, token.word)?;
            self.document_topic.decrement(token.document, old.topic)?;
        } else {
            self.chain.state_word.decrement(old.state, token.word)?;
        }
        Ok(old)
    }

    fn conditional(&self, token: &Token, cursor: &Cursor, weights: &mut [f64]) {
        let k = self.topic_count();
        let hyper = &self.chain.hyper;
        let doc = token.document;
        // alpha > 0 keeps this positive for documents with no content tokens
        let doc_norm = self.document_topic.row_total(doc) as f64 + k as f64 * hyper.alpha;

        for (s, row) in weights.chunks_mut(k).enumerate() {
            let state = s + 1;
            let transition = self.chain.transition_weight(cursor, state);
            let syntactic = if state == CONTENT_STATE {
                None
            } else {
                Some(smoothed(&self.chain.state_word, state, token.word, hyper.delta))
            };
            for (topic, weight) in row.iter_mut().enumerate() {
                let doc_term = (self.document_topic.get(doc, topic) as f64 + hyper.alpha) / doc_norm;
                let emission = match syntactic {
                    Some(e) => e,
                    None => smoothed(&self.topic_word, topic, token.word, hyper.beta),
                };
                *weight = doc_term * emission * transition;
            }
        }
    }

    fn commit(&mut self, token: &Token, cursor: &Cursor, assignment: Assignment) -> Result<()> {
        let Assignment { state, topic } = assignment;
        self.chain.commit_transitions(cursor, state);
        if state == CONTENT_STATE {
            self.topic_word.increment(topic, token.word);
            self.document_topic.increment(token.document, topic);
        } else {
            self.chain.state_word.increment(state, token.word);
        }
        self.chain.states[token.position] = state;
        self.topic_labels[token.position] = topic;
        Ok(())
    }

    fn close_sequence(&mut self, token: &Token, previous: StateId) {
        self.chain.close_sequence(token, previous);
        self.topic_labels[token.position] = 0;
    }

    fn states(&self) -> &[StateId] {
        &self.chain.states
    }

    fn topics(&self) -> Option<&[TopicId]> {
        Some(&self.topic_labels)
    }

    fn count_tables(&self) -> Vec<&CountTable> {
        let mut tables = self.chain.count_tables();
        tables.push(&self.topic_word);
        tables.push(&self.document_topic);
        tables
    }

    fn tables(&self) -> Tables {
        Tables {
            topic_word: Some(self.topic_word.clone()),
            document_topic: Some(self.document_topic.clone()),
            ..self.chain.tables()
        }
    }
}
