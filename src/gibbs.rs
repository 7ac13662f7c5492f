//! Collapsed Gibbs sweep over the token stream.

use std::fs::File;
use std::io::{BufWriter, Write};

use crate::config::Config;
use crate::corpus::{Corpus, Token};
use crate::counts::Tables;
use crate::error::{Error, Result};
use crate::lexicon::Lexicon;
use crate::model::{
    build_model, build_model_over, Assignment, Cursor, GenerativeModel, StateId, BOUNDARY,
};
use crate::report::Report;
use crate::sampler::Sampler;
use crate::snapshot::ModelSnapshot;

/// Drives a [`GenerativeModel`] over a fixed corpus.
///
/// Tokens are resampled strictly in corpus order: every update reads the
/// counts written by the update before it.
pub struct GibbsSampler {
    config: Config,
    corpus: Corpus,
    lexicon: Lexicon,
    model: Box<dyn GenerativeModel>,
    sampler: Sampler,
    weights: Vec<f64>,
    iterations_done: usize,
}

impl GibbsSampler {
    /// Allocate the configured model for `corpus` and assign every word token
    /// a uniformly random candidate. Freezes `lexicon`.
    pub fn new(config: Config, corpus: Corpus, mut lexicon: Lexicon) -> Result<Self> {
        config.validate()?;
        lexicon.freeze();
        let model = build_model(&config, &corpus, lexicon.len());
        let mut gibbs = Self::assemble(config, corpus, lexicon, model);
        gibbs.scatter()?;

        log::info!(
            "Initialized {:?} with {} states over {} tokens ({} words, {} documents)",
            gibbs.config.model,
            gibbs.config.states,
            gibbs.corpus.len(),
            gibbs.lexicon.len(),
            gibbs.corpus.document_count()
        );
        Ok(gibbs)
    }

    /// Resume from `config.model_input` when it is set, else start fresh.
    ///
    /// A resumed run takes its vocabulary from the snapshot, so `lexicon` is
    /// only used for a fresh start.
    pub fn from_config(config: Config, corpus: Corpus, lexicon: Lexicon) -> Result<Self> {
        match &config.model_input {
            Some(path) => {
                log::info!("Loading model from {}", path.display());
                let snapshot = ModelSnapshot::load(path)?;
                Self::resume(config, corpus, &snapshot)
            }
            None => Self::new(config, corpus, lexicon),
        }
    }

    /// Sampler over unseen documents on top of the trained counts.
    ///
    /// `corpus` must be built against `lexicon`, an extension of this
    /// sampler's lexicon (see [`Lexicon::extended`]), so known words keep
    /// their ids and new ones get fresh columns. The trained transition and
    /// emission counts are copied as a fixed base; the document-topic table
    /// is fresh for the new documents. Only the new tokens are resampled.
    ///
    /// The base counts are not recoverable from the new labels alone, so a
    /// snapshot of the returned sampler cannot be resumed.
    pub fn held_out(&self, corpus: Corpus, mut lexicon: Lexicon) -> Result<Self> {
        let known = self.lexicon.words();
        if lexicon.len() < known.len() || lexicon.words()[..known.len()] != *known {
            return Err(Error::snapshot_mismatch(
                "held-out lexicon does not extend the training lexicon",
            ));
        }
        lexicon.freeze();
        let config = self.config.clone();
        let model = build_model_over(&config, &corpus, &self.model.tables(), lexicon.len())?;
        let mut gibbs = Self::assemble(config, corpus, lexicon, model);
        gibbs.scatter()?;

        log::info!(
            "Initialized held-out {:?} over {} tokens ({} new words, {} documents)",
            gibbs.config.model,
            gibbs.corpus.len(),
            gibbs.lexicon.len() - known.len(),
            gibbs.corpus.document_count()
        );
        Ok(gibbs)
    }

    /// Continue from `snapshot` on the corpus it was trained on.
    ///
    /// Model kind, dimensions and priors come from the snapshot; iterations,
    /// schedule, seed and output settings from `config`. Counts are rebuilt
    /// from the stored labels and must equal the stored tables.
    pub fn resume(config: Config, corpus: Corpus, snapshot: &ModelSnapshot) -> Result<Self> {
        snapshot.validate()?;
        let lexicon = snapshot.lexicon()?;
        let config = Config {
            model: snapshot.kind,
            states: snapshot.state_count,
            topics: snapshot.topic_count,
            hyper: snapshot.hyper,
            ..config
        };
        config.validate()?;

        if snapshot.state_labels.len() != corpus.len() {
            return Err(Error::snapshot_mismatch(format!(
                "snapshot labels {} tokens, corpus has {}",
                snapshot.state_labels.len(),
                corpus.len()
            )));
        }
        if snapshot.document_count != corpus.document_count() {
            return Err(Error::snapshot_mismatch(format!(
                "snapshot has {} documents, corpus has {}",
                snapshot.document_count,
                corpus.document_count()
            )));
        }
        let labels = snapshot_labels(snapshot, &corpus)?;

        let model = build_model(&config, &corpus, lexicon.len());
        let mut gibbs = Self::assemble(config, corpus, lexicon, model);
        gibbs.place(&labels)?;
        if gibbs.model.tables() != snapshot.tables {
            return Err(Error::snapshot_mismatch(
                "stored counts do not match the stored labels",
            ));
        }
        gibbs.iterations_done = snapshot.iterations;
        log::info!(
            "Resumed {:?} after {} iterations",
            gibbs.config.model,
            gibbs.iterations_done
        );
        Ok(gibbs)
    }

    fn assemble(
        config: Config,
        corpus: Corpus,
        lexicon: Lexicon,
        model: Box<dyn GenerativeModel>,
    ) -> Self {
        let weights = vec![0.0; model.candidates()];
        Self {
            sampler: Sampler::seeded(config.seed),
            config,
            corpus,
            lexicon,
            model,
            weights,
            iterations_done: 0,
        }
    }

    /// Place a uniformly random candidate on every word token.
    fn scatter(&mut self) -> Result<()> {
        let candidates = self.model.candidates();
        let labels: Vec<Assignment> = self
            .corpus
            .tokens()
            .map(|token| {
                if token.is_eos() {
                    Assignment::state(BOUNDARY)
                } else {
                    self.model.candidate(self.sampler.uniform_index(candidates))
                }
            })
            .collect();
        self.place(&labels)
    }

    /// Count `labels` into the model in corpus order. Each token only
    /// adds its incoming transition; the outgoing one is its successor's
    /// incoming transition.
    fn place(&mut self, labels: &[Assignment]) -> Result<()> {
        let mut previous = BOUNDARY;
        for token in self.corpus.tokens() {
            if token.is_eos() {
                self.model.close_sequence(&token, previous);
                previous = BOUNDARY;
            } else {
                let assignment = labels[token.position];
                let cursor = Cursor {
                    previous,
                    next: None,
                };
                self.model.commit(&token, &cursor, assignment)?;
                previous = assignment.state;
            }
        }
        Ok(())
    }

    /// Run `config.iterations` sweeps under the configured schedule.
    pub fn train(&mut self) -> Result<()> {
        let iterations = self.config.iterations;
        let schedule = self.config.anneal;
        self.train_with_schedule(iterations, |it| schedule.temperature(it, iterations))
    }

    /// Run `iterations` sweeps, annealing sweep `i` at `temperature(i)`.
    pub fn train_with_schedule<F>(&mut self, iterations: usize, temperature: F) -> Result<()>
    where
        F: Fn(usize) -> f64,
    {
        log::info!(
            "Training {:?}: {} iterations over {} tokens",
            self.config.model,
            iterations,
            self.corpus.len()
        );
        let mut current: Option<f64> = None;
        for it in 0..iterations {
            let t = temperature(it);
            if !(t > 0.0 && t.is_finite()) {
                return Err(Error::invalid_config(format!(
                    "temperature at iteration {it} must be positive, got {t}"
                )));
            }
            if current != Some(t) {
                log::info!("Annealing at temperature {t}");
                current = Some(t);
            }
            self.sweep(t)?;
            self.iterations_done += 1;
            if (it + 1) % 10 == 0 || it + 1 == iterations {
                log::debug!("Training: iteration {}/{}", it + 1, iterations);
            }
        }
        log::info!("Training done after {} iterations", self.iterations_done);
        Ok(())
    }

    /// One full pass: resample every word token once.
    pub fn sweep(&mut self, temperature: f64) -> Result<()> {
        let mut previous = BOUNDARY;
        for position in 0..self.corpus.len() {
            let token = self.corpus.token(position);
            if token.is_eos() {
                // its incoming transition moved with the predecessor's commit
                debug_assert_eq!(self.model.assignment(position).state, BOUNDARY);
                previous = BOUNDARY;
                continue;
            }
            let cursor = Cursor {
                previous,
                next: self.successor(position),
            };
            previous = self.resample(&token, &cursor, temperature)?.state;
        }
        debug_assert!(self.is_consistent());
        Ok(())
    }

    fn resample(&mut self, token: &Token, cursor: &Cursor, temperature: f64) -> Result<Assignment> {
        self.model.retract(token, cursor)?;
        self.model.conditional(token, cursor, &mut self.weights);
        let index = self.sampler.draw_annealed(&mut self.weights, temperature)?;
        let drawn = self.model.candidate(index);
        self.model.commit(token, cursor, drawn)?;
        Ok(drawn)
    }

    fn successor(&self, position: usize) -> Option<StateId> {
        let next = position + 1;
        (next < self.corpus.len()).then(|| self.model.assignment(next).state)
    }

    /// Cursor the sweep would build for `position` given the current labels.
    pub fn cursor_at(&self, position: usize) -> Cursor {
        let previous = match position {
            0 => BOUNDARY,
            p => self.model.assignment(p - 1).state,
        };
        Cursor {
            previous,
            next: self.successor(position),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn model(&self) -> &dyn GenerativeModel {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn GenerativeModel {
        self.model.as_mut()
    }

    pub fn iterations_done(&self) -> usize {
        self.iterations_done
    }

    pub fn tables(&self) -> Tables {
        self.model.tables()
    }

    /// Row totals agree with their cells in every table.
    pub fn is_consistent(&self) -> bool {
        self.model.count_tables().iter().all(|t| t.is_consistent())
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            kind: self.config.model,
            state_count: self.config.states,
            topic_count: self.model.topics().map_or(0, |_| self.config.topics),
            document_count: self.corpus.document_count(),
            hyper: self.config.hyper,
            iterations: self.iterations_done,
            vocabulary: self.lexicon.words().to_vec(),
            state_labels: self.model.states().to_vec(),
            topic_labels: self.model.topics().map(<[_]>::to_vec),
            tables: self.model.tables(),
        }
    }

    /// Normalized top-`config.top_n` report of the current counts.
    pub fn report(&self) -> Report {
        self.snapshot().normalize(self.config.top_n)
    }

    /// Save the snapshot and the tabulated report where the config asks for them.
    pub fn write_outputs(&self) -> Result<()> {
        let snapshot = self.snapshot();
        if let Some(path) = &self.config.model_output {
            snapshot.save(path)?;
        }
        if let Some(path) = &self.config.tabular_output {
            log::info!("Writing tabulated output to {}", path.display());
            let mut out = BufWriter::new(File::create(path)?);
            snapshot.normalize(self.config.top_n).write_tabulated(&mut out)?;
            out.flush()?;
        }
        Ok(())
    }
}

fn snapshot_labels(snapshot: &ModelSnapshot, corpus: &Corpus) -> Result<Vec<Assignment>> {
    let topics = snapshot.topic_labels.as_deref();
    corpus
        .tokens()
        .map(|token| {
            let state = snapshot.state_labels[token.position];
            let topic = topics.map_or(0, |t| t.get(token.position).copied().unwrap_or(usize::MAX));
            let valid = if token.is_eos() {
                state == BOUNDARY
            } else {
                (1..snapshot.state_count).contains(&state)
                    && (topics.is_none() || topic < snapshot.topic_count)
                    && token.word < snapshot.vocabulary.len()
            };
            if !valid {
                return Err(Error::snapshot_mismatch(format!(
                    "invalid labels at token {}: state {state}, topic {topic}",
                    token.position
                )));
            }
            Ok(Assignment { state, topic })
        })
        .collect()
}
