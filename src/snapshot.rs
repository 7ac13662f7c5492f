//! Serializable model parameters.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Hyperparameters, ModelKind};
use crate::counts::{CountTable, TableKind, Tables};
use crate::error::{Error, Result};
use crate::lexicon::Lexicon;
use crate::model::{StateId, TopicId, CONTENT_STATE};
use crate::report::{normalize_rows, Report};

/// Everything needed to report on or resume a trained model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub kind: ModelKind,
    pub state_count: usize,
    /// 0 for the plain HMM.
    pub topic_count: usize,
    pub document_count: usize,
    pub hyper: Hyperparameters,
    /// Sweeps completed when the snapshot was taken.
    pub iterations: usize,
    pub vocabulary: Vec<String>,
    pub state_labels: Vec<StateId>,
    pub topic_labels: Option<Vec<TopicId>>,
    pub tables: Tables,
}

impl ModelSnapshot {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        log::info!("Saving model to {}", path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading model from {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        let snapshot: ModelSnapshot = serde_json::from_reader(reader)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Frozen lexicon with the snapshot's ids.
    pub fn lexicon(&self) -> Result<Lexicon> {
        Lexicon::from_words(self.vocabulary.clone())
    }

    /// Check that table shapes and label vectors agree with the dimensions.
    pub fn validate(&self) -> Result<()> {
        let w = self.vocabulary.len();
        let s = self.state_count;
        let k = self.topic_count;
        let d = self.document_count;
        check_shape(&self.tables.transitions, TableKind::Transitions, s, s)?;
        check_shape(&self.tables.state_word, TableKind::StateWord, s, w)?;

        match (self.kind, &self.tables.topic_word, &self.tables.document_topic) {
            (ModelKind::Hmm, None, None) => {
                if self.topic_labels.is_some() {
                    return Err(Error::snapshot_mismatch("HMM snapshot carries topic labels"));
                }
            }
            (ModelKind::HmmLda, Some(topic_word), Some(document_topic)) => {
                check_shape(topic_word, TableKind::TopicWord, k, w)?;
                check_shape(document_topic, TableKind::DocumentTopic, d, k)?;
                match &self.topic_labels {
                    Some(t) if t.len() == self.state_labels.len() => {}
                    _ => {
                        return Err(Error::snapshot_mismatch(
                            "topic labels missing or of the wrong length",
                        ))
                    }
                }
            }
            (kind, _, _) => {
                return Err(Error::snapshot_mismatch(format!(
                    "topic tables do not fit a {kind:?} model"
                )))
            }
        }
        Ok(())
    }

    /// State emission counts. For HMM-LDA the content state's row holds the
    /// topic-word counts summed over topics.
    fn state_emissions(&self) -> CountTable {
        let mut emissions = self.tables.state_word.clone();
        if let Some(topic_word) = &self.tables.topic_word {
            for topic in 0..topic_word.rows() {
                for (word, &n) in topic_word.row(topic).iter().enumerate() {
                    if n > 0 {
                        emissions.add(CONTENT_STATE, word, n);
                    }
                }
            }
        }
        emissions
    }

    /// Smoothed probabilities and top-`top_n` words per state and topic.
    /// Reads the counts only.
    ///
    /// State rows are smoothed with delta, except the HMM-LDA content state,
    /// whose counts come from the topic-word table and are smoothed with beta.
    pub fn normalize(&self, top_n: usize) -> Report {
        let hybrid = self.tables.topic_word.is_some();
        let (beta, delta) = (self.hyper.beta, self.hyper.delta);
        let states = normalize_rows(
            &self.state_emissions(),
            1..self.state_count,
            |r| if hybrid && r == CONTENT_STATE { beta } else { delta },
            top_n,
            "State",
            &self.vocabulary,
        );
        let topics = self
            .tables
            .topic_word
            .as_ref()
            .map(|tw| normalize_rows(tw, 0..tw.rows(), |_| beta, top_n, "Topic", &self.vocabulary))
            .unwrap_or_default();
        Report { states, topics }
    }

    /// One `name:value` line per model parameter.
    pub fn describe(&self) -> String {
        let w = self.vocabulary.len();
        let h = &self.hyper;
        let mut out = String::new();
        let _ = writeln!(out, "model:{:?}", self.kind);
        let _ = writeln!(out, "iterations:{}", self.iterations);
        let _ = writeln!(out, "stateS:{}", self.state_count);
        let _ = writeln!(out, "wordW:{w}");
        let _ = writeln!(out, "wordN:{}", self.state_labels.len());
        let _ = writeln!(out, "gamma:{:.6}", h.gamma);
        let _ = writeln!(out, "delta:{:.6}", h.delta);
        if self.kind == ModelKind::HmmLda {
            let _ = writeln!(out, "topicK:{}", self.topic_count);
            let _ = writeln!(out, "documentD:{}", self.document_count);
            let _ = writeln!(out, "alpha:{:.6}", h.alpha);
            let _ = writeln!(out, "beta:{:.6}", h.beta);
            let _ = writeln!(out, "wbeta:{:.6}", h.beta * w as f64);
        }
        out
    }
}

fn check_shape(table: &CountTable, kind: TableKind, rows: usize, cols: usize) -> Result<()> {
    if table.kind() != kind || table.rows() != rows || table.cols() != cols {
        return Err(Error::snapshot_mismatch(format!(
            "{kind} table should be {rows}x{cols}, found {} {}x{}",
            table.kind(),
            table.rows(),
            table.cols()
        )));
    }
    if !table.is_consistent() {
        return Err(Error::snapshot_mismatch(format!(
            "{kind} table row totals disagree with its cells"
        )));
    }
    Ok(())
}
