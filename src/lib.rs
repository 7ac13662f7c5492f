//! Unsupervised sequence labelling with Bayesian HMMs and HMM-LDA.
//!
//! Both models are inferred by collapsed Gibbs sampling: every word token
//! carries a hidden state (and, for HMM-LDA, a topic) that is resampled from
//! its exact conditional given all other tokens. The conditionals are read
//! straight off count tables that are kept as exact sufficient statistics.
//!
//! ```no_run
//! use hmmlda::{Config, Corpus, GibbsSampler, Lexicon, ModelKind};
//!
//! let mut lexicon = Lexicon::new();
//! let corpus = Corpus::from_texts(&["The cat sat. The dog ran."], &mut lexicon)?;
//! let config = Config::new(ModelKind::HmmLda).states(5).topics(2).iterations(50);
//! let mut gibbs = GibbsSampler::new(config, corpus, lexicon)?;
//! gibbs.train()?;
//! print!("{}", gibbs.report().to_tabulated_string());
//! # Ok::<(), hmmlda::Error>(())
//! ```

pub mod config;
pub mod corpus;
pub mod counts;
pub mod error;
pub mod gibbs;
pub mod lexicon;
pub mod model;
pub mod report;
pub mod sampler;
pub mod snapshot;

pub use crate::config::{AnnealSchedule, Config, Hyperparameters, ModelKind};
pub use crate::corpus::{Corpus, Token, EOS};
pub use crate::counts::{CountTable, TableKind, Tables};
pub use crate::error::{Error, Result};
pub use crate::gibbs::GibbsSampler;
pub use crate::lexicon::{Lexicon, WordId};
pub use crate::model::{Assignment, Cursor, GenerativeModel, BOUNDARY, CONTENT_STATE};
pub use crate::report::{Column, Report};
pub use crate::sampler::{anneal, categorical_index, categorical_index_with_total, Sampler};
pub use crate::snapshot::ModelSnapshot;

/// HMM-LDA over raw texts with small default dimensions, ready to train.
pub fn default(docs_raw: &[&str]) -> Result<GibbsSampler> {
    let mut lexicon = Lexicon::new();
    let corpus = Corpus::from_texts(docs_raw, &mut lexicon)?;
    let config = Config::new(ModelKind::HmmLda).states(6).topics(3).top_n(8);
    GibbsSampler::new(config, corpus, lexicon)
}
