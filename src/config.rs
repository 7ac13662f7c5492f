//! Run configuration: model choice, dimensions, priors and schedule.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which generative model the sampler runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// First-order Bayesian HMM.
    Hmm,
    /// HMM whose content state draws words from document topics.
    HmmLda,
}

/// Dirichlet pseudocounts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// document-topic
    pub alpha: f64,
    /// topic-word
    pub beta: f64,
    /// state transition
    pub gamma: f64,
    /// state-word
    pub delta: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            beta: 0.01,
            gamma: 0.1,
            delta: 0.01,
        }
    }
}

/// Temperature per iteration. Weights are raised to `1 / temperature`
/// before each draw, so 1.0 is plain Gibbs sampling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnealSchedule {
    Constant {
        temperature: f64,
    },
    /// Start at `initial` and lower by `decrement` in equal blocks of
    /// iterations, never going below `target`.
    Stepped {
        initial: f64,
        target: f64,
        decrement: f64,
    },
}

impl Default for AnnealSchedule {
    fn default() -> Self {
        AnnealSchedule::Constant { temperature: 1.0 }
    }
}

impl AnnealSchedule {
    /// Temperature levels from `initial` down to `target`, at most one per iteration.
    fn steps(initial: f64, target: f64, decrement: f64, iterations: usize) -> usize {
        // float to int casts saturate, so a huge level count lands on usize::MAX
        let levels = ((initial - target) / decrement + 1e-9).floor() as usize;
        levels.saturating_add(1).min(iterations.max(1))
    }

    pub fn temperature(&self, iteration: usize, iterations: usize) -> f64 {
        match *self {
            AnnealSchedule::Constant { temperature } => temperature,
            AnnealSchedule::Stepped {
                initial,
                target,
                decrement,
            } => {
                let steps = Self::steps(initial, target, decrement, iterations);
                let block = iterations.div_ceil(steps).max(1);
                let step = iteration / block;
                (initial - decrement * step as f64).max(target)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            AnnealSchedule::Constant { temperature } if temperature > 0.0 => Ok(()),
            AnnealSchedule::Constant { temperature } => Err(Error::invalid_config(format!(
                "temperature must be positive, got {temperature}"
            ))),
            AnnealSchedule::Stepped {
                initial,
                target,
                decrement,
            } => {
                if target <= 0.0 || initial < target || decrement <= 0.0 {
                    return Err(Error::invalid_config(format!(
                        "stepped schedule needs initial >= target > 0 and decrement > 0, \
                         got initial={initial} target={target} decrement={decrement}"
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelKind,
    /// Number of hidden states, boundary state 0 included.
    pub states: usize,
    /// Number of topics; ignored by the plain HMM.
    pub topics: usize,
    pub iterations: usize,
    pub hyper: Hyperparameters,
    pub anneal: AnnealSchedule,
    /// Words reported per state and topic.
    pub top_n: usize,
    pub seed: u64,
    pub model_input: Option<PathBuf>,
    pub model_output: Option<PathBuf>,
    pub tabular_output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelKind::HmmLda,
            states: 10,
            topics: 5,
            iterations: 100,
            hyper: Hyperparameters::default(),
            anneal: AnnealSchedule::default(),
            top_n: 50,
            seed: 42,
            model_input: None,
            model_output: None,
            tabular_output: None,
        }
    }
}

impl Config {
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn states(mut self, states: usize) -> Self {
        self.states = states;
        self
    }

    pub fn topics(mut self, topics: usize) -> Self {
        self.topics = topics;
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn hyper(mut self, hyper: Hyperparameters) -> Self {
        self.hyper = hyper;
        self
    }

    pub fn anneal(mut self, anneal: AnnealSchedule) -> Self {
        self.anneal = anneal;
        self
    }

    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Snapshot to resume from in [`GibbsSampler::from_config`](crate::GibbsSampler::from_config).
    pub fn model_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_input = Some(path.into());
        self
    }

    pub fn model_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_output = Some(path.into());
        self
    }

    pub fn tabular_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.tabular_output = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.states < 2 {
            return Err(Error::invalid_config(format!(
                "need at least 2 states (boundary + 1), got {}",
                self.states
            )));
        }
        if self.model == ModelKind::HmmLda && self.topics == 0 {
            return Err(Error::invalid_config("HMM-LDA needs at least one topic"));
        }
        if self.top_n == 0 {
            return Err(Error::invalid_config("top_n must be positive"));
        }
        let h = &self.hyper;
        for (name, value) in [
            ("alpha", h.alpha),
            ("beta", h.beta),
            ("gamma", h.gamma),
            ("delta", h.delta),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(Error::invalid_config(format!(
                    "{name} must be a positive finite pseudocount, got {value}"
                )));
            }
        }
        self.anneal.validate()
    }
}
