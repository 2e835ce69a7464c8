/// Trainer configuration file (JSON).
///
/// ```json
/// { "train": ["output-site8/", "output-site4/"], "folds": 10, "seed": 7 }
/// ```
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    /// Extraction directories making up the training set. Required.
    pub train: Vec<PathBuf>,
    /// Where `model.json` is read and written. Defaults to the first train dir.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    /// Fitted label encoder used to name sorted directories.
    #[serde(default = "default_label_encoder")]
    pub label_encoder: PathBuf,
    /// Seed for shuffling the training set.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_folds")]
    pub folds: usize,
    /// Probabilities above this are non-mangrove.
    #[serde(default = "default_threshold")]
    pub prediction_threshold: f32,
}

fn default_label_encoder() -> PathBuf {
    PathBuf::from("output/le.json")
}

fn default_seed() -> u64 {
    42
}

fn default_folds() -> usize {
    10
}

fn default_threshold() -> f32 {
    0.5
}

impl TrainConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.train.is_empty() {
            bail!("config key 'train' must list at least one directory");
        }
        if !(0.0..=1.0).contains(&self.prediction_threshold) {
            bail!("prediction_threshold must be within [0, 1], got {}", self.prediction_threshold);
        }
        Ok(())
    }

    pub fn model_dir(&self) -> &Path {
        self.model_dir.as_deref().unwrap_or(&self.train[0])
    }
}
