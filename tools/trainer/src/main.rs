//! Trainer / evaluator / sorter over pre-extracted tile features.
//!
//! One run mode per invocation:
//!   train           fit a model on the training set and save it (default)
//!   validate        score predictions on the test set (water-aware when the
//!                   ground truth has water)
//!   sort            move unlabeled files into predicted-label directories
//!   cross-validate  k-fold accuracy over the training set
//!   analyze         cumulative explained variance of the training features
//! `--retrain` fits a fresh model before any mode and saves it afterwards.
mod config;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::{Builder, Env};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use mangrove_core::artifact::MODEL_FILE;
use mangrove_core::crossval::{cross_validate, KFold};
use mangrove_core::dataset::{load_features, load_fnames, load_predictions, Dataset};
use mangrove_core::model::{Classifier, LabelEncoder, NearestCentroid, Precomputed};
use mangrove_core::pca::{cumulative, explained_variance_ratio};
use mangrove_core::sort::sort_files;
use mangrove_core::{evaluate, Evaluation, PipelineError};

use crate::config::TrainConfig;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RunMode {
    Train,
    Validate,
    Sort,
    CrossValidate,
    Analyze,
}

#[derive(Parser, Debug)]
#[command(name = "trainer", about = "Fit, evaluate and apply the mangrove tile classifier")]
struct Args {
    /// JSON config file (see `TrainConfig`).
    #[arg(long)]
    cfg: PathBuf,

    /// Test extraction directory (features.json, labels.json, fnames.json).
    #[arg(long)]
    test: PathBuf,

    /// What to do.
    #[arg(long, value_enum, default_value_t = RunMode::Train)]
    mode: RunMode,

    /// Fit a new model instead of loading model.json.
    #[arg(short, long)]
    retrain: bool,

    /// Directory of unlabeled images (sort mode).
    #[arg(long)]
    indir: Option<PathBuf>,

    /// Directory to receive sorted images (sort mode; defaults to --indir).
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

// ── Run context ──────────────────────────────────────────────────────────────

struct Run {
    cfg: TrainConfig,
    test_dir: PathBuf,
    train: Dataset,
    model: Option<NearestCentroid>,
}

impl Run {
    fn prepare(cfg: TrainConfig, test_dir: PathBuf, fit: bool) -> Result<Self> {
        let mut train = Dataset::load_dirs(&cfg.train).context("loading training set")?;
        train.shuffle(cfg.seed);
        info!(
            "Training set: {} rows x {} features from {} dirs",
            train.len(),
            train.feature_width(),
            cfg.train.len()
        );

        let model = if fit {
            let mut model = NearestCentroid::new();
            model.fit(&train.features, &train.binarized_labels())?;
            info!("Fitted a new model");
            Some(model)
        } else {
            None
        };

        Ok(Self { cfg, test_dir, train, model })
    }

    fn model_path(&self) -> PathBuf {
        self.cfg.model_dir().join(MODEL_FILE)
    }

    /// The freshly fitted model, or the saved one.
    fn model(&self) -> Result<Cow<'_, NearestCentroid>> {
        match &self.model {
            Some(m) => Ok(Cow::Borrowed(m)),
            None => {
                let path = self.model_path();
                let model = NearestCentroid::load(&path)
                    .with_context(|| format!("loading model {}", path.display()))?;
                Ok(Cow::Owned(model))
            }
        }
    }

    /// Predicted binary labels for the test features. Probabilities written
    /// by the external network take precedence over the in-tree model, which
    /// is then never loaded.
    fn predict_test(&self, features: &[Vec<f32>]) -> Result<Vec<u8>> {
        let threshold = self.cfg.prediction_threshold;
        match load_predictions(&self.test_dir)? {
            Some(proba) => {
                info!("Using external predictions from {}", self.test_dir.display());
                Ok(Precomputed { proba }.predict(features, threshold)?)
            }
            None => Ok(self.model()?.predict(features, threshold)?),
        }
    }

    /// Binary accuracy (percent) of the fitted model on the test set, or
    /// `None` when the test directory carries no labels.
    fn train(&self) -> Result<Option<f64>> {
        let test = match Dataset::load_dir(&self.test_dir) {
            Ok(test) => test,
            Err(PipelineError::MissingArtifact(path)) => {
                info!("No labeled test set ({} missing), skipping evaluation", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e).context("loading test set"),
        };
        let predicted = self.model()?.predict(&test.features, self.cfg.prediction_threshold)?;
        let correct = test
            .binarized_labels()
            .iter()
            .zip(&predicted)
            .filter(|&(a, p)| a == p)
            .count();
        let acc = correct as f64 / test.len().max(1) as f64 * 100.0;
        info!("Test accuracy: {acc:.2}% over {} rows", test.len());
        Ok(Some(acc))
    }

    fn validate(&self) -> Result<Evaluation> {
        let test = Dataset::load_dir(&self.test_dir).context("loading test set")?;
        let predicted = self.predict_test(&test.features)?;
        Ok(evaluate(&test.labels, &predicted)?)
    }

    fn sort(&self, indir: &Path, outdir: &Path) -> Result<()> {
        let features = load_features(&self.test_dir).context("loading test features")?;
        let fnames = load_fnames(&self.test_dir)?;
        let le_path = &self.cfg.label_encoder;
        let encoder = LabelEncoder::load(le_path)
            .with_context(|| format!("loading label encoder {}", le_path.display()))?;

        let predicted = self.predict_test(&features)?;
        let labels = predicted
            .iter()
            .map(|&p| encoder.inverse_transform(p as usize).map(str::to_owned))
            .collect::<mangrove_core::Result<Vec<_>>>()?;
        debug!("predicted labels: {labels:?}");

        let pb = ProgressBar::new(fnames.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );
        let summary = sort_files(&fnames, &labels, indir, outdir, &|| pb.inc(1))?;
        pb.finish_and_clear();

        if !summary.missing.is_empty() {
            warn!("{} files were missing and skipped", summary.missing.len());
        }
        info!("Moved {} files into {}", summary.moved, outdir.display());
        Ok(())
    }

    fn cross_validate(&self) -> Result<()> {
        let summary = cross_validate(
            NearestCentroid::new,
            &self.train,
            KFold::new(self.cfg.folds),
            self.cfg.prediction_threshold,
        )?;
        println!("{summary}");
        Ok(())
    }

    fn analyze(&self) -> Result<()> {
        let ratios = explained_variance_ratio(&self.train.features)?;
        println!("{:?}", cumulative(&ratios));
        Ok(())
    }

    fn save_model(&self) -> Result<()> {
        let path = self.model_path();
        self.model()?.save(&path)?;
        info!("Saved model to {}", path.display());
        Ok(())
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn run(args: Args) -> Result<()> {
    let cfg = TrainConfig::load(&args.cfg)?;
    debug!("config: {cfg:?}");

    let sort_dirs = match (args.mode, &args.indir) {
        (RunMode::Sort, None) => bail!("--mode sort requires --indir"),
        (RunMode::Sort, Some(indir)) => {
            let outdir = args.outdir.clone().unwrap_or_else(|| indir.clone());
            Some((indir.clone(), outdir))
        }
        _ => None,
    };

    let fit = args.retrain || args.mode == RunMode::Train;
    let run = Run::prepare(cfg, args.test.clone(), fit)?;
    match args.mode {
        RunMode::Train => {
            run.train()?;
        }
        RunMode::Validate => println!("{}", run.validate()?),
        RunMode::Sort => {
            if let Some((indir, outdir)) = &sort_dirs {
                run.sort(indir, outdir)?;
            }
        }
        RunMode::CrossValidate => run.cross_validate()?,
        RunMode::Analyze => run.analyze()?,
    }

    if fit {
        run.save_model()?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(level)).init();
    run(args)
}
