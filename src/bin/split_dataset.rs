//! Reproduce the training-time split of the primary dataset.
//!
//! Writes `X_train.csv`, `X_test.csv`, `y_train.csv` and `y_test.csv`: the
//! features one-hot encoded with the first category of each nominal column
//! dropped, the test features aligned to the training columns.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use crop_yield_dash::config::AppConfig;
use crop_yield_dash::data::loader::{load_file, write_csv, write_target};
use crop_yield_dash::data::split::split_indices;
use crop_yield_dash::data::Frame;
use crop_yield_dash::features::{align, CategoricalEncoder, FeatureSchema, MissingColumnPolicy};

/// Split the crop yield dataset into encoded train/test files
#[derive(Parser, Debug)]
#[command(name = "split-dataset")]
#[command(version, about, long_about = None)]
struct Args {
    /// Dashboard config file (defaults apply when omitted)
    #[arg(long, env = "CROP_DASH_CONFIG")]
    config: Option<PathBuf>,

    /// Primary dataset; the configured one when omitted
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Output directory; the configured data directory when omitted
    #[arg(long, short)]
    out_dir: Option<PathBuf>,

    /// Fraction of rows held out for testing
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,
}

/// Row and column counts of a finished split.
#[derive(Debug, PartialEq)]
struct SplitSummary {
    train_rows: usize,
    test_rows: usize,
    features: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    if let Some(fraction) = args.test_fraction {
        config.test_fraction = fraction;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let dataset = args.dataset.unwrap_or_else(|| config.dataset_path());
    let out_dir = args.out_dir.unwrap_or_else(|| config.data_dir.clone());

    let summary = run(&config, &dataset, &out_dir)?;
    println!(
        "{} training rows, {} test rows, {} features written to {}",
        summary.train_rows,
        summary.test_rows,
        summary.features,
        out_dir.display()
    );
    Ok(())
}

fn run(config: &AppConfig, dataset: &Path, out_dir: &Path) -> Result<SplitSummary> {
    if !(0.0..1.0).contains(&config.test_fraction) {
        bail!("test fraction must be in [0, 1), got {}", config.test_fraction);
    }

    let frame = load_file(dataset)?;
    let target = &config.target_column;
    if !frame.has_column(target) {
        bail!("{} has no '{target}' column", dataset.display());
    }
    let y: Vec<f64> = frame
        .numeric_column(target)
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.with_context(|| format!("row {row} of '{target}' is not numeric")))
        .collect::<Result<_>>()?;
    let features = frame.without_column(target);

    // Category sets come from the whole dataset so both sides drop the same
    // baseline.
    let encoder = config.categorical_columns.iter().fold(
        CategoricalEncoder::new(&config.categorical_columns)
            .with_boolean_columns(&config.boolean_columns)
            .drop_first(true)
            .missing_policy(MissingColumnPolicy::Fail),
        |encoder, column| encoder.with_categories(column, features.category_labels(column)),
    );

    let idx = split_indices(features.len(), config.test_fraction, config.seed);
    info!(
        "Splitting {} rows: {} train, {} test (seed {})",
        features.len(),
        idx.train.len(),
        idx.test.len(),
        config.seed
    );

    let x_train = encoder.encode(&features.select_rows(&idx.train))?;
    let schema = FeatureSchema::from_frame(&x_train)?;
    let x_train = align(&x_train, &schema)?;
    let x_test = align(&encoder.encode(&features.select_rows(&idx.test))?, &schema)?;
    for (side, aligned) in [("train", &x_train), ("test", &x_test)] {
        if !aligned.report().is_clean() {
            warn!("{side} split: {}", aligned.report().summary());
        }
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let pick = |rows: &[usize]| -> Vec<f64> { rows.iter().map(|&i| y[i]).collect() };
    write_csv(&Frame::from(&x_train), &out_dir.join(&config.x_train_file))?;
    write_csv(&Frame::from(&x_test), &out_dir.join(&config.x_test_file))?;
    write_target(&pick(&idx.train), target, &out_dir.join(&config.y_train_file))?;
    write_target(&pick(&idx.test), target, &out_dir.join(&config.y_test_file))?;
    info!("Wrote split files to {}", out_dir.display());

    Ok(SplitSummary {
        train_rows: idx.train.len(),
        test_rows: idx.test.len(),
        features: schema.len(),
    })
}
