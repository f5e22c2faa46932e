//! Training job: fits the shared gradient-boosting model on the training
//! asset and stores it with its feature contract.
//!
//! Environment settings apply first; flags override them.

use anyhow::{Context, Result};
use clap::Parser;
use crypto_signal::application::ml::evaluation::ValidationMetrics;
use crypto_signal::application::pipeline::Pipeline;
use crypto_signal::config::PipelineConfig;
use crypto_signal::infrastructure::ServiceFactory;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to output model file (contract is written next to it)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Asset whose next-period return the model learns
    #[arg(long)]
    asset: Option<String>,

    /// Daily bars to train on
    #[arg(long)]
    lookback: Option<usize>,

    /// Maximum number of boosting rounds
    #[arg(long)]
    max_rounds: Option<usize>,

    /// Shrinkage applied to each tree
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Maximum depth of trees
    #[arg(long)]
    max_depth: Option<u16>,

    /// Minimum samples required to split an internal node
    #[arg(long)]
    min_split: Option<usize>,

    /// Rounds without validation improvement before stopping
    #[arg(long)]
    early_stopping: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(path) = &self.output {
            config.model.model_path = path.clone();
        }
        if let Some(asset) = &self.asset {
            let asset = asset.to_uppercase();
            if !config.data.assets.contains(&asset) {
                config.data.assets.push(asset.clone());
            }
            config.data.training_asset = asset;
        }
        if let Some(lookback) = self.lookback {
            config.data.daily_lookback = lookback;
        }
        let gbm = &mut config.model.gbm;
        if let Some(v) = self.max_rounds {
            gbm.max_rounds = v;
        }
        if let Some(v) = self.learning_rate {
            gbm.learning_rate = v;
        }
        if let Some(v) = self.max_depth {
            gbm.max_depth = v;
        }
        if let Some(v) = self.min_split {
            gbm.min_samples_split = v;
        }
        if let Some(v) = self.early_stopping {
            gbm.early_stopping_rounds = v;
        }
    }
}

fn print_holdout(metrics: &ValidationMetrics) {
    let n = metrics.samples as f64;
    let s = &metrics.signals;
    println!("\n══════════════════════════════════════════════════════");
    println!("  HOLDOUT ANALYSIS (n={})", metrics.samples);
    println!("══════════════════════════════════════════════════════");
    println!(
        "  RMSE={:.6}, MAE={:.6}, R²={:.4}",
        metrics.rmse, metrics.mae, metrics.r2
    );
    println!(
        "  Directional accuracy: {:.1}%",
        metrics.directional_accuracy * 100.0
    );
    println!(
        "  BULLISH: {:>5} ({:.1}%)  hits {}",
        s.bullish,
        s.bullish as f64 / n * 100.0,
        s.bullish_hits
    );
    println!(
        "  BEARISH: {:>5} ({:.1}%)  hits {}",
        s.bearish,
        s.bearish as f64 / n * 100.0,
        s.bearish_hits
    );
    println!(
        "  NEUTRAL: {:>5} ({:.1}%)",
        s.neutral,
        s.neutral as f64 / n * 100.0
    );
    println!("══════════════════════════════════════════════════════\n");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::from_env().context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid training overrides")?;

    println!(
        "Training on {} ({} daily bars, up to {} rounds, lr {}, depth {})",
        config.data.training_asset,
        config.data.daily_lookback,
        config.model.gbm.max_rounds,
        config.model.gbm.learning_rate,
        config.model.gbm.max_depth
    );

    let source = ServiceFactory::create_price_source(&config.data);
    let mut pipeline = Pipeline::new(config, source);
    let summary = pipeline.run_training().await.context("Training failed")?;

    let meta = &summary.metadata;
    println!(
        "Trained on {} rows, {} features, kept {} rounds (train RMSE {:.6})",
        meta.training_rows, summary.feature_count, meta.rounds, meta.train_rmse
    );
    if let Some(sigma) = meta.target_volatility {
        println!("Target volatility: {:.6} ({:.4}%)", sigma, sigma * 100.0);
    }
    match &meta.validation {
        Some(metrics) => print_holdout(metrics),
        None => println!("No holdout: too few rows for a validation split."),
    }

    println!("Model {} saved to {}", summary.model_id, summary.model_path);
    Ok(())
}
