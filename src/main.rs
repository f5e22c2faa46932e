//! crypto-signal - next-period return forecasts and trade signals
//!
//! # Usage
//! ```sh
//! crypto-signal run --asset ETHUSDT   # train on one asset and forecast it
//! crypto-signal train                 # fit and store the shared model
//! crypto-signal predict               # score every configured asset
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr. Settings come
//! from the environment (and `.env`), see `config::PipelineConfig`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crypto_signal::application::pipeline::Pipeline;
use crypto_signal::config::PipelineConfig;
use crypto_signal::infrastructure::ServiceFactory;
use serde::Serialize;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on one asset and forecast its next period
    Run {
        /// Asset to train on and forecast (defaults to TRAINING_ASSET)
        #[arg(long)]
        asset: Option<String>,
    },
    /// Fit the shared model on TRAINING_ASSET and store it
    Train,
    /// Score every configured asset with the stored model
    Predict,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Failed to load configuration")?;
    info!(
        "crypto-signal {}: assets={:?}, training asset={}, model={:?}",
        env!("CARGO_PKG_VERSION"),
        config.data.assets,
        config.data.training_asset,
        config.model.model_path
    );

    let source = ServiceFactory::create_price_source(&config.data);
    let default_asset = config.data.training_asset.clone();
    let mut pipeline = Pipeline::new(config, source);

    match cli.command {
        Command::Run { asset } => {
            let asset = asset.map(|a| a.to_uppercase()).unwrap_or(default_asset);
            let outcome = pipeline.run_training_and_prediction(&asset).await;
            print_json(&outcome)?;
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Command::Train => {
            let summary = pipeline.run_training().await.context("Training job failed")?;
            print_json(&summary)?;
        }
        Command::Predict => {
            let report = pipeline
                .run_batch_prediction()
                .await
                .context("Batch prediction failed")?;
            print_json(&report)?;
        }
    }
    Ok(())
}
