//! croptrain CLI
//!
//! Entry point for one training trial. When a tuning service is attached
//! (via the trial-directory environment variable) the trial's
//! hyperparameters come from the service and validation losses are reported
//! back to it; otherwise the CLI flags supply the hyperparameters.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use croptrain::backend::TrainingBackend;
use croptrain::dataset::loader::DataConfig;
use croptrain::model::config::{ClassifierConfig, TrainingConfig};
use croptrain::training::run::run_trial;
use croptrain::training::trainer::TrainCallback;
use croptrain::tuner::{FileTuner, TunerBridge, TuningService};
use croptrain::utils::logging::{init_logging, LogConfig};

/// Crop image classification trainer
#[derive(Parser, Debug)]
#[command(name = "croptrain")]
#[command(version)]
#[command(about = "Train a crop image classifier with tuner integration", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one training trial
    Train {
        /// Path to the image corpus (one subdirectory per class)
        #[arg(short, long, default_value = "data/crop_images")]
        data_dir: PathBuf,

        /// Square resolution images are resized to
        #[arg(long, default_value = "224")]
        img_size: usize,

        /// Hard cap on training epochs
        #[arg(short, long, default_value = "100")]
        epochs: usize,

        /// Batch size (overridden by the tuner when attached)
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Learning rate (overridden by the tuner when attached)
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Hidden layer size (overridden by the tuner when attached)
        #[arg(long, default_value = "256")]
        hidden_size: usize,

        /// Channels of the three conv layers (overridden by the tuner when attached)
        #[arg(long, num_args = 3, default_values = ["32", "64", "128"])]
        conv_sizes: Vec<usize>,

        /// Random seed for the split and batch shuffling
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output directory for the trained weights
        #[arg(short, long, default_value = "output/models")]
        output_dir: String,

        /// Directory for per-run metric history files
        #[arg(long, default_value = "logs")]
        log_dir: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    init_logging(&log_config).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Train {
            data_dir,
            img_size,
            epochs,
            batch_size,
            learning_rate,
            hidden_size,
            conv_sizes,
            seed,
            output_dir,
            log_dir,
        } => train(TrainArgs {
            data_dir,
            img_size,
            epochs,
            batch_size,
            learning_rate,
            hidden_size,
            conv_sizes,
            seed,
            output_dir,
            log_dir,
        }),
    }
}

struct TrainArgs {
    data_dir: PathBuf,
    img_size: usize,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
    hidden_size: usize,
    conv_sizes: Vec<usize>,
    seed: u64,
    output_dir: String,
    log_dir: String,
}

fn train(args: TrainArgs) -> Result<()> {
    println!("{}", "croptrain".green().bold());

    let data_config = DataConfig {
        root: args.data_dir,
        image_size: args.img_size as u32,
        ..Default::default()
    };

    let mut model_config = ClassifierConfig {
        img_size: args.img_size,
        conv_size1: args.conv_sizes[0],
        conv_size2: args.conv_sizes[1],
        conv_size3: args.conv_sizes[2],
        hidden_size: args.hidden_size,
        ..Default::default()
    };

    let mut training_config = TrainingConfig {
        max_epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        seed: args.seed,
        output_dir: args.output_dir,
        log_dir: args.log_dir,
        ..Default::default()
    };

    // When a tuning service is attached, its trial parameters take precedence
    // over the CLI hyperparameters.
    let mut bridge = match FileTuner::from_env() {
        Some(mut tuner) => {
            let params = tuner.next_parameters()?;
            model_config = ClassifierConfig {
                img_size: args.img_size,
                ..ClassifierConfig::from_trial(&params)
            };
            training_config.apply_trial(&params);
            Some(TunerBridge::new(tuner))
        }
        None => {
            info!("No tuning service attached; using CLI hyperparameters");
            None
        }
    };

    let mut callbacks: Vec<&mut dyn TrainCallback> = Vec::new();
    if let Some(bridge) = bridge.as_mut() {
        callbacks.push(bridge);
    }

    let summary = run_trial::<TrainingBackend>(
        &data_config,
        &model_config,
        &training_config,
        &mut callbacks,
    )?;

    info!(
        "Trial finished after {} epochs: final valid loss {:.4} (best {:.4})",
        summary.epochs_run, summary.final_valid_loss, summary.best_valid_loss
    );

    Ok(())
}
