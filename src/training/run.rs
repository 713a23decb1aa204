//! Single-trial orchestration
//!
//! Wires the pieces together for one training run: load the corpus, split
//! it, build the transformed datasets and the model, run the epoch loop, and
//! persist weights plus the metric history.

use std::path::PathBuf;

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use chrono::Local;
use colored::Colorize;
use tracing::info;

use crate::dataset::batcher::CropBurnDataset;
use crate::dataset::loader::{CropDataset, DataConfig};
use crate::dataset::split::{SplitConfig, TrainValidSplit};
use crate::dataset::transform::Transform;
use crate::model::cnn::CropClassifier;
use crate::model::config::{ClassifierConfig, TrainingConfig};
use crate::utils::error::CropError;

use super::trainer::{TrainCallback, Trainer};

/// File stem of the final weights (the recorder appends its own extension)
pub const WEIGHTS_FILE_STEM: &str = "crop_classifier";

/// Outcome of one completed trial
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Number of epochs actually run
    pub epochs_run: usize,
    /// Validation loss of the last epoch (the value reported as final result)
    pub final_valid_loss: f64,
    /// Lowest validation loss over the run
    pub best_valid_loss: f64,
    /// Where the weights were written
    pub weights_path: PathBuf,
    /// Where the metric history was written
    pub history_path: PathBuf,
}

/// Run one full training trial
pub fn run_trial<B: AutodiffBackend>(
    data_config: &DataConfig,
    model_config: &ClassifierConfig,
    training_config: &TrainingConfig,
    callbacks: &mut [&mut dyn TrainCallback],
) -> Result<RunSummary> {
    model_config.validate().map_err(CropError::Config)?;

    println!("{}", "Initializing training...".green().bold());
    let device = B::Device::default();

    println!("{}", "Loading dataset...".cyan());
    let dataset = CropDataset::load(data_config)?;
    let stats = dataset.stats();
    stats.print();

    if dataset.is_empty() {
        anyhow::bail!(
            "No images found under {:?}; expected one subdirectory per class: {:?}",
            data_config.root,
            data_config.class_names
        );
    }

    let split_config = SplitConfig {
        seed: training_config.seed,
        ..Default::default()
    };
    let split = TrainValidSplit::new(&dataset.labels(), &split_config)?;
    info!(
        "Split {} samples: train = {}, valid = {} (seed {})",
        dataset.len(),
        split.train_len(),
        split.valid_len(),
        split_config.seed
    );

    let image_size = dataset.image_size as usize;
    let (train_samples, valid_samples) = split.partition(dataset.samples);

    let train_dataset = CropBurnDataset::new(train_samples, Transform::train(), image_size);
    let valid_dataset = CropBurnDataset::new(valid_samples, Transform::eval(), image_size);

    println!("{}", "Creating model...".cyan());
    let model = CropClassifier::<B>::new(model_config, &device);
    info!(
        "Model: conv {}/{}/{}, hidden {}, flatten dim {}",
        model_config.conv_size1,
        model_config.conv_size2,
        model_config.conv_size3,
        model_config.hidden_size,
        model.flatten_dim()
    );

    println!();
    println!("{}", "Training configuration:".cyan().bold());
    println!("  Training samples:   {}", split.train_len());
    println!("  Validation samples: {}", split.valid_len());
    println!("  Epoch cap:          {}", training_config.max_epochs);
    println!("  Batch size:         {}", training_config.batch_size);
    println!("  Learning rate:      {}", training_config.learning_rate);
    println!("  Patience:           {:?}", training_config.patience);
    println!();

    println!("{}", "Starting training...".green().bold());
    let mut trainer = Trainer::new(model, training_config.clone(), device);
    trainer.fit(train_dataset, valid_dataset, callbacks)?;

    let weights_path = PathBuf::from(&training_config.output_dir).join(WEIGHTS_FILE_STEM);
    trainer.save_checkpoint(&weights_path)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let history_path =
        PathBuf::from(&training_config.log_dir).join(format!("run_{}.json", timestamp));
    trainer.history().save(&history_path)?;

    let history = trainer.history();
    let final_valid_loss = history
        .epochs
        .last()
        .map(|e| e.valid_loss)
        .ok_or_else(|| CropError::Training("No epochs were run".to_string()))?;
    let best_valid_loss = history.best_valid_loss().unwrap_or(final_valid_loss);

    println!("{}", "Training complete!".green().bold());
    println!("  Final validation loss: {:.4}", final_valid_loss);
    println!("  Best validation loss:  {:.4}", best_valid_loss);
    println!("  Weights: {:?}", weights_path);

    Ok(RunSummary {
        epochs_run: history.epochs.len(),
        final_valid_loss,
        best_valid_loss,
        weights_path,
        history_path,
    })
}
