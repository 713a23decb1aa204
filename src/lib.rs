//! # croptrain
//!
//! A Rust training pipeline for crop image classification using the Burn framework.
//! One invocation runs a single trial: load the labeled image corpus, split it into
//! train/validation sets, train a small CNN, and report validation loss to an
//! external hyperparameter-tuning service after every epoch.
//!
//! ## Modules
//!
//! - `dataset`: Image loading, train/validation splitting, augmentation, batching
//! - `model`: CNN architecture and configuration
//! - `training`: The epoch loop, metrics, and early stopping
//! - `tuner`: Hyperparameter-tuning service client and the metrics bridge callback
//! - `utils`: Logging and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use croptrain::backend::TrainingBackend;
//! use croptrain::dataset::DataConfig;
//! use croptrain::model::config::{ClassifierConfig, TrainingConfig};
//! use croptrain::training::run_trial;
//!
//! let data = DataConfig::default();
//! let model = ClassifierConfig::default();
//! let training = TrainingConfig::default();
//! run_trial::<TrainingBackend>(&data, &model, &training, &mut [])?;
//! ```

pub mod backend;
pub mod dataset;
pub mod model;
pub mod training;
pub mod tuner;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::batcher::{CropBatch, CropBatcher, CropBurnDataset, CropItem};
pub use dataset::loader::{CropDataset, DataConfig, DatasetStats};
pub use dataset::split::{SplitConfig, TrainValidSplit};
pub use dataset::transform::Transform;
pub use model::cnn::CropClassifier;
pub use model::config::{ClassifierConfig, TrainingConfig};
pub use training::trainer::{TrainCallback, Trainer, TrainingState};
pub use tuner::bridge::TunerBridge;
pub use tuner::{TrialParams, TuningService};
pub use utils::error::{CropError, Result};

/// Number of crop categories
pub const NUM_CLASSES: usize = 5;

/// Default square image resolution fed to the network
pub const IMAGE_SIZE: usize = 224;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
