//! Training module
//!
//! This module provides:
//! - The epoch loop with Adam optimization and early stopping
//! - Running metrics and the per-epoch metric snapshot handed to callbacks
//! - The single-trial orchestration used by the CLI

pub mod metrics;
pub mod run;
pub mod trainer;

pub use metrics::{MetricSnapshot, RunningAccuracy, TrainingHistory};
pub use run::{run_trial, RunSummary};
pub use trainer::{TrainCallback, Trainer, TrainingState};

/// Default hard cap on training epochs
pub const DEFAULT_MAX_EPOCHS: usize = 100;

/// Default early-stopping patience
pub const DEFAULT_PATIENCE: usize = 10;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;
