//! Hyperparameter-tuning service integration
//!
//! An external search process proposes one hyperparameter configuration per
//! trial and collects the metrics this trainer reports back: one
//! intermediate result per validation epoch, and exactly one final result
//! when the run ends.
//!
//! The service seam is the [`TuningService`] trait; [`client::FileTuner`]
//! implements it over a file protocol, and tests substitute recording stubs.

pub mod bridge;
pub mod client;

pub use bridge::TunerBridge;
pub use client::FileTuner;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// One trial's hyperparameter configuration.
///
/// Supplied by the tuning service before training starts and immutable for
/// the duration of the run. Every key is required; a parameter file missing
/// one fails the trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialParams {
    /// Units in the hidden fully connected layer
    pub hidden_size: usize,
    /// Output channels of the first convolution
    pub conv_size1: usize,
    /// Output channels of the second convolution
    pub conv_size2: usize,
    /// Output channels of the third convolution
    pub conv_size3: usize,
    /// Batch size
    pub batch_size: usize,
    /// Adam learning rate
    pub lr: f64,
}

/// Client-side view of the tuning service
pub trait TuningService {
    /// Obtain the hyperparameters of the current trial (blocking)
    fn next_parameters(&mut self) -> Result<TrialParams>;

    /// Report an intermediate result; called once per validation epoch
    fn report_intermediate(&mut self, value: f64) -> Result<()>;

    /// Report the trial's final result; must be accepted exactly once
    fn report_final(&mut self, value: f64) -> Result<()>;
}
