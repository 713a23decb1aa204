//! Model and Training Configuration
//!
//! All configuration is carried by explicit structs handed to constructors.
//! Trial-supplied hyperparameters override the defaults for the keys they
//! carry and stay immutable for the duration of the run.

use serde::{Deserialize, Serialize};

use crate::tuner::TrialParams;
use crate::{IMAGE_SIZE, NUM_CLASSES};

/// Configuration for the CNN classifier architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Input image size (width and height, assumed square)
    pub img_size: usize,

    /// Output channels of the first convolution
    pub conv_size1: usize,

    /// Output channels of the second convolution
    pub conv_size2: usize,

    /// Output channels of the third convolution
    pub conv_size3: usize,

    /// Units in the hidden fully connected layer
    pub hidden_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            num_classes: NUM_CLASSES,
            img_size: IMAGE_SIZE,
            conv_size1: 32,
            conv_size2: 64,
            conv_size3: 128,
            hidden_size: 256,
        }
    }
}

impl ClassifierConfig {
    /// Build a configuration from trial-supplied hyperparameters
    pub fn from_trial(params: &TrialParams) -> Self {
        Self {
            conv_size1: params.conv_size1,
            conv_size2: params.conv_size2,
            conv_size3: params.conv_size3,
            hidden_size: params.hidden_size,
            ..Default::default()
        }
    }

    /// Spatial edge length after the three conv/pool stages.
    ///
    /// Each stage is a 3x3 valid convolution (edge - 2) followed by a 2x2
    /// max-pool with stride 2 (edge / 2, floored).
    pub fn conv_output_edge(&self) -> usize {
        let mut edge = self.img_size;
        for _ in 0..3 {
            edge = edge.saturating_sub(2) / 2;
        }
        edge
    }

    /// Expected flattened size of the post-convolution feature map
    pub fn conv_output_size(&self) -> usize {
        let edge = self.conv_output_edge();
        edge * edge * self.conv_size3
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.num_classes == 0 {
            return Err("num_classes must be greater than 0".to_string());
        }

        if self.conv_size1 == 0 || self.conv_size2 == 0 || self.conv_size3 == 0 {
            return Err("conv channel widths must be greater than 0".to_string());
        }

        if self.hidden_size == 0 {
            return Err("hidden_size must be greater than 0".to_string());
        }

        if self.conv_output_edge() == 0 {
            return Err(format!(
                "img_size {} collapses to nothing after three conv/pool stages",
                self.img_size
            ));
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Hard cap on the number of training epochs
    pub max_epochs: usize,

    /// Batch size for training and validation
    pub batch_size: usize,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Early stopping patience in epochs without improvement (None to disable)
    pub patience: Option<usize>,

    /// Minimum decrease of the monitored loss that counts as improvement
    pub min_delta: f64,

    /// Random seed for the split and batch shuffling
    pub seed: u64,

    /// Number of data loading workers
    pub num_workers: usize,

    /// Directory for the final weights
    pub output_dir: String,

    /// Directory for per-run metric history files
    pub log_dir: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            patience: Some(10),
            min_delta: 0.0,
            seed: 42,
            num_workers: 8,
            output_dir: "output/models".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl TrainingConfig {
    /// Override the tunable fields from trial-supplied hyperparameters
    pub fn apply_trial(&mut self, params: &TrialParams) {
        self.batch_size = params.batch_size;
        self.learning_rate = params.lr;
    }

    /// A fast configuration for tests and smoke runs
    pub fn smoke() -> Self {
        Self {
            max_epochs: 1,
            batch_size: 8,
            patience: None,
            num_workers: 1,
            ..Default::default()
        }
    }
}
