//! Training metrics
//!
//! Named scalar metrics per epoch. The snapshot is what epoch-end callbacks
//! see; the history is what gets serialized for external viewers.

use std::collections::HashMap;

use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};
use serde::{Deserialize, Serialize};

/// Mean training loss over the epoch
pub const TRAIN_LOSS_EPOCH: &str = "train_loss_epoch";
/// Training accuracy over the epoch
pub const TRAIN_ACC_EPOCH: &str = "train_acc_epoch";
/// Mean validation loss over the epoch (the early-stopping monitor)
pub const VALID_LOSS_EPOCH: &str = "valid_loss_epoch";
/// Validation accuracy over the epoch
pub const VALID_ACC_EPOCH: &str = "valid_acc_epoch";

/// A snapshot of named scalar metrics at one point in training
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    values: HashMap<String, f64>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a named value
    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    /// Read a named value
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Running accuracy accumulator for one pass over a dataset
#[derive(Debug, Clone, Default)]
pub struct RunningAccuracy {
    correct: usize,
    total: usize,
}

impl RunningAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch worth of results
    pub fn update(&mut self, correct: usize, batch_size: usize) {
        self.correct += correct;
        self.total += batch_size;
    }

    /// Accuracy in [0, 1] over everything seen so far
    pub fn value(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Count correct argmax predictions in one batch
pub fn batch_correct<B: Backend>(
    log_probs: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> usize {
    let predictions = log_probs.argmax(1).squeeze::<1>(1);
    let correct_tensor = predictions.equal(targets).int().sum();
    let correct: i64 = correct_tensor.into_scalar().elem();
    correct as usize
}

/// Mean of per-batch losses; this is the epoch-end aggregated value
pub fn mean_loss(batch_losses: &[f64]) -> f64 {
    if batch_losses.is_empty() {
        0.0
    } else {
        batch_losses.iter().sum::<f64>() / batch_losses.len() as f64
    }
}

/// Metrics of one completed epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub valid_loss: f64,
    pub valid_accuracy: f64,
}

/// Full per-epoch metric history of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    /// Lowest validation loss seen so far
    pub fn best_valid_loss(&self) -> Option<f64> {
        self.epochs
            .iter()
            .map(|e| e.valid_loss)
            .fold(None, |best, loss| match best {
                Some(b) if b <= loss => Some(b),
                _ => Some(loss),
            })
    }

    /// Serialize the history as pretty JSON for external viewers
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use burn::tensor::TensorData;

    #[test]
    fn test_running_accuracy() {
        let mut acc = RunningAccuracy::new();
        assert_eq!(acc.value(), 0.0);

        acc.update(3, 4);
        acc.update(1, 4);
        assert!((acc.value() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mean_loss_matches_manual_mean() {
        let losses = vec![0.5, 0.3, 0.4, 0.2];
        let expected = (0.5 + 0.3 + 0.4 + 0.2) / 4.0;
        assert!((mean_loss(&losses) - expected).abs() < 1e-12);
        assert_eq!(mean_loss(&[]), 0.0);
    }

    #[test]
    fn test_batch_correct() {
        let device = Default::default();
        // argmax per row: [2, 0]
        let log_probs = Tensor::<DefaultBackend, 2>::from_floats(
            TensorData::new(vec![-3.0f32, -2.0, -0.1, -0.2, -1.0, -4.0], [2, 3]),
            &device,
        );
        let targets = Tensor::<DefaultBackend, 1, Int>::from_data(
            TensorData::new(vec![2i64, 1], [2]),
            &device,
        );

        assert_eq!(batch_correct(log_probs, targets), 1);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut snapshot = MetricSnapshot::new();
        snapshot.insert(VALID_LOSS_EPOCH, 0.42);

        assert_eq!(snapshot.get(VALID_LOSS_EPOCH), Some(0.42));
        assert_eq!(snapshot.get(TRAIN_LOSS_EPOCH), None);
    }

    #[test]
    fn test_history_best_valid_loss() {
        let mut history = TrainingHistory::new();
        assert_eq!(history.best_valid_loss(), None);

        for (epoch, loss) in [(0, 0.9), (1, 0.4), (2, 0.6)] {
            history.record(EpochRecord {
                epoch,
                train_loss: 1.0,
                train_accuracy: 0.5,
                valid_loss: loss,
                valid_accuracy: 0.5,
            });
        }

        assert_eq!(history.best_valid_loss(), Some(0.4));
    }
}
