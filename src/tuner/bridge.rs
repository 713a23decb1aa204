//! Metrics-to-tuner bridge
//!
//! A training callback that forwards the aggregated validation loss to the
//! tuning service: one intermediate report per validation epoch, and the
//! final report when training ends.

use anyhow::Result;

use crate::training::metrics::{MetricSnapshot, VALID_LOSS_EPOCH};
use crate::training::trainer::TrainCallback;
use crate::utils::error::CropError;

use super::TuningService;

/// Bridges the trainer's metric snapshots to a tuning service
pub struct TunerBridge<T: TuningService> {
    service: T,
}

impl<T: TuningService> TunerBridge<T> {
    pub fn new(service: T) -> Self {
        Self { service }
    }

    /// Recover the wrapped service (used by tests to inspect reports)
    pub fn into_inner(self) -> T {
        self.service
    }

    fn monitored_loss(metrics: &MetricSnapshot) -> Result<f64> {
        metrics.get(VALID_LOSS_EPOCH).ok_or_else(|| {
            CropError::Tuner(format!("Metric snapshot is missing '{}'", VALID_LOSS_EPOCH)).into()
        })
    }
}

impl<T: TuningService> TrainCallback for TunerBridge<T> {
    fn on_validation_epoch_end(&mut self, _epoch: usize, metrics: &MetricSnapshot) -> Result<()> {
        let loss = Self::monitored_loss(metrics)?;
        self.service.report_intermediate(loss)?;
        Ok(())
    }

    fn on_train_end(&mut self, metrics: &MetricSnapshot) -> Result<()> {
        let loss = Self::monitored_loss(metrics)?;
        self.service.report_final(loss)?;
        Ok(())
    }
}
