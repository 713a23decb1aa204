//! Training loop
//!
//! A custom epoch loop on top of Burn's autodiff, optimizer, and dataloader
//! building blocks rather than the high-level LearnerBuilder: forward, NLL
//! loss, backward, Adam step per batch; a validation pass on the inner
//! (non-autodiff) model; epoch-end aggregation; callback dispatch; early
//! stopping on the aggregated validation loss.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::{AutodiffModule, Module},
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use tracing::{debug, info, warn};

use crate::dataset::batcher::{CropBatch, CropBatcher, CropBurnDataset};
use crate::model::cnn::{nll_loss, CropClassifier};
use crate::model::config::TrainingConfig;

use super::metrics::{
    batch_correct, mean_loss, EpochRecord, MetricSnapshot, RunningAccuracy, TrainingHistory,
    TRAIN_ACC_EPOCH, TRAIN_LOSS_EPOCH, VALID_ACC_EPOCH, VALID_LOSS_EPOCH,
};

/// Hook invoked by the trainer at epoch boundaries.
///
/// Callbacks see the same metric snapshot the trainer just aggregated; a
/// callback error aborts the run.
pub trait TrainCallback {
    /// Called after every validation pass with the epoch's aggregated metrics
    fn on_validation_epoch_end(&mut self, _epoch: usize, _metrics: &MetricSnapshot) -> Result<()> {
        Ok(())
    }

    /// Called once after the final validation pass of the run
    fn on_train_end(&mut self, _metrics: &MetricSnapshot) -> Result<()> {
        Ok(())
    }
}

/// Mutable training state for monitoring and early stopping
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    /// Best (lowest) validation loss seen so far
    pub best_valid_loss: f64,
    /// Number of epochs without improvement
    pub epochs_without_improvement: usize,
    /// Total training samples seen
    pub samples_seen: usize,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            epoch: 0,
            best_valid_loss: f64::INFINITY,
            epochs_without_improvement: 0,
            samples_seen: 0,
        }
    }
}

/// Trainer for the crop classifier
pub struct Trainer<B: AutodiffBackend> {
    /// Model being trained
    pub model: CropClassifier<B>,
    /// Adam optimizer
    optimizer: OptimizerAdaptor<Adam<B::InnerBackend>, CropClassifier<B>, B>,
    /// Training configuration
    pub config: TrainingConfig,
    /// Current training state
    pub state: TrainingState,
    /// Per-epoch metric history
    history: TrainingHistory,
    /// Device to train on
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer with the given model and configuration
    pub fn new(model: CropClassifier<B>, config: TrainingConfig, device: B::Device) -> Self {
        let optimizer = AdamConfig::new().init();

        Self {
            model,
            optimizer,
            config,
            state: TrainingState::default(),
            history: TrainingHistory::new(),
            device,
        }
    }

    /// Run the full training loop.
    ///
    /// Trains until `max_epochs` or until the aggregated validation loss has
    /// not improved by more than `min_delta` for `patience` epochs. After the
    /// last validation pass every callback's `on_train_end` fires exactly
    /// once with the final metric snapshot.
    pub fn fit(
        &mut self,
        train_dataset: CropBurnDataset,
        valid_dataset: CropBurnDataset,
        callbacks: &mut [&mut dyn TrainCallback],
    ) -> Result<()> {
        let image_size = train_dataset.image_size();

        let train_batcher = CropBatcher::<B>::new(self.device.clone(), image_size);
        let train_loader = DataLoaderBuilder::new(train_batcher)
            .batch_size(self.config.batch_size)
            .shuffle(self.config.seed)
            .num_workers(self.config.num_workers)
            .build(train_dataset);

        let valid_device = <B::InnerBackend as burn::tensor::backend::Backend>::Device::default();
        let valid_batcher = CropBatcher::<B::InnerBackend>::new(valid_device, image_size);
        let valid_loader = DataLoaderBuilder::new(valid_batcher)
            .batch_size(self.config.batch_size)
            .num_workers(self.config.num_workers)
            .build(valid_dataset);

        let mut last_snapshot = None;

        for epoch in 0..self.config.max_epochs {
            self.state.epoch = epoch;

            let (train_loss, train_acc) = self.train_epoch(&train_loader);
            let (valid_losses, valid_acc) = self.validate_epoch(&valid_loader);
            let valid_loss = mean_loss(&valid_losses);

            let mut snapshot = MetricSnapshot::new();
            snapshot.insert(TRAIN_LOSS_EPOCH, train_loss);
            snapshot.insert(TRAIN_ACC_EPOCH, train_acc);
            snapshot.insert(VALID_LOSS_EPOCH, valid_loss);
            snapshot.insert(VALID_ACC_EPOCH, valid_acc);

            self.history.record(EpochRecord {
                epoch,
                train_loss,
                train_accuracy: train_acc,
                valid_loss,
                valid_accuracy: valid_acc,
            });

            info!(
                "Epoch {}/{}: train_loss = {:.4}, train_acc = {:.2}%, valid_loss = {:.4}, valid_acc = {:.2}%",
                epoch + 1,
                self.config.max_epochs,
                train_loss,
                train_acc * 100.0,
                valid_loss,
                valid_acc * 100.0
            );

            for callback in callbacks.iter_mut() {
                callback.on_validation_epoch_end(epoch, &snapshot)?;
            }

            let stop = self.update_monitor(valid_loss);
            last_snapshot = Some(snapshot);

            if stop {
                break;
            }
        }

        if let Some(snapshot) = &last_snapshot {
            for callback in callbacks.iter_mut() {
                callback.on_train_end(snapshot)?;
            }
        }

        Ok(())
    }

    /// Train for one epoch, returning (mean loss, accuracy)
    fn train_epoch(&mut self, loader: &Arc<dyn DataLoader<CropBatch<B>>>) -> (f64, f64) {
        let mut batch_losses = Vec::new();
        let mut accuracy = RunningAccuracy::new();

        for (batch_idx, batch) in loader.iter().enumerate() {
            let batch_size = batch.targets.dims()[0];

            let output = self.model.forward(batch.images);
            let loss = nll_loss(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            batch_losses.push(loss_value);

            accuracy.update(batch_correct(output, batch.targets), batch_size);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model =
                self.optimizer
                    .step(self.config.learning_rate, self.model.clone(), grads);

            self.state.samples_seen += batch_size;

            if (batch_idx + 1) % 10 == 0 {
                debug!(
                    "  Batch {}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    loss_value,
                    accuracy.value() * 100.0
                );
            }
        }

        (mean_loss(&batch_losses), accuracy.value())
    }

    /// Run a validation pass on the inner (non-autodiff) model.
    ///
    /// Returns the per-batch losses and the accuracy; the epoch-end
    /// aggregated loss is the mean of the per-batch values.
    fn validate_epoch(
        &self,
        loader: &Arc<dyn DataLoader<CropBatch<B::InnerBackend>>>,
    ) -> (Vec<f64>, f64) {
        let model = self.model.valid();

        let mut batch_losses = Vec::new();
        let mut accuracy = RunningAccuracy::new();

        for batch in loader.iter() {
            let batch_size = batch.targets.dims()[0];

            let output = model.forward(batch.images);
            let loss = nll_loss(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.into_scalar().elem();
            batch_losses.push(loss_value);

            accuracy.update(batch_correct(output, batch.targets), batch_size);
        }

        (batch_losses, accuracy.value())
    }

    /// Update early-stopping bookkeeping; returns true when training should stop
    fn update_monitor(&mut self, valid_loss: f64) -> bool {
        if self.state.best_valid_loss - valid_loss > self.config.min_delta {
            debug!(
                "Validation loss improved: {:.4} -> {:.4}",
                self.state.best_valid_loss, valid_loss
            );
            self.state.best_valid_loss = valid_loss;
            self.state.epochs_without_improvement = 0;
            return false;
        }

        self.state.epochs_without_improvement += 1;

        if let Some(patience) = self.config.patience {
            if self.state.epochs_without_improvement >= patience {
                warn!(
                    "Early stopping after {} epochs without improvement",
                    patience
                );
                return true;
            }
        }

        false
    }

    /// Save the model weights
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        info!("Saving weights to {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let recorder = CompactRecorder::new();
        self.model
            .clone()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(|e| anyhow::anyhow!("Failed to save model: {:?}", e))?;

        Ok(())
    }

    /// Load model weights from a checkpoint
    pub fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        info!("Loading weights from {:?}", path);

        let recorder = CompactRecorder::new();
        self.model = self
            .model
            .clone()
            .load_file(path.to_path_buf(), &recorder, &self.device)
            .map_err(|e| anyhow::anyhow!("Failed to load model: {:?}", e))?;

        Ok(())
    }

    /// Per-epoch metric history of this run
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }
}
