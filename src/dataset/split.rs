//! Train/validation split
//!
//! Deterministic random split of the loaded corpus driven by a fixed seed.
//! The default split is non-stratified: class balance is whatever the shuffle
//! produces. A stratified mode that splits each class proportionally is
//! available behind `SplitConfig::stratified`.

use std::collections::HashMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::utils::error::{CropError, Result};

use super::loader::CropSample;

/// Configuration for the train/validation split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of samples held out for validation
    pub valid_fraction: f64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Split each class proportionally instead of splitting the shuffled whole
    pub stratified: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            valid_fraction: 0.33,
            seed: 42,
            stratified: false,
        }
    }
}

impl SplitConfig {
    /// Create a new split configuration
    pub fn new(valid_fraction: f64, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&valid_fraction) || valid_fraction == 0.0 {
            return Err(CropError::Config(
                "Validation fraction must be in (0.0, 1.0)".to_string(),
            ));
        }

        Ok(Self {
            valid_fraction,
            seed,
            stratified: false,
        })
    }
}

/// Index sets of a train/validation split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainValidSplit {
    /// Indices of training samples, in shuffled order
    pub train_indices: Vec<usize>,
    /// Indices of validation samples, in shuffled order
    pub valid_indices: Vec<usize>,
    /// Configuration used to create this split
    pub config: SplitConfig,
}

impl TrainValidSplit {
    /// Split `labels.len()` samples into disjoint train/validation index sets.
    ///
    /// Reproducible: the same seed and input ordering always produce the same
    /// membership.
    pub fn new(labels: &[usize], config: &SplitConfig) -> Result<Self> {
        if labels.is_empty() {
            return Err(CropError::Dataset(
                "No samples provided for splitting".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let (train_indices, valid_indices) = if config.stratified {
            Self::stratified_split(labels, config, &mut rng)
        } else {
            Self::random_split(labels.len(), config, &mut rng)
        };

        if train_indices.is_empty() || valid_indices.is_empty() {
            return Err(CropError::Dataset(format!(
                "Split produced an empty set ({} train / {} valid)",
                train_indices.len(),
                valid_indices.len()
            )));
        }

        Ok(Self {
            train_indices,
            valid_indices,
            config: config.clone(),
        })
    }

    /// Shuffle all indices, take the leading fraction for validation
    fn random_split(
        n: usize,
        config: &SplitConfig,
        rng: &mut ChaCha8Rng,
    ) -> (Vec<usize>, Vec<usize>) {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);

        let n_valid = ((n as f64) * config.valid_fraction).ceil() as usize;
        let valid_indices = indices[..n_valid].to_vec();
        let train_indices = indices[n_valid..].to_vec();

        (train_indices, valid_indices)
    }

    /// Split each class proportionally, preserving class balance in both sets
    fn stratified_split(
        labels: &[usize],
        config: &SplitConfig,
        rng: &mut ChaCha8Rng,
    ) -> (Vec<usize>, Vec<usize>) {
        let mut by_class: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        // Iterate classes in label order so the split stays deterministic
        let mut classes: Vec<(usize, Vec<usize>)> = by_class.into_iter().collect();
        classes.sort_unstable_by_key(|(label, _)| *label);

        let mut train_indices = Vec::new();
        let mut valid_indices = Vec::new();

        for (_, class_indices) in classes.iter_mut() {
            class_indices.shuffle(rng);

            let n_valid = ((class_indices.len() as f64) * config.valid_fraction).ceil() as usize;
            valid_indices.extend_from_slice(&class_indices[..n_valid]);
            train_indices.extend_from_slice(&class_indices[n_valid..]);
        }

        (train_indices, valid_indices)
    }

    /// Number of training samples
    pub fn train_len(&self) -> usize {
        self.train_indices.len()
    }

    /// Number of validation samples
    pub fn valid_len(&self) -> usize {
        self.valid_indices.len()
    }

    /// Partition owned samples into (train, valid) by this split's index sets
    pub fn partition(&self, samples: Vec<CropSample>) -> (Vec<CropSample>, Vec<CropSample>) {
        let mut slots: Vec<Option<CropSample>> = samples.into_iter().map(Some).collect();

        let take = |slots: &mut Vec<Option<CropSample>>, indices: &[usize]| {
            indices
                .iter()
                .map(|&i| slots[i].take().expect("index used twice in split"))
                .collect::<Vec<_>>()
        };

        let train = take(&mut slots, &self.train_indices);
        let valid = take(&mut slots, &self.valid_indices);
        (train, valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(per_class: usize, classes: usize) -> Vec<usize> {
        (0..classes)
            .flat_map(|c| std::iter::repeat(c).take(per_class))
            .collect()
    }

    #[test]
    fn test_split_is_reproducible() {
        let labels = labels(10, 5);
        let config = SplitConfig::default();

        let a = TrainValidSplit::new(&labels, &config).unwrap();
        let b = TrainValidSplit::new(&labels, &config).unwrap();

        assert_eq!(a.train_indices, b.train_indices);
        assert_eq!(a.valid_indices, b.valid_indices);
    }

    #[test]
    fn test_different_seed_changes_split() {
        let labels = labels(10, 5);
        let a = TrainValidSplit::new(&labels, &SplitConfig::default()).unwrap();
        let b = TrainValidSplit::new(
            &labels,
            &SplitConfig {
                seed: 7,
                ..Default::default()
            },
        )
        .unwrap();

        assert_ne!(a.valid_indices, b.valid_indices);
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let labels = labels(10, 5);
        let split = TrainValidSplit::new(&labels, &SplitConfig::default()).unwrap();

        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.valid_indices.iter())
            .copied()
            .collect();
        all.sort_unstable();

        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_fractions() {
        let labels = labels(10, 5);
        let split = TrainValidSplit::new(&labels, &SplitConfig::default()).unwrap();

        // ceil(50 * 0.33) = 17 validation, 33 train
        assert_eq!(split.valid_len(), 17);
        assert_eq!(split.train_len(), 33);
    }

    #[test]
    fn test_stratified_preserves_class_balance() {
        let labels = labels(10, 5);
        let config = SplitConfig {
            stratified: true,
            ..Default::default()
        };
        let split = TrainValidSplit::new(&labels, &config).unwrap();

        for class in 0..5 {
            let in_valid = split
                .valid_indices
                .iter()
                .filter(|&&i| labels[i] == class)
                .count();
            // ceil(10 * 0.33) = 4 per class
            assert_eq!(in_valid, 4);
        }
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(TrainValidSplit::new(&[], &SplitConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        assert!(SplitConfig::new(0.0, 42).is_err());
        assert!(SplitConfig::new(1.0, 42).is_err());
        assert!(SplitConfig::new(0.33, 42).is_ok());
    }
}
