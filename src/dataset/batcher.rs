//! Burn Dataset Integration
//!
//! Implements Burn's Dataset trait over the split sample sets, applying the
//! per-sample transform lazily on each access, plus the Batcher that stacks
//! transformed items into training batches.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;

use super::loader::CropSample;
use super::transform::Transform;

/// A single transformed item ready for batching
#[derive(Clone, Debug)]
pub struct CropItem {
    /// Image data as flattened CHW float array [3 * H * W], already normalized
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
}

/// Dataset over decoded samples with a per-access transform.
///
/// The transform runs on every `get`, so a stochastic training transform
/// yields a different augmentation of the same sample each epoch while the
/// validation transform is referentially transparent.
#[derive(Debug, Clone)]
pub struct CropBurnDataset {
    samples: Vec<CropSample>,
    transform: Transform,
    image_size: usize,
}

impl CropBurnDataset {
    /// Create a new dataset from samples and a transform
    pub fn new(samples: Vec<CropSample>, transform: Transform, image_size: usize) -> Self {
        Self {
            samples,
            transform,
            image_size,
        }
    }

    /// Target square resolution of every item
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Get samples per class count
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for sample in &self.samples {
            if sample.label < num_classes {
                counts[sample.label] += 1;
            }
        }
        counts
    }
}

impl Dataset<CropItem> for CropBurnDataset {
    fn get(&self, index: usize) -> Option<CropItem> {
        let sample = self.samples.get(index)?;
        let mut rng = rand::thread_rng();
        let image = self.transform.apply(&sample.image, &mut rng);

        Some(CropItem {
            image,
            label: sample.label,
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of crop images for training or validation
#[derive(Clone, Debug)]
pub struct CropBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking transformed items into tensors on the target device
#[derive(Clone, Debug)]
pub struct CropBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> CropBatcher<B> {
    /// Create a new batcher for the given device and image size
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<CropItem, CropBatch<B>> for CropBatcher<B> {
    fn batch(&self, items: Vec<CropItem>) -> CropBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size;
        let width = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            &self.device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [batch_size]),
            &self.device,
        );

        CropBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn sample(label: usize, fill: u8, size: u32) -> CropSample {
        CropSample {
            image: RgbImage::from_pixel(size, size, Rgb([fill, fill, fill])),
            label,
            path: PathBuf::from(format!("synthetic_{}.png", label)),
        }
    }

    #[test]
    fn test_dataset_len_and_get() {
        let samples = vec![sample(0, 10, 8), sample(1, 20, 8), sample(4, 30, 8)];
        let dataset = CropBurnDataset::new(samples, Transform::eval(), 8);

        assert_eq!(dataset.len(), 3);

        let item = dataset.get(1).unwrap();
        assert_eq!(item.label, 1);
        assert_eq!(item.image.len(), 3 * 8 * 8);
        assert!(dataset.get(3).is_none());
    }

    #[test]
    fn test_eval_access_is_repeatable() {
        let dataset = CropBurnDataset::new(vec![sample(2, 77, 8)], Transform::eval(), 8);

        let a = dataset.get(0).unwrap();
        let b = dataset.get(0).unwrap();
        assert_eq!(a.image, b.image);
    }

    #[test]
    fn test_class_distribution() {
        let samples = vec![sample(0, 1, 4), sample(0, 2, 4), sample(3, 3, 4)];
        let dataset = CropBurnDataset::new(samples, Transform::eval(), 4);

        assert_eq!(dataset.class_distribution(5), vec![2, 0, 0, 1, 0]);
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let batcher = CropBatcher::<DefaultBackend>::new(device, 8);

        let items = vec![
            CropItem {
                image: vec![0.0; 3 * 8 * 8],
                label: 1,
            },
            CropItem {
                image: vec![0.5; 3 * 8 * 8],
                label: 4,
            },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [2]);

        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![1, 4]);
    }
}
