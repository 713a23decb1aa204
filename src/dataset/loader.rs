//! Crop Image Dataset Loader
//!
//! Loads the crop image corpus from a directory tree with one subdirectory per
//! class. Every image is decoded and resized to a fixed square resolution at
//! load time, so the rest of the pipeline only ever sees uniform samples.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{imageops::FilterType, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::CLASS_NAMES;
use crate::IMAGE_SIZE;

/// Explicit configuration for dataset loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory of the corpus
    pub root: PathBuf,
    /// Class folder names in label order (folder at index `i` carries label `i`)
    pub class_names: Vec<String>,
    /// Target square resolution
    pub image_size: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/crop_images"),
            class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            image_size: IMAGE_SIZE as u32,
        }
    }
}

/// A single decoded sample, already resized to the target resolution
#[derive(Debug, Clone)]
pub struct CropSample {
    /// Decoded RGB pixels, image_size x image_size
    pub image: RgbImage,
    /// Class label index
    pub label: usize,
    /// Source file path
    pub path: PathBuf,
}

/// The fully loaded crop corpus
#[derive(Debug)]
pub struct CropDataset {
    /// All samples, grouped by class in folder order
    pub samples: Vec<CropSample>,
    /// Class names in label order
    pub class_names: Vec<String>,
    /// Square resolution every sample was resized to
    pub image_size: u32,
}

impl CropDataset {
    /// Load every image under `config.root`, one subdirectory per class.
    ///
    /// The directory must be structured as:
    /// ```text
    /// root/
    /// ├── jute/
    /// │   ├── image1.jpg
    /// │   └── image2.jpg
    /// ├── maize/
    /// │   └── ...
    /// └── ...
    /// ```
    ///
    /// An unreadable or undecodable image aborts the load; there is no
    /// skip-and-continue.
    pub fn load(config: &DataConfig) -> Result<Self> {
        info!("Loading crop dataset from: {:?}", config.root);

        if !config.root.exists() {
            anyhow::bail!("Dataset directory does not exist: {:?}", config.root);
        }

        let mut samples = Vec::new();
        let mut class_counts = vec![0usize; config.class_names.len()];

        for (label, class_name) in config.class_names.iter().enumerate() {
            let class_dir = config.root.join(class_name);

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();

                // Only include image files
                let is_image = path
                    .extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_lowercase();
                        ["jpg", "jpeg", "png", "bmp"].contains(&ext.as_str())
                    })
                    .unwrap_or(false);
                if !is_image {
                    continue;
                }

                let image = load_image(&path, config.image_size)?;
                samples.push(CropSample { image, label, path });
                class_counts[label] += 1;
            }

            debug!(
                "Class '{}' (label {}): {} samples",
                class_name, label, class_counts[label]
            );
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            samples,
            class_names: config.class_names.clone(),
            image_size: config.image_size,
        })
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the number of classes
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Labels of all samples, aligned with `samples`
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.class_names.clone(),
        }
    }
}

/// Decode a single image and resize it to `size` x `size`
pub fn load_image(path: &Path, size: u32) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("Failed to open image: {:?}", path))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", path))?;

    Ok(img.resize_exact(size, size, FilterType::Triangle).to_rgb8())
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print per-class counts to console
    pub fn print(&self) {
        println!("\nDataset statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = if self.total_samples > 0 {
                (count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            let bar: String = "█".repeat(bar_len);
            println!("    {:3}. {:12} {:5} {}", idx, name, count, bar);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_test_image(path: &Path, w: u32, h: u32, fill: [u8; 3]) {
        let img = RgbImage::from_pixel(w, h, Rgb(fill));
        img.save(path).unwrap();
    }

    #[test]
    fn test_load_counts_every_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig {
            root: dir.path().to_path_buf(),
            class_names: vec!["jute".to_string(), "maize".to_string()],
            image_size: 16,
        };

        std::fs::create_dir(dir.path().join("jute")).unwrap();
        std::fs::create_dir(dir.path().join("maize")).unwrap();
        for i in 0..3 {
            write_test_image(&dir.path().join(format!("jute/img{}.png", i)), 20, 20, [10, 20, 30]);
        }
        write_test_image(&dir.path().join("maize/img0.png"), 8, 12, [200, 100, 50]);

        let dataset = CropDataset::load(&config).unwrap();
        let stats = dataset.stats();

        assert_eq!(dataset.len(), 4);
        assert_eq!(stats.class_counts, vec![3, 1]);
    }

    #[test]
    fn test_load_resizes_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig {
            root: dir.path().to_path_buf(),
            class_names: vec!["rice".to_string()],
            image_size: 32,
        };

        std::fs::create_dir(dir.path().join("rice")).unwrap();
        write_test_image(&dir.path().join("rice/img.png"), 100, 60, [1, 2, 3]);

        let dataset = CropDataset::load(&config).unwrap();
        let sample = &dataset.samples[0];
        assert_eq!(sample.image.dimensions(), (32, 32));
        assert_eq!(sample.label, 0);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let config = DataConfig {
            root: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        assert!(CropDataset::load(&config).is_err());
    }

    #[test]
    fn test_non_image_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig {
            root: dir.path().to_path_buf(),
            class_names: vec!["wheat".to_string()],
            image_size: 16,
        };

        std::fs::create_dir(dir.path().join("wheat")).unwrap();
        write_test_image(&dir.path().join("wheat/img.png"), 16, 16, [0, 0, 0]);
        std::fs::write(dir.path().join("wheat/notes.txt"), "not an image").unwrap();

        let dataset = CropDataset::load(&config).unwrap();
        assert_eq!(dataset.len(), 1);
    }
}
