//! Burn Dataset Integration
//!
//! Implements Burn's `Dataset` trait over preloaded images and a batcher
//! that augments, stacks and normalizes them into tensors.
//!
//! Images are decoded and resized once at load time. Random augmentation is
//! driven by a per-sample seed (`SeededItem`), so batches can be built in
//! parallel and still come out identical for the same epoch seed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::augmentation::{AugmentationConfig, Augmenter};
use super::loader::{load_image, ImageFolder, ImageSample};
use super::{IMAGENET_MEAN, IMAGENET_STD};
use crate::utils::error::{Result, TumorError};

/// A decoded image at network resolution, before augmentation
#[derive(Clone)]
pub struct RawImageItem {
    /// RGB pixels, already resized to the target size
    pub image: RgbImage,
    /// Class label
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl RawImageItem {
    /// Load and resize an image from disk
    pub fn from_path(path: &PathBuf, label: usize, image_size: u32) -> Result<Self> {
        Ok(Self {
            image: load_image(path, image_size)?,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }
}

impl std::fmt::Debug for RawImageItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImageItem")
            .field("label", &self.label)
            .field("path", &self.path)
            .field(
                "image_size",
                &format!("{}x{}", self.image.width(), self.image.height()),
            )
            .finish()
    }
}

/// In-memory dataset of decoded images
#[derive(Clone)]
pub struct ImageDataset {
    items: Vec<RawImageItem>,
}

impl std::fmt::Debug for ImageDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDataset")
            .field("len", &self.items.len())
            .finish()
    }
}

impl ImageDataset {
    /// Decode every sample in parallel
    ///
    /// A single unreadable image fails the whole load.
    pub fn load(samples: &[ImageSample], image_size: u32) -> Result<Self> {
        let total = samples.len();
        println!("  📦 Pre-loading {} images...", total);

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let loaded = AtomicUsize::new(0);

        let items = samples
            .par_iter()
            .map(|sample| {
                let result = RawImageItem::from_path(&sample.path, sample.label, image_size);
                let count = loaded.fetch_add(1, Ordering::Relaxed);
                if count % 100 == 0 {
                    pb.set_position(count as u64);
                }
                result
            })
            .collect::<Result<Vec<_>>>()?;

        pb.finish_and_clear();
        println!("  ✅ Loaded {} images", items.len());

        Ok(Self { items })
    }

    /// Decode every image of a folder
    pub fn from_folder(folder: &ImageFolder, image_size: u32) -> Result<Self> {
        Self::load(&folder.samples, image_size)
    }

    /// Wrap already decoded items
    pub fn from_items(items: Vec<RawImageItem>) -> Self {
        Self { items }
    }

    /// All labels in dataset order
    pub fn labels(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.label).collect()
    }

    /// Get samples per class count
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for item in &self.items {
            if item.label < num_classes {
                counts[item.label] += 1;
            }
        }
        counts
    }

    /// Fail if any label falls outside `0..num_classes`
    pub fn check_labels(&self, num_classes: usize) -> Result<()> {
        if let Some(item) = self.items.iter().find(|item| item.label >= num_classes) {
            return Err(TumorError::Dataset(format!(
                "label {} of {} is outside the {} model classes",
                item.label, item.path, num_classes
            )));
        }
        Ok(())
    }

    /// Items at the given indices, each paired with its augmentation seed
    ///
    /// With `epoch_seed == None` the items are left unaugmented.
    pub fn seeded_items(&self, indices: &[usize], epoch_seed: Option<u64>) -> Vec<SeededItem> {
        indices
            .iter()
            .filter_map(|&i| {
                self.items.get(i).map(|item| SeededItem {
                    item: item.clone(),
                    seed: epoch_seed.map(|s| sample_seed(s, i)),
                })
            })
            .collect()
    }
}

impl Dataset<RawImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<RawImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// An item with the seed for its augmentation RNG
#[derive(Clone, Debug)]
pub struct SeededItem {
    pub item: RawImageItem,
    /// `None` disables random transforms for this item
    pub seed: Option<u64>,
}

/// Derive a per-sample seed from an epoch seed and the sample index
pub fn sample_seed(epoch_seed: u64, index: usize) -> u64 {
    epoch_seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Index lists for one pass over `len` samples
///
/// Shuffled when an RNG is given, otherwise in dataset order. The last
/// batch holds the remainder.
pub fn epoch_batches(len: usize, batch_size: usize, rng: Option<&mut ChaCha8Rng>) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..len).collect();
    if let Some(rng) = rng {
        indices.shuffle(rng);
    }
    indices
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// A batch of images for training or evaluation
#[derive(Clone, Debug)]
pub struct TumorBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher that augments seeded items and applies ImageNet normalization
#[derive(Clone, Debug)]
pub struct TumorBatcher {
    augmenter: Augmenter,
}

impl TumorBatcher {
    /// Create a batcher with the given augmentation config
    pub fn new(config: AugmentationConfig) -> Self {
        Self {
            augmenter: Augmenter::new(config),
        }
    }

    /// Batcher that only resizes and normalizes
    pub fn clean(image_size: u32) -> Self {
        Self::new(AugmentationConfig::none(image_size))
    }

    pub fn image_size(&self) -> usize {
        self.augmenter.image_size() as usize
    }

    /// Build a batch on a specific backend
    pub fn make_batch<B: Backend>(&self, items: Vec<SeededItem>, device: &B::Device) -> TumorBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size();
        let width = self.image_size();

        let per_item: Vec<Vec<f32>> = items
            .par_iter()
            .map(|seeded| {
                let mut rng = seeded.seed.map(ChaCha8Rng::seed_from_u64);
                self.augmenter.preprocess(&seeded.item.image, rng.as_mut())
            })
            .collect();
        let images_data: Vec<f32> = per_item.into_iter().flatten().collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            device,
        );

        // (x - mean) / std per channel
        let mean = Tensor::<B, 4>::from_floats(TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]), device);
        let std = Tensor::<B, 4>::from_floats(TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]), device);
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|s| s.item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        TumorBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::Rgb;

    type TestBackend = NdArray;

    fn synthetic_dataset(n: usize, size: u32) -> ImageDataset {
        let items = (0..n)
            .map(|i| RawImageItem {
                image: RgbImage::from_fn(size, size, |x, y| {
                    Rgb([(x * 7 + i as u32) as u8, (y * 5) as u8, 100])
                }),
                label: i % 2,
                path: format!("img_{}.png", i),
            })
            .collect();
        ImageDataset::from_items(items)
    }

    #[test]
    fn test_epoch_batches_sizes() {
        let batches = epoch_batches(100, 64, None);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 64);
        assert_eq!(batches[1].len(), 36);
        assert_eq!(batches[0][0], 0);
    }

    #[test]
    fn test_epoch_batches_shuffle_is_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(20);
        let batches = epoch_batches(50, 16, Some(&mut rng));
        let mut all: Vec<usize> = batches.into_iter().flatten().collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_seed_distinct() {
        assert_ne!(sample_seed(1, 0), sample_seed(1, 1));
        assert_ne!(sample_seed(1, 0), sample_seed(2, 0));
        assert_eq!(sample_seed(9, 3), sample_seed(9, 3));
    }

    #[test]
    fn test_batch_shapes_and_targets() {
        let dataset = synthetic_dataset(5, 16);
        let batcher = TumorBatcher::clean(16);
        let device = Default::default();

        let items = dataset.seeded_items(&[0, 1, 2, 3, 4], None);
        let batch = batcher.make_batch::<TestBackend>(items, &device);

        assert_eq!(batch.images.dims(), [5, 3, 16, 16]);
        assert_eq!(batch.targets.dims(), [5]);
        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_normalization_applied() {
        let item = RawImageItem {
            image: RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])),
            label: 0,
            path: "black.png".to_string(),
        };
        let batcher = TumorBatcher::clean(4);
        let device = Default::default();

        let batch = batcher.make_batch::<TestBackend>(
            vec![SeededItem { item, seed: None }],
            &device,
        );
        let values: Vec<f32> = batch.images.into_data().convert::<f32>().to_vec().unwrap();

        // black pixel in channel 0 becomes -mean/std
        let expected = -IMAGENET_MEAN[0] / IMAGENET_STD[0];
        assert!((values[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_seeded_augmentation_is_reproducible() {
        let dataset = synthetic_dataset(4, 16);
        let batcher = TumorBatcher::new(AugmentationConfig {
            image_size: 16,
            ..Default::default()
        });
        let device = Default::default();

        let a = batcher.make_batch::<TestBackend>(dataset.seeded_items(&[0, 1, 2, 3], Some(5)), &device);
        let b = batcher.make_batch::<TestBackend>(dataset.seeded_items(&[0, 1, 2, 3], Some(5)), &device);

        let a: Vec<f32> = a.images.into_data().convert::<f32>().to_vec().unwrap();
        let b: Vec<f32> = b.images.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_class_distribution() {
        let dataset = synthetic_dataset(5, 8);
        assert_eq!(dataset.class_distribution(2), vec![3, 2]);
        assert_eq!(dataset.len(), 5);
    }

    #[test]
    fn test_check_labels() {
        let dataset = synthetic_dataset(5, 8);
        assert!(dataset.check_labels(2).is_ok());
        assert!(matches!(dataset.check_labels(1), Err(TumorError::Dataset(_))));
    }
}
