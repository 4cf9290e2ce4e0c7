//! Reproducible train/validation split
//!
//! Each class is split independently: its files are sorted by name,
//! shuffled with a seeded ChaCha8 RNG, and the first `floor(ratio·n)` go to
//! the training partition. A single RNG is shared across classes, visited
//! in label order, so the whole assignment is fixed by the seed.
//!
//! `materialize` copies the files into
//!
//! ```text
//! out/
//! ├── train/<class>/...
//! ├── val/<class>/...
//! └── split.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::loader::{ImageFolder, ImageSample};
use crate::utils::error::{Result, TumorError};

/// Name of the manifest written next to the split directories
pub const SPLIT_MANIFEST: &str = "split.json";

/// Configuration for dataset splitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of each class assigned to training
    pub train_ratio: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: 20,
        }
    }
}

impl SplitConfig {
    /// Create a split configuration, rejecting ratios outside (0, 1)
    pub fn new(train_ratio: f64, seed: u64) -> Result<Self> {
        let config = Self { train_ratio, seed };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(TumorError::Config(format!(
                "train ratio must be between 0 and 1 (exclusive), got {}",
                self.train_ratio
            )));
        }
        Ok(())
    }
}

/// One file's assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitEntry {
    /// Source image path
    pub source: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class directory name
    pub class_name: String,
}

impl SplitEntry {
    fn from_sample(sample: &ImageSample) -> Self {
        Self {
            source: sample.path.clone(),
            label: sample.label,
            class_name: sample.class_name.clone(),
        }
    }

    /// Destination path under a partition directory
    pub fn destination(&self, partition_dir: &Path) -> Result<PathBuf> {
        let file_name = self.source.file_name().ok_or_else(|| {
            TumorError::Dataset(format!("image path has no file name: {:?}", self.source))
        })?;
        Ok(partition_dir.join(&self.class_name).join(file_name))
    }
}

/// Train/validation assignment of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplit {
    /// Training partition
    pub train: Vec<SplitEntry>,
    /// Validation partition
    pub val: Vec<SplitEntry>,
    /// Class names, indexed by label
    pub class_names: Vec<String>,
    /// Configuration used to create this split
    pub config: SplitConfig,
}

impl DatasetSplit {
    /// Split a discovered image folder
    pub fn from_folder(folder: &ImageFolder, config: SplitConfig) -> Result<Self> {
        Self::from_samples(&folder.samples, folder.class_names.clone(), config)
    }

    /// Split samples per class
    pub fn from_samples(
        samples: &[ImageSample],
        class_names: Vec<String>,
        config: SplitConfig,
    ) -> Result<Self> {
        config.validate()?;

        if samples.is_empty() {
            return Err(TumorError::Dataset(
                "No images provided for splitting".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut train = Vec::new();
        let mut val = Vec::new();

        for label in 0..class_names.len() {
            let mut class_samples: Vec<&ImageSample> =
                samples.iter().filter(|s| s.label == label).collect();
            class_samples.sort_by(|a, b| a.path.cmp(&b.path));
            class_samples.shuffle(&mut rng);

            let n_train = (class_samples.len() as f64 * config.train_ratio).floor() as usize;

            debug!(
                "Class '{}': {} train, {} val",
                class_names[label],
                n_train,
                class_samples.len() - n_train
            );

            for (i, sample) in class_samples.into_iter().enumerate() {
                let entry = SplitEntry::from_sample(sample);
                if i < n_train {
                    train.push(entry);
                } else {
                    val.push(entry);
                }
            }
        }

        Ok(Self {
            train,
            val,
            class_names,
            config,
        })
    }

    /// Copy every file into `out/train/<class>` and `out/val/<class>` and
    /// write the manifest
    pub fn materialize(&self, out_dir: &Path) -> Result<()> {
        for (partition, entries) in [("train", &self.train), ("val", &self.val)] {
            let partition_dir = out_dir.join(partition);
            for class_name in &self.class_names {
                std::fs::create_dir_all(partition_dir.join(class_name))?;
            }

            for entry in entries.iter() {
                let dest = entry.destination(&partition_dir)?;
                std::fs::copy(&entry.source, &dest)?;
            }
        }

        self.save(&out_dir.join(SPLIT_MANIFEST))?;
        info!(
            "Wrote split to {:?} ({} train, {} val)",
            out_dir,
            self.train.len(),
            self.val.len()
        );
        Ok(())
    }

    /// Get statistics about the split
    pub fn stats(&self) -> SplitStats {
        let count = |entries: &[SplitEntry]| {
            let mut counts = vec![0usize; self.class_names.len()];
            for e in entries {
                if let Some(c) = counts.get_mut(e.label) {
                    *c += 1;
                }
            }
            counts
        };

        SplitStats {
            class_names: self.class_names.clone(),
            train_per_class: count(&self.train),
            val_per_class: count(&self.val),
        }
    }

    /// Save the split to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a split from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Per-class counts of a split
#[derive(Debug, Clone)]
pub struct SplitStats {
    pub class_names: Vec<String>,
    pub train_per_class: Vec<usize>,
    pub val_per_class: Vec<usize>,
}

impl SplitStats {
    pub fn train_total(&self) -> usize {
        self.train_per_class.iter().sum()
    }

    pub fn val_total(&self) -> usize {
        self.val_per_class.iter().sum()
    }
}

impl fmt::Display for SplitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.train_total() + self.val_total();
        writeln!(f, "Dataset Split Statistics:")?;
        writeln!(f, "  Total images: {}", total)?;
        writeln!(
            f,
            "  Train: {} ({:.1}%)",
            self.train_total(),
            100.0 * self.train_total() as f64 / total.max(1) as f64
        )?;
        writeln!(
            f,
            "  Val:   {} ({:.1}%)",
            self.val_total(),
            100.0 * self.val_total() as f64 / total.max(1) as f64
        )?;
        for (i, name) in self.class_names.iter().enumerate() {
            writeln!(
                f,
                "    {:20} train {:5}  val {:5}",
                name, self.train_per_class[i], self.val_per_class[i]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_samples(per_class: &[usize]) -> (Vec<ImageSample>, Vec<String>) {
        let class_names = vec!["Brain Tumor".to_string(), "Healthy".to_string()];
        let mut samples = Vec::new();
        for (label, &n) in per_class.iter().enumerate() {
            for i in 0..n {
                samples.push(ImageSample {
                    path: PathBuf::from(format!("{}/img_{:03}.jpg", class_names[label], i)),
                    label,
                    class_name: class_names[label].clone(),
                    id: samples.len(),
                });
            }
        }
        (samples, class_names)
    }

    #[test]
    fn test_per_class_floor_counts() {
        let (samples, names) = create_test_samples(&[11, 7]);
        let split = DatasetSplit::from_samples(&samples, names, SplitConfig::default()).unwrap();
        let stats = split.stats();

        // floor(0.8 * 11) = 8, floor(0.8 * 7) = 5
        assert_eq!(stats.train_per_class, vec![8, 5]);
        assert_eq!(stats.val_per_class, vec![3, 2]);
        assert_eq!(split.train.len() + split.val.len(), 18);
    }

    #[test]
    fn test_reproducibility() {
        let (samples, names) = create_test_samples(&[50, 40]);
        let a = DatasetSplit::from_samples(&samples, names.clone(), SplitConfig::default()).unwrap();

        let mut reversed = samples.clone();
        reversed.reverse();
        let b = DatasetSplit::from_samples(&reversed, names, SplitConfig::default()).unwrap();

        assert_eq!(a.train, b.train);
        assert_eq!(a.val, b.val);
    }

    #[test]
    fn test_seed_changes_assignment() {
        let (samples, names) = create_test_samples(&[50, 40]);
        let a = DatasetSplit::from_samples(&samples, names.clone(), SplitConfig::new(0.8, 20).unwrap())
            .unwrap();
        let b = DatasetSplit::from_samples(&samples, names, SplitConfig::new(0.8, 21).unwrap()).unwrap();

        assert_ne!(a.train, b.train);
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(SplitConfig::new(1.0, 20).is_err());
        assert!(SplitConfig::new(0.0, 20).is_err());
        assert!(SplitConfig::new(0.8, 20).is_ok());
    }

    #[test]
    fn test_materialize_layout() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for class in ["Brain Tumor", "Healthy"] {
            std::fs::create_dir(src.path().join(class)).unwrap();
            for i in 0..5 {
                let img = image::RgbImage::from_pixel(4, 4, image::Rgb([i as u8, 0, 0]));
                img.save(src.path().join(class).join(format!("{}.png", i))).unwrap();
            }
        }

        let folder = ImageFolder::new(src.path()).unwrap();
        let split = DatasetSplit::from_folder(&folder, SplitConfig::default()).unwrap();
        split.materialize(out.path()).unwrap();

        let train = ImageFolder::new(out.path().join("train")).unwrap();
        let val = ImageFolder::new(out.path().join("val")).unwrap();
        assert_eq!(train.get_stats().class_counts, vec![4, 4]);
        assert_eq!(val.get_stats().class_counts, vec![1, 1]);

        let manifest = DatasetSplit::load(&out.path().join(SPLIT_MANIFEST)).unwrap();
        assert_eq!(manifest.train, split.train);
    }
}
