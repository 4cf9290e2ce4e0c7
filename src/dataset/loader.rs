//! Image Folder Loader
//!
//! Discovers a class-per-directory image dataset on disk and decodes
//! individual images at the network input size.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::is_image_file;
use crate::utils::error::{Result, TumorError};
use crate::utils::format_bar;

/// A single image sample with its label and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class directory name (e.g., "Healthy")
    pub class_name: String,
    /// Unique sample ID
    pub id: usize,
}

/// Image dataset laid out as `root/<class>/<image>`
#[derive(Debug)]
pub struct ImageFolder {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples, ordered by class then file name
    pub samples: Vec<ImageSample>,
    /// Class directory names, indexed by label
    pub class_names: Vec<String>,
    /// Mapping from class name to label index
    pub class_to_idx: HashMap<String, usize>,
}

impl ImageFolder {
    /// Scan a directory of class folders
    ///
    /// Classes are sorted by directory name to assign label indices. Only
    /// files directly inside a class directory with an image extension are
    /// picked up.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading image folder from: {:?}", root_dir);

        if !root_dir.exists() {
            return Err(TumorError::PathNotFound(root_dir));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(TumorError::Dataset(format!(
                "no class directories found in {:?}",
                root_dir
            )));
        }

        info!("Found {} classes: {:?}", class_names.len(), class_names);

        let class_to_idx: HashMap<String, usize> = class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let mut samples = Vec::new();

        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path().to_path_buf())
                .filter(|p| is_image_file(p))
                .collect();
            paths.sort();

            debug!("Class '{}' (label {}): {} images", class_name, label, paths.len());

            for path in paths {
                let id = samples.len();
                samples.push(ImageSample {
                    path,
                    label,
                    class_name: class_name.clone(),
                    id,
                });
            }
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            class_names,
            class_to_idx,
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

    /// Get samples for a specific class
    pub fn samples_for_class(&self, class_idx: usize) -> Vec<&ImageSample> {
        self.samples
            .iter()
            .filter(|s| s.label == class_idx)
            .collect()
    }

    /// Get statistics about the dataset
    pub fn get_stats(&self) -> DatasetStats {
        let class_counts: Vec<usize> = (0..self.num_classes())
            .map(|idx| self.samples_for_class(idx).len())
            .collect();

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.class_names.clone(),
        }
    }
}

/// Decode an image as RGB and resize it to `size`×`size`
///
/// Grayscale and RGBA inputs are converted to three channels.
pub fn load_image(path: &Path, size: u32) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .map_err(|e| TumorError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| TumorError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| TumorError::ImageLoad(path.to_path_buf(), e.to_string()))?;

    let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);

    Ok(resized.to_rgb8())
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
    /// Print statistics to console
    pub fn print(&self) {
        println!("\n📊 Dataset Statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let fraction = if self.total_samples > 0 {
                count as f64 / self.total_samples as f64
            } else {
                0.0
            };
            println!(
                "    {:3}. {:20} {:6} {}",
                idx,
                name,
                count,
                format_bar(fraction, 40)
            );
        }
    }
}
