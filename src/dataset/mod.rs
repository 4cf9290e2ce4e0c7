//! Dataset module for brain MRI data handling
//!
//! This module provides functionality for:
//! - Discovering an image-folder dataset on disk (one directory per class)
//! - Reproducible per-class train/validation splitting
//! - Geometric augmentation and ImageNet normalization
//! - Burn dataset and batcher types feeding the training loop
//!
//! ## Expected Layout
//!
//! ```text
//! data/
//! ├── Brain Tumor/
//! │   ├── Cancer (1).jpg
//! │   └── ...
//! └── Healthy/
//!     └── ...
//! ```
//!
//! Class directories are sorted by name, so "Brain Tumor" is label 0 and
//! "Healthy" is label 1.

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod split;

// Re-export main types for convenience
pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{ImageDataset, RawImageItem, SeededItem, TumorBatch, TumorBatcher};
pub use loader::{DatasetStats, ImageFolder, ImageSample};
pub use split::{DatasetSplit, SplitConfig, SplitEntry, SplitStats};

/// Number of output classes
pub const NUM_CLASSES: usize = 2;

/// Default image dimensions fed to the network
pub const DEFAULT_IMAGE_SIZE: usize = 256;

/// Display names, indexed by label
pub const CLASS_LABELS: [&str; NUM_CLASSES] = ["Brain Tumor", "Healthy"];

/// Per-channel ImageNet mean (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel ImageNet standard deviation (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// File extensions recognised as images (lowercase)
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Get the display label for a given label index
pub fn class_label(label: usize) -> Option<&'static str> {
    CLASS_LABELS.get(label).copied()
}

/// Get the label index for a display label
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_LABELS.iter().position(|&n| n == name)
}

/// Axis tick label used in plots, e.g. "Healthy=1"
pub fn tick_label(label: usize) -> String {
    match class_label(label) {
        Some(name) => format!("{}={}", name, label),
        None => format!("class {}={}", label, label),
    }
}

/// Check whether a path has a recognised image extension
pub fn is_image_file(path: &std::path::Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_class_label() {
        assert_eq!(class_label(0), Some("Brain Tumor"));
        assert_eq!(class_label(1), Some("Healthy"));
        assert_eq!(class_label(2), None);
    }

    #[test]
    fn test_class_index() {
        assert_eq!(class_index("Brain Tumor"), Some(0));
        assert_eq!(class_index("Healthy"), Some(1));
        assert_eq!(class_index("Glioma"), None);
    }

    #[test]
    fn test_tick_label() {
        assert_eq!(tick_label(0), "Brain Tumor=0");
        assert_eq!(tick_label(1), "Healthy=1");
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("scan.JPG")));
        assert!(is_image_file(Path::new("a/b/scan.tiff")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("no_extension")));
    }
}
