//! Run Configuration
//!
//! Every path and hyperparameter of one run, passed explicitly into the
//! split, training and evaluation stages. Stored as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::{AugmentationConfig, SplitConfig};
use crate::model::TumorClassifierConfig;
use crate::training::TrainingConfig;
use crate::utils::error::{Result, ResultExt, TumorError};

/// Top-level configuration for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Unsplit dataset root (`<root>/<class>/<images>`)
    pub data_dir: PathBuf,
    /// Where `train/` and `val/` are materialized
    pub split_dir: PathBuf,
    /// Checkpoints, model artifact, histories and reports
    pub output_dir: PathBuf,
    pub split: SplitConfig,
    pub augmentation: AugmentationConfig,
    pub model: TumorClassifierConfig,
    pub training: TrainingConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/brain_tumor"),
            split_dir: PathBuf::from("data/split"),
            output_dir: PathBuf::from("output"),
            split: SplitConfig::default(),
            augmentation: AugmentationConfig::default(),
            model: TumorClassifierConfig::brain_tumor(),
            training: TrainingConfig::default(),
        }
    }
}

impl RunConfig {
    /// Use a different square image size for both the pipeline and the model
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.augmentation.image_size = size;
        self.model = self.model.with_image_size(size as usize);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.split.validate()?;
        self.model.validate()?;
        self.training.validate()?;

        let [_, height, width] = self.model.input_shape;
        let size = self.augmentation.image_size as usize;
        if height != size || width != size {
            return Err(TumorError::Config(format!(
                "model input {}x{} does not match image size {}",
                height, width, size
            )));
        }
        for (name, p) in [
            ("horizontal flip", self.augmentation.horizontal_flip_prob),
            ("vertical flip", self.augmentation.vertical_flip_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(TumorError::Config(format!(
                    "{} probability must be in [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.augmentation.rotation_degrees < 0.0 {
            return Err(TumorError::Config("rotation degrees must not be negative".to_string()));
        }

        Ok(())
    }

    /// Best checkpoint path (without the recorder extension)
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(&self.training.checkpoint_path)
    }

    /// Final model artifact path (without extension)
    pub fn model_path(&self) -> PathBuf {
        self.output_dir.join(&self.training.model_path)
    }

    pub fn train_dir(&self) -> PathBuf {
        self.split_dir.join("train")
    }

    pub fn val_dir(&self) -> PathBuf {
        self.split_dir.join("val")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TumorError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing run config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.checkpoint_path(), PathBuf::from("output/weights"));
        assert_eq!(config.val_dir(), PathBuf::from("data/split/val"));
    }

    #[test]
    fn test_image_size_mismatch_rejected() {
        let mut config = RunConfig::default();
        config.augmentation.image_size = 128;
        assert!(config.validate().is_err());

        let resized = RunConfig::default().with_image_size(128);
        assert!(resized.validate().is_ok());
        assert_eq!(resized.model.input_shape, [3, 128, 128]);
    }

    #[test]
    fn test_bad_values_rejected() {
        let mut config = RunConfig::default();
        config.split.train_ratio = 1.0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.model.dropout = 1.0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.training.epochs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.json");
        let mut config = RunConfig::default().with_image_size(64);
        config.training.epochs = 7;

        config.save(&path).unwrap();
        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded.training, config.training);
        assert_eq!(loaded.augmentation, config.augmentation);
        assert_eq!(loaded.model.input_shape, [3, 64, 64]);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"output_dir": "runs/a", "training": {"epochs": 5}}"#).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("runs/a"));
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.batch_size, 64);
        assert_eq!(config.split.seed, 20);
    }
}
