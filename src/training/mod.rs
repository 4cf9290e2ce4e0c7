//! Training module for the supervised classifier
//!
//! This module provides:
//! - The epoch loop as an explicit phase machine
//! - Summed negative log-likelihood loss and accuracy accumulation
//! - Single-slot best checkpoint store with disk persistence
//! - Reduce-on-plateau learning rate scheduling
//! - Per-epoch loss/accuracy history
//!
//! ## Epoch Flow
//!
//! ```text
//! Idle -> EpochTraining -> EpochValidating -> CheckpointDecision -> LrAdjust
//!             ^                                                        |
//!             +---------------------- next epoch ---------------------+
//!                                                                      v
//!                                                                    Done
//! ```

pub mod checkpoint;
pub mod history;
pub mod scheduler;
pub mod trainer;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, TumorError};

// Re-export main types for convenience
pub use checkpoint::{load_model, persist_model, BestCheckpoint};
pub use history::{History, TrainingHistory};
pub use scheduler::{LrStep, PlateauMode, ReduceOnPlateau};
pub use trainer::{
    batch_loss, decide, evaluate_loss, fit, EpochDecision, EpochStats, EpochSummary, Trainer,
    TrainingOutcome, TrainingPhase,
};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 100;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default Adam learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 3e-4;

/// Hyperparameters and artifact names for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of epochs
    pub epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Initial Adam learning rate
    pub learning_rate: f64,
    /// Multiplicative LR reduction on plateau
    pub lr_factor: f64,
    /// Epochs without improvement tolerated before reducing
    pub lr_patience: usize,
    /// Relative improvement required to reset the plateau counter
    pub lr_threshold: f64,
    /// Lower bound on the learning rate
    pub min_lr: f64,
    /// Seed for weight init, shuffling and augmentation
    pub seed: u64,
    /// Best checkpoint file stem (the recorder adds `.bin`)
    pub checkpoint_path: String,
    /// Final model file stem
    pub model_path: String,
    /// Apply random augmentation to validation batches too
    ///
    /// Off by default: validation batches are only resized and normalized,
    /// so the validation loss behind the best checkpoint and the LR schedule
    /// is reproducible. Set it to validate on flipped and rotated batches
    /// with a fresh seed each epoch, as a loader sharing the training
    /// transforms would.
    pub augment_validation: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            lr_factor: 0.5,
            lr_patience: 20,
            lr_threshold: 1e-4,
            min_lr: 0.0,
            seed: 20,
            checkpoint_path: "weights".to_string(),
            model_path: "brain_tumor_model".to_string(),
            augment_validation: false,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TumorError::Config("epochs must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TumorError::Config("batch size must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(TumorError::Config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.lr_factor > 0.0 && self.lr_factor < 1.0) {
            return Err(TumorError::Config(format!(
                "lr factor must be in (0, 1), got {}",
                self.lr_factor
            )));
        }
        if self.min_lr < 0.0 || self.lr_threshold < 0.0 {
            return Err(TumorError::Config(
                "min lr and lr threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Scheduler configured from these hyperparameters
    pub fn scheduler(&self) -> ReduceOnPlateau {
        ReduceOnPlateau::new(
            self.learning_rate,
            self.lr_factor,
            self.lr_patience,
            self.lr_threshold,
            self.min_lr,
            PlateauMode::Min,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 100);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.learning_rate, 3e-4);
        assert_eq!(config.lr_patience, 20);
        assert_eq!(config.seed, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_batch = TrainingConfig { batch_size: 0, ..Default::default() };
        assert!(zero_batch.validate().is_err());

        let bad_lr = TrainingConfig { learning_rate: 0.0, ..Default::default() };
        assert!(bad_lr.validate().is_err());

        let bad_factor = TrainingConfig { lr_factor: 1.0, ..Default::default() };
        assert!(bad_factor.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig = serde_json::from_str(r#"{"epochs": 3}"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 64);
    }
}
