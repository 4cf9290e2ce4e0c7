//! # Brain Tumor CNN
//!
//! Binary classification of brain MRI slices ("Brain Tumor" vs "Healthy")
//! with a small convolutional network built on the Burn framework.
//!
//! ## Pipeline
//!
//! 1. Split a `<root>/<class>/<images>` folder 80/20 per class (seed 20)
//! 2. Train with random flips and rotations, summed NLL loss and Adam
//! 3. Keep the checkpoint with the lowest validation loss, halving the
//!    learning rate on plateaus and rolling back to the best checkpoint
//! 4. Evaluate on the validation split: confusion matrix and
//!    classification report
//!
//! ## Modules
//!
//! - `dataset`: Folder discovery, splitting, augmentation and batching
//! - `model`: The four-stage CNN and its shape inference
//! - `training`: Epoch loop, best checkpoint, LR scheduling, history
//! - `evaluation`: Predictions, confusion matrix and reports
//! - `config`: JSON run configuration
//! - `pipeline`: The split, train and evaluate stages behind the CLI
//! - `utils`: Errors, logging, metrics and SVG charts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brain_tumor_cnn::{backend, RunConfig};
//! use brain_tumor_cnn::dataset::{ImageDataset, ImageFolder};
//!
//! let config = RunConfig::default();
//! let device = backend::default_device();
//! let train = ImageDataset::from_folder(&ImageFolder::new(config.train_dir())?, 256)?;
//! let val = ImageDataset::from_folder(&ImageFolder::new(config.val_dir())?, 256)?;
//! let model = config.model.init::<backend::TrainingBackend>(&device)?;
//! let outcome = brain_tumor_cnn::training::fit(
//!     model, &train, &val, &config.training, &config.augmentation,
//!     &config.checkpoint_path(), &device,
//! )?;
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod evaluation;
pub mod model;
pub mod pipeline;
pub mod training;
pub mod utils;

pub use config::RunConfig;
pub use dataset::{DatasetSplit, ImageDataset, ImageFolder, SplitConfig, TumorBatcher};
pub use evaluation::{evaluate, EvaluationReport};
pub use model::{TumorClassifier, TumorClassifierConfig};
pub use training::{fit, TrainingConfig, TrainingOutcome};
pub use utils::error::{Result, TumorError};
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
