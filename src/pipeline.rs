//! Run Stages
//!
//! The three stages the CLI drives, each taking the `RunConfig` and the
//! device explicitly:
//! - `split_dataset`: materialize `train/` and `val/` from the raw folder
//! - `train`: fit the classifier and write every training artifact
//! - `evaluate_saved`: rebuild a saved model and evaluate it

use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    data::dataset::Dataset,
    module::AutodiffModule,
    tensor::backend::{AutodiffBackend, Backend},
};
use chrono::Local;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RunConfig;
use crate::dataset::{DatasetSplit, ImageDataset, ImageFolder, TumorBatcher};
use crate::evaluation::{evaluate, EvaluationReport};
use crate::model::{TumorClassifier, TumorClassifierConfig};
use crate::training::{fit, load_model, persist_model, TrainingHistory, TrainingOutcome};
use crate::utils::charts::{generate_line_chart, DataSeries, COLOR_PRIMARY, COLOR_SECONDARY};
use crate::utils::error::{Result, TumorError};

pub const RUN_CONFIG_FILE: &str = "run_config.json";
pub const HISTORY_FILE: &str = "history.json";
pub const SUMMARY_FILE: &str = "training_summary.json";
pub const LOSS_CHART: &str = "loss_history.svg";
pub const ACCURACY_CHART: &str = "accuracy_history.svg";

/// Metadata written next to the training outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub timestamp: String,
    pub backend: String,
    pub epochs: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub best_epoch: Option<usize>,
    pub best_val_loss: f64,
    pub checkpoint_version: u64,
    pub val_accuracy: f64,
    pub model_path: PathBuf,
}

/// Result of `train`
pub struct TrainingRun<B: AutodiffBackend> {
    pub outcome: TrainingOutcome<B>,
    pub evaluation: EvaluationReport,
    pub summary: TrainingSummary,
}

/// Split the raw dataset folder and copy it into the split directory
pub fn split_dataset(config: &RunConfig) -> Result<DatasetSplit> {
    let folder = ImageFolder::new(&config.data_dir)?;
    let split = DatasetSplit::from_folder(&folder, config.split.clone())?;
    split.materialize(&config.split_dir)?;
    Ok(split)
}

/// Fail unless the folder has one class directory per model output
pub fn check_class_count(folder: &ImageFolder, num_classes: usize) -> Result<()> {
    if folder.num_classes() != num_classes {
        return Err(TumorError::Dataset(format!(
            "{:?} has {} class directories {:?}, the model expects {}",
            folder.root_dir,
            folder.num_classes(),
            folder.class_names,
            num_classes
        )));
    }
    Ok(())
}

/// Decode the materialized train and val folders
pub fn load_split(config: &RunConfig) -> Result<(ImageDataset, ImageDataset)> {
    let size = config.augmentation.image_size;
    let train_folder = ImageFolder::new(config.train_dir())?;
    let val_folder = ImageFolder::new(config.val_dir())?;
    check_class_count(&train_folder, config.model.num_classes)?;

    if train_folder.class_names != val_folder.class_names {
        return Err(TumorError::Dataset(format!(
            "train classes {:?} differ from val classes {:?}",
            train_folder.class_names, val_folder.class_names
        )));
    }

    Ok((
        ImageDataset::from_folder(&train_folder, size)?,
        ImageDataset::from_folder(&val_folder, size)?,
    ))
}

/// Shapes of the first batch a loader would produce: (images, targets)
pub fn first_batch_shapes<B: Backend>(
    dataset: &ImageDataset,
    batcher: &TumorBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Option<([usize; 4], [usize; 1])> {
    if dataset.is_empty() {
        return None;
    }
    let indices: Vec<usize> = (0..batch_size.min(dataset.len())).collect();
    let batch = batcher.make_batch::<B>(dataset.seeded_items(&indices, None), device);
    Some((batch.images.dims(), batch.targets.dims()))
}

fn print_shapes<B: Backend>(name: &str, dataset: &ImageDataset, batch_size: usize, image_size: u32, device: &B::Device) {
    if let Some((x, y)) = first_batch_shapes::<B>(dataset, &TumorBatcher::clean(image_size), batch_size, device) {
        println!("  {} loader:", name);
        println!("    Shape of X [N, C, H, W]: {:?}", x);
        println!("    Shape of y: {:?} Int", y);
    }
}

fn print_model_summary(config: &TumorClassifierConfig) -> Result<()> {
    println!("{}", "Model:".cyan().bold());
    println!("  Input: {:?}", config.input_shape);
    for (i, shape) in config.shape_summary()?.iter().enumerate() {
        println!(
            "  Stage {}: {} x {} x {}",
            i + 1,
            shape.channels,
            shape.height,
            shape.width
        );
    }
    println!("  Flatten: {}", config.flatten_size()?);
    println!("  fc1: {} (dropout {})", config.num_fc1, config.dropout);
    println!("  fc2: {}", config.num_classes);
    println!();
    Ok(())
}

/// Plot train/val traces of the history
pub fn save_history_charts(history: &TrainingHistory, output_dir: &Path) -> Result<()> {
    generate_line_chart(
        "Loss",
        "Epoch",
        "Loss",
        &[
            DataSeries::from_epochs("train", &history.loss.train, COLOR_PRIMARY),
            DataSeries::from_epochs("validation", &history.loss.val, COLOR_SECONDARY),
        ],
        &output_dir.join(LOSS_CHART),
    )?;
    generate_line_chart(
        "Accuracy",
        "Epoch",
        "Accuracy",
        &[
            DataSeries::from_epochs("train", &history.accuracy.train, COLOR_PRIMARY),
            DataSeries::from_epochs("validation", &history.accuracy.val, COLOR_SECONDARY),
        ],
        &output_dir.join(ACCURACY_CHART),
    )?;
    Ok(())
}

/// Write the model record and the config needed to rebuild it
pub fn save_trained_model<B: Backend>(
    model: &TumorClassifier<B>,
    model_config: &TumorClassifierConfig,
    path: &Path,
) -> Result<PathBuf> {
    let written = persist_model::<B, _>(model, path)?;
    model_config.save(path.with_extension("json"))?;
    Ok(written)
}

/// Rebuild a model saved by `save_trained_model`
pub fn load_trained_model<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(TumorClassifier<B>, TumorClassifierConfig)> {
    let config_path = path.with_extension("json");
    let config = TumorClassifierConfig::load(&config_path)
        .map_err(|e| TumorError::Config(format!("failed to read {:?}: {:?}", config_path, e)))?;
    let model = config.init::<B>(device)?;
    Ok((load_model::<B, _>(model, path, device)?, config))
}

/// Fit on the split directory and write all artifacts to the output directory
pub fn train<B: AutodiffBackend>(config: &RunConfig, device: &B::Device) -> Result<TrainingRun<B>> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;
    config.save(&config.output_dir.join(RUN_CONFIG_FILE))?;

    B::seed(config.training.seed);

    println!("{}", "Loading Dataset...".cyan());
    let (train_set, val_set) = load_split(config)?;
    info!(
        "Class counts: train {:?}, val {:?}",
        train_set.class_distribution(config.model.num_classes),
        val_set.class_distribution(config.model.num_classes)
    );
    let image_size = config.augmentation.image_size;
    print_shapes::<B::InnerBackend>("Train", &train_set, config.training.batch_size, image_size, device);
    print_shapes::<B::InnerBackend>("Val", &val_set, config.training.batch_size, image_size, device);
    println!();

    print_model_summary(&config.model)?;
    let model = config.model.init::<B>(device)?;

    println!("{}", "Training...".green().bold());
    let outcome = fit(
        model,
        &train_set,
        &val_set,
        &config.training,
        &config.augmentation,
        &config.checkpoint_path(),
        device,
    )?;

    let model_path = save_trained_model::<B>(&outcome.model, &config.model, &config.model_path())?;
    outcome.history.save(&config.output_dir.join(HISTORY_FILE))?;
    save_history_charts(&outcome.history, &config.output_dir)?;

    let evaluation = evaluate::<B::InnerBackend>(
        &outcome.model.valid(),
        &val_set,
        &TumorBatcher::clean(image_size),
        config.training.batch_size,
        device,
    )?;
    evaluation.save(&config.output_dir)?;

    let summary = TrainingSummary {
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        backend: crate::backend::backend_name().to_string(),
        epochs: outcome.history.epochs(),
        train_samples: train_set.len(),
        val_samples: val_set.len(),
        best_epoch: outcome.best_epoch,
        best_val_loss: outcome.best_val_loss,
        checkpoint_version: outcome.checkpoint_version,
        val_accuracy: evaluation.accuracy(),
        model_path,
    };
    std::fs::write(
        config.output_dir.join(SUMMARY_FILE),
        serde_json::to_string_pretty(&summary)?,
    )?;
    info!("Wrote training outputs to {:?}", config.output_dir);

    Ok(TrainingRun {
        outcome,
        evaluation,
        summary,
    })
}

/// Evaluate a saved model on the validation split
pub fn evaluate_saved<B: Backend>(
    config: &RunConfig,
    model_path: &Path,
    device: &B::Device,
) -> Result<EvaluationReport> {
    let (model, model_config) = load_trained_model::<B>(model_path, device)?;
    let image_size = model_config.input_shape[1] as u32;

    let val_folder = ImageFolder::new(config.val_dir())?;
    check_class_count(&val_folder, model_config.num_classes)?;
    let val_set = ImageDataset::from_folder(&val_folder, image_size)?;
    let report = evaluate(
        &model,
        &val_set,
        &TumorBatcher::clean(image_size),
        config.training.batch_size,
        device,
    )?;
    report.save(&config.output_dir)?;
    Ok(report)
}
