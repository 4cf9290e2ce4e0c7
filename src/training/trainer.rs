//! Training Loop for the Brain Tumor Classifier
//!
//! This module implements the epoch loop using the Burn framework directly:
//! - Forward/backward passes with automatic differentiation
//! - Summed negative log-likelihood loss
//! - Adam optimizer with reduce-on-plateau learning rate
//! - Validation on the inner (non-autodiff) backend
//! - Best-checkpoint tracking with rollback when the learning rate changes

use std::fmt;
use std::path::{Path, PathBuf};

use burn::{
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::checkpoint::BestCheckpoint;
use super::history::TrainingHistory;
use super::scheduler::{LrStep, ReduceOnPlateau};
use super::TrainingConfig;
use crate::dataset::augmentation::AugmentationConfig;
use crate::dataset::burn_dataset::{epoch_batches, ImageDataset, TumorBatch, TumorBatcher};
use crate::model::TumorClassifier;
use crate::utils::error::{Result, TumorError};
use crate::utils::logging::TrainingLogger;

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingPhase {
    Idle,
    EpochTraining,
    EpochValidating,
    CheckpointDecision,
    LrAdjust,
    Done,
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingPhase::Idle => "idle",
            TrainingPhase::EpochTraining => "training",
            TrainingPhase::EpochValidating => "validating",
            TrainingPhase::CheckpointDecision => "checkpoint decision",
            TrainingPhase::LrAdjust => "lr adjust",
            TrainingPhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Loss and accuracy accumulated over one pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochStats {
    /// Sum of per-batch summed losses
    pub loss_sum: f64,
    pub correct: usize,
    pub count: usize,
    pub batches: usize,
}

impl EpochStats {
    pub fn add_batch(&mut self, loss_sum: f64, correct: usize, count: usize) {
        self.loss_sum += loss_sum;
        self.correct += correct;
        self.count += count;
        self.batches += 1;
    }

    /// Summed loss divided by the number of samples
    pub fn avg_loss(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.loss_sum / self.count as f64
        }
    }

    /// Fraction of correct predictions
    pub fn accuracy(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.correct as f64 / self.count as f64
        }
    }
}

/// Outcome of the checkpoint decision and scheduler step for one epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochDecision {
    /// New checkpoint version, if this epoch improved
    pub checkpoint: Option<u64>,
    pub lr: LrStep,
}

impl EpochDecision {
    /// Roll back to the best checkpoint iff the learning rate changed
    pub fn reload_best(&self) -> bool {
        self.lr.changed()
    }
}

/// Offer the candidate to the store, then step the scheduler
pub fn decide<T: Clone>(
    best: &mut BestCheckpoint<T>,
    scheduler: &mut ReduceOnPlateau,
    val_loss: f64,
    candidate: &T,
) -> EpochDecision {
    let checkpoint = best.offer(val_loss, candidate);
    let lr = scheduler.step(val_loss);
    EpochDecision { checkpoint, lr }
}

/// Per-epoch record kept in the outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// Zero-based epoch index
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub train_batches: usize,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Learning rate used during the epoch
    pub learning_rate: f64,
    /// Learning rate after the scheduler step
    pub next_learning_rate: f64,
    pub checkpoint_version: Option<u64>,
    pub reloaded: bool,
}

/// Everything `fit` hands back
#[derive(Debug)]
pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Model holding the best checkpoint's parameters
    pub model: TumorClassifier<B>,
    pub history: TrainingHistory,
    pub epochs: Vec<EpochSummary>,
    pub best_epoch: Option<usize>,
    pub best_val_loss: f64,
    pub checkpoint_version: u64,
    /// Phases in the order they were entered
    pub phases: Vec<TrainingPhase>,
}

/// Summed negative log-likelihood of the target classes
pub fn nll_loss_sum<B: Backend>(log_probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [batch_size, _] = log_probs.dims();
    log_probs
        .gather(1, targets.reshape([batch_size, 1]))
        .sum()
        .neg()
}

/// Arg-max class per row
pub fn predictions<B: Backend>(log_probs: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    let [batch_size, _] = log_probs.dims();
    log_probs.argmax(1).reshape([batch_size])
}

/// Number of rows whose arg-max matches the target
pub fn count_correct<B: Backend>(log_probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let correct: i64 = predictions(log_probs)
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem();
    correct as usize
}

/// Forward a batch; returns the summed loss and the number of correct predictions
pub fn batch_loss<B: Backend>(model: &TumorClassifier<B>, batch: &TumorBatch<B>) -> (Tensor<B, 1>, usize) {
    let output = model.forward(batch.images.clone());
    let correct = count_correct(output.clone(), batch.targets.clone());
    (nll_loss_sum(output, batch.targets.clone()), correct)
}

/// One pass over `dataset` without parameter updates
///
/// Pass a model on a non-autodiff backend (`model.valid()`) so no graph is
/// recorded and dropout is off.
pub fn evaluate_loss<B: Backend>(
    model: &TumorClassifier<B>,
    dataset: &ImageDataset,
    batcher: &TumorBatcher,
    batch_size: usize,
    epoch_seed: Option<u64>,
    device: &B::Device,
) -> EpochStats {
    let mut stats = EpochStats::default();

    for indices in epoch_batches(dataset.len(), batch_size, None) {
        let batch = batcher.make_batch::<B>(dataset.seeded_items(&indices, epoch_seed), device);
        let (loss, correct) = batch_loss(model, &batch);
        let loss_value: f64 = loss.into_scalar().elem();
        stats.add_batch(loss_value, correct, indices.len());
    }

    stats
}

/// Epoch loop state
pub struct Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<TumorClassifier<B>, B>,
{
    model: TumorClassifier<B>,
    optimizer: O,
    scheduler: ReduceOnPlateau,
    best: BestCheckpoint<TumorClassifier<B>>,
    config: TrainingConfig,
    train_batcher: TumorBatcher,
    val_batcher: TumorBatcher,
    checkpoint_path: PathBuf,
    device: B::Device,
    rng: ChaCha8Rng,
    phase: TrainingPhase,
    phases: Vec<TrainingPhase>,
    history: TrainingHistory,
    summaries: Vec<EpochSummary>,
    logger: TrainingLogger,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<TumorClassifier<B>, B>,
{
    pub fn new(
        model: TumorClassifier<B>,
        optimizer: O,
        config: TrainingConfig,
        augmentation: AugmentationConfig,
        checkpoint_path: PathBuf,
        device: B::Device,
    ) -> Self {
        let val_batcher = if config.augment_validation {
            TumorBatcher::new(augmentation.clone())
        } else {
            TumorBatcher::clean(augmentation.image_size)
        };

        Self {
            model,
            optimizer,
            scheduler: config.scheduler(),
            best: BestCheckpoint::new(),
            train_batcher: TumorBatcher::new(augmentation),
            val_batcher,
            checkpoint_path,
            device,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            phase: TrainingPhase::Idle,
            phases: vec![TrainingPhase::Idle],
            history: TrainingHistory::default(),
            summaries: Vec::new(),
            logger: TrainingLogger::new(config.epochs),
            config,
        }
    }

    /// Current phase
    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn model(&self) -> &TumorClassifier<B> {
        &self.model
    }

    fn enter(&mut self, phase: TrainingPhase) {
        debug!("Phase {} -> {}", self.phase, phase);
        self.phase = phase;
        self.phases.push(phase);
    }

    /// One optimizer pass over the shuffled training set
    fn train_epoch(&mut self, dataset: &ImageDataset) -> Result<EpochStats> {
        if dataset.is_empty() {
            return Err(TumorError::Training("training set is empty".to_string()));
        }

        let lr = self.scheduler.get_lr();
        let batches = epoch_batches(dataset.len(), self.config.batch_size, Some(&mut self.rng));
        let epoch_seed: u64 = self.rng.gen();
        let num_batches = batches.len();
        let mut stats = EpochStats::default();

        for (batch_idx, indices) in batches.iter().enumerate() {
            let items = dataset.seeded_items(indices, Some(epoch_seed));
            let batch = self.train_batcher.make_batch::<B>(items, &self.device);

            let (loss, correct) = batch_loss(&self.model, &batch);
            let loss_value: f64 = loss.clone().into_scalar().elem();
            stats.add_batch(loss_value, correct, indices.len());

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optimizer.step(lr, self.model.clone(), grads);

            if (batch_idx + 1) % 10 == 0 || batch_idx == num_batches - 1 {
                debug!(
                    "  Batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_value / indices.len() as f64,
                    100.0 * stats.accuracy()
                );
            }
        }

        Ok(stats)
    }

    /// One pass over the validation set with the inner-backend model
    fn validate_epoch(&mut self, dataset: &ImageDataset) -> Result<EpochStats> {
        if dataset.is_empty() {
            return Err(TumorError::Training("validation set is empty".to_string()));
        }

        let epoch_seed = if self.config.augment_validation {
            Some(self.rng.gen())
        } else {
            None
        };

        let model = self.model.valid();
        Ok(evaluate_loss::<B::InnerBackend>(
            &model,
            dataset,
            &self.val_batcher,
            self.config.batch_size,
            epoch_seed,
            &self.device,
        ))
    }

    /// Replace the live parameters with the best checkpoint
    fn reload_best(&mut self) -> bool {
        let reloaded = self.best.load_into(&mut self.model);
        if !reloaded {
            warn!("No best checkpoint stored yet, keeping current weights");
        }
        reloaded
    }

    /// Train, validate, decide, adjust
    pub fn run_epoch(
        &mut self,
        epoch: usize,
        train: &ImageDataset,
        val: &ImageDataset,
    ) -> Result<EpochSummary> {
        let lr = self.scheduler.get_lr();
        self.logger.start_epoch(epoch, lr);

        self.enter(TrainingPhase::EpochTraining);
        let train_stats = self.train_epoch(train)?;

        self.enter(TrainingPhase::EpochValidating);
        let val_stats = self.validate_epoch(val)?;
        let val_loss = val_stats.avg_loss();

        self.enter(TrainingPhase::CheckpointDecision);
        let decision = decide(&mut self.best, &mut self.scheduler, val_loss, &self.model);
        if let Some(version) = decision.checkpoint {
            self.best.persist::<B>(&self.checkpoint_path)?;
            self.logger.log_new_best(val_loss, version);
        }

        self.enter(TrainingPhase::LrAdjust);
        let reloaded = if decision.reload_best() {
            self.logger.log_lr_change(decision.lr.previous, decision.lr.current);
            self.reload_best()
        } else {
            false
        };

        self.history.record(
            train_stats.avg_loss(),
            val_loss,
            train_stats.accuracy(),
            val_stats.accuracy(),
            lr,
        );
        self.logger
            .end_epoch(train_stats.avg_loss(), val_loss, val_stats.accuracy(), lr);

        let summary = EpochSummary {
            epoch,
            train_loss: train_stats.avg_loss(),
            train_accuracy: train_stats.accuracy(),
            train_batches: train_stats.batches,
            val_loss,
            val_accuracy: val_stats.accuracy(),
            learning_rate: lr,
            next_learning_rate: decision.lr.current,
            checkpoint_version: decision.checkpoint,
            reloaded,
        };
        self.summaries.push(summary.clone());

        Ok(summary)
    }

    /// Run every epoch and return the best model
    pub fn fit(mut self, train: &ImageDataset, val: &ImageDataset) -> Result<TrainingOutcome<B>> {
        self.config.validate()?;
        let num_classes = self.model.num_classes();
        train.check_labels(num_classes)?;
        val.check_labels(num_classes)?;
        info!(
            "Training on {} samples, validating on {} ({})",
            train.len(),
            val.len(),
            self.scheduler.description()
        );

        for epoch in 0..self.config.epochs {
            self.run_epoch(epoch, train, val)?;
        }

        self.enter(TrainingPhase::Done);
        self.reload_best();

        let best_epoch = self
            .summaries
            .iter()
            .rev()
            .find(|s| s.checkpoint_version.is_some())
            .map(|s| s.epoch);
        self.logger.log_complete(self.best.best_metric(), best_epoch);

        Ok(TrainingOutcome {
            model: self.model,
            history: self.history,
            epochs: self.summaries,
            best_epoch,
            best_val_loss: self.best.best_metric(),
            checkpoint_version: self.best.version(),
            phases: self.phases,
        })
    }
}

/// Train a classifier with Adam and reduce-on-plateau
///
/// The best checkpoint is written to `checkpoint_path` (plus `.bin`) each
/// time the validation loss improves.
pub fn fit<B: AutodiffBackend>(
    model: TumorClassifier<B>,
    train: &ImageDataset,
    val: &ImageDataset,
    config: &TrainingConfig,
    augmentation: &AugmentationConfig,
    checkpoint_path: &Path,
    device: &B::Device,
) -> Result<TrainingOutcome<B>> {
    let optimizer = AdamConfig::new().init::<B, TumorClassifier<B>>();

    Trainer::new(
        model,
        optimizer,
        config.clone(),
        augmentation.clone(),
        checkpoint_path.to_path_buf(),
        device.clone(),
    )
    .fit(train, val)
}
