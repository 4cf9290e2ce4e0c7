//! Best Checkpoint Store
//!
//! A single slot holding the snapshot with the lowest metric seen so far.
//! Each accepted snapshot bumps a version number. Snapshots are owned
//! copies, so later training never changes a stored checkpoint.
//!
//! Models are written to disk with Burn's full-precision binary recorder.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{BinFileRecorder, FullPrecisionSettings},
    tensor::backend::Backend,
};
use tracing::{debug, info};

use crate::utils::error::{Result, TumorError};

/// Recorder used for every model file
pub type ModelRecorder = BinFileRecorder<FullPrecisionSettings>;

/// File extension the recorder appends
pub const RECORD_EXTENSION: &str = "bin";

/// Single-slot store keyed by the best (lowest) metric
#[derive(Debug, Clone)]
pub struct BestCheckpoint<T: Clone> {
    best_metric: f64,
    snapshot: Option<T>,
    version: u64,
}

impl<T: Clone> Default for BestCheckpoint<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> BestCheckpoint<T> {
    /// Empty store; the initial best metric is +infinity
    pub fn new() -> Self {
        Self {
            best_metric: f64::INFINITY,
            snapshot: None,
            version: 0,
        }
    }

    /// Whether `metric` is strictly lower than the best so far
    pub fn is_improvement(&self, metric: f64) -> bool {
        metric < self.best_metric
    }

    /// Store a copy of `candidate` if `metric` improves on the best
    ///
    /// Returns the new version on acceptance.
    pub fn offer(&mut self, metric: f64, candidate: &T) -> Option<u64> {
        if !self.is_improvement(metric) {
            return None;
        }

        self.best_metric = metric;
        self.snapshot = Some(candidate.clone());
        self.version += 1;
        debug!("Best checkpoint v{} at metric {:.6}", self.version, metric);
        Some(self.version)
    }

    /// The stored snapshot
    pub fn snapshot(&self) -> Option<&T> {
        self.snapshot.as_ref()
    }

    /// Overwrite `target` with the stored snapshot
    ///
    /// Returns false when nothing has been stored yet.
    pub fn load_into(&self, target: &mut T) -> bool {
        match &self.snapshot {
            Some(snapshot) => {
                *target = snapshot.clone();
                true
            }
            None => false,
        }
    }

    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }

    /// Number of accepted snapshots
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Write the stored model to `path` (the recorder adds `.bin`)
    pub fn persist<B: Backend>(&self, path: &Path) -> Result<PathBuf>
    where
        T: Module<B>,
    {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| TumorError::Checkpoint("no checkpoint to persist".to_string()))?;
        persist_model::<B, T>(snapshot, path)
    }
}

/// Save a model record, overwriting any previous file
pub fn persist_model<B: Backend, M: Module<B>>(model: &M, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let recorder = ModelRecorder::new();
    model
        .clone()
        .save_file(path.to_path_buf(), &recorder)
        .map_err(|e| TumorError::Checkpoint(format!("failed to save {:?}: {:?}", path, e)))?;

    let written = path.with_extension(RECORD_EXTENSION);
    info!("Saved model record to {:?}", written);
    Ok(written)
}

/// Load a model record from `path` into `model`
pub fn load_model<B: Backend, M: Module<B>>(model: M, path: &Path, device: &B::Device) -> Result<M> {
    let recorder = ModelRecorder::new();
    model
        .load_file(path.to_path_buf(), &recorder, device)
        .map_err(|e| TumorError::Checkpoint(format!("failed to load {:?}: {:?}", path, e)))
}
