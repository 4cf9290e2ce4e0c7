//! Per-epoch training history
//!
//! Two append-only series pairs: loss and accuracy, each with a train and a
//! val trace.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Train and val traces of one quantity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub train: Vec<f64>,
    pub val: Vec<f64>,
}

impl History {
    /// Append one epoch
    pub fn push(&mut self, train: f64, val: f64) {
        self.train.push(train);
        self.val.push(val);
    }

    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    /// Smallest val value and its epoch index
    pub fn min_val(&self) -> Option<(usize, f64)> {
        self.val
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Loss and accuracy histories of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub loss: History,
    pub accuracy: History,
    /// Learning rate in effect during each epoch
    pub learning_rate: Vec<f64>,
}

impl TrainingHistory {
    pub fn record(&mut self, train_loss: f64, val_loss: f64, train_acc: f64, val_acc: f64, lr: f64) {
        self.loss.push(train_loss, val_loss);
        self.accuracy.push(train_acc, val_acc);
        self.learning_rate.push(lr);
    }

    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
