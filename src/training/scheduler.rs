//! Learning Rate Scheduler Module
//!
//! Reduce-on-plateau scheduling: the learning rate is multiplied by a fixed
//! factor once the monitored metric has gone more than `patience` epochs
//! without a relative improvement of at least `threshold`.

use serde::{Deserialize, Serialize};

/// Mode for plateau detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateauMode {
    /// Metric should decrease (e.g., loss)
    Min,
    /// Metric should increase (e.g., accuracy)
    Max,
}

/// Learning rate before and after one scheduler step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrStep {
    pub previous: f64,
    pub current: f64,
}

impl LrStep {
    /// Whether the step changed the learning rate
    pub fn changed(&self) -> bool {
        self.current != self.previous
    }
}

/// Reduce-on-plateau scheduler state
#[derive(Debug, Clone)]
pub struct ReduceOnPlateau {
    best_metric: f64,
    num_bad_epochs: usize,
    current_lr: f64,
    factor: f64,
    patience: usize,
    threshold: f64,
    min_lr: f64,
    eps: f64,
    mode: PlateauMode,
    num_reductions: usize,
}

impl ReduceOnPlateau {
    /// Smallest reduction that is actually applied
    pub const DEFAULT_EPS: f64 = 1e-8;

    /// Create a new reduce-on-plateau scheduler
    pub fn new(
        initial_lr: f64,
        factor: f64,
        patience: usize,
        threshold: f64,
        min_lr: f64,
        mode: PlateauMode,
    ) -> Self {
        let best_metric = match mode {
            PlateauMode::Min => f64::INFINITY,
            PlateauMode::Max => f64::NEG_INFINITY,
        };

        Self {
            best_metric,
            num_bad_epochs: 0,
            current_lr: initial_lr,
            factor,
            patience,
            threshold,
            min_lr,
            eps: Self::DEFAULT_EPS,
            mode,
            num_reductions: 0,
        }
    }

    fn is_better(&self, metric: f64) -> bool {
        match self.mode {
            PlateauMode::Min => metric < self.best_metric * (1.0 - self.threshold),
            PlateauMode::Max => metric > self.best_metric * (1.0 + self.threshold),
        }
    }

    /// Feed one epoch's metric
    pub fn step(&mut self, metric: f64) -> LrStep {
        let previous = self.current_lr;

        if self.is_better(metric) {
            self.best_metric = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.num_bad_epochs > self.patience {
            let new_lr = (self.current_lr * self.factor).max(self.min_lr);
            if self.current_lr - new_lr > self.eps {
                self.current_lr = new_lr;
                self.num_reductions += 1;
            }
            self.num_bad_epochs = 0;
        }

        LrStep {
            previous,
            current: self.current_lr,
        }
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Best metric seen so far
    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }

    /// Consecutive epochs without improvement
    pub fn num_bad_epochs(&self) -> usize {
        self.num_bad_epochs
    }

    /// How many times the learning rate has been reduced
    pub fn num_reductions(&self) -> usize {
        self.num_reductions
    }

    pub fn description(&self) -> String {
        format!(
            "ReduceOnPlateau: lr={:.2e}, factor={}, patience={}, threshold={:e}, min_lr={:e}",
            self.current_lr, self.factor, self.patience, self.threshold, self.min_lr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_on_plateau_after_patience() {
        let mut state = ReduceOnPlateau::new(0.1, 0.5, 3, 1e-4, 0.0, PlateauMode::Min);

        // Metric improves
        assert_eq!(state.step(1.0).current, 0.1);
        assert_eq!(state.step(0.9).current, 0.1);

        // Three bad epochs are tolerated, the fourth reduces
        assert!(!state.step(0.95).changed());
        assert!(!state.step(0.95).changed());
        assert!(!state.step(0.95).changed());
        let step = state.step(0.95);
        assert!(step.changed());
        assert_eq!(step.previous, 0.1);
        assert_eq!(step.current, 0.05);
        assert_eq!(state.num_bad_epochs(), 0);
    }

    #[test]
    fn test_twenty_improving_then_plateau() {
        let mut state = ReduceOnPlateau::new(3e-4, 0.5, 20, 1e-4, 0.0, PlateauMode::Min);
        let mut changes = Vec::new();

        for epoch in 0..20 {
            let step = state.step(1.0 - 0.01 * epoch as f64);
            if step.changed() {
                changes.push(epoch);
            }
        }
        let plateau = state.best_metric();
        for epoch in 20..41 {
            let step = state.step(plateau);
            if step.changed() {
                changes.push(epoch);
            }
        }

        // the 21st non-improving epoch is index 40
        assert_eq!(changes, vec![40]);
        assert_eq!(state.num_reductions(), 1);
        assert!((state.get_lr() - 1.5e-4).abs() < 1e-12);
    }

    #[test]
    fn test_relative_threshold() {
        let mut state = ReduceOnPlateau::new(0.1, 0.5, 0, 1e-2, 0.0, PlateauMode::Min);
        state.step(1.0);

        // 0.995 is not 1% better than 1.0
        let step = state.step(0.995);
        assert!(step.changed());
        assert_eq!(state.best_metric(), 1.0);
    }

    #[test]
    fn test_min_lr_clamp_and_eps() {
        let mut state = ReduceOnPlateau::new(1e-3, 0.5, 0, 1e-4, 8e-4, PlateauMode::Min);
        state.step(1.0);

        assert_eq!(state.step(1.0).current, 8e-4);
        // already at the floor: no change
        assert!(!state.step(1.0).changed());
        assert_eq!(state.num_reductions(), 1);
    }

    #[test]
    fn test_max_mode() {
        let mut state = ReduceOnPlateau::new(0.1, 0.1, 1, 0.0, 0.0, PlateauMode::Max);
        state.step(0.5);
        state.step(0.6);
        assert!(!state.step(0.6).changed());
        assert!(state.step(0.55).changed());
    }
}
