//! Metrics Module for Model Evaluation
//!
//! Provides the evaluation statistics reported after training:
//! - Confusion matrix (row = actual, column = predicted)
//! - Per-class precision, recall, F1-score and support
//! - Accuracy with macro and weighted averages
//! - A plain text classification report

use serde::{Deserialize, Serialize};

/// Aggregate metrics for a set of predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Number of correct predictions
    pub correct_predictions: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Unweighted mean of per-class precision
    pub macro_precision: f64,

    /// Unweighted mean of per-class recall
    pub macro_recall: f64,

    /// Unweighted mean of per-class F1
    pub macro_f1: f64,

    /// Support-weighted mean of per-class precision
    pub weighted_precision: f64,

    /// Support-weighted mean of per-class recall
    pub weighted_recall: f64,

    /// Support-weighted mean of per-class F1
    pub weighted_f1: f64,

    /// Per-class metrics
    pub per_class: Vec<ClassMetrics>,

    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Create metrics from ground truth labels and predictions
    ///
    /// Pairs beyond the shorter of the two slices are ignored.
    pub fn from_predictions(ground_truth: &[usize], predictions: &[usize], num_classes: usize) -> Self {
        let confusion_matrix = ConfusionMatrix::from_predictions(ground_truth, predictions, num_classes);
        Self::from_confusion_matrix(confusion_matrix)
    }

    /// Derive every statistic from an accumulated confusion matrix
    pub fn from_confusion_matrix(confusion_matrix: ConfusionMatrix) -> Self {
        let num_classes = confusion_matrix.num_classes;
        let total_samples = confusion_matrix.total();
        let correct_predictions = confusion_matrix.correct();

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|class_idx| ClassMetrics::from_confusion_matrix(&confusion_matrix, class_idx))
            .collect();

        let n = num_classes.max(1) as f64;
        let macro_precision = per_class.iter().map(|m| m.precision).sum::<f64>() / n;
        let macro_recall = per_class.iter().map(|m| m.recall).sum::<f64>() / n;
        let macro_f1 = per_class.iter().map(|m| m.f1).sum::<f64>() / n;

        let weighted = |value: fn(&ClassMetrics) -> f64| -> f64 {
            if total_samples == 0 {
                return 0.0;
            }
            per_class
                .iter()
                .map(|m| value(m) * m.support as f64)
                .sum::<f64>()
                / total_samples as f64
        };

        let weighted_precision = weighted(|m| m.precision);
        let weighted_recall = weighted(|m| m.recall);
        let weighted_f1 = weighted(|m| m.f1);

        Self {
            total_samples,
            correct_predictions,
            accuracy: confusion_matrix.accuracy(),
            macro_precision,
            macro_recall,
            macro_f1,
            weighted_precision,
            weighted_recall,
            weighted_f1,
            per_class,
            confusion_matrix,
        }
    }

    /// Render a classification report table
    ///
    /// `class_names` labels the per-class rows; missing names fall back to the index.
    pub fn classification_report(&self, class_names: &[&str]) -> String {
        let names: Vec<String> = (0..self.per_class.len())
            .map(|i| {
                class_names
                    .get(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| i.to_string())
            })
            .collect();

        let width = names
            .iter()
            .map(|n| n.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        let mut out = String::new();
        out.push_str(&format!(
            "{:>width$} {:>10} {:>10} {:>10} {:>10}\n\n",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            width = width
        ));

        for (name, m) in names.iter().zip(&self.per_class) {
            out.push_str(&format!(
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
                name,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                width = width
            ));
        }

        out.push('\n');
        out.push_str(&format!(
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}\n",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.total_samples,
            width = width
        ));
        out.push_str(&format!(
            "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
            "macro avg",
            self.macro_precision,
            self.macro_recall,
            self.macro_f1,
            self.total_samples,
            width = width
        ));
        out.push_str(&format!(
            "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
            "weighted avg",
            self.weighted_precision,
            self.weighted_recall,
            self.weighted_f1,
            self.total_samples,
            width = width
        ));

        out
    }
}

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class index
    pub class_idx: usize,

    /// True positives
    pub true_positives: usize,

    /// False positives
    pub false_positives: usize,

    /// False negatives
    pub false_negatives: usize,

    /// Precision = TP / (TP + FP)
    pub precision: f64,

    /// Recall = TP / (TP + FN)
    pub recall: f64,

    /// F1 = 2 * (precision * recall) / (precision + recall)
    pub f1: f64,

    /// Support = number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for a class from confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        // Predicted as this class but actually another
        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        // Actually this class but predicted as another
        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let support = true_positives + false_negatives;

        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, support);

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
            support,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Matrix data (row = actual, column = predicted)
    /// Stored as a flat vector in row-major order
    pub matrix: Vec<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from ground truth and predictions
    pub fn from_predictions(ground_truth: &[usize], predictions: &[usize], num_classes: usize) -> Self {
        let mut cm = Self::new(num_classes);

        for (&actual, &pred) in ground_truth.iter().zip(predictions.iter()) {
            cm.add(actual, pred);
        }

        cm
    }

    /// Add a single (actual, predicted) pair; out-of-range labels are ignored
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            let idx = actual * self.num_classes + predicted;
            self.matrix[idx] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Get the total count
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Get the number of correct predictions (diagonal sum)
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Get overall accuracy
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Share of all samples that fall in a cell, in percent
    pub fn percent_of_total(&self, actual: usize, predicted: usize) -> f64 {
        100.0 * ratio(self.get(actual, predicted), self.total())
    }

    /// The matrix as nested rows
    pub fn rows(&self) -> Vec<Vec<usize>> {
        (0..self.num_classes)
            .map(|row| (0..self.num_classes).map(|col| self.get(row, col)).collect())
            .collect()
    }

    /// Largest single cell count
    pub fn max_count(&self) -> usize {
        self.matrix.iter().copied().max().unwrap_or(0)
    }

    /// Pretty print the confusion matrix
    pub fn display(&self, class_names: Option<&[&str]>) -> String {
        let mut output = String::new();

        output.push_str("\nConfusion Matrix (rows=actual, cols=predicted):\n\n");

        let label = |idx: usize| -> String {
            class_names
                .and_then(|names| names.get(idx))
                .map(|n| n.to_string())
                .unwrap_or_else(|| idx.to_string())
        };

        let width = (0..self.num_classes)
            .map(|i| label(i).len())
            .max()
            .unwrap_or(1)
            .max(6);

        output.push_str(&" ".repeat(width + 1));
        for col in 0..self.num_classes {
            output.push_str(&format!(" {:>width$}", label(col), width = width));
        }
        output.push('\n');

        for row in 0..self.num_classes {
            output.push_str(&format!("{:>width$} ", label(row), width = width));
            for col in 0..self.num_classes {
                output.push_str(&format!(" {:>width$}", self.get(row, col), width = width));
            }
            output.push('\n');
        }

        output.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));

        output
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display(None))
    }
}
