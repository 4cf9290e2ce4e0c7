//! Evaluation Module
//!
//! One pass over a dataset with the model in evaluation mode, collecting
//! (actual, predicted) pairs and turning them into a confusion matrix and a
//! classification report. The model is never modified.

use std::path::{Path, PathBuf};

use burn::{data::dataset::Dataset, tensor::backend::Backend};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::burn_dataset::{epoch_batches, ImageDataset, TumorBatcher};
use crate::dataset::{tick_label, CLASS_LABELS};
use crate::model::TumorClassifier;
use crate::training::trainer::predictions;
use crate::utils::charts::generate_confusion_heatmap;
use crate::utils::error::{Result, TumorError};
use crate::utils::metrics::{ConfusionMatrix, Metrics};

/// Report file names inside the output directory
pub const EVALUATION_JSON: &str = "evaluation.json";
pub const CLASSIFICATION_REPORT: &str = "classification_report.txt";
pub const CONFUSION_MATRIX_SVG: &str = "confusion_matrix.svg";

/// Paired ground truth and predicted labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub actual: Vec<usize>,
    pub predicted: Vec<usize>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    pub fn confusion_matrix(&self, num_classes: usize) -> ConfusionMatrix {
        ConfusionMatrix::from_predictions(&self.actual, &self.predicted, num_classes)
    }
}

/// Arg-max predictions for every item of `dataset`, in dataset order
///
/// Expects a model on a non-autodiff backend.
pub fn collect_predictions<B: Backend>(
    model: &TumorClassifier<B>,
    dataset: &ImageDataset,
    batcher: &TumorBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<Predictions> {
    let mut collected = Predictions::default();

    for indices in epoch_batches(dataset.len(), batch_size, None) {
        let batch = batcher.make_batch::<B>(dataset.seeded_items(&indices, None), device);
        let output = model.forward(batch.images);

        let predicted = predictions(output)
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| TumorError::Model(format!("failed to read predictions: {:?}", e)))?;
        let actual = batch
            .targets
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| TumorError::Model(format!("failed to read targets: {:?}", e)))?;

        collected.predicted.extend(predicted.into_iter().map(|p| p as usize));
        collected.actual.extend(actual.into_iter().map(|a| a as usize));
    }

    Ok(collected)
}

/// Confusion matrix plus the derived statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub class_names: Vec<String>,
    pub metrics: Metrics,
    pub report: String,
}

impl EvaluationReport {
    /// Build a report from collected predictions
    pub fn from_predictions(predictions: &Predictions, num_classes: usize) -> Self {
        let metrics = Metrics::from_predictions(&predictions.actual, &predictions.predicted, num_classes);
        let class_names: Vec<String> = (0..num_classes)
            .map(|i| CLASS_LABELS.get(i).map(|s| s.to_string()).unwrap_or_else(|| i.to_string()))
            .collect();
        let names: Vec<&str> = class_names.iter().map(String::as_str).collect();
        let report = metrics.classification_report(&names);

        Self {
            class_names,
            metrics,
            report,
        }
    }

    pub fn confusion_matrix(&self) -> &ConfusionMatrix {
        &self.metrics.confusion_matrix
    }

    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    /// Write the JSON report, the text report and the heatmap into `dir`
    pub fn save(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let json_path = dir.join(EVALUATION_JSON);
        std::fs::write(&json_path, serde_json::to_string_pretty(self)?)?;

        let report_path = dir.join(CLASSIFICATION_REPORT);
        std::fs::write(&report_path, &self.report)?;

        let heatmap_path = dir.join(CONFUSION_MATRIX_SVG);
        let ticks: Vec<String> = (0..self.class_names.len()).map(tick_label).collect();
        generate_confusion_heatmap("Confusion Matrix", self.confusion_matrix(), &ticks, &heatmap_path)?;

        info!("Saved evaluation report to {:?}", dir);
        Ok(vec![json_path, report_path, heatmap_path])
    }
}

/// Predict over `dataset` and summarize
pub fn evaluate<B: Backend>(
    model: &TumorClassifier<B>,
    dataset: &ImageDataset,
    batcher: &TumorBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<EvaluationReport> {
    if dataset.is_empty() {
        return Err(TumorError::InvalidInput("cannot evaluate an empty dataset".to_string()));
    }
    dataset.check_labels(model.num_classes())?;

    let predictions = collect_predictions(model, dataset, batcher, batch_size, device)?;
    let report = EvaluationReport::from_predictions(&predictions, model.num_classes());
    info!(
        "Evaluated {} samples: accuracy {:.2}%",
        predictions.len(),
        100.0 * report.accuracy()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::burn_dataset::RawImageItem;
    use crate::model::TumorClassifierConfig;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    #[test]
    fn test_confusion_from_predictions() {
        let predictions = Predictions {
            actual: vec![0, 0, 1, 1],
            predicted: vec![0, 1, 1, 1],
        };
        let cm = predictions.confusion_matrix(2);
        assert_eq!(cm.rows(), vec![vec![1, 1], vec![0, 2]]);
    }

    #[test]
    fn test_report_names_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let predictions = Predictions {
            actual: vec![0, 0, 1, 1],
            predicted: vec![0, 1, 1, 1],
        };
        let report = EvaluationReport::from_predictions(&predictions, 2);

        assert_eq!(report.class_names, vec!["Brain Tumor", "Healthy"]);
        assert!(report.report.contains("Brain Tumor"));
        assert!((report.accuracy() - 0.75).abs() < 1e-12);

        let written = report.save(dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        for path in &written {
            assert!(path.exists());
        }
        let svg = std::fs::read_to_string(dir.path().join(CONFUSION_MATRIX_SVG)).unwrap();
        assert!(svg.contains("Brain Tumor=0"));
        assert!(svg.contains("Healthy=1"));
    }

    #[test]
    fn test_collect_predictions_covers_dataset() {
        let device = Default::default();
        let model = TumorClassifierConfig::new([3, 64, 64], 2, 8, 0.25, 2)
            .init::<TestBackend>(&device)
            .unwrap();
        let items = (0..5)
            .map(|i| RawImageItem {
                image: RgbImage::from_pixel(64, 64, Rgb([i as u8 * 40, 90, 200])),
                label: i % 2,
                path: format!("{}.png", i),
            })
            .collect();
        let dataset = ImageDataset::from_items(items);

        let collected = collect_predictions(&model, &dataset, &TumorBatcher::clean(64), 2, &device).unwrap();
        assert_eq!(collected.len(), 5);
        assert_eq!(collected.actual, vec![0, 1, 0, 1, 0]);
        assert!(collected.predicted.iter().all(|&p| p < 2));

        let report = evaluate(&model, &dataset, &TumorBatcher::clean(64), 2, &device).unwrap();
        assert_eq!(report.confusion_matrix().total(), 5);
    }

    #[test]
    fn test_evaluate_empty_dataset_fails() {
        let device = Default::default();
        let model = TumorClassifierConfig::new([3, 64, 64], 2, 8, 0.25, 2)
            .init::<TestBackend>(&device)
            .unwrap();
        let dataset = ImageDataset::from_items(Vec::new());
        assert!(evaluate(&model, &dataset, &TumorBatcher::clean(64), 2, &device).is_err());
    }
}
