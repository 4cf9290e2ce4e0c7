//! End-to-end run: split a synthetic dataset, train briefly, evaluate the saved model.

use std::path::Path;

use brain_tumor_cnn::dataset::CLASS_LABELS;
use brain_tumor_cnn::pipeline::{self, ACCURACY_CHART, HISTORY_FILE, LOSS_CHART, SUMMARY_FILE};
use brain_tumor_cnn::training::TrainingHistory;
use brain_tumor_cnn::{RunConfig, TumorError};
use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use image::{Rgb, RgbImage};

type Backend = NdArray;
type TrainBackend = Autodiff<NdArray>;

const IMAGES_PER_CLASS: usize = 10;

fn write_dataset(root: &Path) {
    for (label, class) in CLASS_LABELS.iter().enumerate() {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..IMAGES_PER_CLASS {
            let base = if label == 0 { 200u8 } else { 30u8 };
            let img = RgbImage::from_fn(48, 40, |x, y| {
                Rgb([base, (x * 5 + i as u32) as u8, (y * 6) as u8])
            });
            img.save(dir.join(format!("scan_{:02}.png", i))).unwrap();
        }
    }
}

fn run_config(root: &Path) -> RunConfig {
    let mut config = RunConfig::default().with_image_size(64);
    config.data_dir = root.join("raw");
    config.split_dir = root.join("split");
    config.output_dir = root.join("output");
    config.model.initial_filters = 2;
    config.model.num_fc1 = 8;
    config.training.epochs = 2;
    config.training.batch_size = 8;
    config.training.learning_rate = 1e-3;
    config
}

#[test]
fn split_train_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let config = run_config(dir.path());
    write_dataset(&config.data_dir);

    // 10 per class -> 8 train, 2 val
    let split = pipeline::split_dataset(&config).unwrap();
    assert_eq!(split.train.len(), 16);
    assert_eq!(split.val.len(), 4);
    for class in CLASS_LABELS {
        assert_eq!(std::fs::read_dir(config.train_dir().join(class)).unwrap().count(), 8);
        assert_eq!(std::fs::read_dir(config.val_dir().join(class)).unwrap().count(), 2);
    }

    let device = Default::default();
    let run = pipeline::train::<TrainBackend>(&config, &device).unwrap();

    assert_eq!(run.outcome.history.epochs(), 2);
    assert_eq!(run.summary.train_samples, 16);
    assert_eq!(run.summary.val_samples, 4);
    assert_eq!(run.evaluation.confusion_matrix().total(), 4);

    let out = &config.output_dir;
    for file in [
        "weights.bin",
        "brain_tumor_model.bin",
        "brain_tumor_model.json",
        HISTORY_FILE,
        LOSS_CHART,
        ACCURACY_CHART,
        SUMMARY_FILE,
        "evaluation.json",
        "classification_report.txt",
        "confusion_matrix.svg",
    ] {
        assert!(out.join(file).exists(), "missing {}", file);
    }

    let history = TrainingHistory::load(&out.join(HISTORY_FILE)).unwrap();
    assert_eq!(history, run.outcome.history);

    // the saved model reproduces the in-process evaluation
    let report = pipeline::evaluate_saved::<Backend>(&config, &config.model_path(), &device).unwrap();
    assert_eq!(report.confusion_matrix().rows(), run.evaluation.confusion_matrix().rows());

    // a third val class no longer matches the two-class model
    let extra = config.val_dir().join("Other");
    std::fs::create_dir_all(&extra).unwrap();
    RgbImage::from_pixel(48, 40, Rgb([90, 90, 90]))
        .save(extra.join("scan_00.png"))
        .unwrap();
    let result = pipeline::evaluate_saved::<Backend>(&config, &config.model_path(), &device);
    assert!(matches!(result, Err(TumorError::Dataset(_))));
}

#[test]
fn split_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let config = run_config(dir.path());
    write_dataset(&config.data_dir);

    let first = pipeline::split_dataset(&config).unwrap();
    let second = pipeline::split_dataset(&config).unwrap();
    let sources = |entries: &[brain_tumor_cnn::dataset::SplitEntry]| {
        entries.iter().map(|e| e.source.clone()).collect::<Vec<_>>()
    };
    assert_eq!(sources(&first.val), sources(&second.val));
}

#[test]
fn extra_class_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = run_config(dir.path());
    write_dataset(&config.data_dir);
    let extra = config.data_dir.join("Other");
    std::fs::create_dir_all(&extra).unwrap();
    for i in 0..IMAGES_PER_CLASS {
        RgbImage::from_pixel(48, 40, Rgb([90, 90, 90]))
            .save(extra.join(format!("scan_{:02}.png", i)))
            .unwrap();
    }

    pipeline::split_dataset(&config).unwrap();
    assert!(matches!(pipeline::load_split(&config), Err(TumorError::Dataset(_))));

    let device = Default::default();
    let result = pipeline::train::<TrainBackend>(&config, &device);
    assert!(matches!(result, Err(TumorError::Dataset(_))));
}
