//! Brain Tumor CNN CLI
//!
//! Entry point for splitting the MRI dataset, training the classifier and
//! evaluating saved models.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use brain_tumor_cnn::backend::{backend_name, default_device, InferenceBackend, TrainingBackend};
use brain_tumor_cnn::dataset::ImageFolder;
use brain_tumor_cnn::pipeline;
use brain_tumor_cnn::utils::logging::{init_logging, LogConfig};
use brain_tumor_cnn::RunConfig;

/// Brain Tumor MRI Classification
///
/// Trains a small CNN to tell MRI slices with a tumor from healthy ones.
#[derive(Parser, Debug)]
#[command(name = "brain_tumor_cnn")]
#[command(version)]
#[command(about = "Binary brain tumor MRI classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// JSON run configuration; command line flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a class-per-folder dataset into train/ and val/
    Split {
        /// Raw dataset directory (<root>/<class>/<images>)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Output directory for train/ and val/
        #[arg(short, long)]
        split_dir: Option<PathBuf>,

        /// Fraction of each class used for training
        #[arg(long)]
        train_ratio: Option<f64>,

        /// Random seed for the split
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show dataset statistics
    Stats {
        /// Dataset directory (<root>/<class>/<images>)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Train the classifier on a split directory
    Train {
        /// Directory containing train/ and val/
        #[arg(short, long)]
        split_dir: Option<PathBuf>,

        /// Output directory for checkpoints, model and reports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Initial learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Square image size fed to the network
        #[arg(long)]
        image_size: Option<u32>,

        /// Random seed for weights, shuffling and augmentation
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Evaluate a saved model on the validation split
    Evaluate {
        /// Model path without extension (reads <model>.bin and <model>.json)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Directory containing val/
        #[arg(short, long)]
        split_dir: Option<PathBuf>,

        /// Output directory for the reports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Write the default run configuration as JSON
    Config {
        /// Destination file
        #[arg(short, long, default_value = "run_config.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path).with_context(|| format!("loading {:?}", path))?,
        None => RunConfig::default(),
    };

    match cli.command {
        Commands::Split {
            data_dir,
            split_dir,
            train_ratio,
            seed,
        } => {
            override_with(&mut config.data_dir, data_dir);
            override_with(&mut config.split_dir, split_dir);
            override_with(&mut config.split.train_ratio, train_ratio);
            override_with(&mut config.split.seed, seed);
            cmd_split(&config)?;
        }

        Commands::Stats { data_dir } => {
            override_with(&mut config.data_dir, data_dir);
            cmd_stats(&config.data_dir)?;
        }

        Commands::Train {
            split_dir,
            output_dir,
            epochs,
            batch_size,
            learning_rate,
            image_size,
            seed,
        } => {
            override_with(&mut config.split_dir, split_dir);
            override_with(&mut config.output_dir, output_dir);
            override_with(&mut config.training.epochs, epochs);
            override_with(&mut config.training.batch_size, batch_size);
            override_with(&mut config.training.learning_rate, learning_rate);
            override_with(&mut config.training.seed, seed);
            if let Some(size) = image_size {
                config = config.with_image_size(size);
            }
            cmd_train(&config)?;
        }

        Commands::Evaluate {
            model,
            split_dir,
            output_dir,
        } => {
            override_with(&mut config.split_dir, split_dir);
            override_with(&mut config.output_dir, output_dir);
            let model_path = model.unwrap_or_else(|| config.model_path());
            cmd_evaluate(&config, &model_path)?;
        }

        Commands::Config { output } => {
            config.save(&output)?;
            println!("{} {:?}", "Wrote configuration to".green(), output);
        }
    }

    Ok(())
}

fn override_with<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn print_banner() {
    println!(
        "{}",
        r#"
 +------------------------------------------------------------+
 |   Brain Tumor MRI Classifier                               |
 |   Convolutional network with Burn + Rust                   |
 +------------------------------------------------------------+
  "#
        .green()
    );
}

fn cmd_split(config: &RunConfig) -> Result<()> {
    println!("{}", "Splitting Dataset...".cyan().bold());
    println!("  Source: {:?}", config.data_dir);
    println!("  Output: {:?}", config.split_dir);
    println!(
        "  Ratio:  {:.0}/{:.0} (seed {})",
        config.split.train_ratio * 100.0,
        (1.0 - config.split.train_ratio) * 100.0,
        config.split.seed
    );
    println!();

    let split = pipeline::split_dataset(config)?;
    println!("{}", split.stats());
    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("{} Dataset directory not found: {:?}", "Error:".red(), data_dir);
        println!();
        println!("Expected layout:");
        println!("  {}/", data_dir.display());
        println!("  ├── Brain Tumor/");
        println!("  └── Healthy/");
        return Ok(());
    }

    let folder = ImageFolder::new(data_dir)?;
    folder.get_stats().print();
    Ok(())
}

fn cmd_train(config: &RunConfig) -> Result<()> {
    let device = default_device();

    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Backend:       {}", backend_name());
    println!("  Device:        {:?}", device);
    println!("  Split dir:     {:?}", config.split_dir);
    println!("  Output dir:    {:?}", config.output_dir);
    println!("  Epochs:        {}", config.training.epochs);
    println!("  Batch size:    {}", config.training.batch_size);
    println!("  Learning rate: {}", config.training.learning_rate);
    println!("  Image size:    {}", config.augmentation.image_size);
    println!("  Seed:          {}", config.training.seed);
    println!();

    let run = pipeline::train::<TrainingBackend>(config, &device)?;

    println!();
    println!("{}", "Classification Report:".cyan().bold());
    println!("{}", run.evaluation.report);
    println!("{}", run.evaluation.confusion_matrix());
    println!(
        "{} best val loss {:.6} at epoch {}",
        "Done:".green().bold(),
        run.summary.best_val_loss,
        run.summary
            .best_epoch
            .map(|e| (e + 1).to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    info!("Model saved to {:?}", run.summary.model_path);
    Ok(())
}

fn cmd_evaluate(config: &RunConfig, model_path: &Path) -> Result<()> {
    let device = default_device();

    println!("{}", "Evaluation:".cyan().bold());
    println!("  Model:   {:?}", model_path);
    println!("  Val dir: {:?}", config.val_dir());
    println!("  Backend: {}", backend_name());
    println!();

    let report = pipeline::evaluate_saved::<InferenceBackend>(config, model_path, &device)?;

    println!("{}", report.report);
    println!("{}", report.confusion_matrix());
    println!("Reports written to {:?}", config.output_dir);
    Ok(())
}
