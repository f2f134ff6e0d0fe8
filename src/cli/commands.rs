// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and their flags:
//
//   train     — train, evaluate on dev, checkpoint every epoch
//   eval      — evaluate the latest checkpoint on one split
//   features  — write framewise features for one or more splits
//   score     — score predictions an earlier eval persisted
//
// Every command reads a JSON run config; flags override single
// fields of it.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the recognizer
    Train(TrainArgs),

    /// Evaluate the latest checkpoint on a split
    Eval(EvalArgs),

    /// Extract framewise features with the latest checkpoint
    Features(FeaturesArgs),

    /// Score persisted predictions against the ground truth
    Score(ScoreArgs),
}

/// Flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// JSON run configuration; omitted fields take their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for logs, checkpoints and outputs
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Score persisted predictions after evaluating
    #[arg(long)]
    pub score: bool,
}

impl ConfigArgs {
    /// Load the config file (or defaults) and apply the overrides
    pub fn resolve(&self) -> Result<TrainConfig> {
        let mut cfg = match &self.config {
            Some(path) => TrainConfig::load(path)?,
            None => TrainConfig::default(),
        };
        if let Some(dir) = &self.work_dir {
            cfg.work_dir = dir.clone();
        }
        if self.score {
            cfg.score_predictions = true;
        }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// Number of full passes through the training data
    #[arg(long)]
    pub epochs: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Base learning rate before milestone decay
    #[arg(long)]
    pub lr: Option<f64>,

    /// Print a progress line every N batches
    #[arg(long)]
    pub log_interval: Option<usize>,
}

impl TrainArgs {
    pub fn resolve(&self) -> Result<TrainConfig> {
        let mut cfg = self.common.resolve()?;
        if let Some(epochs) = self.epochs {
            cfg.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            cfg.batch_size = batch_size;
        }
        if let Some(lr) = self.lr {
            cfg.base_lr = lr;
        }
        if let Some(interval) = self.log_interval {
            cfg.log_interval = interval;
        }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// Split to evaluate (dev or test)
    #[arg(long, default_value = "dev")]
    pub mode: String,
}

#[derive(Args, Debug)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// Splits to extract, e.g. --mode train --mode dev
    #[arg(long = "mode", default_values = ["train", "dev", "test"])]
    pub modes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    #[arg(long, default_value = "dev")]
    pub mode: String,

    /// Epoch label for the result directory and log line
    #[arg(long, default_value_t = 0)]
    pub epoch: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_flags_override_config() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.json");
        std::fs::write(&path, r#"{ "epochs": 3, "batch_size": 4 }"#).unwrap();

        let cli = Cli::try_parse_from([
            "slr-seq", "train", "--config", path.to_str().unwrap(), "--epochs", "7", "--score",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.resolve().unwrap();

        assert_eq!(cfg.epochs, 7);
        assert_eq!(cfg.batch_size, 4);
        assert!(cfg.score_predictions);
    }

    #[test]
    fn test_features_defaults_to_every_split() {
        let cli = Cli::try_parse_from(["slr-seq", "features"]).unwrap();
        let Commands::Features(args) = cli.command else { panic!("expected features") };
        assert_eq!(args.modes, vec!["train", "dev", "test"]);

        let cli = Cli::try_parse_from(["slr-seq", "features", "--mode", "dev"]).unwrap();
        let Commands::Features(args) = cli.command else { panic!("expected features") };
        assert_eq!(args.modes, vec!["dev"]);
    }
}
