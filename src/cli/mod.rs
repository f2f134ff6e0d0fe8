// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `train`    — trains the recognizer, scoring dev per epoch
//   2. `eval`     — evaluates the latest checkpoint
//   3. `features` — extracts framewise features per split
//   4. `score`    — scores previously persisted predictions
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConfigArgs, EvalArgs, FeaturesArgs, ScoreArgs, TrainArgs};

use crate::application::{
    eval_use_case::EvalUseCase,
    train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "slr-seq",
    version = "0.1.0",
    about = "Train and evaluate a continuous sign language recognizer, and extract its features."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Eval(args)     => run_eval(args),
            Commands::Features(args) => run_features(args),
            Commands::Score(args)    => run_score(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let cfg = args.resolve()?;
    tracing::info!("Training for {} epochs in '{}'", cfg.epochs, cfg.work_dir.display());

    let best = TrainUseCase::new(cfg).execute()?;
    match best {
        Some(wer) => println!("Training complete. Best dev WER: {wer:.2}%"),
        None => println!("Training complete. Checkpoints saved."),
    }
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    let uc  = use_case(&args.common)?;
    let wer = uc.eval(&args.mode)?;
    if uc.config().score_predictions {
        println!("{} WER: {wer:.2}%", args.mode);
    } else {
        println!("{} predictions saved.", args.mode);
    }
    Ok(())
}

fn run_features(args: FeaturesArgs) -> Result<()> {
    for (mode, outcome) in use_case(&args.common)?.features(&args.modes)? {
        println!("{mode}: {outcome:?}");
    }
    Ok(())
}

fn run_score(args: ScoreArgs) -> Result<()> {
    let wer = use_case(&args.common)?.score(&args.mode, args.epoch)?;
    println!("{} WER: {wer:.2}%", args.mode);
    Ok(())
}

/// A run directory without an explicit --config reuses the config
/// `train` saved there.
fn use_case(common: &ConfigArgs) -> Result<EvalUseCase> {
    match (&common.config, &common.work_dir) {
        (None, Some(work_dir)) => {
            Ok(EvalUseCase::from_work_dir(work_dir)?.force_scoring(common.score))
        }
        _ => Ok(EvalUseCase::new(common.resolve()?)),
    }
}
