// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains the C3D recognizer on a rawframe dataset
//   2. `eval`  — scores a saved checkpoint on a validation list
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "c3d-train",
    version = "0.1.0",
    about = "Train a C3D video classifier on UCF101-style rawframes, then evaluate it."
)]
pub struct Cli {
    /// The subcommand to run (train or eval)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args)  => run_eval(args),
        }
    }
}

/// Handles the `train` subcommand.
/// Converts CLI args into a TrainConfig and hands off to Layer 2.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on dataset in: {}", args.dataset_root);
    let output_dir = args.output_dir.clone();

    let report = TrainUseCase::new(args.into()).execute()?;

    match report.best_top1 {
        Some(best) => println!(
            "Training complete. Best top1_acc={:.4} (epochs saved: {:?}), checkpoint in {}/best_model",
            best, report.checkpoint_epochs, output_dir
        ),
        None => println!("Training complete. No epochs were run."),
    }
    Ok(())
}

/// Handles the `eval` subcommand.
fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let use_case = EvalUseCase::new(args.checkpoint, args.dataset_root, args.val_list, args.batch_size);
    let report   = use_case.execute()?;

    println!("\n{}", report);
    Ok(())
}
