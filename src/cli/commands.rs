// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `eval`
// and all their configurable flags.
//
// Flags are spelled with underscores (--batch_size,
// --max_epochs, ...) to match the names used in the run config
// that is saved next to every checkpoint.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::lr_schedule::LrPolicy;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the C3D recognizer on a rawframe dataset
    Train(TrainArgs),

    /// Score a saved checkpoint on a validation list
    Eval(EvalArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
#[command(rename_all = "snake_case")]
pub struct TrainArgs {
    /// Root of the dataset: split lists plus a rawframes/ directory
    #[arg(long, default_value = "data/ucf101")]
    pub dataset_root: String,

    /// Training annotation list, relative to dataset_root
    #[arg(long, default_value = "ucf101_train_split_1_rawframes.txt")]
    pub train_list: String,

    /// Validation annotation list, relative to dataset_root
    #[arg(long, default_value = "ucf101_val_split_1_rawframes.txt")]
    pub val_list: String,

    /// Initial model weights (a model record, .mpk.gz optional)
    #[arg(long)]
    pub pretrained: Option<String>,

    /// Snapshot directory holding `model` and `optim` records
    #[arg(long)]
    pub resume: Option<String>,

    /// Epochs already completed by the resumed run
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub last_epoch: i64,

    /// Videos per batch, for training and validation
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Total number of epochs
    #[arg(long, default_value_t = 100)]
    pub max_epochs: usize,

    /// Print a [TRAIN] line every this many iterations
    #[arg(long, default_value_t = 10)]
    pub log_iters: usize,

    /// Seeds the backend, the loader shuffle and the augmentations
    #[arg(long, default_value_t = 1234)]
    pub seed: u64,

    /// Base learning rate
    #[arg(long, default_value_t = 1.25e-4)]
    pub lr: f64,

    /// Learning-rate policy
    #[arg(long, value_enum, default_value_t = LrPolicy::WarmupCosine)]
    pub lr_policy: LrPolicy,

    /// Linear warmup length in epochs (warmup-cosine)
    #[arg(long, default_value_t = 2)]
    pub warmup_epochs: usize,

    /// Comma-separated decay epochs (multi-step)
    #[arg(long, value_delimiter = ',', default_values_t = [20, 40])]
    pub milestones: Vec<usize>,

    /// Decay factor applied at each milestone (multi-step)
    #[arg(long, default_value_t = 0.1)]
    pub gamma: f64,

    /// L2 regularisation coefficient, 0 disables it
    #[arg(long, default_value_t = 5e-4)]
    pub weight_decay: f64,

    /// SGD momentum; plain SGD when omitted
    #[arg(long)]
    pub momentum: Option<f64>,

    /// Number of action classes
    #[arg(long, default_value_t = 101)]
    pub num_classes: usize,

    /// Data loader worker threads (0 loads in the training thread)
    #[arg(long, default_value_t = 0)]
    pub num_workers: usize,

    /// Where best_model/ is written
    #[arg(long, default_value = "output")]
    pub output_dir: String,

    /// Width of the first C3D stage
    #[arg(long, default_value_t = 64)]
    pub base_channels: usize,

    /// Width of the fc6 / fc7 layers
    #[arg(long, default_value_t = 4096)]
    pub fc_dim: usize,

    /// Dropout probability in the backbone and head
    #[arg(long, default_value_t = 0.5)]
    pub dropout_ratio: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset_root:  a.dataset_root,
            train_list:    a.train_list,
            val_list:      a.val_list,
            pretrained:    a.pretrained,
            resume:        a.resume,
            last_epoch:    a.last_epoch,
            batch_size:    a.batch_size,
            max_epochs:    a.max_epochs,
            log_iters:     a.log_iters,
            seed:          a.seed,
            lr:            a.lr,
            lr_policy:     a.lr_policy,
            warmup_epochs: a.warmup_epochs,
            milestones:    a.milestones,
            gamma:         a.gamma,
            weight_decay:  a.weight_decay,
            momentum:      a.momentum,
            num_classes:   a.num_classes,
            num_workers:   a.num_workers,
            output_dir:    a.output_dir,
            base_channels: a.base_channels,
            fc_dim:        a.fc_dim,
            dropout_ratio: a.dropout_ratio,
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `eval` command.
/// Unset dataset flags fall back to the values saved with the checkpoint.
#[derive(Args, Debug)]
#[command(rename_all = "snake_case")]
pub struct EvalArgs {
    /// Snapshot directory written by `train`
    #[arg(long, default_value = "output/best_model")]
    pub checkpoint: String,

    #[arg(long)]
    pub dataset_root: Option<String>,

    #[arg(long)]
    pub val_list: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_config(args: &[&str]) -> TrainConfig {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Train(a) => a.into(),
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cfg = train_config(&["c3d-train", "train"]);
        let def = TrainConfig::default();
        assert_eq!(cfg.dataset_root, def.dataset_root);
        assert_eq!(cfg.batch_size, def.batch_size);
        assert_eq!(cfg.last_epoch, -1);
        assert_eq!(cfg.milestones, vec![20, 40]);
        assert_eq!(cfg.lr_policy, LrPolicy::WarmupCosine);
        assert!(cfg.momentum.is_none());
    }

    #[test]
    fn test_underscore_flags() {
        let cfg = train_config(&[
            "c3d-train", "train",
            "--batch_size", "4",
            "--max_epochs", "3",
            "--last_epoch", "2",
            "--lr_policy", "multi-step",
            "--milestones", "1,2",
            "--momentum", "0.9",
            "--resume", "output/best_model",
        ]);
        assert_eq!(cfg.batch_size, 4);
        assert_eq!(cfg.max_epochs, 3);
        assert_eq!(cfg.completed_epochs(), 2);
        assert_eq!(cfg.lr_policy, LrPolicy::MultiStep);
        assert_eq!(cfg.milestones, vec![1, 2]);
        assert_eq!(cfg.momentum, Some(0.9));
        assert_eq!(cfg.resume.as_deref(), Some("output/best_model"));
    }

    #[test]
    fn test_eval_args() {
        let cli = Cli::try_parse_from(["c3d-train", "eval", "--batch_size", "8"]).unwrap();
        match cli.command {
            Commands::Eval(a) => {
                assert_eq!(a.checkpoint, "output/best_model");
                assert_eq!(a.batch_size, Some(8));
                assert!(a.val_list.is_none());
            }
            other => panic!("expected eval, got {other:?}"),
        }
    }
}
