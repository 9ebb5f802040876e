// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch / iteration driver. It is generic over the Layer 3
// traits, so the same loop runs the Burn session in the binary
// and small in-memory mocks in the tests below.
//
// Per iteration:
//   reader_cost  time from the end of the previous iteration
//                until the next batch is in hand
//   lr           read from the schedule, then the schedule steps
//   batch_cost   full iteration latency, weighted by batch size
//
// Every `log_iters` global iterations a [TRAIN] line reports
// the window averages (loss, top-1, costs, ips, ETA), after
// which the window sums and both averagers are reset.
//
// After every epoch the whole validation set is predicted and
// scored; when top-1 strictly beats the best so far, the best
// checkpoint is replaced.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{
    optim::{decay::WeightDecayConfig, momentum::MomentumConfig, SgdConfig},
    prelude::*,
};
use std::{path::Path, sync::Arc, time::Instant};

use crate::application::train_use_case::TrainConfig;
use crate::data::{dataset::RawframeDataset, loader::ClipLoader};
use crate::domain::traits::{BatchSource, EvalSource, TrainSession};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{BestAccuracy, EvalReport},
    timer::{calculate_eta, TimeAverager},
};
use crate::ml::{
    lr_schedule::{LrPolicy, LrScheduler},
    model::Recognizer3d,
    session::BurnSession,
};

type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
type MyInnerBackend = burn::backend::Wgpu;

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: RawframeDataset,
    val_dataset:   RawframeDataset,
    ckpt_manager:  CheckpointManager,
) -> Result<TrainReport> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    MyBackend::seed(cfg.seed);

    // ── Data loaders ──────────────────────────────────────────────────────────
    // Training batches live on the autodiff backend, validation
    // batches on the inner backend (no graph is recorded for them).
    let train_loader = ClipLoader::<MyBackend>::train(
        Arc::new(train_dataset),
        device.clone(),
        cfg.batch_size,
        cfg.num_workers,
        cfg.seed,
    );
    let val_loader = ClipLoader::<MyInnerBackend>::eval(
        Arc::new(val_dataset),
        device.clone(),
        cfg.batch_size,
        cfg.num_workers,
    );

    // ── Build model ───────────────────────────────────────────────────────────
    let model: Recognizer3d<MyBackend> = cfg.model_config().init(&device);
    tracing::info!(
        "Model ready: C3D base_channels={}, fc_dim={}, {} classes",
        cfg.base_channels,
        cfg.fc_dim,
        cfg.num_classes
    );

    // ── SGD optimiser ─────────────────────────────────────────────────────────
    // g = g + wd * θ                       (L2 weight decay)
    // v = μ * v + g                        (momentum, if set)
    // θ = θ - lr * v
    let optim = sgd_config(cfg).init::<MyBackend, Recognizer3d<MyBackend>>();

    let mut session = BurnSession::new(model, optim, device);
    if let Some(dir) = &cfg.resume {
        session = session.resume_from(Path::new(dir))?;
    } else if let Some(path) = &cfg.pretrained {
        session = session.with_pretrained(Path::new(path))?;
    }

    // ── Epoch loop ────────────────────────────────────────────────────────────
    Trainer::from_config(cfg).fit(&mut session, &train_loader, &val_loader, &ckpt_manager)
}

/// SGD with optional L2 weight decay and momentum.
pub fn sgd_config(cfg: &TrainConfig) -> SgdConfig {
    let weight_decay = (cfg.weight_decay > 0.0).then(|| WeightDecayConfig {
        penalty: cfg.weight_decay as f32,
    });
    let momentum = cfg.momentum.map(|momentum| MomentumConfig {
        momentum,
        dampening: 0.0,
        nesterov:  false,
    });
    SgdConfig::new()
        .with_weight_decay(weight_decay)
        .with_momentum(momentum)
}

// ─── Report ───────────────────────────────────────────────────────────────────

/// One [TRAIN] status line.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainLog {
    pub epoch:       usize,
    /// 1-based batch index within the epoch
    pub batch_id:    usize,
    pub global_iter: usize,
    pub loss:        f64,
    pub top1_acc:    f64,
    pub lr:          f64,
}

#[derive(Debug, Clone)]
pub struct EpochEval {
    pub epoch:  usize,
    pub report: EvalReport,
}

/// What happened during `Trainer::fit`.
#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub train_logs:        Vec<TrainLog>,
    pub evals:             Vec<EpochEval>,
    /// Epochs whose weights were written as the best checkpoint
    pub checkpoint_epochs: Vec<usize>,
    pub best_top1:         Option<f64>,
}

// ─── Trainer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Trainer {
    pub max_epochs:       usize,
    pub log_iters:        usize,
    /// Epochs finished by a previous run; training starts at the next one
    pub completed_epochs: usize,
    pub lr:               f64,
    pub lr_policy:        LrPolicy,
    pub warmup_epochs:    usize,
    pub milestones:       Vec<usize>,
    pub gamma:            f64,
}

impl Trainer {
    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self {
            max_epochs:       cfg.max_epochs,
            log_iters:        cfg.log_iters,
            completed_epochs: cfg.completed_epochs(),
            lr:               cfg.lr,
            lr_policy:        cfg.lr_policy,
            warmup_epochs:    cfg.warmup_epochs,
            milestones:       cfg.milestones.clone(),
            gamma:            cfg.gamma,
        }
    }

    fn scheduler(&self, iters_per_epoch: usize) -> LrScheduler {
        LrScheduler::new(
            self.lr_policy,
            self.lr,
            iters_per_epoch,
            self.max_epochs,
            self.warmup_epochs,
            &self.milestones,
            self.gamma,
        )
        .resume(self.completed_epochs, iters_per_epoch)
    }

    pub fn fit<S, T, V>(
        &self,
        session: &mut S,
        train:   &T,
        val:     &V,
        ckpt:    &CheckpointManager,
    ) -> Result<TrainReport>
    where
        S: TrainSession,
        T: BatchSource<Batch = S::TrainBatch>,
        V: EvalSource<Batch = S::EvalBatch>,
    {
        let iters_per_epoch = train.num_batches();
        if iters_per_epoch == 0 {
            bail!("Training set yields no batches");
        }
        if val.num_batches() == 0 {
            bail!("Validation set yields no batches");
        }

        let mut report = TrainReport::default();
        if self.completed_epochs >= self.max_epochs {
            tracing::warn!(
                "Nothing to do: {} epochs already completed (max_epochs={})",
                self.completed_epochs,
                self.max_epochs
            );
            return Ok(report);
        }

        let log_iters   = self.log_iters.max(1);
        let total_iters = self.max_epochs * iters_per_epoch;
        let mut global_iter = self.completed_epochs * iters_per_epoch;
        let mut scheduler   = self.scheduler(iters_per_epoch);

        let mut reader_cost = TimeAverager::new();
        let mut batch_cost  = TimeAverager::new();
        let mut best        = BestAccuracy::new();

        tracing::info!(
            "Training epochs {}..={} ({} iterations per epoch)",
            self.completed_epochs + 1,
            self.max_epochs,
            iters_per_epoch
        );

        for epoch in self.completed_epochs + 1..=self.max_epochs {

            // ── Training phase ────────────────────────────────────────────────
            let mut window = Window::default();
            let mut totals = Window::default();
            let mut tic    = Instant::now();

            for (batch_idx, batch) in train.batches().enumerate() {
                reader_cost.record(tic.elapsed(), 0);
                let samples = train.samples_in(&batch);

                let lr   = scheduler.lr();
                let vars = session.train_step(batch, lr)?;
                scheduler.step();
                global_iter += 1;

                window.add(vars.loss, vars.top1_acc);
                totals.add(vars.loss, vars.top1_acc);
                batch_cost.record(tic.elapsed(), samples);

                if global_iter % log_iters == 0 {
                    let eta = calculate_eta(
                        total_iters.saturating_sub(global_iter),
                        batch_cost.get_average(),
                    );
                    let log = TrainLog {
                        epoch,
                        batch_id:    batch_idx + 1,
                        global_iter,
                        loss:        window.mean_loss(),
                        top1_acc:    window.mean_acc(),
                        lr,
                    };
                    tracing::info!(
                        "[TRAIN] epoch: {}/{}, batch: {}/{}, loss: {:.5}, lr: {:.6}, top1_acc: {:.4}, \
                         batch_cost: {:.5}s, reader_cost: {:.5}s, ips: {:.3} samples/s, eta: {}",
                        log.epoch,
                        self.max_epochs,
                        log.batch_id,
                        iters_per_epoch,
                        log.loss,
                        log.lr,
                        log.top1_acc,
                        batch_cost.get_average(),
                        reader_cost.get_average(),
                        batch_cost.get_ips_average(),
                        eta,
                    );
                    report.train_logs.push(log);

                    window = Window::default();
                    reader_cost.reset();
                    batch_cost.reset();
                }

                tic = Instant::now();
            }

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | train_top1={:.4}",
                epoch,
                self.max_epochs,
                totals.mean_loss(),
                totals.mean_acc(),
            );

            // ── Validation phase ──────────────────────────────────────────────
            let mut results = Vec::new();
            for batch in val.batches() {
                results.extend(session.predict(batch)?);
            }
            let eval = val.evaluate(&results)?;
            tracing::info!("[EVAL] epoch: {}, {}", epoch, eval);

            let top1 = eval.top1_acc();
            if best.update(top1) {
                let dir = ckpt.save_best(|dir| session.save(dir))?;
                tracing::info!(
                    "New best top1_acc={:.4} at epoch {}, saved to '{}'",
                    top1,
                    epoch,
                    dir.display()
                );
                report.checkpoint_epochs.push(epoch);
            }
            report.evals.push(EpochEval { epoch, report: eval });
        }

        report.best_top1 = best.best();
        tracing::info!("Training complete! best top1_acc={:.4}", report.best_top1.unwrap_or(0.0));
        Ok(report)
    }
}

/// Running loss / accuracy sums.
#[derive(Debug, Default)]
struct Window {
    loss:  f64,
    acc:   f64,
    count: usize,
}

impl Window {
    fn add(&mut self, loss: f64, acc: f64) {
        self.loss  += loss;
        self.acc   += acc;
        self.count += 1;
    }

    fn mean_loss(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.loss / self.count as f64 }
    }

    fn mean_acc(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.acc / self.count as f64 }
    }
}
