// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// The schedule is stepped once per training iteration, for
// every policy. Epoch-based settings (warmup_epochs,
// milestones, max_epochs) are converted to iterations with
// the loader's iters_per_epoch.
//
//   WarmupCosine:
//     step < warmup   lr = base * (step + 1) / warmup
//     afterwards      lr = base * 0.5 * (1 + cos(pi * p))
//                     p  = (step - warmup) / (total - warmup)
//
//   MultiStep:
//     lr = base * gamma^k, k = milestones already reached
//
// Resuming after N completed epochs starts the step counter
// at N * iters_per_epoch, so the curve continues where the
// interrupted run left off.
//
// Reference: Loshchilov & Hutter (2017) SGDR
//            Goyal et al. (2017) Accurate, Large Minibatch SGD

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LrPolicy {
    /// Linear warmup, then cosine decay to zero
    WarmupCosine,
    /// Step decay by `gamma` at each milestone epoch
    MultiStep,
}

#[derive(Debug, Clone)]
pub struct LrScheduler {
    policy:       LrPolicy,
    base_lr:      f64,
    warmup_iters: usize,
    total_iters:  usize,
    milestones:   Vec<usize>,
    gamma:        f64,
    step:         usize,
}

impl LrScheduler {
    pub fn new(
        policy:          LrPolicy,
        base_lr:         f64,
        iters_per_epoch: usize,
        max_epochs:      usize,
        warmup_epochs:   usize,
        milestones:      &[usize],
        gamma:           f64,
    ) -> Self {
        let mut milestones: Vec<usize> = milestones.iter().map(|m| m * iters_per_epoch).collect();
        milestones.sort_unstable();
        Self {
            policy,
            base_lr,
            warmup_iters: warmup_epochs * iters_per_epoch,
            total_iters:  max_epochs * iters_per_epoch,
            milestones,
            gamma,
            step: 0,
        }
    }

    /// Fast-forward to the start of epoch `completed_epochs + 1`.
    pub fn resume(mut self, completed_epochs: usize, iters_per_epoch: usize) -> Self {
        self.step = completed_epochs * iters_per_epoch;
        self
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Learning rate for the current step.
    pub fn lr(&self) -> f64 {
        match self.policy {
            LrPolicy::WarmupCosine => self.warmup_cosine(),
            LrPolicy::MultiStep => {
                let passed = self.milestones.iter().filter(|&&m| self.step >= m).count();
                self.base_lr * self.gamma.powi(passed as i32)
            }
        }
    }

    pub fn step(&mut self) {
        self.step += 1;
    }

    fn warmup_cosine(&self) -> f64 {
        if self.step < self.warmup_iters {
            return self.base_lr * (self.step + 1) as f64 / self.warmup_iters as f64;
        }

        let decay_iters = self.total_iters.saturating_sub(self.warmup_iters);
        if decay_iters == 0 {
            return self.base_lr;
        }
        let done = (self.step - self.warmup_iters).min(decay_iters);
        let progress = done as f64 / decay_iters as f64;
        self.base_lr * 0.5 * (1.0 + (PI * progress).cos())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(ipe: usize) -> LrScheduler {
        LrScheduler::new(LrPolicy::WarmupCosine, 1.0, ipe, 10, 2, &[], 0.1)
    }

    #[test]
    fn test_warmup_is_linear() {
        let mut s = cosine(5);
        // 10 warmup iterations
        assert!((s.lr() - 0.1).abs() < 1e-12);
        for _ in 0..4 {
            s.step();
        }
        assert!((s.lr() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_endpoints() {
        let mut s = cosine(5);
        for _ in 0..10 {
            s.step();
        }
        // First decay step is the peak
        assert!((s.lr() - 1.0).abs() < 1e-12);

        for _ in 0..20 {
            s.step();
        }
        // Halfway through decay
        assert!((s.lr() - 0.5).abs() < 1e-9);

        for _ in 0..100 {
            s.step();
        }
        assert!(s.lr().abs() < 1e-12);
    }

    #[test]
    fn test_cosine_never_increases_after_warmup() {
        let mut s = cosine(3);
        for _ in 0..6 {
            s.step();
        }
        let mut prev = s.lr();
        for _ in 0..30 {
            s.step();
            let lr = s.lr();
            assert!(lr <= prev + 1e-12);
            prev = lr;
        }
    }

    #[test]
    fn test_multistep_decay() {
        let mut s = LrScheduler::new(LrPolicy::MultiStep, 0.1, 4, 10, 0, &[2, 1], 0.1);
        assert!((s.lr() - 0.1).abs() < 1e-12);
        for _ in 0..4 {
            s.step();
        }
        assert!((s.lr() - 0.01).abs() < 1e-12);
        for _ in 0..4 {
            s.step();
        }
        assert!((s.lr() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_resume_fast_forwards() {
        let ipe = 7;
        let resumed = cosine(ipe).resume(5, ipe);
        assert_eq!(resumed.current_step(), 5 * ipe);

        let mut fresh = cosine(ipe);
        for _ in 0..5 * ipe {
            fresh.step();
        }
        assert!((fresh.lr() - resumed.lr()).abs() < 1e-12);
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&LrPolicy::MultiStep).unwrap();
        assert_eq!(json, "\"multi-step\"");
    }
}
