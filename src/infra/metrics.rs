// ============================================================
// Layer 6 — Evaluation Metrics
// ============================================================
// Scores a full validation pass and tracks the best result.
//
// Metrics computed over a list of ClipPredictions:
//   - top1_acc:            fraction whose arg-max equals the label
//   - top5_acc:            fraction whose label is in the top 5
//   - mean_class_accuracy: per-class recall averaged over the
//                          classes that appear in the labels
//
// mean_class_accuracy is not weighted by class frequency, so a
// rare class counts as much as a common one. On an unbalanced
// validation split the two accuracies can differ noticeably.
//
// Example:
//   labels  = [0, 0, 0, 1]
//   top1    = [0, 0, 0, 0]
//   top1_acc            = 3/4 = 0.75
//   mean_class_accuracy = (3/3 + 0/1) / 2 = 0.5

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::clip::ClipPrediction;

/// The metrics `evaluate` knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Top1Acc,
    Top5Acc,
    MeanClassAccuracy,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Top1Acc           => "top1_acc",
            Metric::Top5Acc           => "top5_acc",
            Metric::MeanClassAccuracy => "mean_class_accuracy",
        }
    }

    /// Everything reported after a validation pass.
    pub fn all() -> &'static [Metric] {
        &[Metric::Top1Acc, Metric::Top5Acc, Metric::MeanClassAccuracy]
    }
}

/// Metric name → score, in a stable (sorted) order for printing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub scores: BTreeMap<String, f64>,
}

impl EvalReport {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.scores.get(metric.name()).copied()
    }

    /// Top-1 accuracy, or 0.0 if it was not requested.
    pub fn top1_acc(&self) -> f64 {
        self.get(Metric::Top1Acc).unwrap_or(0.0)
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .scores
            .iter()
            .map(|(name, score)| format!("{name}={score:.4}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Score `results` with each of `metrics`.
///
/// Fails on an empty result list, since every metric would be 0/0.
pub fn evaluate(results: &[ClipPrediction], metrics: &[Metric]) -> Result<EvalReport> {
    if results.is_empty() {
        bail!("cannot evaluate an empty result list");
    }

    let mut report = EvalReport::default();
    for &metric in metrics {
        let score = match metric {
            Metric::Top1Acc           => top_k_accuracy(results, 1),
            Metric::Top5Acc           => top_k_accuracy(results, 5),
            Metric::MeanClassAccuracy => mean_class_accuracy(results),
        };
        report.scores.insert(metric.name().to_string(), score);
    }
    Ok(report)
}

fn top_k_accuracy(results: &[ClipPrediction], k: usize) -> f64 {
    let hits = results.iter().filter(|p| p.label_in_top_k(k)).count();
    hits as f64 / results.len() as f64
}

fn mean_class_accuracy(results: &[ClipPrediction]) -> f64 {
    // label → (seen, correct)
    let mut per_class: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for p in results {
        let entry = per_class.entry(p.label).or_insert((0, 0));
        entry.0 += 1;
        if p.top1() == Some(p.label) {
            entry.1 += 1;
        }
    }

    let recall_sum: f64 = per_class
        .values()
        .map(|&(seen, correct)| correct as f64 / seen as f64)
        .sum();
    recall_sum / per_class.len() as f64
}

// ─── Best Accuracy Watermark ─────────────────────────────────────────────────
/// Highest validation top-1 accuracy seen in this run.
///
/// Starts below any real accuracy, so the first evaluated epoch
/// always counts as an improvement.
#[derive(Debug, Clone, Copy)]
pub struct BestAccuracy {
    best: f64,
}

impl Default for BestAccuracy {
    fn default() -> Self {
        Self { best: f64::NEG_INFINITY }
    }
}

impl BestAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and raises the watermark if `acc` strictly beats it.
    pub fn update(&mut self, acc: f64) -> bool {
        if acc > self.best {
            self.best = acc;
            true
        } else {
            false
        }
    }

    /// `None` until the first update.
    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }
}
