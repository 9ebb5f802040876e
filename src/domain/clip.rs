// ============================================================
// Layer 3 — Clip Domain Types
// ============================================================
// The two values that flow between the data pipeline, the
// model and the evaluation code:
//
//   ClipItem       — one decoded, augmented training example
//   ClipPrediction — the model's class scores for one example
//
// Both are plain Rust data: the batcher turns ClipItems into
// tensors, and the session turns tensors back into predictions.

use serde::{Deserialize, Serialize};

/// One model-ready example.
///
/// `imgs` is a flat buffer laid out as `shape`:
/// `[clips, channels, time, height, width]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipItem {
    pub imgs:  Vec<f32>,
    pub shape: [usize; 5],
    pub label: usize,
}

/// Per-class probabilities for one example together with its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipPrediction {
    pub scores: Vec<f32>,
    pub label:  usize,
}

impl ClipPrediction {
    pub fn new(scores: Vec<f32>, label: usize) -> Self {
        Self { scores, label }
    }

    /// Index of the highest score. Ties resolve to the lowest index.
    pub fn top1(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, &score) in self.scores.iter().enumerate() {
            match best {
                Some((_, b)) if score <= b => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// True when `label` is among the `k` highest scores.
    pub fn label_in_top_k(&self, k: usize) -> bool {
        let Some(&target) = self.scores.get(self.label) else {
            return false;
        };
        // Count classes that strictly beat the label, ties go to the label.
        let better = self
            .scores
            .iter()
            .enumerate()
            .filter(|&(idx, &s)| s > target || (s == target && idx < self.label))
            .count();
        better < k
    }
}
