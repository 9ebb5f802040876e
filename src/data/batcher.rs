// ============================================================
// Layer 4 — Clip Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ClipItem>
// into GPU-ready tensors.
//
// How batching works here:
//   Input:  N ClipItems, each shaped [clips, C, T, H, W]
//   Output: ClipBatch with
//             imgs   [N * clips, C, T, H, W]
//             labels [N]
//
// Clips are folded into the batch axis so the backbone sees
// ordinary 5D input; the recognizer folds them back out and
// averages per example (see ml::model::average_clips).
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::domain::clip::ClipItem;

// ─── ClipBatch ────────────────────────────────────────────────────────────────
/// A batch of clips ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct ClipBatch<B: Backend> {
    /// Frames — shape: [batch * num_clips, C, T, H, W]
    pub imgs: Tensor<B, 5>,

    /// Class indices — shape: [batch]
    pub labels: Tensor<B, 1, Int>,

    /// Same labels as plain numbers, for building predictions
    pub targets: Vec<usize>,

    /// Clips per example
    pub num_clips: usize,
}

impl<B: Backend> ClipBatch<B> {
    /// Number of examples (not clips) in the batch
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

// ─── ClipBatcher ──────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct ClipBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ClipBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ClipItem, ClipBatch<B>> for ClipBatcher<B> {
    fn batch(&self, items: Vec<ClipItem>) -> ClipBatch<B> {
        // Every item from one pipeline has the same shape; anything
        // else would make the stacked tensor meaningless.
        let shape = items.first().map(|item| item.shape).unwrap_or([1, 3, 0, 0, 0]);
        let items: Vec<ClipItem> = items
            .into_iter()
            .filter(|item| {
                let ok = item.shape == shape;
                if !ok {
                    tracing::warn!("Dropping clip with shape {:?}, expected {:?}", item.shape, shape);
                }
                ok
            })
            .collect();

        let [num_clips, c, t, h, w] = shape;
        let batch_size = items.len();

        let imgs_flat: Vec<f32> = items
            .iter()
            .flat_map(|item| item.imgs.iter().copied())
            .collect();
        let targets: Vec<usize> = items.iter().map(|item| item.label).collect();
        let labels_flat: Vec<i32> = targets.iter().map(|&l| l as i32).collect();

        let imgs = Tensor::<B, 1>::from_floats(imgs_flat.as_slice(), &self.device)
            .reshape([batch_size * num_clips, c, t, h, w]);
        let labels = Tensor::<B, 1, Int>::from_ints(labels_flat.as_slice(), &self.device);

        ClipBatch { imgs, labels, targets, num_clips }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn item(clips: usize, label: usize, fill: f32) -> ClipItem {
        let shape = [clips, 3, 2, 2, 2];
        ClipItem { imgs: vec![fill; shape.iter().product()], shape, label }
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = ClipBatcher::<NdArray>::new(Default::default());
        let batch   = batcher.batch(vec![item(1, 3, 0.0), item(1, 5, 1.0)]);

        assert_eq!(batch.imgs.dims(), [2, 3, 2, 2, 2]);
        assert_eq!(batch.labels.dims(), [2]);
        assert_eq!(batch.targets, vec![3, 5]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_clips_fold_into_batch_axis() {
        let batcher = ClipBatcher::<NdArray>::new(Default::default());
        let batch   = batcher.batch(vec![item(3, 0, 0.0), item(3, 1, 0.0)]);

        assert_eq!(batch.imgs.dims(), [6, 3, 2, 2, 2]);
        assert_eq!(batch.num_clips, 3);
    }

    #[test]
    fn test_mismatched_item_dropped() {
        let batcher = ClipBatcher::<NdArray>::new(Default::default());
        let batch   = batcher.batch(vec![item(1, 0, 0.0), item(2, 1, 0.0)]);

        assert_eq!(batch.targets, vec![0]);
        assert_eq!(batch.imgs.dims(), [1, 3, 2, 2, 2]);
    }
}
