// ============================================================
// Layer 4 — Clip Loader
// ============================================================
// Wraps a Burn DataLoader over a RawframeDataset so the
// training driver can consume it through the BatchSource /
// EvalSource traits.
//
//   RawframeDataset ──► ClipBatcher<B> ──► DataLoader ──► ClipLoader
//
// The dataset is shared (Arc) between the DataLoader and the
// ClipLoader: the loader reads examples from it, the
// ClipLoader asks it to score predictions after validation.
//
// With num_workers > 0 Burn splits the dataset into one slice
// per worker (len / workers each, the remainder on the last),
// and every worker emits its own short final batch. The batch
// count reported to the trainer follows that split. The
// training loader drops short batches altogether.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use std::sync::Arc;

use crate::data::{
    batcher::{ClipBatch, ClipBatcher},
    dataset::RawframeDataset,
};
use crate::domain::{
    clip::ClipPrediction,
    traits::{BatchSource, EvalSource},
};
use crate::infra::metrics::{EvalReport, Metric};

pub struct ClipLoader<B: Backend> {
    loader:      Arc<dyn DataLoader<ClipBatch<B>>>,
    dataset:     Arc<RawframeDataset>,
    batch_size:  usize,
    num_workers: usize,
    drop_last:   bool,
}

impl<B: Backend> ClipLoader<B> {
    /// Shuffled loader for training. `seed` fixes the visiting order.
    /// Batches shorter than `batch_size` are skipped.
    pub fn train(
        dataset:     Arc<RawframeDataset>,
        device:      B::Device,
        batch_size:  usize,
        num_workers: usize,
        seed:        u64,
    ) -> Self {
        let loader = DataLoaderBuilder::new(ClipBatcher::<B>::new(device))
            .batch_size(batch_size)
            .shuffle(seed)
            .num_workers(num_workers)
            .build(dataset.clone());
        Self { loader, dataset, batch_size, num_workers, drop_last: true }
    }

    /// In-order loader for validation / evaluation.
    pub fn eval(
        dataset:     Arc<RawframeDataset>,
        device:      B::Device,
        batch_size:  usize,
        num_workers: usize,
    ) -> Self {
        let loader = DataLoaderBuilder::new(ClipBatcher::<B>::new(device))
            .batch_size(batch_size)
            .num_workers(num_workers)
            .build(dataset.clone());
        Self { loader, dataset, batch_size, num_workers, drop_last: false }
    }

    pub fn dataset(&self) -> &RawframeDataset {
        &self.dataset
    }
}

/// Items each loader worker receives.
fn worker_slices(len: usize, num_workers: usize) -> Vec<usize> {
    let workers = num_workers.max(1);
    let share   = len / workers;
    let mut slices = vec![share; workers];
    slices[workers - 1] = len - share * (workers - 1);
    slices
}

impl<B: Backend> BatchSource for ClipLoader<B> {
    type Batch = ClipBatch<B>;

    fn num_batches(&self) -> usize {
        let batch_size = self.batch_size.max(1);
        worker_slices(self.loader.num_items(), self.num_workers)
            .into_iter()
            .map(|n| if self.drop_last { n / batch_size } else { n.div_ceil(batch_size) })
            .sum()
    }

    fn batches(&self) -> Box<dyn Iterator<Item = ClipBatch<B>> + '_> {
        let full = self.batch_size;
        if self.drop_last {
            Box::new(self.loader.iter().filter(move |batch| batch.len() >= full))
        } else {
            Box::new(self.loader.iter())
        }
    }

    fn samples_in(&self, batch: &ClipBatch<B>) -> usize {
        batch.len()
    }
}

impl<B: Backend> EvalSource for ClipLoader<B> {
    fn evaluate(&self, results: &[ClipPrediction]) -> Result<EvalReport> {
        self.dataset.evaluate(results, Metric::all())
    }
}
