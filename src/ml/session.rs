// ============================================================
// Layer 5 — Burn Training Session
// ============================================================
// BurnSession is the TrainSession the real binary uses: a
// Recognizer3d on an autodiff backend plus its optimizer.
//
// Key Burn insights:
//   - optim.step() takes the model by value and returns the
//     updated one; gradients are consumed by the step
//   - model.valid() gives the same weights on the inner
//     (non-autodiff) backend, with dropout disabled
//   - records are loaded with Module::load_record /
//     Optimizer::load_record, both of which consume self
//
// Reference: Burn Book §5 (Training), §6 (Saving and Loading)

use anyhow::{anyhow, Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::Path;

use crate::data::batcher::ClipBatch;
use crate::domain::{
    clip::ClipPrediction,
    traits::{LogVars, TrainSession},
};
use crate::infra::checkpoint::{
    load_record, record_exists, record_file, record_stem, save_record, MODEL_RECORD, OPTIM_RECORD,
};
use crate::ml::model::{ModelRecord, Recognizer3d};

pub struct BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Recognizer3d<B>, B>,
{
    model:  Recognizer3d<B>,
    optim:  O,
    device: B::Device,
}

impl<B, O> BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Recognizer3d<B>, B>,
{
    pub fn new(model: Recognizer3d<B>, optim: O, device: B::Device) -> Self {
        Self { model, optim, device }
    }

    /// Continue an interrupted run: model weights and optimizer state
    /// from the `model` / `optim` records in `dir`.
    pub fn resume_from(self, dir: &Path) -> Result<Self> {
        let model_stem = dir.join(MODEL_RECORD);
        let optim_stem = dir.join(OPTIM_RECORD);

        let model_record: ModelRecord<B> = load_record::<B, _>(&model_stem, &self.device)?;
        let model = self.model.load_record(model_record);

        // Older snapshots may lack optimizer state; start it fresh then.
        let optim = if record_exists(&optim_stem) {
            let record = load_record::<B, O::Record>(&optim_stem, &self.device)?;
            self.optim.load_record(record)
        } else {
            tracing::warn!(
                "No optimizer state at '{}', starting it fresh",
                record_file(&optim_stem).display()
            );
            self.optim
        };

        tracing::info!("Resumed model and optimizer from '{}'", dir.display());
        Ok(Self { model, optim, device: self.device })
    }

    /// Initialise weights from a pretrained model record.
    /// `path` may be given with or without its `.mpk.gz` suffix.
    pub fn with_pretrained(self, path: &Path) -> Result<Self> {
        let stem = record_stem(path);
        let record: ModelRecord<B> = load_record::<B, _>(&stem, &self.device)
            .with_context(|| format!("Cannot load pretrained weights '{}'", path.display()))?;
        tracing::info!("Loaded pretrained weights from '{}'", record_file(&stem).display());
        Ok(Self { model: self.model.load_record(record), ..self })
    }
}

impl<B, O> TrainSession for BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Recognizer3d<B>, B>,
{
    type TrainBatch = ClipBatch<B>;
    type EvalBatch  = ClipBatch<B::InnerBackend>;

    fn train_step(&mut self, batch: ClipBatch<B>, lr: f64) -> Result<LogVars> {
        let output = self
            .model
            .forward_train(batch.imgs, batch.labels, batch.num_clips);
        let loss: f64 = output.loss.clone().into_scalar().elem::<f64>();

        // Backward pass + optimizer update
        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(lr, self.model.clone(), grads);

        Ok(LogVars { loss, top1_acc: output.top1_acc })
    }

    fn predict(&self, batch: ClipBatch<B::InnerBackend>) -> Result<Vec<ClipPrediction>> {
        predict_clips(&self.model.valid(), batch)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        save_record::<B, _>(self.model.clone().into_record(), &dir.join(MODEL_RECORD))?;
        save_record::<B, _>(self.optim.to_record(), &dir.join(OPTIM_RECORD))?;
        Ok(())
    }
}

/// Clip-averaged class probabilities for every example in `batch`.
pub fn predict_clips<B: Backend>(
    model: &Recognizer3d<B>,
    batch: ClipBatch<B>,
) -> Result<Vec<ClipPrediction>> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let probs  = model.forward_test(batch.imgs, batch.num_clips);
    let [_, k] = probs.dims();
    let flat: Vec<f32> = probs
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read predictions: {e:?}"))?;

    Ok(flat
        .chunks(k)
        .zip(batch.targets)
        .map(|(scores, label)| ClipPrediction::new(scores.to_vec(), label))
        .collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{C3dConfig, I3dHeadConfig, Recognizer3dConfig};
    use burn::{
        backend::{Autodiff, NdArray},
        optim::SgdConfig,
    };

    type TestBackend = Autodiff<NdArray>;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> Recognizer3d<TestBackend> {
        let backbone = C3dConfig::new().with_base_channels(2).with_fc_dim(8).with_dropout_ratio(0.0);
        let cls_head = I3dHeadConfig::new(3, 8).with_dropout_ratio(0.0);
        Recognizer3dConfig::new(backbone, cls_head).init(device)
    }

    type TestOptim = burn::optim::adaptor::OptimizerAdaptor<
        burn::optim::Sgd<NdArray>,
        Recognizer3d<TestBackend>,
        TestBackend,
    >;

    fn sgd() -> TestOptim {
        SgdConfig::new().init()
    }

    fn batch<B: Backend>(device: &B::Device, labels: &[i32]) -> ClipBatch<B> {
        let n = labels.len();
        ClipBatch {
            imgs:      Tensor::<B, 5>::ones([n, 3, 4, 8, 8], device),
            labels:    Tensor::<B, 1, Int>::from_ints(labels, device),
            targets:   labels.iter().map(|&l| l as usize).collect(),
            num_clips: 1,
        }
    }

    #[test]
    fn test_train_step_reports_finite_loss() {
        let device  = Default::default();
        let mut session = BurnSession::new(tiny_model(&device), sgd(), device);

        let vars = session.train_step(batch(&device, &[0, 1]), 0.01).unwrap();
        assert!(vars.loss.is_finite());
        assert!((0.0..=1.0).contains(&vars.top1_acc));
    }

    #[test]
    fn test_predict_returns_one_distribution_per_example() {
        let device  = Default::default();
        let session = BurnSession::new(tiny_model(&device), sgd(), device);

        let preds = session.predict(batch(&device, &[2, 0, 1])).unwrap();
        assert_eq!(preds.len(), 3);
        assert_eq!(preds[0].label, 2);
        let total: f32 = preds[1].scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_save_then_resume() {
        let tmp     = tempfile::tempdir().unwrap();
        let device  = Default::default();
        let mut session = BurnSession::new(tiny_model(&device), sgd(), device);
        session.train_step(batch(&device, &[0]), 0.01).unwrap();
        session.save(tmp.path()).unwrap();

        assert!(record_exists(&tmp.path().join(MODEL_RECORD)));
        assert!(record_exists(&tmp.path().join(OPTIM_RECORD)));

        let before = session.predict(batch(&device, &[1])).unwrap();
        let fresh  = BurnSession::new(tiny_model(&device), sgd(), device);
        let resumed = fresh.resume_from(tmp.path()).unwrap();
        let after   = resumed.predict(batch(&device, &[1])).unwrap();

        for (a, b) in before[0].scores.iter().zip(&after[0].scores) {
            // Records are stored at half precision
            assert!((a - b).abs() < 1e-2);
        }
    }

    #[test]
    fn test_pretrained_accepts_record_suffix() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let session = BurnSession::new(tiny_model(&device), sgd(), device);
        session.save(tmp.path()).unwrap();

        let path = record_file(&tmp.path().join(MODEL_RECORD));
        let fresh = BurnSession::new(tiny_model(&device), sgd(), device);
        assert!(fresh.with_pretrained(&path).is_ok());

        let missing = BurnSession::new(tiny_model(&device), sgd(), device);
        assert!(missing.with_pretrained(&tmp.path().join("nope")).is_err());
    }
}
