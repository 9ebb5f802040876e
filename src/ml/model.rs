use burn::{
    nn::{
        conv::{Conv3d, Conv3dConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig, Initializer, Linear, LinearConfig, PaddingConfig3d,
    },
    prelude::*,
    tensor::activation::{relu, softmax},
};

// ─── Backbone ────────────────────────────────────────────────────────────────

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct C3dConfig {
    /// Width of the first stage; later stages use 2x, 4x, 8x, 8x
    #[config(default = 64)]
    pub base_channels: usize,
    /// Width of fc6 / fc7, the embedding size handed to the head
    #[config(default = 4096)]
    pub fc_dim: usize,
    #[config(default = 0.5)]
    pub dropout_ratio: f64,
    /// Std of the normal init used for fc6 / fc7
    #[config(default = 0.005)]
    pub init_std: f64,
}

impl C3dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> C3d<B> {
        let b = self.base_channels;
        // (convs per stage, output width, halve time?)
        let layout = [(1, b, false), (1, 2 * b, true), (2, 4 * b, true), (2, 8 * b, true), (2, 8 * b, true)];

        let mut in_ch  = 3;
        let mut stages = Vec::with_capacity(layout.len());
        for (num_convs, out_ch, pool_time) in layout {
            let convs = (0..num_convs)
                .map(|i| {
                    let from = if i == 0 { in_ch } else { out_ch };
                    Conv3dConfig::new([from, out_ch], [3, 3, 3])
                        .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
                        .init(device)
                })
                .collect();
            stages.push(ConvStage { convs, temporal_stride: if pool_time { 2 } else { 1 } });
            in_ch = out_ch;
        }

        let init = Initializer::Normal { mean: 0.0, std: self.init_std };
        let fc6 = LinearConfig::new(in_ch, self.fc_dim).with_initializer(init.clone()).init(device);
        let fc7 = LinearConfig::new(self.fc_dim, self.fc_dim).with_initializer(init).init(device);

        C3d {
            stages,
            fc6,
            fc7,
            dropout: DropoutConfig::new(self.dropout_ratio).init(),
        }
    }
}

/// 3x3x3 convolutions followed by 2x2 spatial max pooling, and 2x
/// temporal pooling when `temporal_stride` is 2.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    pub convs:           Vec<Conv3d<B>>,
    pub temporal_stride: usize,
}

impl<B: Backend> ConvStage<B> {
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let mut x = x;
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }
        max_pool_3d(x, self.temporal_stride)
    }
}

#[derive(Module, Debug)]
pub struct C3d<B: Backend> {
    pub stages:  Vec<ConvStage<B>>,
    pub fc6:     Linear<B>,
    pub fc7:     Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> C3d<B> {
    /// [N, 3, T, H, W] → [N, fc_dim]
    pub fn forward(&self, imgs: Tensor<B, 5>) -> Tensor<B, 2> {
        let mut x = imgs;
        for stage in &self.stages {
            x = stage.forward(x);
        }

        // Whatever spatio-temporal extent is left is averaged away,
        // so any clip length / crop size that survives the pools works.
        let [n, c, _, _, _] = x.dims();
        let x = x.mean_dim(4).mean_dim(3).mean_dim(2).reshape([n, c]);

        let x = self.dropout.forward(relu(self.fc6.forward(x)));
        self.dropout.forward(relu(self.fc7.forward(x)))
    }
}

/// Non-overlapping max pooling: 2x2 over (H, W), and `temporal_stride`
/// over T. An axis shorter than its window is left alone, and an odd
/// trailing row/column/frame is dropped.
pub fn max_pool_3d<B: Backend>(x: Tensor<B, 5>, temporal_stride: usize) -> Tensor<B, 5> {
    let [n, c, t, h, w] = x.dims();
    let kt = if temporal_stride > 1 && t >= temporal_stride { temporal_stride } else { 1 };
    let kh = if h >= 2 { 2 } else { 1 };
    let kw = if w >= 2 { 2 } else { 1 };
    let (t2, h2, w2) = (t / kt, h / kh, w / kw);

    x.slice([0..n, 0..c, 0..t2 * kt, 0..h2 * kh, 0..w2 * kw])
        .reshape([n * c * t2, kt, h2, kh, w2, kw])
        .max_dim(5)
        .max_dim(3)
        .max_dim(1)
        .reshape([n, c, t2, h2, w2])
}

// ─── Head ────────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct I3dHeadConfig {
    pub num_classes: usize,
    pub in_channels: usize,
    #[config(default = 0.5)]
    pub dropout_ratio: f64,
    #[config(default = 0.01)]
    pub init_std: f64,
}

impl I3dHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> I3dHead<B> {
        let fc_cls = LinearConfig::new(self.in_channels, self.num_classes)
            .with_initializer(Initializer::Normal { mean: 0.0, std: self.init_std })
            .init(device);
        I3dHead { dropout: DropoutConfig::new(self.dropout_ratio).init(), fc_cls }
    }
}

/// Dropout + linear classifier over backbone embeddings.
#[derive(Module, Debug)]
pub struct I3dHead<B: Backend> {
    pub dropout: Dropout,
    pub fc_cls:  Linear<B>,
}

impl<B: Backend> I3dHead<B> {
    /// [N, in_channels] → [N, num_classes]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc_cls.forward(self.dropout.forward(features))
    }
}

// ─── Recognizer ──────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct Recognizer3dConfig {
    pub backbone: C3dConfig,
    pub cls_head: I3dHeadConfig,
}

impl Recognizer3dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Recognizer3d<B> {
        Recognizer3d {
            backbone: self.backbone.init(device),
            cls_head: self.cls_head.init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Recognizer3d<B: Backend> {
    pub backbone: C3d<B>,
    pub cls_head: I3dHead<B>,
}

/// Serialisable parameters of a `Recognizer3d`.
pub type ModelRecord<B> = <Recognizer3d<B> as Module<B>>::Record;

pub struct TrainOutput<B: Backend> {
    /// Scalar cross-entropy loss, shape [1]
    pub loss:     Tensor<B, 1>,
    pub top1_acc: f64,
}

impl<B: Backend> Recognizer3d<B> {
    /// imgs: [N * num_clips, 3, T, H, W] → per-clip logits [N * num_clips, K]
    pub fn forward(&self, imgs: Tensor<B, 5>) -> Tensor<B, 2> {
        self.cls_head.forward(self.backbone.forward(imgs))
    }

    /// Cross-entropy on clip-averaged logits plus batch top-1 accuracy.
    pub fn forward_train(
        &self,
        imgs:      Tensor<B, 5>,
        labels:    Tensor<B, 1, Int>,
        num_clips: usize,
    ) -> TrainOutput<B> {
        let logits = average_clips(self.forward(imgs), num_clips);
        let [n, _] = logits.dims();

        let correct: i64 = logits
            .clone()
            .argmax(1)
            .flatten::<1>(0, 1)
            .equal(labels.clone())
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        let top1_acc = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, labels);

        TrainOutput { loss, top1_acc }
    }

    /// Class probabilities averaged over each example's clips: [N, K]
    pub fn forward_test(&self, imgs: Tensor<B, 5>, num_clips: usize) -> Tensor<B, 2> {
        average_clips(softmax(self.forward(imgs), 1), num_clips)
    }
}

/// [N * clips, K] → [N, K] by averaging consecutive rows.
pub fn average_clips<B: Backend>(scores: Tensor<B, 2>, num_clips: usize) -> Tensor<B, 2> {
    if num_clips <= 1 {
        return scores;
    }
    let [rows, k] = scores.dims();
    let n = rows / num_clips;
    scores.reshape([n, num_clips, k]).mean_dim(1).reshape([n, k])
}
