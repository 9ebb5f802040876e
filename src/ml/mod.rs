// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The model, the optimisation step and the training loop.
//
// What's in this layer:
//
//   model.rs       — C3D backbone + I3D-style head wrapped in
//                    a Recognizer3d:
//                    • 3x3x3 convolution stages with max pooling
//                    • global average pooling
//                    • fc6 / fc7 with ReLU + dropout
//                    • linear classifier over clip-averaged scores
//
//   session.rs     — BurnSession: model + optimizer behind the
//                    TrainSession trait (forward, backward,
//                    SGD step, inference, save / resume)
//
//   lr_schedule.rs — per-iteration warmup-cosine / multi-step
//                    learning-rate schedule
//
//   trainer.rs     — the epoch / iteration loop, logging,
//                    validation and best-checkpoint tracking
//
//   inferencer.rs  — loads a best_model snapshot and scores it
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Tran et al. (2015) Learning Spatiotemporal Features
//            with 3D Convolutional Networks (C3D)

/// C3D backbone, classification head and recognizer
pub mod model;

/// Burn-backed TrainSession implementation
pub mod session;

/// Learning-rate policies
pub mod lr_schedule;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads a checkpoint and evaluates it
pub mod inferencer;
