// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// All burn-specific code lives here. Other layers see plain
// Vec<f32> / Vec<i32> and the portable graph types.
//
//   model.rs      Embedding → mean pool → Dense(H, relu)
//                 → Dropout → Dense(H/2, relu) → Dropout
//                 → Dense(C) → softmax
//
//   callbacks.rs  Early stopping, best-accuracy checkpointing
//                 and learning-rate reduction on plateau.
//                 Pure bookkeeping, no tensors.
//
//   trainer.rs    Mini-batch Adam loop, validation each epoch
//
//   converter.rs  Copies trained weights into a Float32 graph
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Intent classifier architecture
pub mod model;

/// Epoch-level training policies
pub mod callbacks;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Trained model → portable graph
pub mod converter;
