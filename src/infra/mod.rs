// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Everything that touches the disk:
//
//   artifact_store.rs  Atomic writes (temp file + rename) for
//                      graphs and JSON artifacts, plus the
//                      label encoder file.
//
//   checkpoint.rs      Model weights through burn's recorder,
//                      and the manifest needed to rebuild the
//                      model for export.
//
//   tokenizer_store.rs The fitted vocabulary as a HuggingFace
//                      tokenizer JSON, so clients and export
//                      reproduce training-time ids.
//
//   metrics.rs         Per-epoch history written as JSON.
//
// Reference: Burn Book §5 (Checkpointing)

/// Atomic file writes and label persistence
pub mod artifact_store;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer saving and loading
pub mod tokenizer_store;

/// Training history
pub mod metrics;
