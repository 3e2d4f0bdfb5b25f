// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything between raw labelled text and tensor batches.
//
//   EmbeddedSource / JsonExampleLoader → Vec<Example>
//       │
//       ▼
//   Preprocessor    → fits Vocabulary + LabelEncoder,
//       │             pads ids, one-hot encodes labels
//       ▼
//   split_train_val → seeded, class-stratified train/validation split
//       │
//       ▼
//   IntentBatcher   → stacks examples into tensors
//
// Each module is one step and is tested on its own.

/// Built-in corpus, calibration and smoke-test sentences
pub mod dataset;

/// Loads a labelled dataset from a JSON file
pub mod loader;

/// Tokenisation, vocabulary fitting, padding, label encoding
pub mod preprocessor;

/// Seeded train/validation split
pub mod splitter;

/// Stacks encoded examples into burn tensors
pub mod batcher;
