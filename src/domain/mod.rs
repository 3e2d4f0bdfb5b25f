// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs and traits that define what the system
// works with: labelled utterances, the label set, and the
// metadata contract handed to the mobile client.
//
// Rules for this layer:
//   - NO burn types here
//   - NO file I/O
//   - Only structs, enums, and traits
//
// Everything here is testable without a model or a disk.

// A labelled utterance (text + intent)
pub mod example;

// Bijective intent <-> index mapping
pub mod label_encoder;

// The JSON sidecar describing an exported graph
pub mod metadata;

// Core abstractions (traits) that other layers implement
pub mod traits;
