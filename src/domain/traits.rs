// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits, not the
// concrete loaders or runtimes, so the embedded corpus can be
// swapped for a file and the interpreter for another runtime
// without touching the pipelines.

use anyhow::Result;

use crate::domain::example::Example;

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Anything that can produce the ordered list of training examples.
///
/// Implementations:
///   - EmbeddedSource    → the built-in assistant corpus
///   - JsonExampleLoader → a JSON array on disk
pub trait DatasetSource {
    fn load_all(&self) -> Result<Vec<Example>>;
}

// ─── TokenEncoder ─────────────────────────────────────────────────────────────
/// Anything that maps text to raw (unpadded) token ids.
///
/// Implementations:
///   - Vocabulary → the in-memory mapping right after fitting
///   - tokenizers::Tokenizer → the persisted tokenizer JSON
pub trait TokenEncoder {
    fn token_ids(&self, text: &str) -> Result<Vec<u32>>;
}

// ─── IntentPredictor ──────────────────────────────────────────────────────────
/// Anything that turns an already padded token sequence into a
/// probability per class.
///
/// Implementations:
///   - Interpreter → runs an exported portable graph
pub trait IntentPredictor {
    /// Returns one probability per class (sums to ~1.0)
    fn predict(&mut self, token_ids: &[i32]) -> Result<Vec<f32>>;
}

/// Index and value of the largest probability.
pub fn argmax(probs: &[f32]) -> Option<(usize, f32)> {
    probs
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_picks_first_max() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[]), None);
    }
}
