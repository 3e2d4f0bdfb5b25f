// ============================================================
// Layer 6: Training History
// ============================================================
// Records per-epoch metrics and writes them as one JSON object
// of parallel arrays (index i = epoch i + 1):
//
//   {
//     "loss":         [1.93, 1.71, ...],
//     "accuracy":     [0.18, 0.34, ...],
//     "val_loss":     [1.90, 1.75, ...],
//     "val_accuracy": [0.20, 0.30, ...],
//     "lr":           [0.01, 0.01, ...]
//   }
//
// How to read it:
//   - val_loss rising while loss falls → overfitting
//   - a step down in lr marks a plateau the scheduler reacted to

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::infra::artifact_store::write_json_atomic;

/// Metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean categorical cross-entropy over the training examples
    pub loss: f64,

    /// Fraction of training examples classified correctly (training mode)
    pub accuracy: f64,

    pub val_loss: f64,
    pub val_accuracy: f64,

    /// Learning rate used during this epoch
    pub lr: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub loss:         Vec<f64>,
    pub accuracy:     Vec<f64>,
    pub val_loss:     Vec<f64>,
    pub val_accuracy: Vec<f64>,
    pub lr:           Vec<f64>,
}

impl TrainingHistory {
    pub fn record(&mut self, m: &EpochMetrics) {
        self.loss.push(m.loss);
        self.accuracy.push(m.accuracy);
        self.val_loss.push(m.val_loss);
        self.val_accuracy.push(m.val_accuracy);
        self.lr.push(m.lr);

        tracing::debug!(
            "Recorded epoch {} metrics: loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.loss,
            m.val_loss,
        );
    }

    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        tracing::info!("Saved training history ({} epochs) to '{}'", self.epochs(), path.display());
        Ok(())
    }
}
