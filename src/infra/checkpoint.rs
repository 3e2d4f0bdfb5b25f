// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores the classifier with burn's
// NamedMpkFileRecorder (full precision MessagePack).
//
// What gets saved:
//   1. models/intent_classifier.mpk   all learned parameters
//   2. models/model_config.json       ModelManifest: the architecture
//                                     plus the vocabulary settings
//
// The manifest is written once before training starts; the
// weights are overwritten whenever the trainer finds a better
// checkpoint. Loading needs both: the manifest rebuilds a module
// of the right shape, then the record fills in its weights.

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::infra::artifact_store::{read_json, write_json_atomic};
use crate::ml::model::{IntentClassifier, IntentClassifierConfig};

pub const MANIFEST_FILE_NAME: &str = "model_config.json";

/// Everything needed to rebuild the trained module and describe
/// its preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub classifier:     IntentClassifierConfig,
    /// Vocabulary cap the tokenizer was fitted with
    pub max_vocab_size: usize,
    pub oov_token:      String,
}

pub struct CheckpointManager {
    model_path:    PathBuf,
    manifest_path: PathBuf,
}

impl CheckpointManager {
    /// The manifest lives next to the model file.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        let model_path    = model_path.into();
        let manifest_path = model_path.with_file_name(MANIFEST_FILE_NAME);
        Self { model_path, manifest_path }
    }

    fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
    }

    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        write_json_atomic(&self.manifest_path, manifest)?;
        tracing::debug!("Saved model manifest to '{}'", self.manifest_path.display());
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<ModelManifest> {
        read_json(&self.manifest_path).with_context(|| {
            format!(
                "Cannot load model config '{}'. Make sure you have run 'train' before 'export'.",
                self.manifest_path.display()
            )
        })
    }

    /// Overwrite the saved weights with `model`.
    pub fn save_model<B: Backend>(&self, model: &IntentClassifier<B>) -> Result<()> {
        if let Some(dir) = self.model_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
        }
        Self::recorder()
            .record(model.clone().into_record(), self.model_path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", self.model_path.display())
            })?;
        Ok(())
    }

    /// Rebuild the module from the manifest and load the saved weights.
    pub fn load_model<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(IntentClassifier<B>, ModelManifest)> {
        if !self.model_path.exists() {
            anyhow::bail!(
                "Model file '{}' not found. Have you trained the model first?",
                self.model_path.display()
            );
        }
        let manifest = self.load_manifest()?;

        let record = Self::recorder()
            .load(self.model_path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'", self.model_path.display())
            })?;

        let model = manifest.classifier.init::<B>(device).load_record(record);
        tracing::info!("Model loaded from '{}'", self.model_path.display());
        Ok((model, manifest))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn manifest() -> ModelManifest {
        ModelManifest {
            classifier: IntentClassifierConfig::new(12, 3, 5)
                .with_embedding_dim(4)
                .with_hidden_units(4),
            max_vocab_size: 100,
            oov_token:      "<OOV>".into(),
        }
    }

    #[test]
    fn test_saved_model_reloads_with_same_outputs() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path().join("intent_classifier.mpk"));
        let device = Default::default();

        let model = manifest().classifier.init::<B>(&device);
        ckpt.save_manifest(&manifest()).unwrap();
        ckpt.save_model(&model).unwrap();
        assert!(dir.path().join(MANIFEST_FILE_NAME).exists());

        let (loaded, m) = ckpt.load_model::<B>(&device).unwrap();
        assert_eq!(m.max_vocab_size, 100);

        let ids = Tensor::<B, 2, Int>::from_data(
            TensorData::new(vec![2i64, 3, 4, 0, 0], [1, 5]),
            &device,
        );
        let a: Vec<f32> = model.forward(ids.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(ids).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_model_is_a_clear_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("nope.mpk"));
        let err  = ckpt.load_model::<B>(&Default::default()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
