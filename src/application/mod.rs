// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Each use case strings the other layers together to reach
// one goal: train a classifier, export it, or smoke-test an
// exported graph.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - No direct file formats (that's Layer 4, 6 and 7)
//   - Only workflow coordination

// Dataset → vocabulary, labels, trained model
pub mod train_use_case;

// Trained model → float and quantized graphs + metadata
pub mod export_use_case;

// Exported graphs → predictions on fixed sentences
pub mod validate_use_case;

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};
    use std::sync::OnceLock;

    use tempfile::TempDir;

    use super::export_use_case::ExportConfig;
    use super::train_use_case::{TrainConfig, TrainUseCase};

    static TRAINED: OnceLock<TempDir> = OnceLock::new();

    /// Trains once on the built-in corpus with the default
    /// hyperparameters and returns the models directory.
    pub fn trained_models() -> &'static Path {
        TRAINED
            .get_or_init(|| {
                let dir = tempfile::tempdir().unwrap();
                TrainUseCase::new(train_config(dir.path())).execute().unwrap();
                dir
            })
            .path()
    }

    pub fn train_config(models: &Path) -> TrainConfig {
        TrainConfig {
            model_path:         models.join("intent_classifier.mpk"),
            tokenizer_path:     models.join("tokenizer.json"),
            label_encoder_path: models.join("label_encoder.json"),
            history_path:       models.join("training_history.json"),
            ..TrainConfig::default()
        }
    }

    pub fn export_config(models: &Path, assets: &Path) -> ExportConfig {
        let train = train_config(models);
        ExportConfig {
            model_path:           train.model_path,
            tokenizer_path:       train.tokenizer_path,
            label_encoder_path:   train.label_encoder_path,
            float_graph_path:     assets.join("model.tflite"),
            quantized_graph_path: assets.join("model_quantized.tflite"),
            metadata_path:        assets.join("model_metadata.json"),
            ..ExportConfig::default()
        }
    }

    pub fn history_path(models: &Path) -> PathBuf {
        train_config(models).history_path
    }
}
