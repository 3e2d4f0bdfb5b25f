// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load examples             (Layer 4 - data)
//   Step 2: Validate the dataset      (Layer 3 - domain)
//   Step 3: Fit vocabulary + labels   (Layer 4 - data)
//   Step 4: Persist tokenizer + labels before training
//                                     (Layer 6 - infra)
//   Step 5: Encode through the persisted tokenizer
//   Step 6: Split train/validation    (Layer 4 - data)
//   Step 7: Save model manifest       (Layer 6 - infra)
//   Step 8: Run training loop         (Layer 5 - ml)
//   Step 9: Save history              (Layer 6 - infra)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{EmbeddedSource, EncodedExample},
    loader::JsonExampleLoader,
    preprocessor::{PreprocessConfig, Preprocessor, DEFAULT_OOV_TOKEN},
    splitter::split_train_val,
};
use crate::domain::{example::validate_examples, traits::DatasetSource};
use crate::infra::{
    artifact_store::save_labels,
    checkpoint::{CheckpointManager, ModelManifest},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::IntentClassifierConfig,
    trainer::{run_training, TrainingOutcome},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters and artifact paths for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub model_path:              PathBuf,
    pub tokenizer_path:          PathBuf,
    pub label_encoder_path:      PathBuf,
    pub history_path:            PathBuf,
    /// JSON dataset to train on instead of the built-in corpus
    pub data_path:               Option<PathBuf>,
    pub max_sequence_length:     usize,
    /// Upper bound on vocabulary entries, <PAD> and <OOV> included
    pub vocab_size:              usize,
    pub embedding_dim:           usize,
    pub hidden_units:            usize,
    pub dropout_rate:            f64,
    pub batch_size:              usize,
    pub epochs:                  usize,
    pub learning_rate:           f64,
    pub validation_split:        f64,
    pub seed:                    u64,
    pub early_stopping_patience: usize,
    pub lr_patience:             usize,
    pub lr_factor:               f64,
    pub min_lr:                  f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_path:              "models/intent_classifier.mpk".into(),
            tokenizer_path:          "models/tokenizer.json".into(),
            label_encoder_path:      "models/label_encoder.json".into(),
            history_path:            "models/training_history.json".into(),
            data_path:               None,
            max_sequence_length:     32,
            vocab_size:              10_000,
            embedding_dim:           128,
            hidden_units:            64,
            dropout_rate:            0.3,
            batch_size:              8,
            epochs:                  100,
            learning_rate:           1e-2,
            validation_split:        0.2,
            seed:                    42,
            early_stopping_patience: 10,
            lr_patience:             5,
            lr_factor:               0.5,
            min_lr:                  1e-6,
        }
    }
}

/// Summary printed by the CLI once training is done.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub epochs_run:          usize,
    pub stopped_at:          Option<usize>,
    pub final_val_loss:      f64,
    pub final_val_accuracy:  f64,
    pub best_checkpoint_acc: f64,
    pub classes:             Vec<String>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Load examples ─────────────────────────────────────────────
        let examples = match &cfg.data_path {
            Some(path) => {
                tracing::info!("Loading examples from '{}'", path.display());
                JsonExampleLoader::new(path).load_all()?
            }
            None => {
                tracing::info!("Using the built-in assistant corpus");
                EmbeddedSource.load_all()?
            }
        };

        // ── Step 2: Reject datasets training can't learn from ─────────────────
        validate_examples(&examples).context("Dataset rejected")?;
        tracing::info!("Loaded {} examples", examples.len());

        // ── Step 3: Fit vocabulary and label encoder ──────────────────────────
        let preprocessor = Preprocessor::new(PreprocessConfig {
            max_vocab_size:      cfg.vocab_size,
            max_sequence_length: cfg.max_sequence_length,
            oov_token:           DEFAULT_OOV_TOKEN.to_string(),
        });
        let prepared = preprocessor.prepare(&examples)?;

        // ── Step 4: Persist both mappings before training ─────────────────────
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_path).save(&prepared.vocabulary)?;
        save_labels(&cfg.label_encoder_path, &prepared.labels)?;

        // ── Step 5: Re-encode through the persisted tokenizer ────────────────
        // The file on disk is what export and clients will use, so it
        // must reproduce the fitted mapping exactly.
        let encoded = preprocessor.encode_examples(&examples, &tokenizer, &prepared.labels)?;
        if !encoded
            .iter()
            .map(|e| e.token_ids.as_slice())
            .eq(prepared.sequences())
        {
            anyhow::bail!(
                "Persisted tokenizer '{}' disagrees with the fitted vocabulary",
                cfg.tokenizer_path.display()
            );
        }

        // ── Step 6: Train / validation split ──────────────────────────────────
        let (train, val) =
            split_train_val(encoded, cfg.validation_split, cfg.seed, EncodedExample::class_index);
        tracing::info!("Split: {} train, {} validation", train.len(), val.len());

        // ── Step 7: Save the manifest so export can rebuild the model ─────────
        let model_cfg = IntentClassifierConfig::new(
            prepared.vocabulary.len(),
            prepared.labels.num_classes(),
            cfg.max_sequence_length,
        )
        .with_embedding_dim(cfg.embedding_dim)
        .with_hidden_units(cfg.hidden_units)
        .with_dropout_rate(cfg.dropout_rate);

        let ckpt_manager = CheckpointManager::new(&cfg.model_path);
        ckpt_manager.save_manifest(&ModelManifest {
            classifier:     model_cfg.clone(),
            max_vocab_size: cfg.vocab_size,
            oov_token:      DEFAULT_OOV_TOKEN.to_string(),
        })?;

        // ── Step 8: Run training loop (Layer 5) ───────────────────────────────
        let TrainingOutcome {
            history,
            final_val_loss,
            final_val_accuracy,
            best_checkpoint_acc,
            stopped_at,
        } = run_training(cfg, &model_cfg, &train, &val, &ckpt_manager)?;

        // ── Step 9: Save history ──────────────────────────────────────────────
        history.save(&cfg.history_path)?;

        Ok(TrainReport {
            epochs_run: history.epochs(),
            stopped_at,
            final_val_loss,
            final_val_accuracy,
            best_checkpoint_acc,
            classes: prepared.labels.classes,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{history_path, train_config, trained_models};
    use crate::infra::{artifact_store::{load_labels, read_json}, metrics::TrainingHistory};

    #[test]
    fn test_training_writes_every_artifact() {
        let models = trained_models();
        let cfg    = train_config(models);

        assert!(cfg.model_path.exists());
        assert!(models.join(crate::infra::checkpoint::MANIFEST_FILE_NAME).exists());

        let labels = load_labels(&cfg.label_encoder_path).unwrap();
        assert_eq!(
            labels.classes,
            ["calendar", "greeting", "help", "music", "news", "time", "weather"]
        );

        let tokenizer = TokenizerStore::new(&cfg.tokenizer_path).load().unwrap();
        assert_eq!(tokenizer.token_to_id("<PAD>"), Some(0));
        assert_eq!(tokenizer.token_to_id("<OOV>"), Some(1));

        let history: TrainingHistory = read_json(&history_path(models)).unwrap();
        assert!(history.epochs() > 0);
        assert_eq!(history.val_loss.len(), history.epochs());
        assert_eq!(history.lr[0], TrainConfig::default().learning_rate);
    }

    #[test]
    fn test_vocab_cap_below_two_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { vocab_size: 1, ..train_config(dir.path()) };
        let err = TrainUseCase::new(cfg.clone()).execute().unwrap_err();

        assert!(format!("{err:#}").contains("max_vocab_size"), "{err:#}");
        assert!(!cfg.tokenizer_path.exists());
        assert!(!cfg.label_encoder_path.exists());
    }

    #[test]
    fn test_single_intent_dataset_is_rejected_before_any_write() {
        let dir  = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(
            &data,
            r#"[{"text":"hi","intent":"greeting"},{"text":"hello","intent":"greeting"}]"#,
        )
        .unwrap();

        let cfg = TrainConfig { data_path: Some(data), ..train_config(dir.path()) };
        let err = TrainUseCase::new(cfg.clone()).execute().unwrap_err();

        assert!(format!("{err:#}").contains("Dataset rejected"));
        assert!(!cfg.tokenizer_path.exists());
        assert!(!cfg.model_path.exists());
    }

    #[test]
    fn test_short_run_on_custom_dataset() {
        let dir  = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(
            &data,
            r#"[
                {"text":"hi there","intent":"greeting"},
                {"text":"hello friend","intent":"greeting"},
                {"text":"good morning","intent":"greeting"},
                {"text":"play a song","intent":"music"},
                {"text":"play some jazz","intent":"music"},
                {"text":"music please","intent":"music"}
            ]"#,
        )
        .unwrap();

        let cfg = TrainConfig {
            data_path:           Some(data),
            epochs:              3,
            embedding_dim:       8,
            hidden_units:        8,
            max_sequence_length: 6,
            ..train_config(dir.path())
        };
        let report = TrainUseCase::new(cfg.clone()).execute().unwrap();

        assert_eq!(report.epochs_run, 3);
        assert_eq!(report.stopped_at, None);
        assert_eq!(report.classes, ["greeting", "music"]);
        assert!(report.final_val_loss.is_finite());
        assert!((0.0..=1.0).contains(&report.final_val_accuracy));
        assert!(cfg.model_path.exists());
    }
}
