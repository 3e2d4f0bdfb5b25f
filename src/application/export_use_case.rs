// ============================================================
// Layer 2: ExportUseCase
// ============================================================
// Orchestrates the export pipeline in order:
//
//   Step 1: Load model, tokenizer, labels   (Layer 6 - infra)
//           any failure here aborts before a single file is written
//   Step 2: Float32 graph                   (Layer 5 - ml)
//   Step 3: Quantized graph                 (Layer 7 - graph)
//           full integer, calibrated on the representative
//           sentences; on failure fall back to dynamic range
//   Step 4: Write graphs, then metadata     (Layer 6 - infra)
//   Step 5: Report sizes
//   Step 6: Smoke-test both graphs          (ValidateUseCase)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::backend::ndarray::NdArrayDevice;
use serde::{Deserialize, Serialize};

use crate::application::validate_use_case::{GraphReport, ValidateConfig, ValidateUseCase};
use crate::data::{dataset::REPRESENTATIVE_SENTENCES, preprocessor::pad_sequence};
use crate::domain::{metadata::ModelMetadata, traits::TokenEncoder};
use crate::graph::{
    codec,
    quantize::{quantize_dynamic_range, quantize_full_integer},
    Variant,
};
use crate::infra::{
    artifact_store::{load_labels, write_atomic, write_json_atomic},
    checkpoint::CheckpointManager,
    tokenizer_store::{tokenizer_config, TokenizerStore},
};
use crate::ml::{converter::to_float_graph, trainer::InferBackend};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub model_path:                  PathBuf,
    pub tokenizer_path:              PathBuf,
    pub label_encoder_path:          PathBuf,
    pub float_graph_path:            PathBuf,
    pub quantized_graph_path:        PathBuf,
    pub metadata_path:               PathBuf,
    pub max_sequence_length:         usize,
    /// Cap on the number of calibration sentences
    pub representative_dataset_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            model_path:                  "models/intent_classifier.mpk".into(),
            tokenizer_path:              "models/tokenizer.json".into(),
            label_encoder_path:          "models/label_encoder.json".into(),
            float_graph_path:            "assets/model.tflite".into(),
            quantized_graph_path:        "assets/model_quantized.tflite".into(),
            metadata_path:               "assets/model_metadata.json".into(),
            max_sequence_length:         32,
            representative_dataset_size: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub float_size:     usize,
    pub quantized_size: usize,
    /// Variant written to the quantized path
    pub quantization:   Variant,
    pub validation:     Vec<GraphReport>,
}

impl ExportReport {
    pub fn compression_ratio(&self) -> f64 {
        self.float_size as f64 / self.quantized_size.max(1) as f64
    }
}

pub struct ExportUseCase {
    config: ExportConfig,
}

impl ExportUseCase {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ExportReport> {
        let cfg = &self.config;

        // ── Step 1: Load everything up front ──────────────────────────────────
        let device = NdArrayDevice::default();
        let (model, manifest) =
            CheckpointManager::new(&cfg.model_path).load_model::<InferBackend>(&device)?;
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_path).load()?;
        let labels    = load_labels(&cfg.label_encoder_path)?;

        let trained_len = manifest.classifier.max_sequence_length;
        if trained_len != cfg.max_sequence_length {
            anyhow::bail!(
                "max_sequence_length mismatch: model was trained with {}, export uses {}",
                trained_len,
                cfg.max_sequence_length
            );
        }
        labels
            .ensure_matches(manifest.classifier.num_classes)
            .context("Label encoder does not match the trained model")?;

        // ── Step 2: Full-precision graph ──────────────────────────────────────
        let float_graph = to_float_graph(&model, cfg.max_sequence_length)?;
        let float_bytes = codec::encode(&float_graph)?;

        // ── Step 3: Quantized graph ───────────────────────────────────────────
        let calibration = REPRESENTATIVE_SENTENCES
            .iter()
            .take(cfg.representative_dataset_size)
            .map(|text| Ok(pad_sequence(&tokenizer.token_ids(text)?, cfg.max_sequence_length)))
            .collect::<Result<Vec<_>>>()?;

        let quantized = match quantize_full_integer(&float_graph, &calibration) {
            Ok(graph) => {
                tracing::info!("Full integer quantization calibrated on {} sentences", calibration.len());
                graph
            }
            Err(e) => {
                tracing::warn!("Full integer quantization failed: {e}");
                tracing::warn!("Falling back to dynamic range quantization");
                quantize_dynamic_range(&float_graph)?
            }
        };
        let quantized_bytes = codec::encode(&quantized)?;

        // ── Step 4: Write artifacts ───────────────────────────────────────────
        write_atomic(&cfg.float_graph_path, &float_bytes)?;
        tracing::info!("Float32 graph saved to '{}'", cfg.float_graph_path.display());
        write_atomic(&cfg.quantized_graph_path, &quantized_bytes)?;
        tracing::info!(
            "{} graph saved to '{}'",
            quantized.variant.name(),
            cfg.quantized_graph_path.display()
        );

        let metadata = ModelMetadata::new(
            labels.classes.clone(),
            cfg.max_sequence_length,
            float_graph.vocab_size().unwrap_or(manifest.classifier.vocab_size),
            quantized.variant.name(),
            tokenizer_config(&tokenizer, manifest.max_vocab_size, &manifest.oov_token),
        );
        write_json_atomic(&cfg.metadata_path, &metadata)?;
        tracing::info!("Metadata saved to '{}'", cfg.metadata_path.display());

        // ── Step 5: Sizes ─────────────────────────────────────────────────────
        let report_sizes = (float_bytes.len(), quantized_bytes.len());
        tracing::info!(
            "Float32 size: {:.2} KB, quantized size: {:.2} KB, compression {:.2}x",
            report_sizes.0 as f64 / 1024.0,
            report_sizes.1 as f64 / 1024.0,
            report_sizes.0 as f64 / report_sizes.1.max(1) as f64
        );
        if report_sizes.1 >= report_sizes.0 {
            tracing::warn!("Quantized graph is not smaller than the float32 graph");
        }

        // ── Step 6: Smoke test ────────────────────────────────────────────────
        let validation = ValidateUseCase::new(ValidateConfig {
            tokenizer_path:      cfg.tokenizer_path.clone(),
            label_encoder_path:  cfg.label_encoder_path.clone(),
            graph_paths:         vec![cfg.float_graph_path.clone(), cfg.quantized_graph_path.clone()],
            max_sequence_length: cfg.max_sequence_length,
        })
        .execute()?;

        Ok(ExportReport {
            float_size:     report_sizes.0,
            quantized_size: report_sizes.1,
            quantization:   quantized.variant,
            validation,
        })
    }
}
