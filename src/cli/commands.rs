// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `train`, `export` and
// `validate` with all their configurable flags.
//
// Defaults mirror the application configs, so running the
// commands bare reproduces the standard artifact layout:
//
//   models/   intent_classifier.mpk, model_config.json,
//             tokenizer.json, label_encoder.json,
//             training_history.json
//   assets/   model.tflite, model_quantized.tflite,
//             model_metadata.json
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    export_use_case::ExportConfig,
    train_use_case::TrainConfig,
    validate_use_case::ValidateConfig,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the intent classifier and save tokenizer, labels and weights
    Train(TrainArgs),

    /// Export a trained model to float and quantized graphs plus metadata
    Export(ExportArgs),

    /// Run the fixed test sentences through exported graphs
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON array of {"text", "intent"} objects; the built-in corpus if omitted
    #[arg(long)]
    pub data: Option<PathBuf>,

    #[arg(long, default_value = "models/intent_classifier.mpk")]
    pub model_path: PathBuf,

    #[arg(long, default_value = "models/tokenizer.json")]
    pub tokenizer_path: PathBuf,

    #[arg(long, default_value = "models/label_encoder.json")]
    pub label_encoder_path: PathBuf,

    #[arg(long, default_value = "models/training_history.json")]
    pub history_path: PathBuf,

    /// Every sequence is padded or truncated to this many tokens
    #[arg(long, default_value_t = 32)]
    pub max_sequence_length: usize,

    /// Vocabulary cap, <PAD> and <OOV> included
    #[arg(long, default_value_t = 10_000)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 128)]
    pub embedding_dim: usize,

    /// Width of the first hidden layer; the second is half of it
    #[arg(long, default_value_t = 64)]
    pub hidden_units: usize,

    #[arg(long, default_value_t = 0.3)]
    pub dropout: f64,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-2)]
    pub lr: f64,

    /// Fraction of examples held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub validation_split: f64,

    /// Seeds the split, the shuffles and weight initialisation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Epochs without val_loss improvement before stopping
    #[arg(long, default_value_t = 10)]
    pub early_stopping_patience: usize,

    /// Epochs without val_loss improvement before reducing the LR
    #[arg(long, default_value_t = 5)]
    pub lr_patience: usize,

    /// Multiplier applied to the LR on a plateau
    #[arg(long, default_value_t = 0.5)]
    pub lr_factor: f64,

    #[arg(long, default_value_t = 1e-6)]
    pub min_lr: f64,
}

/// Boundary between Layer 1 and Layer 2: the application
/// layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            model_path:              a.model_path,
            tokenizer_path:          a.tokenizer_path,
            label_encoder_path:      a.label_encoder_path,
            history_path:            a.history_path,
            data_path:               a.data,
            max_sequence_length:     a.max_sequence_length,
            vocab_size:              a.vocab_size,
            embedding_dim:           a.embedding_dim,
            hidden_units:            a.hidden_units,
            dropout_rate:            a.dropout,
            batch_size:              a.batch_size,
            epochs:                  a.epochs,
            learning_rate:           a.lr,
            validation_split:        a.validation_split,
            seed:                    a.seed,
            early_stopping_patience: a.early_stopping_patience,
            lr_patience:             a.lr_patience,
            lr_factor:               a.lr_factor,
            min_lr:                  a.min_lr,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long, default_value = "models/intent_classifier.mpk")]
    pub model_path: PathBuf,

    #[arg(long, default_value = "models/tokenizer.json")]
    pub tokenizer_path: PathBuf,

    #[arg(long, default_value = "models/label_encoder.json")]
    pub label_encoder_path: PathBuf,

    #[arg(long, default_value = "assets/model.tflite")]
    pub float_graph_path: PathBuf,

    #[arg(long, default_value = "assets/model_quantized.tflite")]
    pub quantized_graph_path: PathBuf,

    #[arg(long, default_value = "assets/model_metadata.json")]
    pub metadata_path: PathBuf,

    /// Must equal the length the model was trained with
    #[arg(long, default_value_t = 32)]
    pub max_sequence_length: usize,

    /// Calibration sentences used for full-integer quantization
    #[arg(long, default_value_t = 100)]
    pub representative_dataset_size: usize,
}

impl From<ExportArgs> for ExportConfig {
    fn from(a: ExportArgs) -> Self {
        ExportConfig {
            model_path:                  a.model_path,
            tokenizer_path:              a.tokenizer_path,
            label_encoder_path:          a.label_encoder_path,
            float_graph_path:            a.float_graph_path,
            quantized_graph_path:        a.quantized_graph_path,
            metadata_path:               a.metadata_path,
            max_sequence_length:         a.max_sequence_length,
            representative_dataset_size: a.representative_dataset_size,
        }
    }
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Graph files to check; both exported graphs if omitted
    #[arg(long = "graph")]
    pub graphs: Vec<PathBuf>,

    #[arg(long, default_value = "models/tokenizer.json")]
    pub tokenizer_path: PathBuf,

    #[arg(long, default_value = "models/label_encoder.json")]
    pub label_encoder_path: PathBuf,

    #[arg(long, default_value_t = 32)]
    pub max_sequence_length: usize,
}

impl From<ValidateArgs> for ValidateConfig {
    fn from(a: ValidateArgs) -> Self {
        let defaults = ValidateConfig::default();
        ValidateConfig {
            tokenizer_path:      a.tokenizer_path,
            label_encoder_path:  a.label_encoder_path,
            graph_paths:         if a.graphs.is_empty() { defaults.graph_paths } else { a.graphs },
            max_sequence_length: a.max_sequence_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["intent-lite", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();

        assert_eq!(cfg.model_path, def.model_path);
        assert_eq!(cfg.max_sequence_length, def.max_sequence_length);
        assert_eq!(cfg.vocab_size, def.vocab_size);
        assert_eq!(cfg.batch_size, def.batch_size);
        assert_eq!(cfg.epochs, def.epochs);
        assert_eq!(cfg.learning_rate, def.learning_rate);
        assert_eq!(cfg.early_stopping_patience, def.early_stopping_patience);
        assert_eq!(cfg.lr_patience, def.lr_patience);
        assert_eq!(cfg.lr_factor, def.lr_factor);
        assert_eq!(cfg.min_lr, def.min_lr);
        assert!(cfg.data_path.is_none());
    }

    #[test]
    fn test_lr_schedule_flags_reach_the_config() {
        let cli = Cli::try_parse_from([
            "intent-lite", "train", "--lr-factor", "0.2", "--lr-patience", "3", "--min-lr", "1e-5",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.lr_factor, 0.2);
        assert_eq!(cfg.lr_patience, 3);
        assert_eq!(cfg.min_lr, 1e-5);
    }

    #[test]
    fn test_validate_without_graphs_checks_both_exports() {
        let cli = Cli::try_parse_from(["intent-lite", "validate"]).unwrap();
        let Commands::Validate(args) = cli.command else { panic!("expected validate") };
        let cfg: ValidateConfig = args.into();
        assert_eq!(cfg.graph_paths, ValidateConfig::default().graph_paths);

        let cli = Cli::try_parse_from(["intent-lite", "validate", "--graph", "a.tflite"]).unwrap();
        let Commands::Validate(args) = cli.command else { panic!("expected validate") };
        let cfg: ValidateConfig = args.into();
        assert_eq!(cfg.graph_paths, [PathBuf::from("a.tflite")]);
    }

    #[test]
    fn test_export_flags() {
        let cli = Cli::try_parse_from([
            "intent-lite", "export", "--representative-dataset-size", "0",
        ])
        .unwrap();
        let Commands::Export(args) = cli.command else { panic!("expected export") };
        let cfg: ExportConfig = args.into();
        assert_eq!(cfg.representative_dataset_size, 0);
        assert_eq!(cfg.metadata_path, PathBuf::from("assets/model_metadata.json"));
    }
}
