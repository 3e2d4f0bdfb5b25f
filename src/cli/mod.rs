// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap, hands the resulting config to a Layer 2 use case and
// prints what comes back.
//
//   1. `train`    fits the classifier on the corpus
//   2. `export`   writes float + quantized graphs and metadata
//   3. `validate` runs test sentences through exported graphs
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ExportArgs, TrainArgs, ValidateArgs};

use crate::application::validate_use_case::GraphReport;

#[derive(Parser, Debug)]
#[command(
    name = "intent-lite",
    version = "0.1.0",
    about = "Train a text-intent classifier and export it as a quantized on-device graph."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Export(args)   => run_export(args),
            Commands::Validate(args) => run_validate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let report = TrainUseCase::new(args.into()).execute()?;

    println!("\nTraining complete.");
    if let Some(epoch) = report.stopped_at {
        println!("  Stopped early at epoch {epoch}");
    }
    println!("  Epochs run:             {}", report.epochs_run);
    println!("  Final val loss:         {:.4}", report.final_val_loss);
    println!("  Final val accuracy:     {:.4}", report.final_val_accuracy);
    println!("  Best checkpoint acc:    {:.4}", report.best_checkpoint_acc);
    println!("  Intents:                {}", report.classes.join(", "));
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    use crate::application::export_use_case::ExportUseCase;

    let report = ExportUseCase::new(args.into()).execute()?;

    println!("\nExport complete.");
    println!("  Float32 graph:   {:.2} KB", report.float_size as f64 / 1024.0);
    println!(
        "  Quantized graph: {:.2} KB ({})",
        report.quantized_size as f64 / 1024.0,
        report.quantization.name()
    );
    println!("  Compression:     {:.2}x", report.compression_ratio());
    print_reports(&report.validation);
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    use crate::application::validate_use_case::ValidateUseCase;

    let reports = ValidateUseCase::new(args.into()).execute()?;
    print_reports(&reports);
    Ok(())
}

fn print_reports(reports: &[GraphReport]) {
    for report in reports {
        println!("\nTesting {} ({}):", report.path.display(), report.variant);
        for p in &report.predictions {
            println!("  '{}' -> {} (confidence: {:.4})", p.text, p.label, p.confidence);
        }
    }
}
