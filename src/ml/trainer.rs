// ============================================================
// Layer 5: Training Loop
// ============================================================
// Mini-batch Adam on categorical cross-entropy.
//
// Per epoch:
//   1. shuffle the training indices (seeded StdRng) and step
//      through them in batches; forward, backward, Adam update
//   2. evaluate on the validation set with model.valid()
//      (inner backend, so dropout is off)
//   3. feed the policies in order:
//        EarlyStopping  → remember best weights / stop
//        BestCheckpoint → overwrite the saved model
//        LrPlateau      → decay the learning rate
//
// When training ends, by early stop or by running out of epochs,
// the weights with the lowest val_loss are restored.
//
// Key burn insight:
//   - Training uses TrainBackend (Autodiff<NdArray>) for gradients
//   - model.valid() returns the model on NdArray
//   - so the validation batcher uses the inner backend too
//
// Reference: Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::IntentBatcher, dataset::EncodedExample};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, TrainingHistory},
};
use crate::ml::{
    callbacks::{BestCheckpoint, EarlyStopping, LrPlateau, Progress},
    model::{correct_count, IntentClassifier, IntentClassifierConfig},
};

pub type TrainBackend = Autodiff<NdArray>;
pub type InferBackend = NdArray;

/// What a finished run reports back to the use case.
pub struct TrainingOutcome {
    pub history:             TrainingHistory,
    pub final_val_loss:      f64,
    pub final_val_accuracy:  f64,
    pub best_checkpoint_acc: f64,
    /// Epoch at which early stopping fired, if it did
    pub stopped_at:          Option<usize>,
}

pub fn run_training(
    cfg:          &TrainConfig,
    model_cfg:    &IntentClassifierConfig,
    train:        &[EncodedExample],
    val:          &[EncodedExample],
    ckpt_manager: &CheckpointManager,
) -> Result<TrainingOutcome> {
    if train.is_empty() || val.is_empty() {
        anyhow::bail!(
            "Need at least one training and one validation example (got {} and {})",
            train.len(),
            val.len()
        );
    }
    let device = NdArrayDevice::default();
    tracing::info!("Using NdArray device: {:?}", device);
    train_loop(cfg, model_cfg, train, val, ckpt_manager, device)
}

fn train_loop(
    cfg:          &TrainConfig,
    model_cfg:    &IntentClassifierConfig,
    train:        &[EncodedExample],
    val:          &[EncodedExample],
    ckpt_manager: &CheckpointManager,
    device:       NdArrayDevice,
) -> Result<TrainingOutcome> {

    // ── Build model ───────────────────────────────────────────────────────────
    TrainBackend::seed(cfg.seed);
    let mut model: IntentClassifier<TrainBackend> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: vocab={}, embedding_dim={}, hidden={}/{}, classes={}",
        model_cfg.vocab_size,
        model_cfg.embedding_dim,
        model_cfg.hidden_units,
        model_cfg.second_hidden_units(),
        model_cfg.num_classes,
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(1e-7).init();

    let train_batcher = IntentBatcher::<TrainBackend>::new(device.clone());
    let val_batcher   = IntentBatcher::<InferBackend>::new(device.clone());

    let mut early_stopping = EarlyStopping::new(cfg.early_stopping_patience);
    let mut checkpoint     = BestCheckpoint::default();
    let mut plateau        = LrPlateau::new(cfg.lr_patience, cfg.lr_factor, cfg.min_lr);

    let mut rng        = StdRng::seed_from_u64(cfg.seed);
    let mut lr         = cfg.learning_rate;
    let mut history    = TrainingHistory::default();
    let mut best_model = model.clone();
    let mut stopped_at = None;
    let batch_size     = cfg.batch_size.max(1);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut order: Vec<usize> = (0..train.len()).collect();
        order.shuffle(&mut rng);

        let mut loss_sum = 0.0f64;
        let mut correct  = 0usize;

        for chunk in order.chunks(batch_size) {
            let items: Vec<&EncodedExample> = chunk.iter().map(|&i| &train[i]).collect();
            let batch = train_batcher.batch(&items);

            let (loss, logits) = model.forward_loss(batch.token_ids, batch.targets.clone());

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            loss_sum += loss_val * items.len() as f64;
            correct  += correct_count(logits, batch.targets);

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }

        let train_loss = loss_sum / train.len() as f64;
        let train_acc  = correct as f64 / train.len() as f64;

        // ── Validation phase ──────────────────────────────────────────────────
        let (val_loss, val_acc) = evaluate(&model.valid(), &val_batcher, val, batch_size);

        let metrics = EpochMetrics {
            epoch,
            loss:         train_loss,
            accuracy:     train_acc,
            val_loss,
            val_accuracy: val_acc,
            lr,
        };
        history.record(&metrics);

        println!(
            "Epoch {:>3}/{} | loss={:.4} | acc={:.1}% | val_loss={:.4} | val_acc={:.1}% | lr={:.2e}",
            epoch, cfg.epochs, train_loss, train_acc * 100.0,
            val_loss, val_acc * 100.0, lr,
        );

        // ── Policies ──────────────────────────────────────────────────────────
        let progress = early_stopping.observe(epoch, val_loss);
        if progress == Progress::Improved {
            best_model = model.clone();
        }

        if checkpoint.should_save(val_acc) {
            ckpt_manager.save_model(&model.valid())?;
            tracing::info!("Epoch {}: val_accuracy improved to {:.4}, checkpoint saved", epoch, val_acc);
        }

        let next_lr = plateau.observe(val_loss, lr);
        if next_lr < lr {
            tracing::info!("Epoch {}: reducing learning rate to {:.2e}", epoch, next_lr);
        }
        lr = next_lr;

        if progress == Progress::Stop {
            tracing::info!(
                "Early stopping at epoch {}; restoring weights from epoch {} (val_loss={:.4})",
                epoch,
                early_stopping.best_epoch(),
                early_stopping.best_loss()
            );
            stopped_at = Some(epoch);
            break;
        }
    }

    // Restore the lowest-val_loss weights
    let model = best_model.valid();
    let (final_val_loss, final_val_accuracy) = evaluate(&model, &val_batcher, val, batch_size);

    tracing::info!("Training complete!");
    Ok(TrainingOutcome {
        history,
        final_val_loss,
        final_val_accuracy,
        best_checkpoint_acc: checkpoint.best_accuracy(),
        stopped_at,
    })
}

/// Mean loss and accuracy over `data`, weighted by batch size.
fn evaluate<B: Backend>(
    model:      &IntentClassifier<B>,
    batcher:    &IntentBatcher<B>,
    data:       &[EncodedExample],
    batch_size: usize,
) -> (f64, f64) {
    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;

    for chunk in data.chunks(batch_size) {
        let items: Vec<&EncodedExample> = chunk.iter().collect();
        let batch = batcher.batch(&items);
        let (loss, logits) = model.forward_loss(batch.token_ids, batch.targets.clone());
        loss_sum += loss.into_scalar().elem::<f64>() * items.len() as f64;
        correct  += correct_count(logits, batch.targets);
    }

    let n = data.len().max(1) as f64;
    (loss_sum / n, correct as f64 / n)
}
