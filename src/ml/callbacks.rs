// ============================================================
// Layer 5: Training Policies
// ============================================================
// Three small state machines, fed once per epoch, in this order:
//
//   EarlyStopping   watches val_loss; says Stop after `patience`
//                   epochs without a new minimum
//   BestCheckpoint  watches val_accuracy; says Save only when it is
//                   strictly higher than the last saved checkpoint
//   LrPlateau       watches val_loss; multiplies the learning rate
//                   by `factor` after `patience` flat epochs, never
//                   going below `min_lr`
//
// They hold no tensors. The trainer keeps the best weights and
// writes checkpoints when told to.

/// What EarlyStopping decided for the epoch just observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// New best val_loss; the trainer should remember these weights
    Improved,
    Waiting,
    Stop,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience:   usize,
    best_loss:  f64,
    best_epoch: usize,
    wait:       usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, best_loss: f64::INFINITY, best_epoch: 0, wait: 0 }
    }

    pub fn observe(&mut self, epoch: usize, val_loss: f64) -> Progress {
        if val_loss < self.best_loss {
            self.best_loss  = val_loss;
            self.best_epoch = epoch;
            self.wait       = 0;
            return Progress::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            Progress::Stop
        } else {
            Progress::Waiting
        }
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }
}

#[derive(Debug, Clone)]
pub struct BestCheckpoint {
    best_accuracy: f64,
}

impl Default for BestCheckpoint {
    fn default() -> Self {
        Self { best_accuracy: f64::NEG_INFINITY }
    }
}

impl BestCheckpoint {
    /// True when this epoch should overwrite the saved model.
    pub fn should_save(&mut self, val_accuracy: f64) -> bool {
        let better = val_accuracy > self.best_accuracy;
        if better {
            self.best_accuracy = val_accuracy;
        }
        better
    }

    pub fn best_accuracy(&self) -> f64 {
        self.best_accuracy
    }
}

#[derive(Debug, Clone)]
pub struct LrPlateau {
    patience:  usize,
    factor:    f64,
    min_lr:    f64,
    /// A loss must drop by more than this to count as progress
    min_delta: f64,
    best_loss: f64,
    wait:      usize,
}

impl LrPlateau {
    pub fn new(patience: usize, factor: f64, min_lr: f64) -> Self {
        Self {
            patience,
            factor,
            min_lr,
            min_delta: 1e-4,
            best_loss: f64::INFINITY,
            wait:      0,
        }
    }

    /// Returns the learning rate to use from the next epoch on.
    pub fn observe(&mut self, val_loss: f64, lr: f64) -> f64 {
        if val_loss < self.best_loss - self.min_delta {
            self.best_loss = val_loss;
            self.wait      = 0;
            return lr;
        }
        self.wait += 1;
        if self.wait >= self.patience && lr > self.min_lr {
            self.wait = 0;
            return (lr * self.factor).max(self.min_lr);
        }
        lr
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_stopping_fires_after_patience() {
        let mut es = EarlyStopping::new(2);
        assert_eq!(es.observe(1, 1.0), Progress::Improved);
        assert_eq!(es.observe(2, 0.8), Progress::Improved);
        assert_eq!(es.observe(3, 0.9), Progress::Waiting);
        assert_eq!(es.observe(4, 0.8), Progress::Stop);
        assert_eq!(es.best_epoch(), 2);
        assert_eq!(es.best_loss(), 0.8);
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let mut es = EarlyStopping::new(2);
        es.observe(1, 1.0);
        assert_eq!(es.observe(2, 1.1), Progress::Waiting);
        assert_eq!(es.observe(3, 0.5), Progress::Improved);
        assert_eq!(es.observe(4, 0.6), Progress::Waiting);
    }

    #[test]
    fn test_checkpoint_only_on_improvement() {
        let mut ck = BestCheckpoint::default();
        assert!(ck.should_save(0.5));
        assert!(!ck.should_save(0.4));
        assert!(ck.should_save(0.7));
        assert_eq!(ck.best_accuracy(), 0.7);
    }

    #[test]
    fn test_checkpoint_ignores_equal_accuracy() {
        let mut ck = BestCheckpoint::default();
        assert!(ck.should_save(0.5));
        assert!(!ck.should_save(0.5));
        assert!(!ck.should_save(0.5));
        assert_eq!(ck.best_accuracy(), 0.5);
    }

    #[test]
    fn test_lr_halves_on_plateau_with_floor() {
        let mut p = LrPlateau::new(2, 0.5, 0.2);
        let mut lr = 1.0;
        lr = p.observe(1.0, lr);
        assert_eq!(lr, 1.0);
        lr = p.observe(1.0, lr);
        assert_eq!(lr, 1.0);
        lr = p.observe(1.0, lr);
        assert_eq!(lr, 0.5);
        lr = p.observe(1.0, lr);
        lr = p.observe(1.0, lr);
        assert_eq!(lr, 0.25);
        lr = p.observe(1.0, lr);
        lr = p.observe(1.0, lr);
        assert_eq!(lr, 0.2);
        lr = p.observe(1.0, lr);
        lr = p.observe(1.0, lr);
        assert_eq!(lr, 0.2);
    }

    #[test]
    fn test_tiny_loss_drop_is_still_a_plateau() {
        let mut p = LrPlateau::new(1, 0.5, 0.0);
        assert_eq!(p.observe(1.0, 1.0), 1.0);
        assert_eq!(p.observe(0.99999, 1.0), 0.5);
    }
}
