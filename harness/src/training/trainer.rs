use std::path::Path;

use crate::{Result, evaluation::Scores};

/// Where a `Trainer` is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    Training { epoch: usize },
    Evaluating { epoch: usize },
    EarlyStopped,
    Completed,
}

impl TrainerState {
    /// Whether the trainer is done and holds its final snapshot.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainerState::EarlyStopped | TrainerState::Completed)
    }
}

/// What happened during a single epoch.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch: usize,
    pub batches: usize,
    /// The training loss averaged over the epoch's batches.
    pub train_loss: f64,
    pub dev: Scores,
    pub improved: bool,
}

/// The outcome of a `Trainer::train` call.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Either `TrainerState::EarlyStopped` or `TrainerState::Completed`.
    pub outcome: TrainerState,
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_dev_f1: f64,
    pub history: Vec<EpochSummary>,
}

/// Trains a model, keeping a snapshot of its best version.
pub trait Trainer {
    /// Runs at most `epochs` epochs of training.
    ///
    /// # Returns
    /// The report of the run, or an error if `epochs` is 0 or any step fails.
    fn train(&mut self, epochs: usize) -> Result<TrainReport>;

    /// Returns the path the best snapshot is written to.
    fn snapshot_path(&self) -> &Path;

    fn state(&self) -> TrainerState;
}
