use std::path::PathBuf;

/// How an evaluator reads its split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Score every label independently instead of picking a single class.
    pub is_multilabel: bool,
    /// Feed the padded documents as they are instead of cutting them to their real length.
    pub ignore_lengths: bool,
}

/// The knobs of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub batch_size: usize,
    /// Log the running loss every this many batches.
    pub log_interval: usize,
    /// The amount of non-improving dev evaluations tolerated before stopping.
    pub patience: usize,
    /// The directory snapshots are written under.
    pub model_outfile: PathBuf,
    pub is_multilabel: bool,
    pub ignore_lengths: bool,
    /// Also evaluate on the training split at the end of every epoch.
    pub evaluate_train: bool,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            log_interval: 10,
            patience: 5,
            model_outfile: PathBuf::from("model_checkpoints/hr_cnn"),
            is_multilabel: false,
            ignore_lengths: false,
            evaluate_train: false,
            seed: 3435,
        }
    }
}

impl TrainerConfig {
    /// The configuration evaluators bound to this run should use.
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            is_multilabel: self.is_multilabel,
            ignore_lengths: self.ignore_lengths,
        }
    }
}
