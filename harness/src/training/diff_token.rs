use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicUsize, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use datasets::{DataLoader, DataSplit, DatasetName};
use machine_learning::{
    arch::{
        Model, Persist,
        loss::{BceWithLogits, CrossEntropy, LossFn},
    },
    optimization::Optimizer,
};
use rand::{SeedableRng, rngs::StdRng};

use super::{EarlyStopping, EpochSummary, TrainReport, Trainer, TrainerState, Verdict};
use crate::{HarnessErr, Result, TrainerConfig, evaluation::Evaluator};

/// The metric early stopping follows.
const DEV_METRIC: &str = "f1";

/// Tells apart the snapshots of trainers created by this process within the same millisecond.
static SNAPSHOT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Trains document classifiers over a split of tokenized diffs.
///
/// The trainer owns the model while training. At the end of every epoch the dev evaluator
/// scores it and, whenever the dev F1 improves, its parameters are written to the snapshot
/// path.
pub struct DiffTokenTrainer<'a, M, O>
where
    M: Model + Persist,
    O: Optimizer,
{
    model: M,
    optimizer: O,
    loss_fn: Box<dyn LossFn>,
    train_split: &'a DataSplit,
    train_evaluator: Option<Box<dyn Evaluator + 'a>>,
    dev_evaluator: Box<dyn Evaluator + 'a>,

    config: TrainerConfig,
    batch_size: NonZeroUsize,
    snapshot_path: PathBuf,
    stopper: EarlyStopping,
    state: TrainerState,
    grad: Vec<f32>,
    rng: StdRng,
}

impl<'a, M, O> DiffTokenTrainer<'a, M, O>
where
    M: Model + Persist,
    O: Optimizer,
{
    /// Returns a new `DiffTokenTrainer`.
    ///
    /// # Arguments
    /// * `dataset` - The dataset being trained on, naming the snapshot directory.
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer updating the model's parameters.
    /// * `train_split` - The split the model is trained with.
    /// * `config` - The knobs of the run.
    /// * `train_evaluator` - Scores the training split when `config.evaluate_train` is set.
    /// * `dev_evaluator` - Scores the dev split, driving early stopping.
    ///
    /// # Returns
    /// The trainer, or an error if the configuration is invalid or the snapshot directory
    /// cannot be created.
    pub fn new(
        dataset: DatasetName,
        model: M,
        optimizer: O,
        train_split: &'a DataSplit,
        config: TrainerConfig,
        train_evaluator: Option<Box<dyn Evaluator + 'a>>,
        dev_evaluator: Box<dyn Evaluator + 'a>,
    ) -> Result<Self> {
        let batch_size = NonZeroUsize::new(config.batch_size)
            .ok_or_else(|| HarnessErr::InvalidConfig("batch size must be greater than 0".into()))?;

        if model.num_classes() != train_split.num_classes() {
            return Err(HarnessErr::InvalidConfig(format!(
                "the model scores {} classes but the dataset has {}",
                model.num_classes(),
                train_split.num_classes()
            )));
        }

        let dir = config.model_outfile.join(dataset.name());
        fs::create_dir_all(&dir).map_err(|e| HarnessErr::Snapshot {
            path: dir.clone(),
            msg: e.to_string(),
        })?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = SNAPSHOT_SEQ.fetch_add(1, Ordering::Relaxed);
        let snapshot_path = dir.join(format!("{stamp}_{}_{seq}.safetensors", process::id()));

        let loss_fn: Box<dyn LossFn> = if config.is_multilabel {
            Box::new(BceWithLogits::new())
        } else {
            Box::new(CrossEntropy::new())
        };

        Ok(Self {
            grad: vec![0.0; model.size()],
            rng: StdRng::seed_from_u64(config.seed),
            stopper: EarlyStopping::new(config.patience),
            state: TrainerState::Idle,
            model,
            optimizer,
            loss_fn,
            train_split,
            train_evaluator,
            dev_evaluator,
            config,
            batch_size,
            snapshot_path,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Gives the model back, as left by the last epoch.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Makes a full pass over the training split.
    ///
    /// # Returns
    /// The loss averaged over the epoch's batches and the amount of batches.
    fn train_epoch(&mut self, epoch: usize, loader: &mut DataLoader<'_>) -> Result<(f64, usize)> {
        loader.shuffle(&mut self.rng);

        let mut total = 0.0;
        let mut batches = 0;

        while let Some(batch) = loader.next_batch() {
            batches += 1;

            let docs = batch.docs(self.config.ignore_lengths);
            let loss = self.model.backprop(
                &docs,
                batch.labels(),
                self.loss_fn.as_ref(),
                &mut self.grad,
                &mut self.rng,
            )?;

            if !loss.is_finite() {
                return Err(HarnessErr::NonFiniteLoss {
                    epoch,
                    batch: batches,
                });
            }

            self.optimizer.update_params(&self.grad, self.model.params_mut())?;
            total += loss as f64;

            if self.config.log_interval > 0 && batches % self.config.log_interval == 0 {
                log::info!(
                    epoch = epoch, batch = batches;
                    "{:>5}/{} batches, running loss {:.4}",
                    batches,
                    loader.num_batches(),
                    total / batches as f64
                );
            }
        }

        let avg = if batches > 0 { total / batches as f64 } else { 0.0 };
        Ok((avg, batches))
    }

    fn save_snapshot(&self) -> Result<()> {
        self.model
            .save(&self.snapshot_path)
            .map_err(|e| HarnessErr::Snapshot {
                path: self.snapshot_path.clone(),
                msg: e.to_string(),
            })
    }
}

impl<'a, M, O> Trainer for DiffTokenTrainer<'a, M, O>
where
    M: Model + Persist,
    O: Optimizer,
{
    fn train(&mut self, epochs: usize) -> Result<TrainReport> {
        if epochs == 0 {
            return Err(HarnessErr::InvalidConfig(
                "training needs at least one epoch".into(),
            ));
        }

        let mut loader = DataLoader::new(self.train_split, self.batch_size);
        let mut history = Vec::with_capacity(epochs);

        log::info!(
            "training for at most {epochs} epochs, {} batches each, patience {}",
            loader.num_batches(),
            self.config.patience
        );

        for epoch in 1..=epochs {
            self.state = TrainerState::Training { epoch };
            let (train_loss, batches) = self.train_epoch(epoch, &mut loader)?;

            self.state = TrainerState::Evaluating { epoch };

            if self.config.evaluate_train {
                if let Some(evaluator) = &self.train_evaluator {
                    let scores = evaluator.get_scores(&self.model, None)?;
                    log::info!(epoch = epoch; "train {:?} {:?}", scores.names, scores.values);
                }
            }

            let dev = self.dev_evaluator.get_scores(&self.model, None)?;
            let metric = dev.get(DEV_METRIC).ok_or_else(|| {
                HarnessErr::InvalidConfig(format!("the dev evaluator does not report `{DEV_METRIC}`"))
            })?;

            let verdict = self.stopper.observe(epoch, metric);
            log::info!(
                epoch = epoch;
                "train loss {train_loss:.4}, dev {:?} {:?}{}",
                dev.names,
                dev.values,
                if verdict == Verdict::Improved { " *" } else { "" }
            );

            history.push(EpochSummary {
                epoch,
                batches,
                train_loss,
                dev,
                improved: verdict == Verdict::Improved,
            });

            match verdict {
                Verdict::Improved => {
                    self.save_snapshot()?;
                    log::info!("saved snapshot to {}", self.snapshot_path.display());
                }
                Verdict::Waiting => {}
                Verdict::Stop => {
                    self.state = TrainerState::EarlyStopped;
                    log::info!(
                        "early stopping at epoch {epoch}, best dev {DEV_METRIC} {:.4} at epoch {}",
                        self.stopper.best(),
                        self.stopper.best_epoch().unwrap_or_default()
                    );
                    break;
                }
            }
        }

        if !self.state.is_terminal() {
            self.state = TrainerState::Completed;
        }

        Ok(TrainReport {
            outcome: self.state,
            epochs_run: history.len(),
            best_epoch: self.stopper.best_epoch(),
            best_dev_f1: self.stopper.best(),
            history,
        })
    }

    fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    fn state(&self) -> TrainerState {
        self.state
    }
}
