use datasets::{DataSplit, DatasetName};
use machine_learning::{
    arch::{Model, Persist},
    optimization::Optimizer,
};

use super::{DiffTokenTrainer, Trainer};
use crate::{HarnessErr, Result, TrainerConfig, evaluation::Evaluator};

/// Picks the trainer matching a dataset.
pub struct TrainerFactory;

impl TrainerFactory {
    /// Builds the trainer of the dataset called `dataset_name`.
    ///
    /// # Arguments
    /// * `dataset_name` - The name of the dataset.
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer updating the model's parameters.
    /// * `train_split` - The split the model is trained with.
    /// * `config` - The knobs of the run.
    /// * `train_evaluator` - Scores the training split.
    /// * `dev_evaluator` - Scores the dev split, required for early stopping.
    ///
    /// # Returns
    /// The trainer, or `HarnessErr::UnknownDataset` if no trainer handles that dataset.
    pub fn get_trainer<'a, M, O>(
        dataset_name: &str,
        model: M,
        optimizer: O,
        train_split: &'a DataSplit,
        config: TrainerConfig,
        train_evaluator: Option<Box<dyn Evaluator + 'a>>,
        dev_evaluator: Option<Box<dyn Evaluator + 'a>>,
    ) -> Result<Box<dyn Trainer + 'a>>
    where
        M: Model + Persist + 'a,
        O: Optimizer + 'a,
    {
        let name: DatasetName = dataset_name.parse()?;
        let dev_evaluator = dev_evaluator
            .ok_or_else(|| HarnessErr::InvalidConfig("training requires a dev evaluator".into()))?;

        match name {
            DatasetName::VulasDiff => Ok(Box::new(DiffTokenTrainer::new(
                name,
                model,
                optimizer,
                train_split,
                config,
                train_evaluator,
                dev_evaluator,
            )?)),
        }
    }
}
