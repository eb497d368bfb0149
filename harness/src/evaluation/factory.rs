use datasets::{DataSplit, DatasetName};

use super::{DiffTokenEvaluator, Evaluator};
use crate::{EvaluatorConfig, Result};

/// Picks the evaluator matching a dataset.
pub struct EvaluatorFactory;

impl EvaluatorFactory {
    /// Builds the evaluator of the dataset called `dataset_name` over `split`.
    ///
    /// # Returns
    /// The evaluator, or `HarnessErr::UnknownDataset` if no evaluator handles that dataset.
    pub fn get_evaluator<'a>(
        dataset_name: &str,
        split: &'a DataSplit,
        batch_size: usize,
        config: EvaluatorConfig,
    ) -> Result<Box<dyn Evaluator + 'a>> {
        let name: DatasetName = dataset_name.parse()?;

        match name {
            DatasetName::VulasDiff => Ok(Box::new(DiffTokenEvaluator::new(split, batch_size, config)?)),
        }
    }
}
