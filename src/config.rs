use datasets::{DatasetName, Splits};
use harness::{EvaluatorConfig, TrainerConfig};
use machine_learning::arch::HrCnnConfig;

use crate::args::Args;

/// The command line arguments plus what is only known once the dataset is loaded.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub args: Args,
    pub dataset: DatasetName,
    pub words_num: usize,
    pub words_dim: usize,
    pub target_class: usize,
    pub is_multilabel: bool,
}

impl RunConfig {
    pub fn new(args: Args, dataset: DatasetName, splits: &Splits) -> Self {
        let words_dim = match &splits.embedding {
            Some(table) if table.ncols() != args.words_dim => {
                log::warn!(
                    "word vectors have {} dimensions, overriding --words-dim {}",
                    table.ncols(),
                    args.words_dim
                );
                table.ncols()
            }
            _ => args.words_dim,
        };

        Self {
            words_num: splits.vocab.len(),
            target_class: dataset.num_classes(),
            is_multilabel: dataset.is_multilabel(),
            words_dim,
            dataset,
            args,
        }
    }

    pub fn model_config(&self) -> HrCnnConfig {
        HrCnnConfig {
            words_num: self.words_num,
            words_dim: self.words_dim,
            output_channel: self.args.output_channel,
            kernel_sizes: self.args.kernel_sizes.clone(),
            target_class: self.target_class,
            dropout: self.args.dropout,
            mode: self.args.mode.into(),
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            batch_size: self.args.batch_size,
            log_interval: self.args.log_every,
            patience: self.args.patience,
            model_outfile: self.args.save_path.clone(),
            is_multilabel: self.is_multilabel,
            ignore_lengths: true,
            evaluate_train: self.args.evaluate_train,
            seed: self.args.seed,
        }
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        self.trainer_config().evaluator_config()
    }
}
