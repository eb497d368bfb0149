use std::{
    fmt::Write as _,
    fs::{self, File},
    io::BufWriter,
    num::NonZeroUsize,
    path::Path,
};

use datasets::{DataLoader, DataSplit};
use machine_learning::arch::{
    Model,
    loss::{BceWithLogits, CrossEntropy, LossFn, argmax},
};
use ndarray::{Array2, Axis};
use serde_json::{Map, Value};

use super::{
    Evaluator, Scores,
    metrics::{self, LabelCounts},
};
use crate::{EvaluatorConfig, HarnessErr, Result};

const SCORES_FILE: &str = "scores.json";
const MATRIX_FILE: &str = "confusion_matrix.csv";

/// Evaluates document classifiers over a split of tokenized diffs.
pub struct DiffTokenEvaluator<'a> {
    split: &'a DataSplit,
    batch_size: NonZeroUsize,
    config: EvaluatorConfig,
}

/// Gold labels and predictions gathered over a whole split.
enum Outcome {
    SingleLabel { gold: Vec<usize>, pred: Vec<usize> },
    Multilabel { gold: Vec<bool>, pred: Vec<bool> },
}

impl<'a> DiffTokenEvaluator<'a> {
    /// Creates a new `DiffTokenEvaluator`.
    ///
    /// # Returns
    /// The evaluator, or an error if `batch_size` is zero.
    pub fn new(split: &'a DataSplit, batch_size: usize, config: EvaluatorConfig) -> Result<Self> {
        let batch_size = NonZeroUsize::new(batch_size)
            .ok_or_else(|| HarnessErr::InvalidConfig("batch size must be greater than 0".into()))?;

        Ok(Self {
            split,
            batch_size,
            config,
        })
    }

    pub fn split(&self) -> &DataSplit {
        self.split
    }

    pub fn config(&self) -> EvaluatorConfig {
        self.config
    }

    fn loss_fn(&self) -> Box<dyn LossFn> {
        if self.config.is_multilabel {
            Box::new(BceWithLogits::new())
        } else {
            Box::new(CrossEntropy::new())
        }
    }

    /// Runs the model over every batch of the split.
    ///
    /// # Returns
    /// The gathered predictions and the loss averaged over batches.
    fn predict(&self, model: &dyn Model) -> Result<(Outcome, f64)> {
        let loss_fn = self.loss_fn();
        let mut loader = DataLoader::new(self.split, self.batch_size);

        let mut outcome = if self.config.is_multilabel {
            Outcome::Multilabel {
                gold: Vec::new(),
                pred: Vec::new(),
            }
        } else {
            Outcome::SingleLabel {
                gold: Vec::new(),
                pred: Vec::new(),
            }
        };

        let mut total_loss = 0.0;
        let mut batches = 0;

        while let Some(batch) = loader.next_batch() {
            let docs = batch.docs(self.config.ignore_lengths);
            let labels = batch.labels();
            let logits = model.forward(&docs)?;
            total_loss += loss_fn.loss(logits.view(), labels) as f64;
            batches += 1;

            let rows = logits.axis_iter(Axis(0)).zip(labels.axis_iter(Axis(0)));
            match &mut outcome {
                Outcome::SingleLabel { gold, pred } => {
                    for (z, y) in rows {
                        pred.push(argmax(z));
                        gold.push(argmax(y));
                    }
                }
                Outcome::Multilabel { gold, pred } => {
                    for (z, y) in rows {
                        pred.extend(z.iter().map(|&z| z > 0.0));
                        gold.extend(y.iter().map(|&y| y > 0.5));
                    }
                }
            }
        }

        let avg_loss = if batches > 0 {
            total_loss / batches as f64
        } else {
            0.0
        };

        Ok((outcome, avg_loss))
    }
}

impl Evaluator for DiffTokenEvaluator<'_> {
    fn get_scores(&self, model: &dyn Model, output_path: Option<&Path>) -> Result<Scores> {
        let classes = self.split.num_classes();
        if model.num_classes() != classes {
            return Err(HarnessErr::InvalidConfig(format!(
                "the model scores {} classes but the {} split has {classes}",
                model.num_classes(),
                self.split.name()
            )));
        }

        let (outcome, avg_loss) = self.predict(model)?;

        let (scores, table) = match outcome {
            Outcome::SingleLabel { gold, pred } => {
                let matrix = metrics::confusion_matrix(&gold, &pred, classes);
                let m = metrics::macro_metrics(matrix.view());

                let scores = Scores {
                    values: vec![m.accuracy, m.precision, m.recall, m.f1, avg_loss],
                    names: vec!["accuracy", "precision", "recall", "f1", "avg_loss"],
                };
                (scores, matrix_csv(&matrix))
            }
            Outcome::Multilabel { gold, pred } => {
                let examples = gold.len() / classes.max(1);
                let gold = Array2::from_shape_vec((examples, classes), gold)
                    .map_err(machine_learning::MlErr::from)?;
                let pred = Array2::from_shape_vec((examples, classes), pred)
                    .map_err(machine_learning::MlErr::from)?;

                let m = metrics::micro_metrics(gold.view(), pred.view());
                let hamming = metrics::hamming_loss(gold.view(), pred.view());

                let scores = Scores {
                    values: vec![m.accuracy, m.precision, m.recall, m.f1, hamming, avg_loss],
                    names: vec!["accuracy", "precision", "recall", "f1", "hamming_loss", "avg_loss"],
                };
                let counts = metrics::label_counts(gold.view(), pred.view());
                (scores, counts_csv(&counts))
            }
        };

        log::debug!(split = self.split.name(); "scores {:?}", scores.values);

        if let Some(dir) = output_path {
            write_artifacts(dir, &scores, &table)?;
        }

        Ok(scores)
    }
}

fn matrix_csv(matrix: &Array2<usize>) -> String {
    let mut out = String::new();
    for row in matrix.rows() {
        let cells: Vec<_> = row.iter().map(usize::to_string).collect();
        let _ = writeln!(out, "{}", cells.join(","));
    }
    out
}

fn counts_csv(counts: &[LabelCounts]) -> String {
    let mut out = String::from("label,tp,fp,fn,tn\n");
    for (label, c) in counts.iter().enumerate() {
        let _ = writeln!(out, "{label},{},{},{},{}", c.tp, c.fp, c.fn_count, c.tn);
    }
    out
}

fn write_artifacts(dir: &Path, scores: &Scores, table: &str) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| HarnessErr::Io { path, source }
    };

    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let scores_path = dir.join(SCORES_FILE);
    let map: Map<String, Value> = scores
        .names
        .iter()
        .zip(&scores.values)
        .map(|(&name, &value)| (name.to_string(), Value::from(value)))
        .collect();
    let file = File::create(&scores_path).map_err(io_err(&scores_path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &map)?;

    let matrix_path = dir.join(MATRIX_FILE);
    fs::write(&matrix_path, table).map_err(io_err(&matrix_path))?;

    log::info!("wrote evaluation artifacts to {}", dir.display());
    Ok(())
}
