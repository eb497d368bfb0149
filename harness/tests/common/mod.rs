#![allow(dead_code)]

use std::{env, path::PathBuf};

use datasets::{DataSplit, Example};
use harness::TrainerConfig;
use machine_learning::{
    arch::{EmbeddingMode, HrCnn, HrCnnConfig, Model},
    optimization::Adam,
};
use rand::{SeedableRng, rngs::StdRng};

pub const CLASSES: usize = 3;
pub const VOCAB: usize = 12;
const NOISE: u32 = 11;

fn one_hot(class: usize) -> Vec<f32> {
    let mut label = vec![0.0; CLASSES];
    label[class] = 1.0;
    label
}

/// Builds `n` examples whose tokens give their class away, cycling through the classes.
pub fn mk_split(name: &str, n: usize, offset: usize) -> DataSplit {
    let examples = (offset..offset + n)
        .map(|i| {
            let class = i % CLASSES;
            let lines = (0..1 + i % 3)
                .map(|l| {
                    (0..2 + (i + l) % 3)
                        .map(|t| (2 + 3 * class + (i + l + t) % 3) as u32)
                        .chain(std::iter::once(NOISE))
                        .collect()
                })
                .collect();
            Example::new(lines, one_hot(class))
        })
        .collect();

    DataSplit::new(name, examples, CLASSES, false)
}

/// Builds `n` multilabel examples. Every example carries the tokens of its first class and,
/// for even `i`, a line with the tokens of the next class too.
pub fn mk_multilabel_split(name: &str, n: usize, offset: usize) -> DataSplit {
    let examples = (offset..offset + n)
        .map(|i| {
            let mut classes = vec![i % CLASSES];
            if i % 2 == 0 {
                classes.push((i + 1) % CLASSES);
            }

            let lines = classes
                .iter()
                .map(|&class| {
                    (0..2 + i % 3)
                        .map(|t| (2 + 3 * class + (i + t) % 3) as u32)
                        .chain(std::iter::once(NOISE))
                        .collect()
                })
                .collect();

            let mut label = vec![0.0; CLASSES];
            for &class in &classes {
                label[class] = 1.0;
            }
            Example::new(lines, label)
        })
        .collect();

    DataSplit::new(name, examples, CLASSES, true)
}

/// The 80/10/10 split of a 100 example dataset.
pub fn mk_dataset() -> (DataSplit, DataSplit, DataSplit) {
    (
        mk_split("train", 80, 0),
        mk_split("dev", 10, 80),
        mk_split("test", 10, 90),
    )
}

pub fn mk_model(seed: u64) -> HrCnn {
    let config = HrCnnConfig {
        words_num: VOCAB,
        words_dim: 8,
        output_channel: 4,
        kernel_sizes: vec![1, 2],
        target_class: CLASSES,
        dropout: 0.25,
        mode: EmbeddingMode::NonStatic,
    };

    HrCnn::new(config, None, &mut StdRng::seed_from_u64(seed)).unwrap()
}

pub fn mk_optimizer(model: &HrCnn) -> Adam {
    Adam::new(model.layout().trainable_ranges(), model.size(), 0.01, 0.0)
}

/// A fresh directory under the system's temp dir.
pub fn mk_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("harness_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

pub fn mk_config(dir: PathBuf, patience: usize) -> TrainerConfig {
    TrainerConfig {
        batch_size: 10,
        log_interval: 4,
        patience,
        model_outfile: dir,
        is_multilabel: false,
        ignore_lengths: true,
        evaluate_train: false,
        seed: 3435,
    }
}
