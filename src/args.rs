use std::path::PathBuf;

use clap::{Parser, ValueEnum, builder::TypedValueParser};
use datasets::LoadOptions;
use machine_learning::arch::EmbeddingMode;

/// Whether the word embeddings are fine-tuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Static,
    NonStatic,
}

impl From<Mode> for EmbeddingMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Static => EmbeddingMode::Static,
            Mode::NonStatic => EmbeddingMode::NonStatic,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "hrcnn", about = "Train and evaluate a hierarchical CNN over code diffs")]
pub struct Args {
    /// Dataset to train on.
    #[arg(long, default_value = "VulasDiffToken")]
    pub dataset: String,

    /// Directory holding one subdirectory per dataset.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory holding the word vectors file.
    #[arg(long)]
    pub word_vectors_dir: Option<PathBuf>,

    /// Word vectors file, relative to --word-vectors-dir when given.
    #[arg(long)]
    pub word_vectors_file: Option<PathBuf>,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Maximum training epochs.
    #[arg(
        long,
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize)
    )]
    pub epochs: usize,

    #[arg(long, default_value_t = 0.001)]
    pub lr: f32,

    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f32,

    /// Non-improving dev evaluations tolerated before stopping.
    #[arg(long, default_value_t = 5)]
    pub patience: usize,

    /// Log the running loss every this many batches.
    #[arg(long, default_value_t = 10)]
    pub log_every: usize,

    /// Directory snapshots are written under.
    #[arg(long, default_value = "model_checkpoints/hr_cnn")]
    pub save_path: PathBuf,

    /// Directory the final scores and confusion matrices are written under.
    #[arg(long, default_value = "matrices/hr_cnn")]
    pub matrix_path: PathBuf,

    /// Request an accelerator.
    #[arg(long)]
    pub cuda: bool,

    #[arg(long, default_value_t = 0)]
    pub gpu: usize,

    /// Snapshot to resume training from.
    #[arg(long)]
    pub resume_snapshot: Option<PathBuf>,

    /// Snapshot to evaluate instead of training.
    #[arg(long)]
    pub trained_model: Option<PathBuf>,

    #[arg(long, default_value_t = 3435)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = Mode::Static)]
    pub mode: Mode,

    #[arg(long, default_value_t = 300)]
    pub words_dim: usize,

    #[arg(long, default_value_t = 100)]
    pub output_channel: usize,

    /// Convolution widths, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = [3, 4, 5])]
    pub kernel_sizes: Vec<usize>,

    #[arg(long, default_value_t = 0.5)]
    pub dropout: f32,

    /// Lines kept per diff.
    #[arg(long, default_value_t = 64)]
    pub max_lines: usize,

    /// Tokens kept per line.
    #[arg(long, default_value_t = 64)]
    pub max_tokens: usize,

    /// Also score the training split after every epoch.
    #[arg(long)]
    pub evaluate_train: bool,
}

impl Args {
    /// Returns the word vectors file, if any.
    pub fn word_vectors_path(&self) -> Option<PathBuf> {
        let file = self.word_vectors_file.as_ref()?;
        Some(match &self.word_vectors_dir {
            Some(dir) => dir.join(file),
            None => file.clone(),
        })
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_lines: self.max_lines,
            max_tokens: self.max_tokens,
            min_freq: 1,
            word_vectors: self.word_vectors_path(),
        }
    }
}
