use std::{
    fs,
    path::{Path, PathBuf},
};

use machine_learning::initialization::UnkVecCache;
use ndarray::Array2;

use crate::{
    DataErr, Result,
    dataset::{DataSplit, Example},
    vectors::WordVectors,
    vocab::{PAD, Vocab},
};

/// How the raw diffs are turned into examples.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub max_lines: usize,
    pub max_tokens: usize,
    pub min_freq: usize,
    pub word_vectors: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_lines: 64,
            max_tokens: 64,
            min_freq: 1,
            word_vectors: None,
        }
    }
}

/// Everything a training run needs out of a dataset.
#[derive(Debug, Clone)]
pub struct Splits {
    pub train: DataSplit,
    pub dev: DataSplit,
    pub test: DataSplit,
    pub vocab: Vocab,
    /// The `(vocab.len(), dim)` pretrained embedding table, if word vectors were given.
    pub embedding: Option<Array2<f32>>,
}

/// A tokenized document before its tokens are mapped to ids.
struct RawExample {
    lines: Vec<Vec<String>>,
    label: Vec<f32>,
}

/// The VulasDiff code-diff dataset: each example is a commit diff labeled as either
/// a vulnerability fix or not.
pub struct VulasDiff;

impl VulasDiff {
    pub const NAME: &'static str = "VulasDiff";
    pub const NUM_CLASSES: usize = 2;
    pub const IS_MULTILABEL: bool = false;

    /// Loads the train, dev and test splits out of `<data_dir>/VulasDiff/`.
    ///
    /// # Arguments
    /// * `data_dir` - The directory holding every dataset.
    /// * `options` - The truncation limits and the optional word vectors file.
    /// * `unk` - The cache supplying vectors to tokens without a pretrained one.
    ///
    /// # Returns
    /// The splits, the vocabulary built from the training split and the embedding table.
    pub fn splits(data_dir: &Path, options: &LoadOptions, unk: &mut UnkVecCache) -> Result<Splits> {
        let root = data_dir.join(Self::NAME);

        let train = read_split(&root.join("train.tsv"), options)?;
        let dev = read_split(&root.join("dev.tsv"), options)?;
        let test = read_split(&root.join("test.tsv"), options)?;

        let vocab = Vocab::build(
            train.iter().flat_map(|ex| ex.lines.iter().flatten().map(String::as_str)),
            options.min_freq,
        );
        log::info!(vocab = vocab.len(); "built vocabulary out of {} training examples", train.len());

        let embedding = match &options.word_vectors {
            Some(path) => {
                let vectors = WordVectors::load(path)?;
                Some(vectors.embedding_matrix(&vocab, unk)?)
            }
            None => None,
        };

        let to_split = |name: &str, raw: Vec<RawExample>| {
            let examples = raw.into_iter().map(|ex| encode(&vocab, ex)).collect();
            DataSplit::new(name, examples, Self::NUM_CLASSES, Self::IS_MULTILABEL)
        };

        Ok(Splits {
            train: to_split("train", train),
            dev: to_split("dev", dev),
            test: to_split("test", test),
            embedding,
            vocab,
        })
    }
}

fn read_split(path: &Path, options: &LoadOptions) -> Result<Vec<RawExample>> {
    let text = fs::read_to_string(path).map_err(|source| DataErr::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let examples = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_line(line, options).map_err(|msg| DataErr::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                msg,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if examples.is_empty() {
        return Err(DataErr::EmptySplit {
            path: path.to_path_buf(),
        });
    }

    log::debug!("read {} examples from {}", examples.len(), path.display());
    Ok(examples)
}

fn parse_line(line: &str, options: &LoadOptions) -> std::result::Result<RawExample, String> {
    let (label, diff) = line
        .split_once('\t')
        .ok_or_else(|| "expected `<label>\\t<diff>`".to_string())?;

    let label = label
        .trim()
        .chars()
        .map(|c| match c {
            '0' => Ok(0.0),
            '1' => Ok(1.0),
            other => Err(format!("invalid label character `{other}`")),
        })
        .collect::<std::result::Result<Vec<f32>, _>>()?;

    if label.len() != VulasDiff::NUM_CLASSES {
        return Err(format!(
            "the label has {} entries, expected {}",
            label.len(),
            VulasDiff::NUM_CLASSES
        ));
    }

    let mut lines: Vec<Vec<String>> = diff
        .split("\\n")
        .map(|line| {
            line.split_whitespace()
                .take(options.max_tokens)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|tokens| !tokens.is_empty())
        .take(options.max_lines)
        .collect();

    if lines.is_empty() {
        lines.push(vec![PAD.to_string()]);
    }

    Ok(RawExample { lines, label })
}

fn encode(vocab: &Vocab, raw: RawExample) -> Example {
    let lines = raw
        .lines
        .iter()
        .map(|line| line.iter().map(|token| vocab.id(token)).collect())
        .collect();

    Example::new(lines, raw.label)
}
