use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use machine_learning::initialization::UnkVecCache;
use ndarray::{Array2, ArrayView1};

use crate::{DataErr, Result, vocab::Vocab};

/// Pretrained word vectors read from a whitespace separated text file.
///
/// Each line holds a word followed by its components. A leading word2vec style
/// `count dim` header is skipped.
#[derive(Debug, Clone)]
pub struct WordVectors {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectors {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| DataErr::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_reader(path, BufReader::new(file))
    }

    /// Parses the vectors out of `reader`, `path` only being used for error reporting.
    pub fn from_reader<B: BufRead>(path: &Path, reader: B) -> Result<Self> {
        let parse_err = |line: usize, msg: String| DataErr::Parse {
            path: path.to_path_buf(),
            line,
            msg,
        };

        let mut dim = None;
        let mut vectors = HashMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| DataErr::Io {
                path: path.to_path_buf(),
                source,
            })?;

            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let rest: Vec<&str> = fields.collect();

            let is_header = i == 0
                && rest.len() == 1
                && word.parse::<usize>().is_ok()
                && rest[0].parse::<usize>().is_ok();
            if is_header {
                continue;
            }

            let vector = rest
                .iter()
                .map(|x| x.parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| parse_err(i + 1, format!("invalid component for `{word}`: {e}")))?;

            match dim {
                None => dim = Some(vector.len()),
                Some(d) if d != vector.len() => {
                    return Err(parse_err(
                        i + 1,
                        format!("`{word}` has {} components, expected {d}", vector.len()),
                    ));
                }
                _ => {}
            }

            vectors.insert(word.to_string(), vector);
        }

        match dim {
            Some(dim) if dim > 0 => Ok(Self { dim, vectors }),
            _ => Err(parse_err(0, "the file holds no word vectors".into())),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<ArrayView1<'_, f32>> {
        self.vectors.get(word).map(|v| ArrayView1::from(v.as_slice()))
    }

    /// Builds the embedding table of `vocab`, one row per token.
    ///
    /// Tokens without a pretrained vector all share the cache's unknown vector.
    ///
    /// # Returns
    /// The `(vocab.len(), dim)` table.
    pub fn embedding_matrix(&self, vocab: &Vocab, unk: &mut UnkVecCache) -> Result<Array2<f32>> {
        let mut table = Array2::zeros((vocab.len(), self.dim));
        let mut missing = 0;

        for (token, mut row) in vocab.tokens().iter().zip(table.rows_mut()) {
            match self.get(token) {
                Some(vector) => row.assign(&vector),
                None => {
                    let fallback = unk.unk(&[self.dim])?;
                    row.iter_mut().zip(fallback.iter()).for_each(|(x, &v)| *x = v);
                    missing += 1;
                }
            }
        }

        log::info!(
            "{} of {} vocabulary tokens have no pretrained vector",
            missing,
            vocab.len()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<WordVectors> {
        WordVectors::from_reader(Path::new("vectors.txt"), text.as_bytes())
    }

    #[test]
    fn skips_the_word2vec_header() {
        let vectors = parse("2 3\nif 1 2 3\nelse 4 5 6\n").unwrap();

        assert_eq!(vectors.dim(), 3);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.get("else").unwrap().to_vec(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn inconsistent_dimensions_fail() {
        let err = parse("if 1 2 3\nelse 4 5\n").unwrap_err();
        assert!(matches!(err, DataErr::Parse { line: 2, .. }));
    }

    #[test]
    fn empty_file_fails() {
        assert!(parse("").is_err());
    }

    #[test]
    fn missing_tokens_share_the_unknown_vector() {
        let vectors = parse("if 1 2\n").unwrap();
        let vocab = Vocab::build(["if", "while", "for"], 1);
        let mut unk = UnkVecCache::new(0);

        let table = vectors.embedding_matrix(&vocab, &mut unk).unwrap();

        assert_eq!(table.dim(), (5, 2));
        assert_eq!(table.row(vocab.id("if") as usize).to_vec(), vec![1.0, 2.0]);
        assert_eq!(
            table.row(vocab.id("while") as usize),
            table.row(vocab.id("for") as usize)
        );
        assert_eq!(unk.len(), 1);
    }
}
