use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, s};
use rand::{Rng, seq::SliceRandom};

use crate::{dataset::DataSplit, vocab::PAD_ID};

/// Yields padded batches out of a split, optionally in shuffled order.
#[derive(Debug, Clone)]
pub struct DataLoader<'a> {
    split: &'a DataSplit,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

/// A batch of documents padded to a common shape.
///
/// Every document is padded with `PAD_ID` to the amount of lines of the longest document
/// and the amount of tokens of the longest line in the batch.
#[derive(Debug, Clone)]
pub struct Batch {
    docs: Vec<Array2<u32>>,
    lengths: Vec<usize>,
    labels: Array2<f32>,
}

impl<'a> DataLoader<'a> {
    pub fn new(split: &'a DataSplit, batch_size: NonZeroUsize) -> Self {
        Self {
            split,
            order: (0..split.len()).collect(),
            batch_size: batch_size.get(),
            cursor: 0,
        }
    }

    #[inline]
    pub fn split(&self) -> &DataSplit {
        self.split
    }

    /// Returns the amount of batches a full pass over the split yields.
    #[inline]
    pub fn num_batches(&self) -> usize {
        self.split.len().div_ceil(self.batch_size)
    }

    /// Rewinds to the first batch keeping the current order.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Draws a new visiting order and rewinds to the first batch.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
        self.cursor = 0;
    }

    /// Returns the next batch, or None if the split is exhausted.
    pub fn next_batch(&mut self) -> Option<Batch> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let examples: Vec<_> = self.order[self.cursor..end]
            .iter()
            .map(|&i| self.split.get(i))
            .collect();
        self.cursor = end;

        let rows = examples.iter().map(|ex| ex.lines().len()).max().unwrap_or(0);
        let cols = examples.iter().map(|ex| ex.max_tokens()).max().unwrap_or(0);

        let mut docs = Vec::with_capacity(examples.len());
        let mut lengths = Vec::with_capacity(examples.len());
        let mut labels = Array2::zeros((examples.len(), self.split.num_classes()));

        for (i, ex) in examples.iter().enumerate() {
            let mut doc = Array2::from_elem((rows, cols), PAD_ID);
            for (r, line) in ex.lines().iter().enumerate() {
                for (c, &id) in line.iter().enumerate() {
                    doc[[r, c]] = id;
                }
            }

            labels
                .row_mut(i)
                .iter_mut()
                .zip(ex.label())
                .for_each(|(y, &v)| *y = v);

            docs.push(doc);
            lengths.push(ex.lines().len());
        }

        Some(Batch {
            docs,
            lengths,
            labels,
        })
    }
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The real amount of lines of every document.
    #[inline]
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    #[inline]
    pub fn labels(&self) -> ArrayView2<'_, f32> {
        self.labels.view()
    }

    /// Returns a view of every document.
    ///
    /// # Arguments
    /// * `ignore_lengths` - If true the documents are given with their padding lines,
    ///   otherwise each one is cut down to its real amount of lines.
    pub fn docs(&self, ignore_lengths: bool) -> Vec<ArrayView2<'_, u32>> {
        self.docs
            .iter()
            .zip(&self.lengths)
            .map(|(doc, &len)| {
                if ignore_lengths {
                    doc.view()
                } else {
                    doc.slice(s![..len, ..])
                }
            })
            .collect()
    }
}
