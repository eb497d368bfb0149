use ndarray::prelude::*;

use crate::{MlErr, Result};

/// A lookup table mapping token ids to dense vectors.
///
/// Its parameters are the `(vocab, dim)` matrix, one row per token.
#[derive(Debug, Clone)]
pub struct Embedding {
    vocab: usize,
    dim: usize,
}

impl Embedding {
    pub fn new(vocab: usize, dim: usize) -> Self {
        Self { vocab, dim }
    }

    pub fn size(&self) -> usize {
        self.vocab * self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Looks up the vector of every id in `ids`.
    ///
    /// # Returns
    /// A `(ids.len(), dim)` matrix or an error if an id falls outside the vocabulary.
    pub fn forward(&self, params: &[f32], ids: ArrayView1<u32>) -> Result<Array2<f32>> {
        let table = self.view(params)?;
        let mut out = Array2::zeros((ids.len(), self.dim));

        for (mut row, &id) in out.axis_iter_mut(Axis(0)).zip(ids) {
            row.assign(&table.row(self.check_id(id)?));
        }

        Ok(out)
    }

    /// Adds each row of `d` to the gradient row of the token it was looked up for.
    pub fn backward(&self, grad: &mut [f32], ids: ArrayView1<u32>, d: ArrayView2<f32>) -> Result<()> {
        if grad.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "embedding gradient",
                got: grad.len(),
                expected: self.size(),
            });
        }

        let mut table = ArrayViewMut2::from_shape((self.vocab, self.dim), grad)?;
        for (&id, row) in ids.iter().zip(d.axis_iter(Axis(0))) {
            let id = self.check_id(id)?;
            table.row_mut(id).scaled_add(1.0, &row);
        }

        Ok(())
    }

    fn view<'a>(&self, params: &'a [f32]) -> Result<ArrayView2<'a, f32>> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "embedding parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        Ok(ArrayView2::from_shape((self.vocab, self.dim), params)?)
    }

    fn check_id(&self, id: u32) -> Result<usize> {
        let id = id as usize;
        if id >= self.vocab {
            return Err(MlErr::SizeMismatch {
                what: "token id",
                got: id,
                expected: self.vocab,
            });
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_rows() {
        let emb = Embedding::new(3, 2);
        let params = [0.0, 0.0, 1.0, 2.0, 3.0, 4.0];

        let out = emb.forward(&params, array![2, 1, 2].view()).unwrap();
        assert_eq!(out, array![[3.0, 4.0], [1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn repeated_ids_accumulate_gradient() {
        let emb = Embedding::new(3, 2);
        let mut grad = [0.0; 6];
        let d = array![[1.0, 1.0], [0.5, 0.0], [1.0, 2.0]];

        emb.backward(&mut grad, array![2, 1, 2].view(), d.view()).unwrap();
        assert_eq!(grad, [0.0, 0.0, 0.5, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn unknown_id_fails() {
        let emb = Embedding::new(3, 2);
        let params = [0.0; 6];
        assert!(emb.forward(&params, array![3].view()).is_err());
    }
}
