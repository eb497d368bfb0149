use std::path::Path;

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;

use crate::{arch::loss::LossFn, error::Result, params::ParamLayout};

/// A document classifier whose parameters live in a single flat buffer.
///
/// A document is a `(lines, tokens)` matrix of token ids.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the description of the parameter buffer.
    fn layout(&self) -> &ParamLayout;

    fn params(&self) -> &[f32];

    fn params_mut(&mut self) -> &mut [f32];

    /// Returns the amount of classes the model scores.
    fn num_classes(&self) -> usize;

    /// Scores a batch of documents in inference mode.
    ///
    /// # Arguments
    /// * `docs` - The documents of the batch.
    ///
    /// # Returns
    /// The `(docs.len(), num_classes)` logits.
    fn forward(&self, docs: &[ArrayView2<u32>]) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model
    /// over a single batch, in training mode.
    ///
    /// # Arguments
    /// * `docs` - The documents of the batch.
    /// * `y` - The `(docs.len(), num_classes)` gold labels.
    /// * `loss_fn` - The loss function.
    /// * `grad` - A buffer the size of the model, overwritten with the gradient.
    /// * `rng` - The random number generator driving dropout.
    ///
    /// # Returns
    /// The batch loss.
    fn backprop(
        &self,
        docs: &[ArrayView2<u32>],
        y: ArrayView2<f32>,
        loss_fn: &dyn LossFn,
        grad: &mut [f32],
        rng: &mut StdRng,
    ) -> Result<f32>;
}

/// A model that can be written to and read back from a snapshot file.
pub trait Persist: Sized {
    /// Writes the model to `path`, overwriting any previous file.
    fn save(&self, path: &Path) -> Result<()>;

    /// Reads a model previously written with `save`.
    fn load(path: &Path) -> Result<Self>;
}
