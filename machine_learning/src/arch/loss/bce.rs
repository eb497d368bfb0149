use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Binary cross entropy on raw logits, each label scored independently.
///
/// Used for multilabel classification, the loss is averaged over every
/// `(example, label)` pair.
#[derive(Default, Clone, Copy)]
pub struct BceWithLogits;

impl BceWithLogits {
    /// Returns a new `BceWithLogits`.
    pub fn new() -> Self {
        Self
    }
}

pub fn sigmoid(z: f32) -> f32 {
    1. / (1. + (-z).exp())
}

impl LossFn for BceWithLogits {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        if y_pred.is_empty() {
            return 0.0;
        }

        let mut total = 0.0;
        Zip::from(&y_pred).and(&y).for_each(|&z, &t| {
            total += z.max(0.0) - z * t + (-z.abs()).exp().ln_1p();
        });

        total / y_pred.len() as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len().max(1) as f32;
        let mut d = y_pred.to_owned();
        d.zip_mut_with(&y, |z, &t| *z = (sigmoid(*z) - t) / n);
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn zero_logits_give_ln2() {
        let z = array![[0.0, 0.0]];
        let y = array![[1.0, 0.0]];

        let loss = BceWithLogits.loss(z.view(), y.view());
        assert!((loss - 2f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let z = array![[0.7, -2.0], [1.5, 0.1]];
        let y = array![[1.0, 0.0], [1.0, 1.0]];
        let grad = BceWithLogits.loss_prime(z.view(), y.view());

        let eps = 1e-2;
        for ((i, j), &g) in grad.indexed_iter() {
            let mut plus = z.clone();
            plus[[i, j]] += eps;
            let mut minus = z.clone();
            minus[[i, j]] -= eps;

            let numeric = (BceWithLogits.loss(plus.view(), y.view())
                - BceWithLogits.loss(minus.view(), y.view()))
                / (2.0 * eps);
            assert!((numeric - g).abs() < 1e-3, "({i}, {j}): {numeric} vs {g}");
        }
    }
}
