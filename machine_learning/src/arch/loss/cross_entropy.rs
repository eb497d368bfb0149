use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;

/// Softmax cross entropy for single-label classification.
///
/// The gold class of each row is the argmax of its label vector.
#[derive(Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

/// Returns the index of the largest element, the first one on ties.
pub fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &x)| {
            if x > best { (i, x) } else { (best_i, best) }
        })
        .0
}

fn log_sum_exp(row: ArrayView1<f32>) -> f32 {
    let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
    max + row.mapv(|x| (x - max).exp()).sum().ln()
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.nrows();
        if n == 0 {
            return 0.0;
        }

        let total: f32 = y_pred
            .axis_iter(Axis(0))
            .zip(y.axis_iter(Axis(0)))
            .map(|(z, t)| log_sum_exp(z) - z[argmax(t)])
            .sum();

        total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.nrows().max(1) as f32;
        let mut d = y_pred.to_owned();

        for (mut row, t) in d.axis_iter_mut(Axis(0)).zip(y.axis_iter(Axis(0))) {
            let lse = log_sum_exp(row.view());
            row.mapv_inplace(|z| (z - lse).exp());
            row[argmax(t)] -= 1.0;
            row.mapv_inplace(|g| g / n);
        }

        d
    }
}
