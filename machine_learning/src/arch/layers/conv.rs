use ndarray::prelude::*;

use crate::{MlErr, Result};

/// A 1-d convolution over the rows of its input followed by a ReLU and a max-pool over time.
///
/// Each output channel looks at `width` consecutive rows of `in_dim` features. Inputs
/// shorter than `width` are padded with zero rows so every input yields one window.
/// Its parameters are laid out as the `(width * in_dim, channels)` kernel followed by
/// the `channels` biases.
#[derive(Debug, Clone)]
pub struct Conv1d {
    width: usize,
    in_dim: usize,
    channels: usize,
    size: usize,
}

/// What `Conv1d::forward` remembers for the backward pass.
#[derive(Debug, Clone)]
pub struct ConvTrace {
    cols: Array2<f32>,
    rows: usize,
    argmax: Vec<usize>,
    active: Vec<bool>,
}

impl Conv1d {
    /// Creates a new `Conv1d`.
    ///
    /// # Arguments
    /// * `width` - The amount of consecutive rows each window spans.
    /// * `in_dim` - The amount of features per row.
    /// * `channels` - The amount of output channels.
    pub fn new(width: usize, in_dim: usize, channels: usize) -> Self {
        Self {
            width,
            in_dim,
            channels,
            size: (width * in_dim + 1) * channels,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the kernel shape and bias length, in layout order.
    pub fn param_shapes(&self) -> ([usize; 2], [usize; 1]) {
        ([self.width * self.in_dim, self.channels], [self.channels])
    }

    /// Convolves `x`, applies a ReLU and max-pools every channel over time.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `x` - A `(rows, in_dim)` input.
    ///
    /// # Returns
    /// The pooled `channels` features and the trace needed by `backward`.
    pub fn forward(&self, params: &[f32], x: ArrayView2<f32>) -> Result<(Array1<f32>, ConvTrace)> {
        if x.ncols() != self.in_dim {
            return Err(MlErr::SizeMismatch {
                what: "convolution input features",
                got: x.ncols(),
                expected: self.in_dim,
            });
        }

        let (w, b) = self.view_params(params)?;
        let cols = self.im2col(x);
        let mut z = cols.dot(&w);
        z += &b;

        let mut h = Array1::zeros(self.channels);
        let mut argmax = vec![0; self.channels];
        let mut active = vec![false; self.channels];

        for (c, column) in z.axis_iter(Axis(1)).enumerate() {
            let (best, max) = column
                .iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(bi, bm), (i, &v)| {
                    if v > bm { (i, v) } else { (bi, bm) }
                });

            argmax[c] = best;
            active[c] = max > 0.0;
            h[c] = max.max(0.0);
        }

        let trace = ConvTrace {
            cols,
            rows: x.nrows(),
            argmax,
            active,
        };

        Ok((h, trace))
    }

    /// Accumulates this layer's gradient and propagates the delta to its input.
    ///
    /// Only the window that won the max-pool of each channel receives gradient.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `grad` - This layer's gradient slice, added to rather than overwritten.
    /// * `trace` - The trace returned by `forward`.
    /// * `dh` - The derivative of the loss with respect to the pooled output.
    ///
    /// # Returns
    /// The `(rows, in_dim)` derivative of the loss with respect to the input.
    pub fn backward(
        &self,
        params: &[f32],
        grad: &mut [f32],
        trace: &ConvTrace,
        dh: ArrayView1<f32>,
    ) -> Result<Array2<f32>> {
        let (w, _) = self.view_params(params)?;
        let (mut dw, mut db) = self.view_grad(grad)?;
        let mut dx = Array2::zeros((trace.rows, self.in_dim));

        for c in 0..self.channels {
            if !trace.active[c] {
                continue;
            }

            let g = dh[c];
            let p = trace.argmax[c];

            dw.column_mut(c).scaled_add(g, &trace.cols.row(p));
            db[c] += g;

            let dcol = w.column(c);
            for j in 0..self.width {
                let row = p + j;
                if row >= trace.rows {
                    break;
                }

                let chunk = dcol.slice(s![j * self.in_dim..(j + 1) * self.in_dim]);
                dx.row_mut(row).scaled_add(g, &chunk);
            }
        }

        Ok(dx)
    }

    /// Unfolds every window of `x` into a row, zero padding past the end of the input.
    fn im2col(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let rows = x.nrows();
        let windows = rows.max(self.width) - self.width + 1;
        let mut cols = Array2::zeros((windows, self.width * self.in_dim));

        for p in 0..windows {
            for j in 0..self.width {
                if p + j >= rows {
                    break;
                }

                cols.slice_mut(s![p, j * self.in_dim..(j + 1) * self.in_dim])
                    .assign(&x.row(p + j));
            }
        }

        cols
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("convolution parameters", params.len())?;
        let (w_shape, _) = self.param_shapes();
        let (w_raw, b_raw) = params.split_at(self.size - self.channels);
        let w = ArrayView2::from_shape((w_shape[0], w_shape[1]), w_raw)?;
        let b = ArrayView1::from_shape(self.channels, b_raw)?;
        Ok((w, b))
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("convolution gradient", grad.len())?;
        let (w_shape, _) = self.param_shapes();
        let (dw_raw, db_raw) = grad.split_at_mut(self.size - self.channels);
        let dw = ArrayViewMut2::from_shape((w_shape[0], w_shape[1]), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.channels, db_raw)?;
        Ok((dw, db))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_the_largest_window() {
        // one feature, a window of one row, one channel with weight 2 and no bias
        let conv = Conv1d::new(1, 1, 1);
        let params = [2.0, 0.0];
        let x = array![[1.0], [3.0], [2.0]];

        let (h, trace) = conv.forward(&params, x.view()).unwrap();
        assert_eq!(h, array![6.0]);

        let mut grad = [0.0; 2];
        let dx = conv
            .backward(&params, &mut grad, &trace, array![1.0].view())
            .unwrap();

        assert_eq!(grad, [3.0, 1.0]);
        assert_eq!(dx, array![[0.0], [2.0], [0.0]]);
    }

    #[test]
    fn wide_windows_span_consecutive_rows() {
        let conv = Conv1d::new(2, 1, 1);
        let params = [1.0, 1.0, -1.0];
        let x = array![[1.0], [2.0], [5.0]];

        let (h, trace) = conv.forward(&params, x.view()).unwrap();
        // windows: 1+2-1 = 2, 2+5-1 = 6
        assert_eq!(h, array![6.0]);

        let mut grad = [0.0; 3];
        let dx = conv
            .backward(&params, &mut grad, &trace, array![0.5].view())
            .unwrap();

        assert_eq!(grad, [1.0, 2.5, 0.5]);
        assert_eq!(dx, array![[0.0], [0.5], [0.5]]);
    }

    #[test]
    fn short_inputs_are_zero_padded() {
        let conv = Conv1d::new(3, 2, 1);
        let params = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        let x = array![[1.0, 2.0]];

        let (h, trace) = conv.forward(&params, x.view()).unwrap();
        assert_eq!(h, array![3.0]);

        let mut grad = [0.0; 7];
        let dx = conv
            .backward(&params, &mut grad, &trace, array![1.0].view())
            .unwrap();
        assert_eq!(dx.shape(), &[1, 2]);
        assert_eq!(dx, array![[1.0, 1.0]]);
    }

    #[test]
    fn dead_channels_get_no_gradient() {
        let conv = Conv1d::new(1, 1, 1);
        let params = [-1.0, 0.0];
        let x = array![[1.0], [2.0]];

        let (h, trace) = conv.forward(&params, x.view()).unwrap();
        assert_eq!(h, array![0.0]);

        let mut grad = [0.0; 2];
        let dx = conv
            .backward(&params, &mut grad, &trace, array![1.0].view())
            .unwrap();
        assert_eq!(grad, [0.0, 0.0]);
        assert_eq!(dx, array![[0.0], [0.0]]);
    }
}
