use std::ops::Range;

use super::Optimizer;
use crate::{MlErr, Result};

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// The Adam optimizer restricted to the trainable ranges of a parameter buffer.
///
/// Weight decay is applied as an L2 penalty added to the gradient.
#[derive(Debug)]
pub struct Adam {
    ranges: Vec<Range<usize>>,
    len: usize,
    learning_rate: f32,
    weight_decay: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer with the default betas and epsilon.
    ///
    /// # Arguments
    /// * `ranges` - The parts of the parameter buffer this optimizer may update.
    /// * `len` - The length of the whole parameter buffer.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `weight_decay` - The L2 penalty coefficient.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(ranges: Vec<Range<usize>>, len: usize, learning_rate: f32, weight_decay: f32) -> Self {
        Self::with_betas(ranges, len, learning_rate, weight_decay, BETA1, BETA2, EPSILON)
    }

    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    pub fn with_betas(
        ranges: Vec<Range<usize>>,
        len: usize,
        learning_rate: f32,
        weight_decay: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    ) -> Self {
        Self {
            ranges,
            len,
            learning_rate,
            weight_decay,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }

    /// Returns the amount of parameters this optimizer updates.
    pub fn trainable(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        for (what, got) in [("gradient", grad.len()), ("parameters", params.len())] {
            if got != self.len {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected: self.len,
                });
            }
        }

        let Self {
            learning_rate: lr,
            weight_decay: wd,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        for range in &self.ranges {
            params[range.clone()]
                .iter_mut()
                .zip(&grad[range.clone()])
                .zip(self.v[range.clone()].iter_mut())
                .zip(self.s[range.clone()].iter_mut())
                .for_each(|(((p, g), v), s)| {
                    let g = g + wd * *p;
                    *v = b1 * *v + (1. - b1) * g;
                    *s = b2 * *s + (1. - b2) * g.powi(2);
                    *p -= step_size * *v / (s.sqrt() + eps);
                });
        }

        Ok(())
    }
}
