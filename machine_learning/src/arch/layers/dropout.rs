use ndarray::Array1;
use rand::Rng;

/// Inverted dropout: during training every feature is zeroed with probability `p` and the
/// survivors are scaled by `1 / (1 - p)`, at inference time it is the identity.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    pub fn new(p: f32) -> Self {
        Self { p }
    }

    /// Samples a mask of `n` multiplicative factors.
    pub fn mask<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Array1<f32> {
        if self.p <= 0.0 {
            return Array1::ones(n);
        }

        let keep = 1.0 - self.p;
        Array1::from_shape_fn(n, |_| {
            if rng.random::<f32>() < keep {
                1.0 / keep
            } else {
                0.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn zero_probability_keeps_everything() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(Dropout::new(0.0).mask(&mut rng, 3), Array1::<f32>::ones(3));
    }

    #[test]
    fn survivors_are_rescaled() {
        let mut rng = StdRng::seed_from_u64(0);
        let mask = Dropout::new(0.5).mask(&mut rng, 1000);

        assert!(mask.iter().all(|&m| m == 0.0 || m == 2.0));
        let kept = mask.iter().filter(|&&m| m > 0.0).count();
        assert!((300..700).contains(&kept));
    }
}
