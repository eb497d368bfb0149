use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::Result;

/// How a parameter tensor is initialized when a model is built from scratch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamInit {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    XavierUniform { fan_in: usize, fan_out: usize },
    LecunUniform { fan_in: usize },
}

impl ParamInit {
    /// Fills `out` following this initialization scheme.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `out` - The parameters to overwrite.
    ///
    /// # Returns
    /// An error if the resulting range is invalid (low > high).
    pub fn fill<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f32]) -> Result<()> {
        let (low, high) = match *self {
            ParamInit::Const { value } => {
                out.fill(value);
                return Ok(());
            }
            ParamInit::Uniform { low, high } => (low, high),
            ParamInit::XavierUniform { fan_in, fan_out } => {
                let range = (6. / (fan_in + fan_out) as f32).sqrt();
                (-range, range)
            }
            ParamInit::LecunUniform { fan_in } => {
                let range = (3. / fan_in as f32).sqrt();
                (-range, range)
            }
        };

        let distribution = Uniform::new(low, high)?;
        for p in out.iter_mut() {
            *p = distribution.sample(rng);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn constant() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut out = [1.0; 4];

        ParamInit::Const { value: 0.0 }.fill(&mut rng, &mut out).unwrap();
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn xavier_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut out = [0.0; 64];

        let init = ParamInit::XavierUniform {
            fan_in: 4,
            fan_out: 2,
        };
        init.fill(&mut rng, &mut out).unwrap();

        assert!(out.iter().all(|p| p.abs() <= 1.0));
        assert!(out.iter().any(|&p| p != 0.0));
    }

    #[test]
    fn inverted_range_fails() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut out = [0.0; 2];

        let init = ParamInit::Uniform { low: 1.0, high: -1.0 };
        assert!(init.fill(&mut rng, &mut out).is_err());
    }
}
