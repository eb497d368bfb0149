use std::{collections::HashMap, rc::Rc};

use ndarray::{ArrayD, IxDyn};
use ndarray_rand::RandomExt;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::Uniform;

use crate::Result;

const UNK_LOW: f32 = -0.25;
const UNK_HIGH: f32 = 0.25;

/// Hands out the vector used for words that have no pretrained embedding.
///
/// The first request for a given shape samples a vector uniformly from
/// `[-0.25, 0.25)` and every later request for that shape returns the very same
/// vector, so all unknown words of a given dimension share one representation.
/// Entries are never evicted.
pub struct UnkVecCache {
    rng: StdRng,
    cache: HashMap<Vec<usize>, Rc<ArrayD<f32>>>,
}

impl UnkVecCache {
    /// Creates a new empty cache whose vectors are drawn from a generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cache: HashMap::new(),
        }
    }

    /// Returns the unknown-word vector for `shape`, sampling it on the first request.
    ///
    /// # Arguments
    /// * `shape` - The shape of the requested vector.
    ///
    /// # Returns
    /// A shared handle to the cached vector.
    pub fn unk(&mut self, shape: &[usize]) -> Result<Rc<ArrayD<f32>>> {
        if let Some(vector) = self.cache.get(shape) {
            return Ok(Rc::clone(vector));
        }

        let distribution = Uniform::new(UNK_LOW, UNK_HIGH)?;
        let vector = Rc::new(ArrayD::random_using(
            IxDyn(shape),
            distribution,
            &mut self.rng,
        ));

        log::debug!("sampled unknown word vector for shape {shape:?}");
        self.cache.insert(shape.to_vec(), Rc::clone(&vector));
        Ok(vector)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_shape_returns_the_same_vector() {
        let mut cache = UnkVecCache::new(7);

        let a = cache.unk(&[5]).unwrap();
        let b = cache.unk(&[5]).unwrap();

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(*a, *b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn components_lie_in_range() {
        let mut cache = UnkVecCache::new(7);
        let v = cache.unk(&[300]).unwrap();

        assert_eq!(v.shape(), &[300]);
        assert!(v.iter().all(|&x| (UNK_LOW..UNK_HIGH).contains(&x)));
    }

    #[test]
    fn different_shapes_get_independent_vectors() {
        let mut cache = UnkVecCache::new(7);

        let a = cache.unk(&[4]).unwrap();
        let b = cache.unk(&[2, 2]).unwrap();

        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(b.shape(), &[2, 2]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let a = UnkVecCache::new(11).unk(&[8]).unwrap();
        let b = UnkVecCache::new(11).unk(&[8]).unwrap();
        assert_eq!(*a, *b);
    }
}
