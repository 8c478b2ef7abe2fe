use rand::{distributions::Distribution, rngs::StdRng, SeedableRng};
use std::{
    sync::{Arc, Mutex},
    vec::Vec,
};

use super::{unique_id, Error, SampleTensor, Storage, Tensor};
use crate::dtypes::Dtype;

/// A device that stores data on the heap.
///
/// The [Default] impl seeds the rng with 0.
#[derive(Clone, Debug)]
pub struct Cpu {
    pub(crate) rng: Arc<Mutex<StdRng>>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::seed_from_u64(0)
    }
}

impl Cpu {
    /// Constructs rng with the given seed.
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl<E: Dtype> Storage<E> for Cpu {
    type Vec = Vec<E>;

    fn try_alloc_len(&self, len: usize) -> Result<Self::Vec, Error> {
        let mut data: Vec<E> = Vec::new();
        data.try_reserve(len).map_err(|_| Error::OutOfMemory)?;
        data.resize(len, E::zero());
        Ok(data)
    }

    fn try_from_vec(&self, src: Vec<E>) -> Result<Self::Vec, Error> {
        Ok(src)
    }

    fn to_vec(&self, v: &Self::Vec) -> Vec<E> {
        v.clone()
    }

    fn len(&self, v: &Self::Vec) -> usize {
        v.len()
    }
}

impl<E: Dtype> SampleTensor<E> for Cpu {
    fn try_sample<Distr: Distribution<E>>(
        &self,
        shape: impl Into<Vec<usize>>,
        distr: Distr,
    ) -> Result<Tensor<E, Self>, Error> {
        let shape = shape.into();
        let len = shape.iter().product();
        let mut data: Vec<E> = Vec::new();
        data.try_reserve(len).map_err(|_| Error::OutOfMemory)?;
        {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            data.extend((&distr).sample_iter(&mut *rng).take(len));
        }
        Ok(Tensor {
            id: unique_id(),
            data: Arc::new(data),
            shape,
            device: self.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tensor::*, tests::*};

    #[test]
    fn test_zeros_and_ones() {
        let dev: TestDevice = Default::default();
        let z: Tensor<TestDtype, _> = dev.zeros([2, 3]);
        assert_eq!(z.as_vec(), vec![0.0; 6]);
        let o: Tensor<TestDtype, _> = dev.ones([4]);
        assert_eq!(o.as_vec(), vec![1.0; 4]);
    }

    #[test]
    fn test_tensor_from_vec_checks_len() {
        let dev: TestDevice = Default::default();
        let r = dev.try_tensor_from_vec(vec![1.0 as TestDtype, 2.0, 3.0], [2, 2]);
        assert!(matches!(r, Err(Error::WrongNumElements)));
    }

    #[test]
    fn test_same_seed_same_samples() {
        let a: Tensor<TestDtype, _> = Cpu::seed_from_u64(7).sample_normal([16]);
        let b: Tensor<TestDtype, _> = Cpu::seed_from_u64(7).sample_normal([16]);
        assert_eq!(a.as_vec(), b.as_vec());
        assert_ne!(a.id(), b.id());
    }
}
