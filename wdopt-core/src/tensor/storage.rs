use rand::distributions::Distribution;
use rand_distr::StandardNormal;
use std::{sync::Arc, vec::Vec};

use super::{unique_id, Error, Tensor};

/// Something that can store flat arrays of `E`.
pub trait Storage<E>: 'static + std::fmt::Debug + Default + Clone {
    /// Generic Storage type
    type Vec: 'static + std::fmt::Debug + Clone + Send + Sync;

    /// Allocates a zeroed buffer the same length as `storage`. Used for
    /// gradients and optimizer slots.
    fn try_alloc_grad(&self, storage: &Self::Vec) -> Result<Self::Vec, Error> {
        self.try_alloc_len(self.len(storage))
    }

    /// Allocates a zeroed buffer of `len` elements.
    fn try_alloc_len(&self, len: usize) -> Result<Self::Vec, Error>;

    /// Moves host data onto the device.
    fn try_from_vec(&self, src: Vec<E>) -> Result<Self::Vec, Error>;

    /// Copies device data back to the host.
    fn to_vec(&self, v: &Self::Vec) -> Vec<E>;

    fn len(&self, v: &Self::Vec) -> usize;
}

/// Construct tensors on a device.
pub trait TensorCreator<E>: Storage<E> {
    /// Creates a tensor from `src`. `src` must hold exactly as many elements as `shape` describes.
    fn try_tensor_from_vec(
        &self,
        src: Vec<E>,
        shape: impl Into<Vec<usize>>,
    ) -> Result<Tensor<E, Self>, Error> {
        let shape = shape.into();
        if shape.iter().product::<usize>() != src.len() {
            return Err(Error::WrongNumElements);
        }
        Ok(Tensor {
            id: unique_id(),
            data: Arc::new(self.try_from_vec(src)?),
            shape,
            device: self.clone(),
        })
    }

    /// Creates a tensor from `src`.
    ///
    /// **Panics** if the number of elements does not match `shape`.
    fn tensor_from_vec(&self, src: Vec<E>, shape: impl Into<Vec<usize>>) -> Tensor<E, Self> {
        self.try_tensor_from_vec(src, shape).unwrap()
    }

    /// Creates a tensor filled with zeros.
    fn try_zeros(&self, shape: impl Into<Vec<usize>>) -> Result<Tensor<E, Self>, Error> {
        let shape = shape.into();
        Ok(Tensor {
            id: unique_id(),
            data: Arc::new(self.try_alloc_len(shape.iter().product())?),
            shape,
            device: self.clone(),
        })
    }

    /// Creates a tensor filled with zeros.
    fn zeros(&self, shape: impl Into<Vec<usize>>) -> Tensor<E, Self> {
        self.try_zeros(shape).unwrap()
    }

    /// Creates a tensor filled with ones.
    fn try_ones(&self, shape: impl Into<Vec<usize>>) -> Result<Tensor<E, Self>, Error>
    where
        E: num_traits::One + Clone,
    {
        let shape = shape.into();
        let len = shape.iter().product();
        self.try_tensor_from_vec(std::vec![E::one(); len], shape)
    }

    /// Creates a tensor filled with ones.
    fn ones(&self, shape: impl Into<Vec<usize>>) -> Tensor<E, Self>
    where
        E: num_traits::One + Clone,
    {
        self.try_ones(shape).unwrap()
    }
}

impl<E, D: Storage<E>> TensorCreator<E> for D {}

/// Construct tensors filled with random values.
pub trait SampleTensor<E>: TensorCreator<E> {
    /// Creates a tensor with values drawn from `distr`.
    fn try_sample<Distr: Distribution<E>>(
        &self,
        shape: impl Into<Vec<usize>>,
        distr: Distr,
    ) -> Result<Tensor<E, Self>, Error>;

    /// Creates a tensor with values drawn from the standard normal distribution.
    fn try_sample_normal(&self, shape: impl Into<Vec<usize>>) -> Result<Tensor<E, Self>, Error>
    where
        StandardNormal: Distribution<E>,
    {
        self.try_sample(shape, StandardNormal)
    }

    /// Creates a tensor with values drawn from the standard normal distribution.
    fn sample_normal(&self, shape: impl Into<Vec<usize>>) -> Tensor<E, Self>
    where
        StandardNormal: Distribution<E>,
    {
        self.try_sample_normal(shape).unwrap()
    }
}
