//! The [Tensor] struct, the [Cpu] device and the [Gradients] store.
//!
//! At a high level a tensor consists of only four parts
//! 1. A [UniqueId] to track which gradients and optimizer slots are associated with what tensors
//! 2. A flat buffer stored in a [std::sync::Arc], owned by the device's [Storage]
//! 3. A runtime shape
//! 4. The device that allocated it
//!
//! # Creating tensors
//!
//! Use the [TensorCreator] and [SampleTensor] traits, which every device implements:
//!
//! ```rust
//! # use wdopt_core::prelude::*;
//! let dev: Cpu = Default::default();
//! let a: Tensor<f32, _> = dev.tensor_from_vec(vec![1.0, 2.0, 3.0], [3]);
//! let b: Tensor<f32, _> = dev.zeros([2, 2]);
//! let c: Tensor<f32, _> = dev.sample_normal([4, 8]);
//! ```
//!
//! # Cloning
//!
//! Cloning a tensor is cheap: the buffer is reference counted and the clone
//! keeps the same [UniqueId]. Writing through [Tensor::data_mut] only copies
//! the buffer if it is shared.

mod cpu;
mod error;
mod gradients;
mod storage;
mod unique_id;

pub use cpu::Cpu;
pub use error::Error;
pub use gradients::{Gradients, SparseGradient};
pub use storage::{SampleTensor, Storage, TensorCreator};
pub use unique_id::UniqueId;

pub(crate) use unique_id::unique_id;

use std::sync::Arc;

/// A flat, reference counted buffer with a runtime shape.
#[derive(Debug, Clone)]
pub struct Tensor<E, D: Storage<E>> {
    pub(crate) id: UniqueId,
    pub(crate) data: Arc<D::Vec>,
    pub(crate) shape: Vec<usize>,
    pub(crate) device: D,
}

impl<E, D: Storage<E>> Tensor<E, D> {
    /// The id that gradients and optimizer slots are keyed on.
    pub fn id(&self) -> UniqueId {
        self.id
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.device.len(&self.data)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Copies the data back to the host.
    pub fn as_vec(&self) -> Vec<E> {
        self.device.to_vec(&self.data)
    }

    /// Returns a read only reference to the underlying storage.
    pub fn data(&self) -> &D::Vec {
        &self.data
    }

    /// Returns a mutable reference to the underlying storage, copying it if
    /// another clone of this tensor shares it.
    pub fn data_mut(&mut self) -> &mut D::Vec {
        Arc::make_mut(&mut self.data)
    }
}
