//! Kernels that optimizers need: the global gradient norm and the
//! AdamWeightDecay update.
//!
//! Each op is split the same way: a `*Kernel` trait that devices implement
//! (see the `cpu_kernel.rs` files), and a device-agnostic front end that
//! validates lengths before anything is written.

mod adam_weight_decay;
mod global_norm;

pub use adam_weight_decay::{AdamWeightDecayKernel, AdamWeightDecayUpdate};
pub use global_norm::{clip_scale, GlobalNormKernel};

use crate::{dtypes::Dtype, tensor::Storage};

/// A [Storage] that implements every kernel an optimizer needs.
pub trait Device<E: Dtype>: Storage<E> + AdamWeightDecayKernel<E> + GlobalNormKernel<E> {}

impl<E: Dtype> Device<E> for crate::tensor::Cpu {}
