//! # wdopt-core
//!
//! The numeric substrate that the `wdopt` optimizers run on. It is deliberately
//! small: it knows how to store parameters, store gradients keyed by the
//! parameter they belong to, walk a model's named parameters, and run the
//! update kernels. There is no autodiff here; gradients are produced elsewhere
//! and handed in through [tensor::Gradients].
//!
//! # Tensors & Devices
//!
//! A [tensor::Tensor] is a flat buffer with a runtime shape, a
//! [tensor::UniqueId] and the device that allocated it. Devices allocate
//! tensors and execute kernels. There is a single device right now,
//! [tensor::Cpu].
//!
//! ```rust
//! # use wdopt_core::prelude::*;
//! let dev: Cpu = Default::default();
//! let w: Tensor<f32, _> = dev.zeros([2, 3]);
//! assert_eq!(w.shape(), &[2, 3]);
//! ```
//!
//! # Gradients
//!
//! [tensor::Gradients] maps tensor ids to gradient buffers. Optimizers also
//! use it to store per-parameter slots (first and second moments).
//!
//! ```rust
//! # use wdopt_core::prelude::*;
//! let dev: Cpu = Default::default();
//! let w: Tensor<f32, _> = dev.ones([3]);
//! let mut grads: Gradients<f32, Cpu> = Gradients::leaky();
//! grads.try_insert(&w, vec![3.0, 0.0, 4.0]).unwrap();
//! let norm = grads.try_clip_by_global_norm(&[w.id()], 1.0).unwrap();
//! assert_eq!(norm, 5.0);
//! ```
//!
//! # Parameters & Optimizers
//!
//! Models expose their parameters through [nn_traits::UpdateParams], which
//! hands every parameter tensor to an [nn_traits::Optimizer] together with
//! its dotted name (e.g. `encoder.layer_norm.gamma`).

#![allow(clippy::type_complexity)]

extern crate self as wdopt_core;

pub mod dtypes;
pub mod nn_traits;
pub mod tensor;
pub mod tensor_ops;

#[cfg(feature = "safetensors")]
pub use safetensors;

/// Contains subset of all public exports.
pub mod prelude {
    pub use crate::dtypes::Dtype;
    pub use crate::nn_traits::{Optimizer, OptimizerUpdateError, UpdateParams};
    pub use crate::tensor::*;
    pub use crate::tensor_ops::*;
}
