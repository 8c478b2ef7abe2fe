//! # wdopt
//!
//! Adam with decoupled weight decay ("AdamWeightDecay") and warmup learning
//! rate schedules, as used to pre-train and fine-tune BERT.
//!
//! The pieces:
//! - [optim::AdamWeightDecay]: Adam without bias correction, with weight decay
//!   applied directly to the parameters (never through the moments), a regex
//!   list of parameter names exempt from decay, and global norm clipping of
//!   all gradients to 1.0 before every update.
//! - [schedules]: [schedules::WarmUp] ramps the learning rate up before
//!   handing over to another schedule, usually [schedules::PolynomialDecay].
//! - [optim::create_optimizer]: both of the above configured the way BERT
//!   fine-tuning does it.
//!
//! Models expose their parameters through [nn_traits::UpdateParams], which is
//! derived. Parameter names come from the field path, so a `bias` field
//! inside a `#[module] output` field is called `output.bias`:
//!
//! ```rust
//! use wdopt::prelude::*;
//!
//! #[derive(Clone, UpdateParams)]
//! struct LayerNorm<Elem: Dtype, Dev: Device<Elem>> {
//!     #[param]
//!     gamma: Tensor<Elem, Dev>,
//!     #[param]
//!     beta: Tensor<Elem, Dev>,
//! }
//!
//! #[derive(Clone, UpdateParams)]
//! struct Output<Elem: Dtype, Dev: Device<Elem>> {
//!     #[param]
//!     kernel: Tensor<Elem, Dev>,
//!     #[param]
//!     bias: Tensor<Elem, Dev>,
//!     #[module]
//!     layer_norm: LayerNorm<Elem, Dev>,
//! }
//!
//! let dev: Cpu = Default::default();
//! let mut model: Output<f32, Cpu> = Output {
//!     kernel: dev.sample_normal([8, 8]),
//!     bias: dev.zeros([8]),
//!     layer_norm: LayerNorm { gamma: dev.ones([8]), beta: dev.zeros([8]) },
//! };
//! assert_eq!(
//!     model.param_names(),
//!     ["kernel", "bias", "layer_norm.gamma", "layer_norm.beta"]
//! );
//!
//! let mut opt = create_optimizer(&model, 2e-5, 10_000, 1_000).unwrap();
//! assert!(opt.should_decay("kernel"));
//! assert!(!opt.should_decay("layer_norm.gamma"));
//!
//! // gradients come from elsewhere
//! let mut grads = Gradients::leaky();
//! grads.try_insert(&model.kernel, vec![0.01; 64]).unwrap();
//! grads.try_insert(&model.bias, vec![0.01; 8]).unwrap();
//! grads.try_insert(&model.layer_norm.gamma, vec![0.01; 8]).unwrap();
//! grads.try_insert(&model.layer_norm.beta, vec![0.01; 8]).unwrap();
//! opt.update(&mut model, &grads).unwrap();
//! ```

#![allow(clippy::type_complexity)]

extern crate self as wdopt;

pub mod optim;
pub mod schedules;

pub use wdopt_core::{dtypes, nn_traits, tensor, tensor_ops};
pub use wdopt_derives::*;

#[cfg(feature = "safetensors")]
pub use safetensors;

/// Contains subset of all public exports.
pub mod prelude {
    pub use crate::optim::{
        create_optimizer, AdamWeightDecay, AdamWeightDecayConfig, ConfigError, OptimizerConfig,
    };
    pub use crate::schedules::{
        build_schedule, ConstantSchedule, CustomObjects, LearningRateSchedule, PolynomialDecay,
        WarmUp,
    };
    pub use wdopt_core::prelude::*;
    pub use wdopt_derives::*;
}
