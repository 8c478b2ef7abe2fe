//! Optimizers: the [AdamWeightDecay] optimizer, its exportable config, and
//! [create_optimizer] which sets it up the way BERT is trained.
//!
//! An optimizer updates a model in place given [crate::tensor::Gradients]
//! for its parameters:
//!
//! ```rust
//! # use wdopt::prelude::*;
//! #[derive(Clone, UpdateParams)]
//! struct Classifier<Elem: Dtype, Dev: Device<Elem>> {
//!     #[param]
//!     weight: Tensor<Elem, Dev>,
//!     #[param]
//!     bias: Tensor<Elem, Dev>,
//! }
//!
//! let dev: Cpu = Default::default();
//! let mut model = Classifier {
//!     weight: dev.sample_normal([4, 2]),
//!     bias: dev.zeros([2]),
//! };
//! assert_eq!(model.param_names(), ["weight", "bias"]);
//!
//! let mut opt = create_optimizer(&model, 5e-5, 1000, 100).unwrap();
//!
//! let mut grads: Gradients<f32, Cpu> = Gradients::leaky();
//! grads.try_insert(&model.weight, vec![0.1; 8]).unwrap();
//! grads.try_insert(&model.bias, vec![0.2; 2]).unwrap();
//! opt.update(&mut model, &grads).unwrap();
//! ```
//!
//! # Exporting and importing configs
//!
//! The hyperparameters, including the learning rate schedule, can be exported
//! with [AdamWeightDecay::get_config] and rebuilt with
//! [AdamWeightDecay::from_config]. [OptimizerConfig] round-trips through JSON.
//!
//! # Checkpointing
//!
//! With the `safetensors` feature, the moments and iteration count are saved
//! with [AdamWeightDecay::save_safetensors] and restored with
//! [AdamWeightDecay::load_safetensors].

mod adam_weight_decay;
mod config;
#[cfg(feature = "safetensors")]
mod state;

pub use adam_weight_decay::{AdamWeightDecay, AdamWeightDecayConfig, CLIP_NORM};
pub use config::{ConfigError, LearningRateConfig, OptimizerConfig};

// re-exports
pub use crate::nn_traits::{Optimizer, OptimizerUpdateError, UpdateParams};

use crate::{dtypes::Dtype, schedules::build_schedule, tensor::Storage};

/// Creates the optimizer used to fine-tune BERT: [AdamWeightDecay] with a
/// weight decay rate of `0.01`, `eps = 1e-6`, `layer_norm` and `bias`
/// parameters excluded from decay, and the learning rate schedule from
/// [build_schedule].
pub fn create_optimizer<M, E: Dtype, D: Storage<E>>(
    model: &M,
    init_lr: f64,
    num_train_steps: u64,
    num_warmup_steps: u64,
) -> Result<AdamWeightDecay<M, E, D>, ConfigError> {
    AdamWeightDecay::new(
        model,
        AdamWeightDecayConfig {
            learning_rate: build_schedule(init_lr, num_train_steps, num_warmup_steps),
            betas: [0.9, 0.999],
            eps: 1e-6,
            weight_decay_rate: 0.01,
            exclude_from_weight_decay: Some(vec!["layer_norm".into(), "bias".into()]),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prelude::*, tests::*};

    #[test]
    fn test_create_optimizer() {
        let dev: TestDevice = Default::default();
        let t: Tensor<TestDtype, _> = dev.zeros([1]);
        let opt: AdamWeightDecay<_, TestDtype, TestDevice> =
            create_optimizer(&t, 2e-5, 100, 10).unwrap();
        let cfg = opt.config();
        assert_eq!(cfg.weight_decay_rate, 0.01);
        assert_eq!(cfg.betas, [0.9, 0.999]);
        assert_eq!(cfg.eps, 1e-6);
        assert_eq!(cfg.name, "AdamWeightDecay");
        assert_eq!(cfg.learning_rate.class_name(), WarmUp::CLASS_NAME);
        assert_eq!(opt.learning_rate(), 0.0);
        assert!(opt.should_decay("encoder.attention.query.kernel"));
        assert!(!opt.should_decay("encoder.layer_norm.gamma"));
        assert!(!opt.should_decay("encoder.attention.query.bias"));
    }

    #[test]
    fn test_create_optimizer_without_warmup() {
        let dev: TestDevice = Default::default();
        let t: Tensor<TestDtype, _> = dev.zeros([1]);
        let opt: AdamWeightDecay<_, TestDtype, TestDevice> =
            create_optimizer(&t, 2e-5, 100, 0).unwrap();
        assert_eq!(opt.config().learning_rate.class_name(), "PolynomialDecay");
        assert_eq!(opt.learning_rate(), 2e-5);
    }
}
