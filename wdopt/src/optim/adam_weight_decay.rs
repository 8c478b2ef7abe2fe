use std::marker::PhantomData;
use std::sync::Arc;

use regex::Regex;

use super::config::{ConfigError, LearningRateConfig, OptimizerConfig};
use crate::{
    dtypes::Dtype,
    nn_traits::{Optimizer, OptimizerUpdateError, UpdateParams},
    schedules::{ConstantSchedule, CustomObjects, LearningRateSchedule, WarmUp},
    tensor::{Error, Gradients, Storage, Tensor, UniqueId},
    tensor_ops::{clip_scale, AdamWeightDecayUpdate, Device},
};

/// Gradients are jointly rescaled to this global norm before every update.
pub const CLIP_NORM: f64 = 1.0;

/// Configuration of the [AdamWeightDecay] optimizer.
///
/// Changing these after the optimizer is built has no effect, so they're
/// passed to [AdamWeightDecay::new] by value.
///
/// ```rust
/// # use std::sync::Arc;
/// # use wdopt::prelude::*;
/// AdamWeightDecayConfig {
///     learning_rate: Arc::new(PolynomialDecay::new(1e-3, 1000)),
///     weight_decay_rate: 1e-2,
///     exclude_from_weight_decay: Some(vec!["bias".into()]),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct AdamWeightDecayConfig {
    /// Learning rate source, queried with the number of finished updates.
    /// Defaults to a constant `0.001`.
    pub learning_rate: Arc<dyn LearningRateSchedule>,

    /// Exponential decay rates of the first and second moments. Defaults to `[0.9, 0.999]`.
    pub betas: [f64; 2],

    /// Added to `sqrt(v)` for numerical stability. Defaults to `1e-7`.
    pub eps: f64,

    /// Decoupled weight decay rate. Defaults to `0.0`, no decay.
    pub weight_decay_rate: f64,

    /// Regexes of parameter names that are never decayed. A name is excluded
    /// if any pattern matches anywhere in it.
    pub exclude_from_weight_decay: Option<Vec<String>>,

    pub name: String,
}

impl Default for AdamWeightDecayConfig {
    fn default() -> Self {
        Self {
            learning_rate: Arc::new(ConstantSchedule::new(0.001)),
            betas: [0.9, 0.999],
            eps: 1e-7,
            weight_decay_rate: 0.0,
            exclude_from_weight_decay: None,
            name: "AdamWeightDecay".to_string(),
        }
    }
}

/// Adam with decoupled weight decay, as used to train BERT.
///
/// Differences from plain Adam:
/// 1. No bias correction of the moments.
/// 2. Weight decay is added to the update after the moments are computed,
///    instead of to the gradient, so it never leaks into `m` and `v`.
/// 3. Parameters whose name matches `exclude_from_weight_decay` are not decayed.
/// 4. Before every update all gradients are rescaled together so their
///    combined norm is at most [CLIP_NORM].
///
/// Sparse gradients are rejected. The update fails before any parameter is
/// touched.
///
/// # Example Usage
/// ```rust
/// # use wdopt::prelude::*;
/// # let dev: Cpu = Default::default();
/// let mut bias: Tensor<f32, Cpu> = dev.ones([2]);
/// let mut opt: AdamWeightDecay<_, f32, Cpu> = AdamWeightDecay::new(&bias, AdamWeightDecayConfig {
///     weight_decay_rate: 0.01,
///     exclude_from_weight_decay: Some(vec!["layer_norm".into(), "bias".into()]),
///     ..Default::default()
/// }).unwrap();
/// assert!(opt.should_decay("encoder.dense.weight"));
/// assert!(!opt.should_decay("encoder.dense.bias"));
///
/// let mut grads: Gradients<f32, Cpu> = Gradients::leaky();
/// grads.try_insert(&bias, vec![0.5, -0.5]).unwrap();
/// opt.update(&mut bias, &grads).unwrap();
/// assert_eq!(opt.iterations(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct AdamWeightDecay<M, E: Dtype, D: Storage<E>> {
    cfg: AdamWeightDecayConfig,
    exclude: Vec<Regex>,

    iterations: u64,
    step: Option<AdamWeightDecayUpdate>,
    pub(super) moment1: Gradients<E, D>,
    pub(super) moment2: Gradients<E, D>,

    marker: PhantomData<*const M>,
}

impl<M, E: Dtype, D: Storage<E>> AdamWeightDecay<M, E, D> {
    /// Constructs using hyperparameters from `cfg`. Fails if an exclusion
    /// pattern isn't a valid regex.
    pub fn new(_model: &M, cfg: AdamWeightDecayConfig) -> Result<Self, ConfigError> {
        Self::with_config(cfg)
    }

    fn with_config(cfg: AdamWeightDecayConfig) -> Result<Self, ConfigError> {
        let exclude = cfg
            .exclude_from_weight_decay
            .iter()
            .flatten()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            cfg,
            exclude,
            iterations: 0,
            step: None,
            moment1: Gradients::leaky(),
            moment2: Gradients::leaky(),
            marker: PhantomData,
        })
    }

    pub fn config(&self) -> &AdamWeightDecayConfig {
        &self.cfg
    }

    /// Number of finished updates.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub(super) fn set_iterations(&mut self, iterations: u64) {
        self.iterations = iterations;
    }

    /// The learning rate the next update will use.
    pub fn learning_rate(&self) -> f64 {
        self.cfg.learning_rate.learning_rate(self.iterations)
    }

    /// Whether weight decay applies to the parameter called `param_name`.
    pub fn should_decay(&self, param_name: &str) -> bool {
        if self.cfg.weight_decay_rate == 0.0 {
            return false;
        }
        !self.exclude.iter().any(|r| r.is_match(param_name))
    }

    fn step_update(&self, grad_scale: f64) -> AdamWeightDecayUpdate {
        AdamWeightDecayUpdate {
            lr: self.learning_rate(),
            betas: self.cfg.betas,
            eps: self.cfg.eps,
            weight_decay: None,
            grad_scale,
        }
    }

    /// Exports the hyperparameters. The learning rate is exported as a number
    /// if it is constant, otherwise as a `{class_name, config}` object.
    pub fn get_config(&self) -> Result<OptimizerConfig, ConfigError> {
        Ok(OptimizerConfig {
            name: self.cfg.name.clone(),
            learning_rate: LearningRateConfig::from_schedule(self.cfg.learning_rate.as_ref())?,
            beta_1: self.cfg.betas[0],
            beta_2: self.cfg.betas[1],
            epsilon: self.cfg.eps,
            weight_decay_rate: self.cfg.weight_decay_rate,
            exclude_from_weight_decay: self.cfg.exclude_from_weight_decay.clone(),
        })
    }

    /// Rebuilds an optimizer from [AdamWeightDecay::get_config]. [WarmUp] is
    /// registered on top of the built-in schedules.
    ///
    /// Moments and the iteration count are not part of the config, the new
    /// optimizer starts fresh.
    pub fn from_config(config: &OptimizerConfig) -> Result<Self, ConfigError> {
        Self::from_config_with(config, &CustomObjects::empty())
    }

    /// Like [AdamWeightDecay::from_config], with extra schedules in
    /// `custom_objects`. Entries there take precedence over the built-ins.
    pub fn from_config_with(
        config: &OptimizerConfig,
        custom_objects: &CustomObjects,
    ) -> Result<Self, ConfigError> {
        let mut objects = CustomObjects::default().with(WarmUp::CLASS_NAME, WarmUp::from_config);
        objects.extend(custom_objects);
        let learning_rate = config.learning_rate.to_schedule(&objects)?;
        log::debug!(
            "building {} from config: schedule={} weight_decay_rate={} exclude={:?}",
            config.name,
            learning_rate.class_name(),
            config.weight_decay_rate,
            config.exclude_from_weight_decay,
        );
        let cfg = AdamWeightDecayConfig {
            learning_rate,
            betas: [config.beta_1, config.beta_2],
            eps: config.epsilon,
            weight_decay_rate: config.weight_decay_rate,
            exclude_from_weight_decay: config.exclude_from_weight_decay.clone(),
            name: config.name.clone(),
        };
        Self::with_config(cfg)
    }
}

impl<M, E: Dtype, D: Device<E>> Optimizer<M, E, D> for AdamWeightDecay<M, E, D> {
    fn update_tensor(
        &mut self,
        name: &str,
        t: &mut Tensor<E, D>,
        gradients: &Gradients<E, D>,
        missing_params: &mut Vec<UniqueId>,
    ) -> Result<(), Error> {
        let g = gradients.get_ref_checked(t);
        match g {
            None if gradients.get_sparse_checked(t).is_some() => {
                return Err(Error::SparseGradientsUnsupported(name.to_string()));
            }
            None => missing_params.push(t.id()),
            Some(g) => {
                let mut upd = self.step.unwrap_or_else(|| self.step_update(1.0));
                if self.should_decay(name) {
                    upd.weight_decay = Some(self.cfg.weight_decay_rate);
                }
                let m_t = self.moment1.get_or_alloc_mut(t)?;
                let v_t = self.moment2.get_or_alloc_mut(t)?;
                upd.try_update(t, m_t, v_t, g)?;
            }
        }
        Ok(())
    }

    /// Clips the gradients of every parameter in `module` jointly to a global
    /// norm of [CLIP_NORM], then applies one step.
    ///
    /// [OptimizerUpdateError::UnusedTensors] means the step was taken and the
    /// listed parameters were skipped for lack of a gradient. When none of the
    /// parameters has a gradient, nothing is touched and the iteration count
    /// stays put. Any other error is raised before a parameter is written.
    fn update(
        &mut self,
        module: &mut M,
        gradients: &Gradients<E, D>,
    ) -> Result<(), OptimizerUpdateError>
    where
        M: UpdateParams<E, D>,
    {
        let mut params: Vec<(String, UniqueId)> = Vec::new();
        let mut sparse = None;
        let mut any_grad = false;
        module.visit_params("", &mut |name: &str, t: &Tensor<E, D>| {
            if sparse.is_none() && gradients.get_sparse_checked(t).is_some() {
                sparse = Some(name.to_string());
            }
            any_grad |= gradients.get_ref_checked(t).is_some();
            params.push((name.to_string(), t.id()));
        });
        if let Some(name) = sparse {
            return Err(Error::SparseGradientsUnsupported(name).into());
        }

        let ids: Vec<UniqueId> = params.iter().map(|(_, id)| *id).collect();
        if !any_grad && !ids.is_empty() {
            log::warn!("{}: no gradients for any parameter, step skipped", self.cfg.name);
            return Err(OptimizerUpdateError::UnusedTensors(ids));
        }
        let global_norm = gradients.try_global_norm(&ids)?;
        let upd = self.step_update(clip_scale(global_norm, CLIP_NORM));
        log::trace!(
            "{} step {}: lr={} global_norm={} grad_scale={}",
            self.cfg.name,
            self.iterations,
            upd.lr,
            global_norm,
            upd.grad_scale,
        );

        self.step = Some(upd);
        let mut missing_tensors = Vec::new();
        let result = module.try_update_params("", self, gradients, &mut missing_tensors);
        self.step = None;
        result?;
        self.iterations += 1;

        if missing_tensors.is_empty() {
            Ok(())
        } else {
            let names: Vec<&str> = params
                .iter()
                .filter(|(_, id)| missing_tensors.contains(id))
                .map(|(name, _)| name.as_str())
                .collect();
            log::warn!("{}: no gradients for {names:?}", self.cfg.name);
            Err(OptimizerUpdateError::UnusedTensors(missing_tensors))
        }
    }
}
