mod cpu_kernel;

use crate::{
    dtypes::Dtype,
    tensor::{Error, Storage, Tensor},
};

/// Everything the AdamWeightDecay kernel needs to update a single parameter
/// for a single step.
///
/// Unlike Adam, there is no bias correction of the moments, and weight decay
/// is added to the update after the moments are computed so it never leaks
/// into `m` or `v`:
///
/// ```text
/// g      = grad * grad_scale
/// m      = β1 * m + (1 - β1) * g
/// v      = β2 * v + (1 - β2) * g²
/// update = m / (sqrt(v) + ε) + weight_decay * param
/// param  = param - lr * update
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamWeightDecayUpdate {
    /// Learning rate for this step.
    pub lr: f64,

    /// Exponential decay rates of the first and second moments.
    pub betas: [f64; 2],

    /// Added to `sqrt(v)` for numerical stability.
    pub eps: f64,

    /// Decoupled weight decay rate, or `None` if this parameter is exempt.
    pub weight_decay: Option<f64>,

    /// Multiplier applied to the gradient before it is used, e.g. from
    /// global norm clipping. `1.0` leaves the gradient untouched.
    pub grad_scale: f64,
}

pub trait AdamWeightDecayKernel<E: Dtype>: Storage<E> {
    fn adam_weight_decay_kernel(
        &self,
        upd: &AdamWeightDecayUpdate,
        param: &mut Self::Vec,
        moment1: &mut Self::Vec,
        moment2: &mut Self::Vec,
        grad: &Self::Vec,
    ) -> Result<(), Error>;
}

impl AdamWeightDecayUpdate {
    /// Updates `param`, `moment1` and `moment2` together. Lengths are checked
    /// before anything is written, so on error all three are untouched.
    pub fn try_update<E: Dtype, D: AdamWeightDecayKernel<E>>(
        &self,
        param: &mut Tensor<E, D>,
        moment1: &mut D::Vec,
        moment2: &mut D::Vec,
        grad: &D::Vec,
    ) -> Result<(), Error> {
        let dev = param.device.clone();
        let len = param.len();
        if dev.len(moment1) != len || dev.len(moment2) != len || dev.len(grad) != len {
            return Err(Error::WrongNumElements);
        }
        dev.adam_weight_decay_kernel(self, param.data_mut(), moment1, moment2, grad)
    }
}
