use super::{AdamWeightDecayKernel, AdamWeightDecayUpdate};
use crate::{
    dtypes::Dtype,
    tensor::{Cpu, Error},
};

impl<E: Dtype> AdamWeightDecayKernel<E> for Cpu {
    fn adam_weight_decay_kernel(
        &self,
        upd: &AdamWeightDecayUpdate,
        param: &mut Self::Vec,
        moment1: &mut Self::Vec,
        moment2: &mut Self::Vec,
        grad: &Self::Vec,
    ) -> Result<(), Error> {
        debug_assert_eq!(param.len(), grad.len());
        let betas = upd.betas.map(E::from_f64_lossy);
        let eps = E::from_f64_lossy(upd.eps);
        let lr = E::from_f64_lossy(upd.lr);
        let scale = E::from_f64_lossy(upd.grad_scale);
        let weight_decay = upd.weight_decay.map(E::from_f64_lossy);

        for ((p, g), (m, v)) in param
            .iter_mut()
            .zip(grad.iter().cloned())
            .zip(moment1.iter_mut().zip(moment2.iter_mut()))
        {
            let g = g * scale;
            *m = *m * betas[0] + g * (E::one() - betas[0]);
            *v = *v * betas[1] + g.powi(2) * (E::one() - betas[1]);
            let mut update = *m / (v.sqrt() + eps);

            if let Some(wd) = weight_decay {
                update += wd * *p;
            }

            *p -= lr * update;
        }
        Ok(())
    }
}
