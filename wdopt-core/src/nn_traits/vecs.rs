use crate::{
    dtypes::Dtype,
    tensor::{Error, Gradients, Tensor, UniqueId},
    tensor_ops::Device,
};

use super::{join_location, Optimizer, UpdateParams};

/// Elements are named by their index, e.g. `layers.0.weight`.
impl<E: Dtype, D: Device<E>, T: UpdateParams<E, D>> UpdateParams<E, D> for std::vec::Vec<T> {
    fn try_update_params<M, Optim: Optimizer<M, E, D>>(
        &mut self,
        location: &str,
        optimizer: &mut Optim,
        gradients: &Gradients<E, D>,
        missing_tensors: &mut Vec<UniqueId>,
    ) -> Result<(), Error> {
        for (i, m_i) in self.iter_mut().enumerate() {
            m_i.try_update_params(
                &join_location(location, &i.to_string()),
                optimizer,
                gradients,
                missing_tensors,
            )?;
        }
        Ok(())
    }

    fn visit_params<F: FnMut(&str, &Tensor<E, D>)>(&self, location: &str, f: &mut F) {
        for (i, m_i) in self.iter().enumerate() {
            m_i.visit_params(&join_location(location, &i.to_string()), f);
        }
    }
}
