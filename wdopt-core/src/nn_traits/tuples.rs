use crate::{
    dtypes::Dtype,
    tensor::{Error, Gradients, Tensor, UniqueId},
    tensor_ops::Device,
};

use super::{join_location, Optimizer, UpdateParams};

macro_rules! tuple_impls {
    ([$($name:ident),+] [$($idx:tt),+]) => {
        /// Elements are named by their position, e.g. `pooler.0.bias`.
        impl<E: Dtype, D: Device<E>, $($name: UpdateParams<E, D>),+> UpdateParams<E, D>
            for ($($name,)+)
        {
            fn try_update_params<M, Optim: Optimizer<M, E, D>>(
                &mut self,
                location: &str,
                optimizer: &mut Optim,
                gradients: &Gradients<E, D>,
                missing_tensors: &mut Vec<UniqueId>,
            ) -> Result<(), Error> {
                $(self.$idx.try_update_params(
                    &join_location(location, stringify!($idx)),
                    optimizer,
                    gradients,
                    missing_tensors,
                )?;)+
                Ok(())
            }

            fn visit_params<F: FnMut(&str, &Tensor<E, D>)>(&self, location: &str, f: &mut F) {
                $(self.$idx.visit_params(&join_location(location, stringify!($idx)), f);)+
            }
        }
    };
}

tuple_impls!([M0] [0]);
tuple_impls!([M0, M1] [0, 1]);
tuple_impls!([M0, M1, M2] [0, 1, 2]);
tuple_impls!([M0, M1, M2, M3] [0, 1, 2, 3]);
tuple_impls!([M0, M1, M2, M3, M4] [0, 1, 2, 3, 4]);
tuple_impls!([M0, M1, M2, M3, M4, M5] [0, 1, 2, 3, 4, 5]);
