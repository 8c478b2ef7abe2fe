//! Traits connecting models and optimizers.
//!
//! A model implements [UpdateParams] (usually via `#[derive(UpdateParams)]`
//! from `wdopt`), which walks its parameter tensors and hands each one to an
//! [Optimizer] along with a dotted name built from the field path.

mod tuples;
mod vecs;

use crate::{
    dtypes::Dtype,
    tensor::{Error, Gradients, Tensor, UniqueId},
    tensor_ops::Device,
};

/// An error indicating that an update could not be applied.
#[derive(Debug)]
pub enum OptimizerUpdateError {
    /// Some parameters had no gradient. The step was still taken for every other
    /// parameter, so this is not a failed update.
    UnusedTensors(Vec<UniqueId>),
    /// A kernel or validation error. Raised before any parameter is written
    /// when it is detected up front (e.g. sparse gradients).
    TensorError(Error),
}

impl std::fmt::Display for OptimizerUpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnusedTensors(unused) => write!(f, "Unused tensors: {unused:?}"),
            Self::TensorError(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OptimizerUpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnusedTensors(_) => None,
            Self::TensorError(err) => Some(err),
        }
    }
}

impl From<Error> for OptimizerUpdateError {
    fn from(err: Error) -> Self {
        Self::TensorError(err)
    }
}

/// All optimizers must implement [Optimizer::update_tensor], which updates a
/// single named parameter. [Optimizer::update] walks a whole model.
///
/// # Notes
///
/// The optimizer is generic over `M`, not the update method. This means a
/// single optimizer object can only work on objects of type `M`.
pub trait Optimizer<M, E: Dtype, D: Device<E>>: Sized {
    /// Updates a single parameter. Parameters without a gradient are pushed
    /// onto `missing_tensors` and left untouched.
    fn update_tensor(
        &mut self,
        name: &str,
        t: &mut Tensor<E, D>,
        gradients: &Gradients<E, D>,
        missing_tensors: &mut Vec<UniqueId>,
    ) -> Result<(), Error>;

    /// Updates all of `module`'s parameters using `gradients`.
    ///
    /// Requires a `&mut self` because the optimizer may change some internally
    /// tracked values.
    fn update(
        &mut self,
        module: &mut M,
        gradients: &Gradients<E, D>,
    ) -> Result<(), OptimizerUpdateError>
    where
        M: UpdateParams<E, D>,
    {
        let mut missing_tensors = Vec::new();
        module
            .try_update_params("", self, gradients, &mut missing_tensors)
            .map_err(OptimizerUpdateError::TensorError)?;
        if missing_tensors.is_empty() {
            Ok(())
        } else {
            Err(OptimizerUpdateError::UnusedTensors(missing_tensors))
        }
    }
}

/// Something with named parameters that an [Optimizer] can update.
///
/// `location` is the name of `self` inside its parent. Parameters are named
/// by joining field names with `.`, see [join_location].
pub trait UpdateParams<E: Dtype, D: Device<E>> {
    fn try_update_params<M, Optim: Optimizer<M, E, D>>(
        &mut self,
        location: &str,
        optimizer: &mut Optim,
        gradients: &Gradients<E, D>,
        missing_tensors: &mut Vec<UniqueId>,
    ) -> Result<(), Error>;

    /// Calls `f` with the name and value of every parameter, in the same
    /// order [UpdateParams::try_update_params] visits them.
    fn visit_params<F: FnMut(&str, &Tensor<E, D>)>(&self, location: &str, f: &mut F);

    /// Names of all parameters.
    fn param_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit_params("", &mut |name, _| names.push(name.to_string()));
        names
    }

    /// Ids of all parameters.
    fn param_ids(&self) -> Vec<UniqueId> {
        let mut ids = Vec::new();
        self.visit_params("", &mut |_, t| ids.push(t.id()));
        ids
    }
}

/// Appends `name` to `location`, separated by `.` unless `location` is empty.
pub fn join_location(location: &str, name: &str) -> String {
    if location.is_empty() {
        name.to_string()
    } else {
        format!("{location}.{name}")
    }
}

impl<E: Dtype, D: Device<E>> UpdateParams<E, D> for Tensor<E, D> {
    fn try_update_params<M, Optim: Optimizer<M, E, D>>(
        &mut self,
        location: &str,
        optimizer: &mut Optim,
        gradients: &Gradients<E, D>,
        missing_tensors: &mut Vec<UniqueId>,
    ) -> Result<(), Error> {
        optimizer.update_tensor(location, self, gradients, missing_tensors)
    }

    fn visit_params<F: FnMut(&str, &Tensor<E, D>)>(&self, location: &str, f: &mut F) {
        f(location, self)
    }
}
