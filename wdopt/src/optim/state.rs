//! Saving and restoring the moments and iteration count of an
//! [AdamWeightDecay] as a `.safetensors` file.
//!
//! Moments are stored under the parameter's name with `.m` and `.v` appended,
//! the step counter under `iterations`. Parameters that were never updated
//! have no entries.

use std::collections::BTreeMap;
use std::path::Path;

use memmap2::MmapOptions;
use safetensors::{
    serialize_to_file,
    tensor::{Dtype as SDtype, SafeTensors, TensorView},
};

use super::{AdamWeightDecay, ConfigError};
use crate::{
    dtypes::{Dtype, FromLeBytes, SafeTensorsDtype, ToLeBytes},
    nn_traits::{join_location, UpdateParams},
    tensor::Tensor,
    tensor_ops::Device,
};

const ITERATIONS_KEY: &str = "iterations";

struct TensorData {
    dtype: SDtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl TensorData {
    fn new<T: SafeTensorsDtype + ToLeBytes + Copy>(shape: Vec<usize>, data: &[T]) -> Self {
        Self {
            dtype: T::DTYPE,
            shape,
            data: data.iter().flat_map(|x| ToLeBytes::to_le_bytes(*x)).collect(),
        }
    }
}

fn read_vec<T: SafeTensorsDtype + FromLeBytes>(
    tensors: &SafeTensors,
    key: &str,
    len: usize,
) -> Result<Vec<T>, ConfigError> {
    let view = tensors.tensor(key)?;
    if view.dtype() != T::DTYPE {
        return Err(ConfigError::StateMismatch(format!(
            "`{key}` is {:?}, expected {:?}",
            view.dtype(),
            T::DTYPE
        )));
    }
    let num_bytes = std::mem::size_of::<T>();
    let bytes = view.data();
    if bytes.len() != len * num_bytes {
        return Err(ConfigError::StateMismatch(format!(
            "`{key}` has {} elements, the parameter has {len}",
            bytes.len() / num_bytes
        )));
    }
    Ok(bytes
        .chunks_exact(num_bytes)
        .map(<T as FromLeBytes>::from_le_bytes)
        .collect())
}

impl<M: UpdateParams<E, D>, E: Dtype, D: Device<E>> AdamWeightDecay<M, E, D> {
    /// Writes the optimizer state for the parameters of `model` to `path`.
    pub fn save_safetensors<P: AsRef<Path>>(&self, model: &M, path: P) -> Result<(), ConfigError> {
        let mut tensors = BTreeMap::new();
        tensors.insert(
            ITERATIONS_KEY.to_string(),
            TensorData::new(vec![1], &[self.iterations()]),
        );
        model.visit_params("", &mut |name: &str, t: &Tensor<E, D>| {
            let slots = [("m", &self.moment1), ("v", &self.moment2)];
            for (suffix, moments) in slots {
                if let Some(moment) = moments.get_ref_checked(t) {
                    let key = join_location(name, suffix);
                    let moment = t.device().to_vec(moment);
                    tensors.insert(key, TensorData::new(t.shape().to_vec(), &moment));
                }
            }
        });

        let views = tensors
            .iter()
            .map(|(k, t)| Ok((k.clone(), TensorView::new(t.dtype, t.shape.clone(), &t.data)?)))
            .collect::<Result<BTreeMap<String, TensorView>, ConfigError>>()?;
        serialize_to_file(&views, &None, path.as_ref())?;
        log::debug!(
            "saved {} optimizer state tensors to {}",
            views.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Restores state written by [AdamWeightDecay::save_safetensors] for the
    /// parameters of `model`.
    ///
    /// Everything is read and checked against `model` before the optimizer is
    /// modified. Parameters without saved moments are left alone.
    pub fn load_safetensors<P: AsRef<Path>>(
        &mut self,
        model: &M,
        path: P,
    ) -> Result<(), ConfigError> {
        let f = std::fs::File::open(path)?;
        let buffer = unsafe { MmapOptions::new().map(&f)? };
        let tensors = SafeTensors::deserialize(&buffer)?;

        let iterations = read_vec::<u64>(&tensors, ITERATIONS_KEY, 1)?[0];

        let names = tensors.names();
        let mut staged = Vec::new();
        let mut failed = None;
        model.visit_params("", &mut |name: &str, t: &Tensor<E, D>| {
            if failed.is_some() {
                return;
            }
            let m_key = join_location(name, "m");
            let v_key = join_location(name, "v");
            if !names.iter().any(|n| **n == m_key) {
                return;
            }
            let read = read_vec::<E>(&tensors, &m_key, t.len())
                .and_then(|m| Ok((m, read_vec::<E>(&tensors, &v_key, t.len())?)));
            match read {
                Ok((m, v)) => staged.push((t.clone(), m, v)),
                Err(err) => failed = Some(err),
            }
        });
        if let Some(err) = failed {
            return Err(err);
        }

        for (t, m, v) in staged {
            self.moment1.try_insert(&t, m)?;
            self.moment2.try_insert(&t, v)?;
        }
        self.set_iterations(iterations);
        Ok(())
    }
}
