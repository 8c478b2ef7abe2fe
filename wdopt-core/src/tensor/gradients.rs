//! Generic containers keyed by the [UniqueId] of the tensor they belong to, via [Gradients].

use std::collections::{btree_map::Entry, BTreeMap};
use std::vec::Vec;

use super::{storage::Storage, unique_id, Error, Tensor, UniqueId};

/// A gradient that only touches some elements of its parameter, e.g. from an
/// embedding lookup. `values[i]` belongs to element `indices[i]` of the
/// flattened parameter.
#[derive(Clone, Debug)]
pub struct SparseGradient<V> {
    pub indices: Vec<usize>,
    pub values: V,
}

/// A generic container for keeping gradients of tensors keyed by the
/// tensor's [UniqueId].
///
/// You can:
/// 1. Insert dense or sparse values into it
/// 2. Remove entries
/// 3. Access references to arrays
/// 4. Access mutable references to arrays, allocating zeroed ones on demand
///
/// Optimizers use the same container for their per-parameter slots.
#[derive(Clone, Debug)]
pub struct Gradients<E, D: Storage<E>> {
    /// Using BTreeMap so iteration order is deterministic
    gradient_by_id: BTreeMap<UniqueId, D::Vec>,
    sparse_by_id: BTreeMap<UniqueId, SparseGradient<D::Vec>>,
}

impl<E, D: Storage<E>> Default for Gradients<E, D> {
    fn default() -> Self {
        Self::leaky()
    }
}

impl<E, D: Storage<E>> Gradients<E, D> {
    /// Creates an empty [Gradients] object. Nothing is ever dropped from it
    /// implicitly, entries stay until they are removed or overwritten.
    pub fn leaky() -> Self {
        Self {
            gradient_by_id: Default::default(),
            sparse_by_id: Default::default(),
        }
    }
}

impl<E, D: Storage<E>> Gradients<E, D> {
    /// Retrieves mutable gradient for `t`, allocating a zeroed one if it isn't present.
    pub fn get_or_alloc_mut(&mut self, t: &Tensor<E, D>) -> Result<&mut D::Vec, Error> {
        match self.gradient_by_id.entry(t.id) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => Ok(e.insert(t.device.try_alloc_grad(&t.data)?)),
        }
    }

    /// Stores a dense gradient for `t`, replacing whatever was there.
    pub fn try_insert(&mut self, t: &Tensor<E, D>, data: Vec<E>) -> Result<(), Error> {
        if data.len() != t.len() {
            return Err(Error::WrongNumElements);
        }
        let data = t.device.try_from_vec(data)?;
        self.sparse_by_id.remove(&t.id);
        self.gradient_by_id.insert(t.id, data);
        Ok(())
    }

    /// Stores a sparse gradient for `t`, replacing whatever was there.
    pub fn try_insert_sparse(
        &mut self,
        t: &Tensor<E, D>,
        indices: Vec<usize>,
        values: Vec<E>,
    ) -> Result<(), Error> {
        if indices.len() != values.len() {
            return Err(Error::WrongNumElements);
        }
        let len = t.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let values = t.device.try_from_vec(values)?;
        self.gradient_by_id.remove(&t.id);
        self.sparse_by_id
            .insert(t.id, SparseGradient { indices, values });
        Ok(())
    }

    /// Returns a reference to the dense gradient if found.
    pub fn get_ref_checked(&self, t: &Tensor<E, D>) -> Option<&D::Vec> {
        self.gradient_by_id.get(&t.id)
    }

    /// Returns a reference to the sparse gradient if found.
    pub fn get_sparse_checked(&self, t: &Tensor<E, D>) -> Option<&SparseGradient<D::Vec>> {
        self.sparse_by_id.get(&t.id)
    }

    /// Clones the dense gradient and transforms it into a tensor with the shape of `t`.
    pub fn get(&self, t: &Tensor<E, D>) -> Option<Tensor<E, D>> {
        let buf = self.gradient_by_id.get(&t.id)?.clone();
        Some(Tensor {
            id: unique_id(),
            data: std::sync::Arc::new(buf),
            shape: t.shape.clone(),
            device: t.device.clone(),
        })
    }

    /// Whether a dense or sparse gradient is stored for `t`.
    pub fn contains(&self, t: &Tensor<E, D>) -> bool {
        self.gradient_by_id.contains_key(&t.id) || self.sparse_by_id.contains_key(&t.id)
    }

    /// Removes any gradient stored for `t`.
    pub fn remove(&mut self, t: &Tensor<E, D>) {
        self.gradient_by_id.remove(&t.id);
        self.sparse_by_id.remove(&t.id);
    }

    pub fn is_empty(&self) -> bool {
        self.gradient_by_id.is_empty() && self.sparse_by_id.is_empty()
    }

    /// Number of tensors with a gradient.
    pub fn len(&self) -> usize {
        self.gradient_by_id.len() + self.sparse_by_id.len()
    }

    pub(crate) fn dense_by_id(&self, id: &UniqueId) -> Option<&D::Vec> {
        self.gradient_by_id.get(id)
    }

    pub(crate) fn dense_by_id_mut(&mut self, id: &UniqueId) -> Option<&mut D::Vec> {
        self.gradient_by_id.get_mut(id)
    }

    pub(crate) fn sparse_by_id(&self, id: &UniqueId) -> Option<&SparseGradient<D::Vec>> {
        self.sparse_by_id.get(id)
    }

    pub(crate) fn sparse_by_id_mut(
        &mut self,
        id: &UniqueId,
    ) -> Option<&mut SparseGradient<D::Vec>> {
        self.sparse_by_id.get_mut(id)
    }
}
