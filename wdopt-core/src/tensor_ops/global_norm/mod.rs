mod cpu_kernel;

use crate::{
    dtypes::Dtype,
    tensor::{Error, Gradients, Storage, UniqueId},
};

/// Reductions and rescaling used by global norm clipping.
pub trait GlobalNormKernel<E: Dtype>: Storage<E> {
    /// Sum of squares of every element, accumulated in `f64`.
    fn sum_squares(&self, v: &Self::Vec) -> Result<f64, Error>;

    /// Multiplies every element by `factor`.
    fn scale(&self, v: &mut Self::Vec, factor: f64) -> Result<(), Error>;
}

/// The factor that brings a set of gradients with combined norm `global_norm`
/// down to at most `clip_norm`: `clip_norm / max(global_norm, clip_norm)`.
///
/// A non finite `global_norm` yields NaN, so every clipped gradient becomes NaN
/// instead of silently turning into zeros.
pub fn clip_scale(global_norm: f64, clip_norm: f64) -> f64 {
    if !global_norm.is_finite() {
        return f64::NAN;
    }
    clip_norm / global_norm.max(clip_norm)
}

impl<E: Dtype, D: GlobalNormKernel<E>> Gradients<E, D> {
    /// The combined L2 norm of the gradients of `ids`, treating them as one
    /// flat vector. Sparse gradients contribute their values. Ids without a
    /// gradient are skipped.
    pub fn try_global_norm(&self, ids: &[UniqueId]) -> Result<f64, Error> {
        let dev = D::default();
        let mut sum = 0.0;
        for id in ids {
            if let Some(g) = self.dense_by_id(id) {
                sum += dev.sum_squares(g)?;
            } else if let Some(g) = self.sparse_by_id(id) {
                sum += dev.sum_squares(&g.values)?;
            }
        }
        Ok(sum.sqrt())
    }

    /// Rescales the gradients of `ids` jointly so that their combined L2 norm
    /// is at most `clip_norm`. Relative magnitudes and directions are kept.
    ///
    /// Returns the norm **before** clipping.
    pub fn try_clip_by_global_norm(
        &mut self,
        ids: &[UniqueId],
        clip_norm: f64,
    ) -> Result<f64, Error> {
        let global_norm = self.try_global_norm(ids)?;
        let factor = clip_scale(global_norm, clip_norm);
        log::trace!("clip_by_global_norm: norm={global_norm} clip_norm={clip_norm} factor={factor}");
        if factor == 1.0 {
            return Ok(global_norm);
        }
        let dev = D::default();
        for id in ids {
            if let Some(g) = self.dense_by_id_mut(id) {
                dev.scale(g, factor)?;
            } else if let Some(g) = self.sparse_by_id_mut(id) {
                dev.scale(&mut g.values, factor)?;
            }
        }
        Ok(global_norm)
    }
}
