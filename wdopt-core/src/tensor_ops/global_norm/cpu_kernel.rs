use super::GlobalNormKernel;
use crate::{
    dtypes::Dtype,
    tensor::{Cpu, Error},
};

impl<E: Dtype> GlobalNormKernel<E> for Cpu {
    fn sum_squares(&self, v: &Self::Vec) -> Result<f64, Error> {
        Ok(v.iter()
            .map(|x| {
                let x = x.to_f64_lossy();
                x * x
            })
            .sum())
    }

    fn scale(&self, v: &mut Self::Vec, factor: f64) -> Result<(), Error> {
        let factor = E::from_f64_lossy(factor);
        for x in v.iter_mut() {
            *x *= factor;
        }
        Ok(())
    }
}
