//! Module for data type related traits. Contains [Dtype] and the byte conversions
//! used by safetensors checkpoints.

/// Represents a floating point element of a tensor that optimizers can update.
///
/// Hyperparameters are stored as `f64` and converted into the element type
/// right before a kernel runs, see [Dtype::from_f64_lossy].
pub trait Dtype:
    'static
    + Copy
    + Clone
    + Default
    + std::fmt::Debug
    + std::fmt::Display
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + std::marker::Unpin
    + std::ops::AddAssign
    + std::ops::SubAssign
    + std::ops::MulAssign
    + std::ops::DivAssign
    + num_traits::Float
    + SafeTensorsDtype
    + ToLeBytes
    + FromLeBytes
{
    /// Converts an `f64` into this dtype, rounding if the dtype is narrower.
    fn from_f64_lossy(value: f64) -> Self;

    /// Widens (or copies) this value into an `f64`.
    fn to_f64_lossy(self) -> f64;
}

impl Dtype for f32 {
    fn from_f64_lossy(value: f64) -> Self {
        value as f32
    }
    fn to_f64_lossy(self) -> f64 {
        self as f64
    }
}

impl Dtype for f64 {
    fn from_f64_lossy(value: f64) -> Self {
        value
    }
    fn to_f64_lossy(self) -> f64 {
        self
    }
}

/// Conversion trait for SafeTensors dtype
pub trait SafeTensorsDtype {
    #[cfg(feature = "safetensors")]
    const DTYPE: safetensors::tensor::Dtype;
}

macro_rules! dtype {
    ($type:ty, $dtype:ident) => {
        impl SafeTensorsDtype for $type {
            #[cfg(feature = "safetensors")]
            const DTYPE: safetensors::tensor::Dtype = safetensors::tensor::Dtype::$dtype;
        }
    };
}

dtype!(f32, F32);
dtype!(f64, F64);
dtype!(u64, U64);

/// Convert a type into a slice of little endian bytes.
pub trait ToLeBytes {
    type Array: IntoIterator<Item = u8>;
    fn to_le_bytes(self) -> Self::Array;
}

/// Convert slice of little endian bytes into a type.
///
/// `bytes` must hold exactly `size_of::<Self>()` bytes.
pub trait FromLeBytes {
    fn from_le_bytes(bytes: &[u8]) -> Self;
}

macro_rules! le_bytes {
    ($type:ty, $n:expr) => {
        impl ToLeBytes for $type {
            type Array = [u8; $n];
            fn to_le_bytes(self) -> Self::Array {
                <$type>::to_le_bytes(self)
            }
        }

        impl FromLeBytes for $type {
            fn from_le_bytes(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $n];
                buf.copy_from_slice(bytes);
                <$type>::from_le_bytes(buf)
            }
        }
    };
}

le_bytes!(f32, 4);
le_bytes!(f64, 8);
le_bytes!(u64, 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_bytes_matches_std() {
        let x = 0.123f32;
        let bytes: Vec<u8> = ToLeBytes::to_le_bytes(x).into_iter().collect();
        assert_eq!(bytes, x.to_le_bytes().to_vec());
        assert_eq!(<f32 as FromLeBytes>::from_le_bytes(&bytes), x);
    }

    #[test]
    fn test_lossy_casts() {
        assert_eq!(f32::from_f64_lossy(0.5), 0.5f32);
        assert_eq!(1e-6f64.to_f64_lossy(), 1e-6);
    }
}
