/// Represents a number of different errors that can occur from creating tensors,
/// storing gradients, or launching optimizer kernels.
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// Device is out of memory
    OutOfMemory,
    /// Not enough elements were provided when creating a tensor or gradient
    WrongNumElements,
    /// A sparse gradient referenced an element outside of its parameter.
    IndexOutOfBounds { index: usize, len: usize },
    /// A sparse gradient was handed to an optimizer that only applies dense updates.
    /// Holds the name of the offending parameter.
    SparseGradientsUnsupported(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::WrongNumElements => f.write_str("wrong number of elements"),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for tensor of length {len}")
            }
            Self::SparseGradientsUnsupported(name) => {
                write!(f, "sparse gradient updates are not supported (parameter `{name}`)")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
