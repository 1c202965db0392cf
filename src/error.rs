//! Error types for vlasimd operations.
//!
//! The unchecked and panicking kernels never produce these; they are
//! returned by the checked entry points and by configuration loading.

use thiserror::Error;

/// Errors that can occur during vlasimd operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VlaError {
    /// A buffer holds fewer elements than the requested length.
    #[error("Buffer `{buffer}` too short: {required} elements required, {actual} available")]
    LengthMismatch {
        /// Which operand was too short (`a`, `b` or `c`).
        buffer: &'static str,
        /// The element count the call asked for.
        required: usize,
        /// The element count the buffer actually holds.
        actual: usize,
    },
    /// A stride provider reported a step width of zero.
    #[error("Invalid stride: {stride} elements per step (must be positive)")]
    InvalidStride {
        /// The rejected step width.
        stride: usize,
    },
    /// A configuration value could not be parsed.
    #[error("Invalid configuration value {value:?} for {key}: {message}")]
    Config {
        /// The configuration key, e.g. `VLASIMD_STRIDE`.
        key: String,
        /// The raw value that was rejected.
        value: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Result type alias for vlasimd operations.
pub type Result<T> = std::result::Result<T, VlaError>;

/// Creates a length mismatch error.
pub fn length_mismatch(buffer: &'static str, required: usize, actual: usize) -> VlaError {
    VlaError::LengthMismatch {
        buffer,
        required,
        actual,
    }
}

/// Creates an invalid stride error.
pub fn invalid_stride(stride: usize) -> VlaError {
    VlaError::InvalidStride { stride }
}

/// Creates a configuration error.
pub fn config_error(
    key: impl Into<String>,
    value: impl Into<String>,
    message: impl Into<String>,
) -> VlaError {
    VlaError::Config {
        key: key.into(),
        value: value.into(),
        message: message.into(),
    }
}
