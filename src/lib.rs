//! # vlasimd
//!
//! Vector-length-agnostic element-wise kernels for `f32` slices.
//!
//! The kernels follow the shape of an ARM SVE loop: every step asks a
//! [`StrideProvider`] how many lanes the machine can process, builds a
//! [`Predicate`] covering at most that many of the remaining elements, and
//! performs a predicated load, add and store. The last step simply has a
//! narrower predicate, so there is no separate scalar remainder loop.
//!
//! ```rust
//! use vlasimd::{vector_add, FixedStride};
//!
//! let a = [1.0f32, 2.0, 3.0, 4.0, 5.0];
//! let b = [10.0f32, 20.0, 30.0, 40.0, 50.0];
//! let mut c = [0.0f32; 5];
//!
//! vector_add(&mut c, &a, &b, a.len(), &FixedStride::new(4).unwrap());
//! assert_eq!(c, [11.0, 22.0, 33.0, 44.0, 55.0]);
//! ```
//!
//! For whole slices the [`VlaAdd`] trait offers scalar, VLA and parallel VLA
//! variants, plus [`VlaAdd::fast_add`] which picks one based on
//! [`KernelConfig`] thresholds.

pub mod config;
pub mod error;
pub mod simd;

pub use config::KernelConfig;
pub use error::{Result, VlaError};
pub use simd::add::{
    par_vector_add, par_vector_add_chunked, scalar_add, try_vector_add, vector_add,
    vector_add_unchecked,
};
pub use simd::predicate::Predicate;
pub use simd::stride::{FixedStride, HardwareStride, Stride, StrideProvider};
pub use simd::traits::VlaAdd;
pub use simd::vector::ScalableF32;

/// Widest register the kernels model: 2048 bits (the SVE architectural
/// maximum) of 32-bit lanes. Larger strides are clamped to this.
pub const MAX_LANES: usize = 2048 / 32;

/// Below this length `fast_add` uses the scalar loop.
pub const VLA_THRESHOLD: usize = 16;

/// From this length on `fast_add` splits the work across the rayon pool.
pub const PARALLEL_VLA_THRESHOLD: usize = 262_144;

/// Elements per rayon task, rounded up to a multiple of the step width.
pub const PARALLEL_CHUNK_SIZE: usize = 16_384;
