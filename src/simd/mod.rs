//! Scalable-vector building blocks and the kernels built from them.
//!
//! - [`stride`]: how many lanes a step may cover on this machine
//! - [`predicate`]: which lanes of a step are active
//! - [`vector`]: a software register with predicated load and store
//! - [`add`]: the element-wise addition kernels
//! - [`traits`]: slice-level entry points

pub mod add;
pub mod predicate;
pub mod stride;
pub mod traits;
pub mod vector;
