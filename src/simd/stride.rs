//! Step-width discovery.
//!
//! The kernels never hard-code a vector width. They ask a [`StrideProvider`]
//! how many `f32` lanes one step may cover, once per iteration. In
//! production that is [`HardwareStride`], which inspects the running CPU;
//! tests and tuning overrides use [`FixedStride`].
//!
//! # Detection order
//!
//! | Architecture | Extension | Lanes per step |
//! |--------------|-----------|----------------|
//! | AArch64 | SVE | `cntw` (4..=64, implementation defined) |
//! | AArch64 | NEON | 4 |
//! | x86 / x86_64 | AVX-512F | 16 |
//! | x86 / x86_64 | AVX2 | 8 |
//! | x86 / x86_64 | SSE2 | 4 |
//! | anything else | none | 1 |

use std::fmt;
use std::sync::OnceLock;

use crate::error::{invalid_stride, Result};

/// Source of the number of elements processed per loop step.
///
/// Implementations must return a positive count. The kernels clamp it to
/// [`MAX_LANES`](crate::MAX_LANES) and to the number of remaining elements.
pub trait StrideProvider {
    fn elements_per_step(&self) -> usize;
}

impl<T: StrideProvider + ?Sized> StrideProvider for &T {
    #[inline(always)]
    fn elements_per_step(&self) -> usize {
        (**self).elements_per_step()
    }
}

/// A constant step width.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FixedStride {
    width: usize,
}

impl FixedStride {
    /// Creates a provider that always answers `width`.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::InvalidStride`](crate::VlaError::InvalidStride)
    /// when `width` is zero.
    pub fn new(width: usize) -> Result<Self> {
        if width == 0 {
            return Err(invalid_stride(width));
        }

        Ok(Self { width })
    }

    pub const fn width(&self) -> usize {
        self.width
    }
}

impl StrideProvider for FixedStride {
    #[inline(always)]
    fn elements_per_step(&self) -> usize {
        self.width
    }
}

/// Instruction set the detected step width comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Isa {
    Sve,
    Neon,
    Avx512,
    Avx2,
    Sse2,
    Scalar,
}

impl fmt::Display for Isa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Isa::Sve => "sve",
            Isa::Neon => "neon",
            Isa::Avx512 => "avx512f",
            Isa::Avx2 => "avx2",
            Isa::Sse2 => "sse2",
            Isa::Scalar => "scalar",
        };
        f.write_str(name)
    }
}

/// What the running CPU offers for vector work.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VectorCapability {
    pub isa: Isa,
    /// Vector register width in bits.
    pub vector_bits: usize,
}

impl VectorCapability {
    /// Number of 32-bit lanes in one register, at least one.
    pub const fn lanes(&self) -> usize {
        let lanes = self.vector_bits / 32;
        if lanes == 0 {
            1
        } else {
            lanes
        }
    }
}

impl fmt::Display for VectorCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bits, {} x f32 per step)",
            self.isa,
            self.vector_bits,
            self.lanes()
        )
    }
}

/// Step width read from the running CPU.
///
/// Detection runs once per process; every later query is a load from a
/// `OnceLock`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HardwareStride;

impl HardwareStride {
    pub fn capability(&self) -> VectorCapability {
        detect()
    }
}

impl StrideProvider for HardwareStride {
    #[inline(always)]
    fn elements_per_step(&self) -> usize {
        detect().lanes()
    }
}

/// Either stride source, chosen at run time from
/// [`KernelConfig`](crate::KernelConfig).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stride {
    Fixed(FixedStride),
    Hardware(HardwareStride),
}

impl StrideProvider for Stride {
    #[inline(always)]
    fn elements_per_step(&self) -> usize {
        match self {
            Stride::Fixed(fixed) => fixed.elements_per_step(),
            Stride::Hardware(hardware) => hardware.elements_per_step(),
        }
    }
}

impl Default for Stride {
    fn default() -> Self {
        Stride::Hardware(HardwareStride)
    }
}

/// The highest-priority CPU feature `build.rs` saw on the build host, or
/// `fallback` for cross builds and unknown hosts.
pub fn build_feature() -> &'static str {
    env!("VLASIMD_BUILD_FEATURE")
}

/// Returns the vector capability of the running CPU.
pub fn detect() -> VectorCapability {
    static CAPABILITY: OnceLock<VectorCapability> = OnceLock::new();

    *CAPABILITY.get_or_init(|| {
        let capability = probe();
        tracing::debug!(
            isa = %capability.isa,
            vector_bits = capability.vector_bits,
            lanes = capability.lanes(),
            build_feature = build_feature(),
            "detected vector capability"
        );
        capability
    })
}

#[cfg(target_arch = "aarch64")]
fn probe() -> VectorCapability {
    if std::arch::is_aarch64_feature_detected!("sve") {
        // SAFETY: SVE availability was checked just above.
        let lanes = unsafe { sve_f32_lanes() };
        return VectorCapability {
            isa: Isa::Sve,
            vector_bits: lanes * 32,
        };
    }

    if std::arch::is_aarch64_feature_detected!("neon") {
        return VectorCapability {
            isa: Isa::Neon,
            vector_bits: 128,
        };
    }

    SCALAR
}

/// Reads the SVE vector length as a count of 32-bit lanes.
///
/// # Safety
///
/// The CPU must implement SVE, otherwise `cntw` raises an undefined
/// instruction exception.
#[cfg(target_arch = "aarch64")]
#[inline(never)]
unsafe fn sve_f32_lanes() -> usize {
    let lanes: usize;
    core::arch::asm!(
        ".arch_extension sve",
        "cntw {lanes}",
        lanes = out(reg) lanes,
        options(pure, nomem, nostack, preserves_flags),
    );
    lanes
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn probe() -> VectorCapability {
    if is_x86_feature_detected!("avx512f") {
        VectorCapability {
            isa: Isa::Avx512,
            vector_bits: 512,
        }
    } else if is_x86_feature_detected!("avx2") {
        VectorCapability {
            isa: Isa::Avx2,
            vector_bits: 256,
        }
    } else if is_x86_feature_detected!("sse2") {
        VectorCapability {
            isa: Isa::Sse2,
            vector_bits: 128,
        }
    } else {
        SCALAR
    }
}

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86", target_arch = "x86_64")))]
fn probe() -> VectorCapability {
    SCALAR
}

const SCALAR: VectorCapability = VectorCapability {
    isa: Isa::Scalar,
    vector_bits: 32,
};
