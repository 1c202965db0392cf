//! Run-time tuning for the slice-level entry points.
//!
//! The low-level kernels take their stride explicitly. [`VlaAdd`] has no
//! place for one, so it reads [`KernelConfig::global`], which starts from
//! the crate constants and applies any of these environment overrides:
//!
//! | Variable | Field | Accepts |
//! |----------|-------|---------|
//! | `VLASIMD_STRIDE` | `stride` | positive integer, or `auto` for hardware detection |
//! | `VLASIMD_VLA_THRESHOLD` | `vla_threshold` | integer |
//! | `VLASIMD_PARALLEL_THRESHOLD` | `parallel_threshold` | integer |
//! | `VLASIMD_PARALLEL_CHUNK` | `parallel_chunk_size` | positive integer |
//!
//! [`VlaAdd`]: crate::VlaAdd

use std::fmt;
use std::sync::OnceLock;

use crate::{
    error::{config_error, Result},
    simd::stride::{FixedStride, HardwareStride, Stride},
    PARALLEL_CHUNK_SIZE, PARALLEL_VLA_THRESHOLD, VLA_THRESHOLD,
};

pub const STRIDE_VAR: &str = "VLASIMD_STRIDE";
pub const VLA_THRESHOLD_VAR: &str = "VLASIMD_VLA_THRESHOLD";
pub const PARALLEL_THRESHOLD_VAR: &str = "VLASIMD_PARALLEL_THRESHOLD";
pub const PARALLEL_CHUNK_VAR: &str = "VLASIMD_PARALLEL_CHUNK";

/// Tuning knobs for [`VlaAdd`](crate::VlaAdd) and
/// [`par_vector_add`](crate::par_vector_add).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    /// Forced step width. `None` means detect it from the hardware.
    pub stride: Option<FixedStride>,
    /// Lengths below this use the scalar loop in `fast_add`.
    pub vla_threshold: usize,
    /// Lengths from this on use the parallel kernel in `fast_add`.
    pub parallel_threshold: usize,
    /// Elements per rayon task before rounding to the step width.
    pub parallel_chunk_size: usize,
}

impl KernelConfig {
    pub const DEFAULT: Self = Self {
        stride: None,
        vla_threshold: VLA_THRESHOLD,
        parallel_threshold: PARALLEL_VLA_THRESHOLD,
        parallel_chunk_size: PARALLEL_CHUNK_SIZE,
    };

    pub fn with_stride(mut self, stride: FixedStride) -> Self {
        self.stride = Some(stride);
        self
    }

    pub fn with_vla_threshold(mut self, threshold: usize) -> Self {
        self.vla_threshold = threshold;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_parallel_chunk_size(mut self, chunk_size: usize) -> Self {
        self.parallel_chunk_size = chunk_size;
        self
    }

    /// The stride source this configuration selects.
    pub fn stride_provider(&self) -> Stride {
        match self.stride {
            Some(fixed) => Stride::Fixed(fixed),
            None => Stride::Hardware(HardwareStride),
        }
    }

    /// Builds a configuration from [`DEFAULT`](Self::DEFAULT), overriding
    /// each field `lookup` has a value for.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::Config`](crate::VlaError::Config) for values that
    /// are not integers, and for a zero stride or chunk size.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::DEFAULT;

        if let Some(raw) = lookup(STRIDE_VAR) {
            config.stride = parse_stride(&raw)?;
        }
        if let Some(threshold) = parse_usize(&lookup, VLA_THRESHOLD_VAR)? {
            config.vla_threshold = threshold;
        }
        if let Some(threshold) = parse_usize(&lookup, PARALLEL_THRESHOLD_VAR)? {
            config.parallel_threshold = threshold;
        }
        if let Some(chunk_size) = parse_usize(&lookup, PARALLEL_CHUNK_VAR)? {
            if chunk_size == 0 {
                return Err(config_error(
                    PARALLEL_CHUNK_VAR,
                    "0",
                    "chunk size must be positive",
                ));
            }
            config.parallel_chunk_size = chunk_size;
        }

        Ok(config)
    }

    /// [`from_lookup`](Self::from_lookup) over the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// The process-wide configuration, read from the environment on first
    /// use. Invalid overrides are logged and replaced by the defaults.
    pub fn global() -> &'static KernelConfig {
        static CONFIG: OnceLock<KernelConfig> = OnceLock::new();

        CONFIG.get_or_init(|| match Self::from_env() {
            Ok(config) => {
                tracing::debug!(%config, "loaded kernel configuration");
                config
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid kernel configuration");
                Self::DEFAULT
            }
        })
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for KernelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stride {
            Some(fixed) => write!(f, "KernelConfig(stride={}", fixed.width())?,
            None => write!(f, "KernelConfig(stride=auto")?,
        }
        write!(
            f,
            ", vla_threshold={}, parallel_threshold={}, parallel_chunk={})",
            self.vla_threshold, self.parallel_threshold, self.parallel_chunk_size
        )
    }
}

fn parse_stride(raw: &str) -> Result<Option<FixedStride>> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }

    let width = trimmed
        .parse::<usize>()
        .map_err(|e| config_error(STRIDE_VAR, raw, e.to_string()))?;

    FixedStride::new(width)
        .map(Some)
        .map_err(|e| config_error(STRIDE_VAR, raw, e.to_string()))
}

fn parse_usize<F>(lookup: &F, key: &str) -> Result<Option<usize>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|e| config_error(key, raw.as_str(), e.to_string()))
        })
        .transpose()
}
