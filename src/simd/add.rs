//! Vector-length-agnostic element-wise addition.
//!
//! All entry points share one loop. Each iteration asks the stride provider
//! for a width, builds a [`Predicate`] over at most that many of the
//! remaining elements, and runs a predicated load / add / store:
//!
//! ```text
//! i = 0
//! while i < n:
//!     pg = whilelt(i, n, stride)
//!     c[i..i + pg] = a[i..i + pg] + b[i..i + pg]
//!     i += pg
//! ```
//!
//! A length that is not a multiple of the stride just gets a narrower last
//! predicate. Nothing at or past `c[n]` is read or written.
//!
//! | Function | Checks | Threads |
//! |----------|--------|---------|
//! | [`vector_add_unchecked`] | none (raw pointers) | 1 |
//! | [`vector_add`] | asserts buffer lengths | 1 |
//! | [`try_vector_add`] | returns [`VlaError`](crate::VlaError) | 1 |
//! | [`par_vector_add`] | asserts buffer lengths | rayon pool |

use rayon::prelude::*;

use crate::{
    config::KernelConfig,
    error::{invalid_stride, length_mismatch, Result},
    simd::{predicate::Predicate, stride::StrideProvider, traits::VlaAdd, vector::ScalableF32},
    MAX_LANES,
};

/// The predicated loop. Returns the number of steps taken.
///
/// # Safety
///
/// `a` and `b` must be valid for `n` reads and `c` for `n` writes. `c` may
/// alias neither input.
#[inline(always)]
unsafe fn add_predicated<S>(
    c: *mut f32,
    a: *const f32,
    b: *const f32,
    n: usize,
    stride: &S,
) -> Result<usize>
where
    S: StrideProvider + ?Sized,
{
    let mut i = 0;
    let mut steps = 0;

    while i < n {
        let width = stride.elements_per_step();
        if width == 0 {
            return Err(invalid_stride(width));
        }

        let pg = Predicate::while_lt(i, n, width);
        debug_assert!(
            pg.is_full(width) || i + pg.active() == n,
            "only the last step may be narrower than the stride"
        );

        let va = ScalableF32::load(a.add(i), pg);
        let vb = ScalableF32::load(b.add(i), pg);
        (va + vb).store(c.add(i));

        i += pg.active();
        steps += 1;
    }

    Ok(steps)
}

/// Computes `c[i] = a[i] + b[i]` for `i in 0..n` without bounds checks.
///
/// # Safety
///
/// - `a` and `b` must be valid for reads of `n` consecutive `f32`s.
/// - `c` must be valid for writes of `n` consecutive `f32`s and must not
///   overlap `a` or `b`.
/// - No other thread may access `c[..n]` during the call.
///
/// # Panics
///
/// Panics if `stride` ever reports a width of zero.
pub unsafe fn vector_add_unchecked<S>(
    c: *mut f32,
    a: *const f32,
    b: *const f32,
    n: usize,
    stride: &S,
) where
    S: StrideProvider + ?Sized,
{
    if let Err(e) = add_predicated(c, a, b, n, stride) {
        panic!("{e}");
    }
}

/// Computes `c[i] = a[i] + b[i]` for `i in 0..n`.
///
/// Elements of `c` at index `n` and beyond are left untouched.
///
/// # Panics
///
/// Panics if any buffer holds fewer than `n` elements, or if `stride`
/// reports a width of zero.
pub fn vector_add<S>(c: &mut [f32], a: &[f32], b: &[f32], n: usize, stride: &S)
where
    S: StrideProvider + ?Sized,
{
    assert!(a.len() >= n, "Input `a` shorter than length ({} < {n})", a.len());
    assert!(b.len() >= n, "Input `b` shorter than length ({} < {n})", b.len());
    assert!(c.len() >= n, "Output `c` shorter than length ({} < {n})", c.len());

    // SAFETY: lengths checked above; `&mut` rules out aliasing.
    unsafe { vector_add_unchecked(c.as_mut_ptr(), a.as_ptr(), b.as_ptr(), n, stride) }
}

/// Checked variant of [`vector_add`].
///
/// # Errors
///
/// - [`VlaError::LengthMismatch`](crate::VlaError::LengthMismatch) if a
///   buffer is shorter than `n`; nothing is written.
/// - [`VlaError::InvalidStride`](crate::VlaError::InvalidStride) if the
///   provider reports zero. Steps completed before that have been stored.
pub fn try_vector_add<S>(
    c: &mut [f32],
    a: &[f32],
    b: &[f32],
    n: usize,
    stride: &S,
) -> Result<()>
where
    S: StrideProvider + ?Sized,
{
    for (name, len) in [("a", a.len()), ("b", b.len()), ("c", c.len())] {
        if len < n {
            return Err(length_mismatch(name, n, len));
        }
    }

    // SAFETY: lengths checked above; `&mut` rules out aliasing.
    let steps = unsafe { add_predicated(c.as_mut_ptr(), a.as_ptr(), b.as_ptr(), n, stride) };
    steps.map(|_| ())
}

/// Parallel [`vector_add`] using the global
/// [`KernelConfig::parallel_chunk_size`].
///
/// # Panics
///
/// Same conditions as [`vector_add`].
pub fn par_vector_add<S>(c: &mut [f32], a: &[f32], b: &[f32], n: usize, stride: &S)
where
    S: StrideProvider + Sync + ?Sized,
{
    par_vector_add_chunked(
        c,
        a,
        b,
        n,
        stride,
        KernelConfig::global().parallel_chunk_size,
    )
}

/// Parallel [`vector_add`] with an explicit task size.
///
/// `chunk_size` is capped at `n` and rounded up to a multiple of the
/// current step width, so with a constant stride every task starts on the
/// same step boundary the sequential loop would use.
///
/// # Panics
///
/// Same conditions as [`vector_add`], and if `chunk_size` is zero.
#[tracing::instrument(level = "trace", skip(c, a, b, stride))]
pub fn par_vector_add_chunked<S>(
    c: &mut [f32],
    a: &[f32],
    b: &[f32],
    n: usize,
    stride: &S,
    chunk_size: usize,
) where
    S: StrideProvider + Sync + ?Sized,
{
    assert!(a.len() >= n, "Input `a` shorter than length ({} < {n})", a.len());
    assert!(b.len() >= n, "Input `b` shorter than length ({} < {n})", b.len());
    assert!(c.len() >= n, "Output `c` shorter than length ({} < {n})", c.len());
    assert!(chunk_size > 0, "Chunk size must be positive");

    if n == 0 {
        return;
    }

    let width = stride.elements_per_step().min(MAX_LANES);
    assert!(width > 0, "{}", invalid_stride(width));

    let chunk = chunk_size.min(n).div_ceil(width).saturating_mul(width);

    c[..n]
        .par_chunks_mut(chunk)
        .zip(a[..n].par_chunks(chunk))
        .zip(b[..n].par_chunks(chunk))
        .for_each(|((c_chunk, a_chunk), b_chunk)| {
            vector_add(c_chunk, a_chunk, b_chunk, c_chunk.len(), stride);
        });
}

/// Plain iterator addition, the reference the VLA kernels are checked
/// against.
#[inline(always)]
pub fn scalar_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    assert_eq!(a.len(), b.len(), "Vectors must be the same length");

    a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()
}

fn vla_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    assert_eq!(a.len(), b.len(), "Vectors must be the same length");

    let stride = KernelConfig::global().stride_provider();
    let mut c = vec![0.0f32; a.len()];
    vector_add(&mut c, a, b, a.len(), &stride);

    c
}

fn parallel_vla_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    assert_eq!(a.len(), b.len(), "Vectors must be the same length");

    let stride = KernelConfig::global().stride_provider();
    let mut c = vec![0.0f32; a.len()];
    par_vector_add(&mut c, a, b, a.len(), &stride);

    c
}

#[tracing::instrument(level = "debug", skip_all, fields(n = a.len()))]
fn fast_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    let config = KernelConfig::global();
    let n = a.len();

    if n < config.vla_threshold {
        tracing::debug!(path = "scalar", "fast_add dispatch");
        scalar_add(a, b)
    } else if n >= config.parallel_threshold {
        tracing::debug!(path = "parallel", "fast_add dispatch");
        parallel_vla_add(a, b)
    } else {
        tracing::debug!(path = "vla", "fast_add dispatch");
        vla_add(a, b)
    }
}

impl<'b> VlaAdd<&'b [f32]> for &[f32] {
    type Output = Vec<f32>;

    #[inline(always)]
    fn scalar_add(self, rhs: &'b [f32]) -> Self::Output {
        scalar_add(self, rhs)
    }

    #[inline(always)]
    fn vla_add(self, rhs: &'b [f32]) -> Self::Output {
        vla_add(self, rhs)
    }

    #[inline(always)]
    fn par_vla_add(self, rhs: &'b [f32]) -> Self::Output {
        parallel_vla_add(self, rhs)
    }

    #[inline(always)]
    fn fast_add(self, rhs: &'b [f32]) -> Self::Output {
        fast_add(self, rhs)
    }
}

impl VlaAdd<Vec<f32>> for Vec<f32> {
    type Output = Vec<f32>;

    #[inline(always)]
    fn scalar_add(self, rhs: Vec<f32>) -> Self::Output {
        scalar_add(&self, &rhs)
    }

    #[inline(always)]
    fn vla_add(self, rhs: Vec<f32>) -> Self::Output {
        vla_add(&self, &rhs)
    }

    #[inline(always)]
    fn par_vla_add(self, rhs: Vec<f32>) -> Self::Output {
        parallel_vla_add(&self, &rhs)
    }

    #[inline(always)]
    fn fast_add(self, rhs: Vec<f32>) -> Self::Output {
        fast_add(&self, &rhs)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::simd::stride::FixedStride;
    use crate::VlaError;

    /// Fixed width that counts how often it was asked, one query per step.
    struct CountingStride {
        width: usize,
        queries: Cell<usize>,
    }

    impl CountingStride {
        fn new(width: usize) -> Self {
            Self {
                width,
                queries: Cell::new(0),
            }
        }
    }

    impl StrideProvider for CountingStride {
        fn elements_per_step(&self) -> usize {
            self.queries.set(self.queries.get() + 1);
            self.width
        }
    }

    /// Answers from a script, then zero.
    struct ScriptedStride {
        widths: Vec<usize>,
        next: Cell<usize>,
    }

    impl StrideProvider for ScriptedStride {
        fn elements_per_step(&self) -> usize {
            let i = self.next.get();
            self.next.set(i + 1);
            self.widths.get(i).copied().unwrap_or(0)
        }
    }

    fn fixed(width: usize) -> FixedStride {
        FixedStride::new(width).unwrap()
    }

    #[test]
    fn test_example_independent_of_stride() {
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let b = [10.0f32, 20.0, 30.0, 40.0, 50.0];

        for width in [1, 2, 4, 8] {
            let mut c = [0.0f32; 5];
            vector_add(&mut c, &a, &b, 5, &fixed(width));
            assert_eq!(c, [11.0, 22.0, 33.0, 44.0, 55.0], "stride {width}");
        }
    }

    #[test]
    fn test_zero_length_does_nothing() {
        let stride = CountingStride::new(4);
        let empty: [f32; 0] = [];
        let mut c: [f32; 0] = [];
        vector_add(&mut c, &empty, &empty, 0, &stride);
        assert_eq!(stride.queries.get(), 0);

        // Non-empty buffers with n = 0 stay untouched.
        let mut c = [9.0f32; 3];
        vector_add(&mut c, &[1.0; 3], &[1.0; 3], 0, &stride);
        assert_eq!(c, [9.0; 3]);
        assert_eq!(stride.queries.get(), 0);
    }

    #[test]
    fn test_single_element() {
        let stride = CountingStride::new(16);
        let mut c = [0.0f32];
        vector_add(&mut c, &[1.5], &[2.25], 1, &stride);
        assert_eq!(c, [3.75]);
        assert_eq!(stride.queries.get(), 1);
    }

    #[test]
    fn test_length_equal_to_stride_takes_one_step() {
        for width in [1, 2, 4, 8, 16] {
            let a: Vec<f32> = (0..width).map(|i| i as f32).collect();
            let mut c = vec![0.0f32; width];
            let stride = CountingStride::new(width);

            vector_add(&mut c, &a, &a, width, &stride);

            assert_eq!(stride.queries.get(), 1, "stride {width}");
            assert_eq!(c, scalar_add(&a, &a));
        }
    }

    #[test]
    fn test_tail_step_touches_exactly_one_element() {
        let width = 4;
        let n = 3 * width + 1;
        let a: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let b = vec![100.0f32; n];

        // Output longer than n, with a sentinel past the end.
        let mut c = vec![f32::NAN; n + width];
        let stride = CountingStride::new(width);
        vector_add(&mut c, &a, &b, n, &stride);

        assert_eq!(stride.queries.get(), 4);
        assert_eq!(&c[..n], scalar_add(&a, &b).as_slice());
        assert!(c[n..].iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_step_count_is_ceil_div() {
        for width in [1, 3, 4, 7, 8] {
            for n in 0..40 {
                let a = vec![1.0f32; n];
                let mut c = vec![0.0f32; n];
                let stride = CountingStride::new(width);
                vector_add(&mut c, &a, &a, n, &stride);
                assert_eq!(stride.queries.get(), n.div_ceil(width));
            }
        }
    }

    #[test]
    fn test_stride_wider_than_register_is_clamped() {
        let n = 3 * MAX_LANES + 5;
        let a: Vec<f32> = (0..n).map(|i| i as f32 * 0.5).collect();
        let mut c = vec![0.0f32; n];
        let stride = CountingStride::new(10 * MAX_LANES);

        vector_add(&mut c, &a, &a, n, &stride);

        assert_eq!(c, scalar_add(&a, &a));
        assert_eq!(stride.queries.get(), 4);
    }

    #[test]
    fn test_varying_stride() {
        let n = 20;
        let a: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..n).map(|i| -(i as f32) * 2.0).collect();
        let stride = ScriptedStride {
            widths: vec![3, 8, 1, 5, 16],
            next: Cell::new(0),
        };

        let mut c = vec![0.0f32; n];
        vector_add(&mut c, &a, &b, n, &stride);

        assert_eq!(c, scalar_add(&a, &b));
        assert_eq!(stride.next.get(), 5);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let a: Vec<f32> = (0..1000).map(|i| (i as f32).sin()).collect();
        let b: Vec<f32> = (0..1000).map(|i| (i as f32).cos()).collect();

        let mut first = vec![0.0f32; 1000];
        let mut second = vec![0.0f32; 1000];
        vector_add(&mut first, &a, &b, 1000, &fixed(8));
        vector_add(&mut second, &a, &b, 1000, &fixed(8));

        assert_eq!(first, second);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![4.0f32, 5.0, 6.0];
        let (a0, b0) = (a.clone(), b.clone());
        let mut c = vec![0.0f32; 3];

        vector_add(&mut c, &a, &b, 3, &fixed(2));

        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn test_ieee_semantics() {
        let a = [f32::INFINITY, f32::NAN, -0.0, f32::MAX];
        let b = [f32::NEG_INFINITY, 1.0, -0.0, f32::MAX];
        let mut c = [0.0f32; 4];

        vector_add(&mut c, &a, &b, 4, &fixed(4));

        assert!(c[0].is_nan());
        assert!(c[1].is_nan());
        assert!(c[2] == 0.0 && c[2].is_sign_negative());
        assert_eq!(c[3], f32::INFINITY);
    }

    #[test]
    fn test_unchecked_matches_checked() {
        let a: Vec<f32> = (0..37).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..37).map(|i| (i * i) as f32).collect();
        let mut c = vec![0.0f32; 37];

        unsafe { vector_add_unchecked(c.as_mut_ptr(), a.as_ptr(), b.as_ptr(), 37, &fixed(4)) };

        assert_eq!(c, scalar_add(&a, &b));
    }

    #[test]
    #[should_panic(expected = "Input `b` shorter than length")]
    fn test_short_input_panics() {
        let mut c = [0.0f32; 4];
        vector_add(&mut c, &[1.0; 4], &[1.0; 3], 4, &fixed(4));
    }

    #[test]
    #[should_panic(expected = "Invalid stride")]
    fn test_zero_stride_panics() {
        let stride = ScriptedStride {
            widths: vec![],
            next: Cell::new(0),
        };
        let mut c = [0.0f32; 4];
        vector_add(&mut c, &[1.0; 4], &[1.0; 4], 4, &stride);
    }

    #[test]
    fn test_try_vector_add_errors() {
        let mut c = [0.0f32; 4];

        assert_eq!(
            try_vector_add(&mut c, &[1.0; 2], &[1.0; 4], 4, &fixed(4)),
            Err(VlaError::LengthMismatch {
                buffer: "a",
                required: 4,
                actual: 2
            })
        );
        assert_eq!(
            try_vector_add(&mut c[..3], &[1.0; 4], &[1.0; 4], 4, &fixed(4)),
            Err(VlaError::LengthMismatch {
                buffer: "c",
                required: 4,
                actual: 3
            })
        );
        assert_eq!(c, [0.0; 4]);

        let stride = ScriptedStride {
            widths: vec![2],
            next: Cell::new(0),
        };
        assert_eq!(
            try_vector_add(&mut c, &[1.0; 4], &[2.0; 4], 4, &stride),
            Err(VlaError::InvalidStride { stride: 0 })
        );
        // The first step completed before the provider failed.
        assert_eq!(c, [3.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_try_vector_add_ok() {
        let mut c = [0.0f32; 5];
        try_vector_add(
            &mut c,
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[10.0, 20.0, 30.0, 40.0, 50.0],
            5,
            &fixed(2),
        )
        .unwrap();
        assert_eq!(c, [11.0, 22.0, 33.0, 44.0, 55.0]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let n = 10_003;
        let a: Vec<f32> = (0..n).map(|i| i as f32 * 0.25).collect();
        let b: Vec<f32> = (0..n).map(|i| 1.0 / (i as f32 + 1.0)).collect();

        for width in [1, 3, 4, 8, 16] {
            let mut sequential = vec![0.0f32; n];
            let mut parallel = vec![0.0f32; n];
            vector_add(&mut sequential, &a, &b, n, &fixed(width));
            par_vector_add_chunked(&mut parallel, &a, &b, n, &fixed(width), 1000);

            assert_eq!(sequential, parallel, "stride {width}");
        }
    }

    #[test]
    fn test_parallel_huge_chunk_size() {
        let a: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let mut c = vec![0.0f32; 1000];

        par_vector_add_chunked(&mut c, &a, &a, 1000, &fixed(8), usize::MAX);

        assert_eq!(c, scalar_add(&a, &a));
    }

    #[test]
    fn test_parallel_with_configured_chunk_size() {
        let max = usize::MAX.to_string();
        let config = KernelConfig::from_lookup(|key| {
            (key == crate::config::PARALLEL_CHUNK_VAR).then(|| max.clone())
        })
        .unwrap();
        let a: Vec<f32> = (0..777).map(|i| i as f32 * 0.5).collect();
        let mut c = vec![0.0f32; 777];

        par_vector_add_chunked(&mut c, &a, &a, 777, &fixed(8), config.parallel_chunk_size);

        assert_eq!(c, scalar_add(&a, &a));
    }

    #[test]
    fn test_parallel_respects_length() {
        let mut c = vec![-1.0f32; 100];
        par_vector_add_chunked(&mut c, &[1.0; 100], &[1.0; 100], 50, &fixed(4), 7);
        assert!(c[..50].iter().all(|&x| x == 2.0));
        assert!(c[50..].iter().all(|&x| x == -1.0));
    }
}
