use std::ops::{Add, AddAssign};
use std::ptr;

use crate::simd::predicate::Predicate;
use crate::MAX_LANES;

/// A scalable vector of `f32` lanes with a predicate-defined active width.
///
/// Inactive lanes always hold `0.0` (zeroing predication), so lane-wise
/// arithmetic over the whole register never leaks stale data into a store.
#[derive(Copy, Clone, Debug)]
pub struct ScalableF32 {
    size: usize,
    elements: [f32; MAX_LANES],
}

impl ScalableF32 {
    /// Sets every active lane to `value`.
    #[inline(always)]
    pub fn splat(value: f32, pg: Predicate) -> Self {
        let mut elements = [0.0; MAX_LANES];
        elements[..pg.active()].fill(value);

        Self {
            size: pg.active(),
            elements,
        }
    }

    /// Loads the active lanes from `ptr`; inactive lanes are zeroed.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `pg.active()` consecutive `f32`s.
    #[inline(always)]
    pub unsafe fn load(ptr: *const f32, pg: Predicate) -> Self {
        debug_assert!(!ptr.is_null(), "Pointer must not be null");

        let mut elements = [0.0; MAX_LANES];
        ptr::copy_nonoverlapping(ptr, elements.as_mut_ptr(), pg.active());

        Self {
            size: pg.active(),
            elements,
        }
    }

    /// Safe counterpart of [`load`](Self::load).
    ///
    /// # Panics
    ///
    /// Panics if `slice` is shorter than the predicate's active width.
    #[inline(always)]
    pub fn from_slice(slice: &[f32], pg: Predicate) -> Self {
        assert!(
            slice.len() >= pg.active(),
            "Slice too short for predicate ({} < {})",
            slice.len(),
            pg.active()
        );

        unsafe { Self::load(slice.as_ptr(), pg) }
    }

    /// Writes the active lanes to `ptr`. Memory past them is not touched.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `self.active()` consecutive `f32`s
    /// and must not overlap this register.
    #[inline(always)]
    pub unsafe fn store(&self, ptr: *mut f32) {
        debug_assert!(!ptr.is_null(), "Pointer must not be null");

        ptr::copy_nonoverlapping(self.elements.as_ptr(), ptr, self.size);
    }

    /// Safe counterpart of [`store`](Self::store).
    ///
    /// # Panics
    ///
    /// Panics if `slice` is shorter than the active width.
    #[inline(always)]
    pub fn store_into(&self, slice: &mut [f32]) {
        assert!(
            slice.len() >= self.size,
            "Slice too short for store ({} < {})",
            slice.len(),
            self.size
        );

        unsafe { self.store(slice.as_mut_ptr()) }
    }

    #[inline(always)]
    pub const fn active(&self) -> usize {
        self.size
    }

    pub fn to_vec(self) -> Vec<f32> {
        self.elements[..self.size].to_vec()
    }
}

impl Add for ScalableF32 {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: Self) -> Self::Output {
        assert!(
            self.size == rhs.size,
            "Operands must have the same active width (got {} and {})",
            self.size,
            rhs.size
        );

        // Full-width loop so the compiler can keep it vectorized; inactive
        // lanes are 0.0 + 0.0.
        let mut elements = [0.0; MAX_LANES];
        for ((out, x), y) in elements
            .iter_mut()
            .zip(self.elements.iter())
            .zip(rhs.elements.iter())
        {
            *out = x + y;
        }

        Self {
            size: self.size,
            elements,
        }
    }
}

impl AddAssign for ScalableF32 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
