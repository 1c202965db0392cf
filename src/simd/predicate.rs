//! Active-lane masks for one loop step.

use crate::MAX_LANES;

/// The lanes of a step that take part in loads, arithmetic and stores.
///
/// Active lanes are always a prefix `0..active`, which is what SVE's
/// `whilelt` produces for a forward loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    active: usize,
}

impl Predicate {
    /// Lanes `j` for which `i + j < n`, capped at `width` and
    /// [`MAX_LANES`].
    #[inline(always)]
    pub fn while_lt(i: usize, n: usize, width: usize) -> Self {
        let remaining = n.saturating_sub(i);

        Self {
            active: width.min(MAX_LANES).min(remaining),
        }
    }

    /// Every lane of a `width`-lane register.
    #[inline(always)]
    pub fn all(width: usize) -> Self {
        Self {
            active: width.min(MAX_LANES),
        }
    }

    #[inline(always)]
    pub const fn active(&self) -> usize {
        self.active
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// True when no lane of a `width`-lane register is masked off.
    #[inline(always)]
    pub fn is_full(&self, width: usize) -> bool {
        self.active == width.min(MAX_LANES)
    }

    #[inline(always)]
    pub const fn is_active(&self, lane: usize) -> bool {
        lane < self.active
    }
}
