/// Element-wise addition over whole slices, returning a new vector.
///
/// All variants panic when the operands differ in length.
pub trait VlaAdd<Rhs = Self> {
    type Output;

    /// Sequential iterator addition.
    fn scalar_add(self, rhs: Rhs) -> Self::Output;

    /// Single-threaded predicated loop with the configured stride.
    fn vla_add(self, rhs: Rhs) -> Self::Output;

    /// Predicated loop split across the rayon pool.
    fn par_vla_add(self, rhs: Rhs) -> Self::Output;

    /// Picks one of the above from the
    /// [`KernelConfig`](crate::KernelConfig) thresholds.
    fn fast_add(self, rhs: Rhs) -> Self::Output;
}
