#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kernel {
    Auto,
    Scalar,
    Wide8,
    Wide16,
    ScalarBatch,
    WideBatch,
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Auto
    }
}

impl Kernel {
    #[inline(always)]
    pub const fn is_batch(self) -> bool {
        matches!(self, Kernel::ScalarBatch | Kernel::WideBatch)
    }

    /// Lane-group width of the wide kernels. All kernels here are integer
    /// code, so every width produces bit-identical sums; only speed differs.
    #[inline(always)]
    pub const fn lanes(self) -> usize {
        match self {
            Kernel::Wide16 => 16,
            Kernel::Wide8 | Kernel::WideBatch => 8,
            _ => 1,
        }
    }
}
