//! Buffer control (spec.md §4.4): the block buffer (quantised-coefficient
//! rows, DCT paths) and the line buffer (reconstructed-sample rows,
//! lossless/JPEG-LS paths), both built from a shared free-list pool so
//! rows/lines are recycled rather than reallocated at every MCU row.
pub mod block_buffer;
pub mod line_buffer;

pub use block_buffer::{BlockBuffer, QuantisedBlock, QuantisedRow};
pub use line_buffer::{Line, LineBuffer};

/// A pool of reusable row/line allocations (spec.md §9 "Manual arenas"):
/// the buffer control owns it and hands out/reclaims entries explicitly at
/// MCU-row boundaries rather than relying on a general-purpose allocator.
pub struct FreeList<T> {
    free: Vec<T>,
}

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        FreeList { free: Vec::new() }
    }
}

impl<T> FreeList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a free entry if one is available, or build a fresh one.
    pub fn take_or_else(&mut self, make: impl FnOnce() -> T) -> T {
        self.free.pop().unwrap_or_else(make)
    }

    /// Return an entry to the pool for reuse on a later MCU row.
    pub fn recycle(&mut self, item: T) {
        self.free.push(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}
