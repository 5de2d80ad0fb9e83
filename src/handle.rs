//! Handle encoding.
//!
//! A handle crosses the boundary as a 32-bit integer whose low bit selects
//! the table region: even values index the reference-counted heap region,
//! odd values index the transient stack region. Host-side code never works
//! with the raw form directly; it dispatches on the [`Handle`] variants.

/// A reference to a host-side value, tagged by table region.
///
/// The region of a handle is fixed at creation. Promotion from the stack
/// region to the heap region always produces a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    /// Index into the transient stack region.
    Stack(u32),
    /// Index into the reference-counted heap region.
    Heap(u32),
}

impl Handle {
    /// Decode the 32-bit wire form.
    pub fn from_raw(raw: u32) -> Self {
        if raw & 1 == 1 {
            Handle::Stack(raw >> 1)
        } else {
            Handle::Heap(raw >> 1)
        }
    }

    /// Encode to the 32-bit wire form.
    pub fn raw(self) -> u32 {
        match self {
            Handle::Stack(index) => (index << 1) | 1,
            Handle::Heap(index) => index << 1,
        }
    }

    /// Index within the handle's table region.
    pub fn index(self) -> u32 {
        match self {
            Handle::Stack(index) | Handle::Heap(index) => index,
        }
    }

    /// Check if the handle points into the heap region.
    pub fn is_heap(self) -> bool {
        matches!(self, Handle::Heap(_))
    }

    /// Check if the handle points into the stack region.
    pub fn is_stack(self) -> bool {
        matches!(self, Handle::Stack(_))
    }
}
