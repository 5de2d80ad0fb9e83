//! Guest linear memory and view overlays.
//!
//! The guest buffer grows in whole pages and every successful growth
//! replaces the backing allocation, so typed access never touches the
//! buffer directly: it goes through [`MemoryView`]/[`MemoryViewMut`]
//! overlays obtained from a [`ViewCache`]-guarded context.

use alloc::vec::Vec;

use crate::BridgeError;

/// Page size in bytes (64 KB).
pub const PAGE_SIZE: usize = 65536;

/// Maximum memory size (4 GB).
pub const MAX_MEMORY_SIZE: usize = 4 * 1024 * 1024 * 1024;

/// Linear memory for a guest module.
pub struct LinearMemory {
    /// Memory data.
    data: Vec<u8>,

    /// Current size in pages.
    current_pages: u32,

    /// Maximum size in pages (if specified).
    max_pages: Option<u32>,

    /// Bumped whenever the backing buffer is replaced by growth.
    generation: u64,
}

impl LinearMemory {
    /// Create a new linear memory.
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, BridgeError> {
        let initial_size = initial_pages as usize * PAGE_SIZE;

        if initial_size > MAX_MEMORY_SIZE {
            return Err(BridgeError::MemoryError(
                "Initial memory size exceeds maximum".into(),
            ));
        }

        if let Some(max) = max_pages {
            if (max as usize * PAGE_SIZE) > MAX_MEMORY_SIZE {
                return Err(BridgeError::MemoryError(
                    "Maximum memory size exceeds limit".into(),
                ));
            }
            if initial_pages > max {
                return Err(BridgeError::MemoryError(
                    "Initial pages exceeds maximum pages".into(),
                ));
            }
        }

        let mut data = Vec::new();
        data.resize(initial_size, 0);

        Ok(LinearMemory {
            data,
            current_pages: initial_pages,
            max_pages,
            generation: 0,
        })
    }

    /// Get the current size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get the current size in pages.
    pub fn pages(&self) -> u32 {
        self.current_pages
    }

    /// Get the maximum size in pages.
    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Buffer replacement counter. Views built against an older generation
    /// are stale and must be rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Grow memory by the specified number of pages.
    /// Returns the previous size in pages, or an error if growth fails.
    pub fn grow(&mut self, delta_pages: u32) -> Result<u32, BridgeError> {
        let new_pages = self
            .current_pages
            .checked_add(delta_pages)
            .ok_or_else(|| BridgeError::MemoryError("Page count overflow".into()))?;

        if let Some(max) = self.max_pages {
            if new_pages > max {
                return Err(BridgeError::MemoryError(
                    "Would exceed maximum memory size".into(),
                ));
            }
        }

        let new_size = new_pages as usize * PAGE_SIZE;
        if new_size > MAX_MEMORY_SIZE {
            return Err(BridgeError::MemoryError(
                "Would exceed absolute maximum memory size".into(),
            ));
        }

        let old_pages = self.current_pages;
        if delta_pages > 0 {
            self.data.resize(new_size, 0);
            self.current_pages = new_pages;
            self.generation += 1;
            log::debug!("[Memory] grew {} -> {} pages", old_pages, new_pages);
        }

        Ok(old_pages)
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Tracks which buffer generation the current overlays were built against.
///
/// Call [`ViewCache::refresh`] before handing out a view; the invariant is
/// that no access ever goes through an overlay older than the buffer.
#[derive(Debug)]
pub struct ViewCache {
    /// Generation the overlays were last built against.
    generation: Option<u64>,

    /// How many times the overlays were (re)built.
    rebuilds: u64,
}

impl ViewCache {
    /// Create a cache with no overlays built yet.
    pub fn new() -> Self {
        ViewCache {
            generation: None,
            rebuilds: 0,
        }
    }

    /// Revalidate against the memory's current generation.
    /// Returns true if the overlays had to be rebuilt.
    pub fn refresh(&mut self, memory: &LinearMemory) -> bool {
        if self.generation == Some(memory.generation()) {
            return false;
        }
        self.generation = Some(memory.generation());
        self.rebuilds += 1;
        true
    }

    /// Number of times the overlays were (re)built.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only byte/word overlay over the guest buffer.
pub struct MemoryView<'m> {
    data: &'m [u8],
}

impl<'m> MemoryView<'m> {
    pub(crate) fn new(memory: &'m LinearMemory) -> Self {
        MemoryView {
            data: memory.data(),
        }
    }

    /// Size of the viewed buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the viewed buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a byte.
    pub fn byte(&self, offset: usize) -> Result<u8, BridgeError> {
        check_bounds(self.data, offset, 1)?;
        Ok(self.data[offset])
    }

    /// Read a byte range.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'m [u8], BridgeError> {
        check_bounds(self.data, offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Read the 32-bit word at a word index (little-endian).
    pub fn word(&self, index: usize) -> Result<u32, BridgeError> {
        read_word(self.data, index)
    }
}

/// Mutable byte/word overlay over the guest buffer.
pub struct MemoryViewMut<'m> {
    data: &'m mut [u8],
}

impl<'m> MemoryViewMut<'m> {
    pub(crate) fn new(memory: &'m mut LinearMemory) -> Self {
        MemoryViewMut {
            data: memory.data_mut(),
        }
    }

    /// Size of the viewed buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the viewed buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the 32-bit word at a word index (little-endian).
    pub fn word(&self, index: usize) -> Result<u32, BridgeError> {
        read_word(self.data, index)
    }

    /// Write a byte.
    pub fn set_byte(&mut self, offset: usize, value: u8) -> Result<(), BridgeError> {
        check_bounds(self.data, offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Write the 32-bit word at a word index (little-endian).
    pub fn set_word(&mut self, index: usize, value: u32) -> Result<(), BridgeError> {
        let offset = word_offset(self.data, index)?;
        check_bounds(self.data, offset, 4)?;
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write a byte range.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BridgeError> {
        check_bounds(self.data, offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

fn word_offset(data: &[u8], index: usize) -> Result<usize, BridgeError> {
    index.checked_mul(4).ok_or(BridgeError::MemoryOutOfBounds {
        offset: index,
        len: 4,
        memory_size: data.len(),
    })
}

fn read_word(data: &[u8], index: usize) -> Result<u32, BridgeError> {
    let offset = word_offset(data, index)?;
    check_bounds(data, offset, 4)?;
    Ok(u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

/// Check if an access is within bounds.
fn check_bounds(data: &[u8], offset: usize, len: usize) -> Result<(), BridgeError> {
    let end = offset
        .checked_add(len)
        .ok_or(BridgeError::MemoryOutOfBounds {
            offset,
            len,
            memory_size: data.len(),
        })?;

    if end > data.len() {
        return Err(BridgeError::MemoryOutOfBounds {
            offset,
            len,
            memory_size: data.len(),
        });
    }

    Ok(())
}
