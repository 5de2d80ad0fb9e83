//! Reference-counted host value table.
//!
//! The heap region is a slot arena with an explicit free-index list: drops
//! that reach a count of zero vacate the slot and push its index, and new
//! entries pop the most recently freed index before the arena grows. The
//! stack region holds transients whose lifetime is owned by the caller that
//! pushed them.

use alloc::vec::Vec;

use crate::handle::Handle;
use crate::value::HostValue;
use crate::BridgeError;

/// An occupied slot in the heap region.
#[derive(Debug, Clone)]
struct HeapSlot {
    /// The referenced value.
    value: HostValue,
    /// Number of live handles to the slot.
    refs: u32,
}

/// Two-region registry for host values crossing the boundary.
pub struct HandleTable {
    /// Heap region: slot arena, `None` marks a vacant slot.
    slots: Vec<Option<HeapSlot>>,

    /// Vacant slot indices, most recently freed last.
    free: Vec<u32>,

    /// Stack region for transients.
    stack: Vec<HostValue>,
}

impl HandleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        HandleTable {
            slots: Vec::new(),
            free: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Store a value in the heap region with a reference count of one.
    pub fn add(&mut self, value: HostValue) -> Handle {
        let slot = Some(HeapSlot { value, refs: 1 });
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                (self.slots.len() - 1) as u32
            }
        };
        log::trace!("[Handles] add -> slot {}", index);
        Handle::Heap(index)
    }

    /// Clone a handle.
    ///
    /// Heap handles get their reference count bumped and come back
    /// unchanged. Stack handles are promoted: the transient value is copied
    /// into a fresh heap slot and the new heap handle is returned.
    pub fn clone_ref(&mut self, handle: Handle) -> Result<Handle, BridgeError> {
        match handle {
            Handle::Heap(index) => {
                let slot = self.slot_mut(index, handle)?;
                slot.refs += 1;
                Ok(handle)
            }
            Handle::Stack(pos) => {
                let value = self
                    .stack
                    .get(pos as usize)
                    .cloned()
                    .ok_or(BridgeError::InvalidHandle(handle.raw()))?;
                Ok(self.add(value))
            }
        }
    }

    /// Release one reference to a heap handle, vacating the slot when the
    /// count reaches zero. Stack handles are not droppable; their owner
    /// reclaims them through [`HandleTable::pop_stack`].
    pub fn drop_ref(&mut self, handle: Handle) -> Result<(), BridgeError> {
        let index = match handle {
            Handle::Heap(index) => index,
            Handle::Stack(_) => return Err(BridgeError::InvalidHandle(handle.raw())),
        };
        let slot = self.slot_mut(index, handle)?;
        slot.refs -= 1;
        if slot.refs == 0 {
            self.slots[index as usize] = None;
            self.free.push(index);
            log::trace!("[Handles] slot {} reclaimed", index);
        }
        Ok(())
    }

    /// Look up the value a handle refers to.
    pub fn resolve(&self, handle: Handle) -> Result<&HostValue, BridgeError> {
        match handle {
            Handle::Heap(index) => self
                .slots
                .get(index as usize)
                .and_then(|slot| slot.as_ref())
                .map(|slot| &slot.value)
                .ok_or(BridgeError::InvalidHandle(handle.raw())),
            Handle::Stack(pos) => self
                .stack
                .get(pos as usize)
                .ok_or(BridgeError::InvalidHandle(handle.raw())),
        }
    }

    /// Reference count of a heap handle.
    pub fn ref_count(&self, handle: Handle) -> Result<u32, BridgeError> {
        match handle {
            Handle::Heap(index) => self
                .slots
                .get(index as usize)
                .and_then(|slot| slot.as_ref())
                .map(|slot| slot.refs)
                .ok_or(BridgeError::InvalidHandle(handle.raw())),
            Handle::Stack(_) => Err(BridgeError::InvalidHandle(handle.raw())),
        }
    }

    /// Push a transient value onto the stack region.
    pub fn push_stack(&mut self, value: HostValue) -> Handle {
        self.stack.push(value);
        Handle::Stack((self.stack.len() - 1) as u32)
    }

    /// Pop the most recent transient off the stack region.
    pub fn pop_stack(&mut self) -> Option<HostValue> {
        self.stack.pop()
    }

    /// Occupancy counters.
    pub fn stats(&self) -> TableStats {
        TableStats {
            live_slots: self.slots.iter().filter(|slot| slot.is_some()).count(),
            free_slots: self.free.len(),
            stack_depth: self.stack.len(),
        }
    }

    fn slot_mut(&mut self, index: u32, handle: Handle) -> Result<&mut HeapSlot, BridgeError> {
        self.slots
            .get_mut(index as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(BridgeError::InvalidHandle(handle.raw()))
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle table occupancy counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Occupied heap slots.
    pub live_slots: usize,
    /// Vacant heap slots awaiting reuse.
    pub free_slots: usize,
    /// Transients currently on the stack region.
    pub stack_depth: usize,
}
