//! Scripted greeter guest.
//!
//! A stand-in for the compiled module on the far side of the boundary: it
//! exposes the bridge calls (`greet`, `malloc`, `free`,
//! `global_argument_ptr`) as ordinary exports over the shared context.
//! The guest keeps all of its state (a bump cursor and a live-allocation
//! counter) in its own linear memory words, so host code observes it
//! exactly the way it would observe a real module.
//!
//! Memory layout:
//!
//! ```text
//! 0  .. 4    heap cursor word
//! 4  .. 8    live allocation counter word
//! 16 .. 48   argument slot area (8 words)
//! 64 ..      guest heap, bump allocated
//! ```

use alloc::vec;
use alloc::vec::Vec;

use crate::bridge::Bridge;
use crate::memory::PAGE_SIZE;
use crate::value::{expect_u32, AbiValue};
use crate::{argslot, codec, BridgeError};

/// Base address of the argument slot area, as reported by the guest's
/// `global_argument_ptr` export.
pub const ARG_AREA: u32 = 16;

/// First address handed out by `malloc`. Address zero stays unused so a
/// zero pointer can serve as the "no string" sentinel.
pub const HEAP_BASE: u32 = 64;

/// Allocation granularity of the guest heap.
const ALIGN: u32 = 8;

/// Word index of the bump cursor.
const CURSOR_WORD: usize = 0;

/// Word index of the live allocation counter.
const LIVE_WORD: usize = 1;

/// Register the greeter exports on a bridge.
pub fn install(bridge: &mut Bridge) -> Result<(), BridgeError> {
    // The state words and argument slots must exist before the first
    // export call.
    if bridge.ctx.memory.size() < HEAP_BASE as usize {
        return Err(BridgeError::MemoryError(
            "guest memory smaller than the reserved region".into(),
        ));
    }
    bridge.add_export("greet", greet);
    bridge.add_export("malloc", malloc);
    bridge.add_export("free", free);
    bridge.add_export("global_argument_ptr", global_argument_ptr);
    log::debug!("[Guest] greeter exports installed");
    Ok(())
}

/// Number of guest allocations not yet returned to `free`.
pub fn live_allocations(bridge: &mut Bridge) -> Result<u32, BridgeError> {
    bridge.ctx.view().word(LIVE_WORD)
}

/// `greet(ptr)`: read the name (byte length in argument slot 0), format
/// the greeting, and deliver it through the host's alert import. The
/// greeting buffer is scoped to the alert call.
fn greet(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let ptr = expect_u32(args, 0)?;
    let len = argslot::get(bridge, 0)?;
    let name = codec::decode(&mut bridge.ctx, ptr, len)?;

    let greeting = alloc::format!("Hello, {}!", name);
    log::debug!("[Guest] greet -> {:?}", greeting);
    codec::with_encoded(bridge, &greeting, |bridge, ptr, len| {
        argslot::set(bridge, 0, len)?;
        bridge.call_import("host", "alert", &[AbiValue::I32(ptr as i32)])?;
        Ok(())
    })?;
    Ok(Vec::new())
}

/// `malloc(size)`: bump allocation out of the guest heap, growing memory
/// when the heap runs past the current buffer.
fn malloc(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let size = expect_u32(args, 0)?;

    let mut cursor = bridge.ctx.view().word(CURSOR_WORD)?;
    if cursor == 0 {
        cursor = HEAP_BASE;
    }

    let padded = size
        .checked_add(ALIGN - 1)
        .map(|s| s & !(ALIGN - 1))
        .ok_or_else(|| BridgeError::MemoryError("allocation size overflow".into()))?;
    let ptr = cursor;
    let end = cursor
        .checked_add(padded)
        .ok_or_else(|| BridgeError::MemoryError("guest heap exhausted".into()))?;

    let memory_size = bridge.ctx.memory.size();
    if end as usize > memory_size {
        let shortfall = end as usize - memory_size;
        let delta = ((shortfall + PAGE_SIZE - 1) / PAGE_SIZE) as u32;
        bridge.ctx.memory.grow(delta)?;
        log::debug!("[Guest] heap grew by {} page(s)", delta);
    }

    let live = bridge.ctx.view().word(LIVE_WORD)?;
    let mut view = bridge.ctx.view_mut();
    view.set_word(CURSOR_WORD, end)?;
    view.set_word(LIVE_WORD, live + 1)?;
    log::trace!("[Guest] malloc({}) -> {}", size, ptr);
    Ok(vec![AbiValue::I32(ptr as i32)])
}

/// `free(ptr, len)`: release one allocation.
///
/// The heap is a bump region, so no space is reclaimed; the guest checks
/// the pair against the heap bounds and balances the live counter.
fn free(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let ptr = expect_u32(args, 0)?;
    let len = expect_u32(args, 1)?;

    let live = bridge.ctx.view().word(LIVE_WORD)?;
    if live == 0 {
        return Err(BridgeError::MemoryError(
            "free without a live allocation".into(),
        ));
    }
    let cursor = bridge.ctx.view().word(CURSOR_WORD)?;
    let end = ptr
        .checked_add(len)
        .ok_or_else(|| BridgeError::MemoryError("freed range overflows".into()))?;
    if ptr < HEAP_BASE || end > cursor {
        return Err(BridgeError::MemoryError(
            "free outside the guest heap".into(),
        ));
    }
    bridge.ctx.view_mut().set_word(LIVE_WORD, live - 1)?;
    log::trace!("[Guest] free({}, {})", ptr, len);
    Ok(Vec::new())
}

/// `global_argument_ptr()`: base address of the argument slot area.
fn global_argument_ptr(
    _bridge: &mut Bridge,
    _args: &[AbiValue],
) -> Result<Vec<AbiValue>, BridgeError> {
    Ok(vec![AbiValue::I32(ARG_AREA as i32)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bridge, BridgeConfig};

    fn guest_only() -> Bridge {
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        install(&mut bridge).unwrap();
        bridge
    }

    fn call_malloc(bridge: &mut Bridge, size: u32) -> u32 {
        let results = bridge
            .call_export("malloc", &[AbiValue::I32(size as i32)])
            .unwrap();
        expect_u32(&results, 0).unwrap()
    }

    #[test]
    fn test_malloc_bumps_past_reserved_region() {
        let mut bridge = guest_only();
        let first = call_malloc(&mut bridge, 5);
        let second = call_malloc(&mut bridge, 3);
        assert_eq!(first, HEAP_BASE);
        assert_eq!(second, HEAP_BASE + ALIGN);
        assert_eq!(second % ALIGN, 0);
        assert_eq!(live_allocations(&mut bridge).unwrap(), 2);
    }

    #[test]
    fn test_malloc_zero_size() {
        let mut bridge = guest_only();
        let ptr = call_malloc(&mut bridge, 0);
        assert_eq!(ptr, HEAP_BASE);
        assert_eq!(live_allocations(&mut bridge).unwrap(), 1);
        bridge
            .call_export("free", &[AbiValue::I32(ptr as i32), AbiValue::I32(0)])
            .unwrap();
        assert_eq!(live_allocations(&mut bridge).unwrap(), 0);
    }

    #[test]
    fn test_malloc_grows_memory() {
        let config = BridgeConfig {
            initial_pages: 1,
            max_pages: Some(4),
            ..BridgeConfig::default()
        };
        let mut bridge = Bridge::new(config).unwrap();
        install(&mut bridge).unwrap();

        // Build the overlay once so the growth demonstrably invalidates it.
        bridge.ctx.view();
        assert_eq!(bridge.ctx.view_rebuilds(), 1);

        call_malloc(&mut bridge, PAGE_SIZE as u32);
        assert_eq!(bridge.ctx.memory.pages(), 2);
        assert_eq!(bridge.ctx.memory.generation(), 1);

        // The overlay was rebuilt exactly once against the new buffer.
        let rebuilds = bridge.ctx.view_rebuilds();
        assert_eq!(rebuilds, 2);
        bridge.ctx.view();
        assert_eq!(bridge.ctx.view_rebuilds(), rebuilds);
    }

    #[test]
    fn test_malloc_growth_denied_past_max() {
        let config = BridgeConfig {
            initial_pages: 1,
            max_pages: Some(1),
            ..BridgeConfig::default()
        };
        let mut bridge = Bridge::new(config).unwrap();
        install(&mut bridge).unwrap();

        let result = bridge.call_export("malloc", &[AbiValue::I32(PAGE_SIZE as i32)]);
        assert!(matches!(result, Err(BridgeError::MemoryError(_))));
        // A denied allocation leaves the counter untouched.
        assert_eq!(live_allocations(&mut bridge).unwrap(), 0);
    }

    #[test]
    fn test_free_underflow_fails() {
        let mut bridge = guest_only();
        let result = bridge.call_export(
            "free",
            &[AbiValue::I32(HEAP_BASE as i32), AbiValue::I32(4)],
        );
        assert!(matches!(result, Err(BridgeError::MemoryError(_))));
    }

    #[test]
    fn test_free_outside_heap_fails() {
        let mut bridge = guest_only();
        call_malloc(&mut bridge, 8);

        // Below the heap base.
        let result = bridge.call_export("free", &[AbiValue::I32(4), AbiValue::I32(4)]);
        assert!(matches!(result, Err(BridgeError::MemoryError(_))));

        // Past the bump cursor.
        let result = bridge.call_export(
            "free",
            &[AbiValue::I32(HEAP_BASE as i32), AbiValue::I32(64)],
        );
        assert!(matches!(result, Err(BridgeError::MemoryError(_))));
        assert_eq!(live_allocations(&mut bridge).unwrap(), 1);
    }

    #[test]
    fn test_global_argument_ptr_reports_area() {
        let mut bridge = guest_only();
        let results = bridge.call_export("global_argument_ptr", &[]).unwrap();
        assert_eq!(results, vec![AbiValue::I32(ARG_AREA as i32)]);
    }

    #[test]
    fn test_greet_without_alert_import_still_frees() {
        // No shims installed: the alert import is unresolvable, but both
        // scoped buffers (name and greeting) must still come back.
        let mut bridge = guest_only();
        let result = bridge.greet("Nobody");
        assert!(matches!(result, Err(BridgeError::ImportNotFound(_))));
        assert_eq!(live_allocations(&mut bridge).unwrap(), 0);
    }

    #[test]
    fn test_install_requires_reserved_region() {
        let config = BridgeConfig {
            initial_pages: 0,
            max_pages: Some(1),
            ..BridgeConfig::default()
        };
        let mut bridge = Bridge::new(config).unwrap();
        let result = install(&mut bridge);
        assert!(matches!(result, Err(BridgeError::MemoryError(_))));
    }
}
