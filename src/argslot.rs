//! Global argument slot access.
//!
//! A fixed word area in guest memory carries auxiliary integer arguments
//! (typically byte lengths) alongside pointer-only call signatures. The
//! area's base address is resolved once through the guest's
//! `global_argument_ptr` export and cached on the context.

use crate::bridge::Bridge;
use crate::value::expect_u32;
use crate::BridgeError;

/// Resolve the argument area base address, caching it on first use.
pub fn base(bridge: &mut Bridge) -> Result<u32, BridgeError> {
    if let Some(base) = bridge.ctx.argument_base {
        return Ok(base);
    }
    let results = bridge.call_export("global_argument_ptr", &[])?;
    let base = expect_u32(&results, 0)?;
    log::debug!("[Bridge] argument slot base resolved to {}", base);
    bridge.ctx.argument_base = Some(base);
    Ok(base)
}

/// Store `value` in argument slot `index`.
pub fn set(bridge: &mut Bridge, index: u32, value: u32) -> Result<(), BridgeError> {
    let base = base(bridge)?;
    let word = (base / 4) as usize + index as usize;
    bridge.ctx.view_mut().set_word(word, value)
}

/// Read argument slot `index`.
pub fn get(bridge: &mut Bridge, index: u32) -> Result<u32, BridgeError> {
    let base = base(bridge)?;
    let word = (base / 4) as usize + index as usize;
    bridge.ctx.view().word(word)
}
