//! String transport across the memory boundary.
//!
//! Strings cross as (pointer, length) pairs into guest memory. Outbound
//! text is allocated through the guest's `malloc` export and must come back
//! through `free`; [`with_encoded`] scopes that pairing so the buffer is
//! released on every exit path.

use alloc::string::String;

use crate::bridge::{Bridge, BridgeContext};
use crate::value::{expect_u32, AbiValue};
use crate::BridgeError;

/// Encode a string into guest memory.
///
/// Returns the (pointer, byte length) pair of the allocation. The caller
/// owns it and is responsible for passing it to [`release`].
pub fn encode(bridge: &mut Bridge, text: &str) -> Result<(u32, u32), BridgeError> {
    let bytes = text.as_bytes();
    let len = bytes.len() as u32;
    let results = bridge.call_export("malloc", &[AbiValue::I32(len as i32)])?;
    let ptr = expect_u32(&results, 0)?;
    bridge.ctx.view_mut().write(ptr as usize, bytes)?;
    log::trace!("[Bridge] encoded {} bytes at {}", len, ptr);
    Ok((ptr, len))
}

/// Decode a string from guest memory.
pub fn decode(ctx: &mut BridgeContext, ptr: u32, len: u32) -> Result<String, BridgeError> {
    let view = ctx.view();
    let bytes = view.bytes(ptr as usize, len as usize)?;
    let text =
        core::str::from_utf8(bytes).map_err(|_| BridgeError::InvalidUtf8 { ptr, len })?;
    Ok(String::from(text))
}

/// Return an encoded buffer to the guest allocator.
pub fn release(bridge: &mut Bridge, ptr: u32, len: u32) -> Result<(), BridgeError> {
    bridge.call_export(
        "free",
        &[AbiValue::I32(ptr as i32), AbiValue::I32(len as i32)],
    )?;
    Ok(())
}

/// Encode `text`, run `f` with the (pointer, length) pair, then release the
/// buffer whether `f` succeeded or not. An error from `f` takes precedence
/// over an error from the release.
pub fn with_encoded<T, F>(bridge: &mut Bridge, text: &str, f: F) -> Result<T, BridgeError>
where
    F: FnOnce(&mut Bridge, u32, u32) -> Result<T, BridgeError>,
{
    let (ptr, len) = encode(bridge, text)?;
    let result = f(bridge, ptr, len);
    let released = release(bridge, ptr, len);
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), _) => Err(e),
    }
}
