//! Boundary call shims.
//!
//! Host-side adapters the guest calls by name: the intrinsic family under
//! the `bridge` module (handle bookkeeping, value boxing and unboxing,
//! type probes, throw) and the default alert sink under `host`. Each shim
//! decodes or resolves its inbound arguments, performs the operation on
//! the shared context, and hands the result back as boundary scalars.
//!
//! Type probes never fail on a mismatched value; they answer with a
//! sentinel return or a flag write into guest memory. An invalid handle
//! is fatal in every shim.

use alloc::vec;
use alloc::vec::Vec;
use bitflags::bitflags;

use crate::bridge::Bridge;
use crate::handle::Handle;
use crate::value::{expect_f64, expect_i32, expect_u32, AbiValue, HostValue};
use crate::{argslot, codec, BridgeError};

bitflags! {
    /// Intrinsic shim families.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntrinsicSet: u32 {
        /// Handle cloning and dropping.
        const OBJECT = 0b000_0001;
        /// Null/undefined constructors and probes.
        const NULLISH = 0b000_0010;
        /// String boxing and unboxing.
        const STRING = 0b000_0100;
        /// Number boxing and unboxing.
        const NUMBER = 0b000_1000;
        /// Boolean boxing and unboxing.
        const BOOLEAN = 0b001_0000;
        /// Symbol construction and probing.
        const SYMBOL = 0b010_0000;
        /// Guest-raised fatal errors.
        const THROW = 0b100_0000;
        /// All intrinsic families.
        const ALL = 0b111_1111;
    }
}

/// Install the default alert sink and the intrinsic families selected by
/// the bridge configuration.
pub fn install(bridge: &mut Bridge) {
    let families = bridge.config().intrinsics;

    bridge.add_import("host", "alert", host_alert);

    if families.contains(IntrinsicSet::OBJECT) {
        bridge.add_import("bridge", "object_clone", object_clone);
        bridge.add_import("bridge", "object_drop", object_drop);
    }
    if families.contains(IntrinsicSet::NULLISH) {
        bridge.add_import("bridge", "null_new", null_new);
        bridge.add_import("bridge", "undefined_new", undefined_new);
        bridge.add_import("bridge", "is_null", is_null);
        bridge.add_import("bridge", "is_undefined", is_undefined);
    }
    if families.contains(IntrinsicSet::STRING) {
        bridge.add_import("bridge", "string_new", string_new);
        bridge.add_import("bridge", "string_get", string_get);
    }
    if families.contains(IntrinsicSet::NUMBER) {
        bridge.add_import("bridge", "number_new", number_new);
        bridge.add_import("bridge", "number_get", number_get);
    }
    if families.contains(IntrinsicSet::BOOLEAN) {
        bridge.add_import("bridge", "boolean_new", boolean_new);
        bridge.add_import("bridge", "boolean_get", boolean_get);
    }
    if families.contains(IntrinsicSet::SYMBOL) {
        bridge.add_import("bridge", "symbol_new", symbol_new);
        bridge.add_import("bridge", "is_symbol", is_symbol);
    }
    if families.contains(IntrinsicSet::THROW) {
        bridge.add_import("bridge", "throw", throw);
    }

    log::debug!("[Bridge] intrinsics installed: {:?}", families);
}

/// Box a host value and return its handle as a boundary scalar.
fn boxed(bridge: &mut Bridge, value: HostValue) -> AbiValue {
    AbiValue::I32(bridge.ctx.handles.add(value).raw() as i32)
}

/// Default alert sink: decodes the message (byte length from argument
/// slot 0) and captures it on the context. Embedders override
/// `("host", "alert")` to reach a real alert facility.
fn host_alert(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let ptr = expect_u32(args, 0)?;
    let len = argslot::get(bridge, 0)?;
    let message = codec::decode(&mut bridge.ctx, ptr, len)?;
    log::info!("[Bridge] alert: {}", message);
    bridge.ctx.alerts.push(message);
    Ok(Vec::new())
}

// Object family

fn object_clone(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    let cloned = bridge.ctx.handles.clone_ref(handle)?;
    Ok(vec![AbiValue::I32(cloned.raw() as i32)])
}

fn object_drop(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    bridge.ctx.handles.drop_ref(handle)?;
    Ok(Vec::new())
}

// Nullish family

fn null_new(bridge: &mut Bridge, _args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    Ok(vec![boxed(bridge, HostValue::Null)])
}

fn undefined_new(bridge: &mut Bridge, _args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    Ok(vec![boxed(bridge, HostValue::Undefined)])
}

fn is_null(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    let hit = bridge.ctx.handles.resolve(handle)?.is_null();
    Ok(vec![AbiValue::I32(hit as i32)])
}

fn is_undefined(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    let hit = bridge.ctx.handles.resolve(handle)?.is_undefined();
    Ok(vec![AbiValue::I32(hit as i32)])
}

// String family

fn string_new(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let ptr = expect_u32(args, 0)?;
    let len = expect_u32(args, 1)?;
    let text = codec::decode(&mut bridge.ctx, ptr, len)?;
    Ok(vec![boxed(bridge, HostValue::String(text))])
}

/// `string_get(handle, len_ptr)`: encode the string back into guest
/// memory. Not a string → pointer zero. Otherwise the byte length lands
/// in the word containing `len_ptr` and the guest owns the returned
/// buffer.
fn string_get(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    let len_ptr = expect_u32(args, 1)?;
    let text = match bridge.ctx.handles.resolve(handle)? {
        HostValue::String(text) => text.clone(),
        _ => return Ok(vec![AbiValue::I32(0)]),
    };
    let (ptr, len) = codec::encode(bridge, &text)?;
    bridge.ctx.view_mut().set_word((len_ptr / 4) as usize, len)?;
    Ok(vec![AbiValue::I32(ptr as i32)])
}

// Number family

fn number_new(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let value = expect_f64(args, 0)?;
    Ok(vec![boxed(bridge, HostValue::Number(value))])
}

/// `number_get(handle, invalid_ptr)`: the number, or zero with byte 1
/// written at `invalid_ptr` when the value is not a number.
fn number_get(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    let invalid_ptr = expect_u32(args, 1)?;
    let number = match bridge.ctx.handles.resolve(handle)? {
        HostValue::Number(n) => Some(*n),
        _ => None,
    };
    match number {
        Some(n) => Ok(vec![AbiValue::F64(n)]),
        None => {
            bridge.ctx.view_mut().set_byte(invalid_ptr as usize, 1)?;
            Ok(vec![AbiValue::F64(0.0)])
        }
    }
}

// Boolean family

/// `boolean_new(v)`: boxes true iff `v` is exactly 1.
fn boolean_new(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let value = expect_i32(args, 0)?;
    Ok(vec![boxed(bridge, HostValue::Boolean(value == 1))])
}

/// `boolean_get(handle)`: 0 or 1, or the sentinel 2 when the value is
/// not a boolean.
fn boolean_get(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    let code = match bridge.ctx.handles.resolve(handle)? {
        HostValue::Boolean(b) => *b as i32,
        _ => 2,
    };
    Ok(vec![AbiValue::I32(code)])
}

// Symbol family

/// `symbol_new(ptr, len)`: pointer zero makes an anonymous symbol,
/// anything else a described one.
fn symbol_new(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let ptr = expect_u32(args, 0)?;
    let len = expect_u32(args, 1)?;
    let description = if ptr == 0 {
        None
    } else {
        Some(codec::decode(&mut bridge.ctx, ptr, len)?)
    };
    Ok(vec![boxed(bridge, HostValue::Symbol(description))])
}

fn is_symbol(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let handle = Handle::from_raw(expect_u32(args, 0)?);
    let hit = bridge.ctx.handles.resolve(handle)?.is_symbol();
    Ok(vec![AbiValue::I32(hit as i32)])
}

// Throw

/// `throw(ptr, len)`: decode the message and unwind the call chain with
/// it.
fn throw(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
    let ptr = expect_u32(args, 0)?;
    let len = expect_u32(args, 1)?;
    let message = codec::decode(&mut bridge.ctx, ptr, len)?;
    log::debug!("[Bridge] guest threw: {}", message);
    Err(BridgeError::Thrown(message))
}
