//! Boundary value types.
//!
//! [`HostValue`] is the host-side object model stored in the handle table.
//! [`AbiValue`] is the low-level scalar representation that actually crosses
//! the call boundary; anything richer travels as a handle or as a
//! (pointer, length) pair into guest memory.

use alloc::string::String;

use crate::BridgeError;

/// A host-side value held in the handle table.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// The undefined value.
    Undefined,
    /// The null value.
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A numeric value.
    Number(f64),
    /// A string value.
    String(String),
    /// A symbol with an optional description.
    Symbol(Option<String>),
}

impl HostValue {
    /// Check if value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Check if value is a boolean.
    pub fn is_boolean(&self) -> bool {
        matches!(self, HostValue::Boolean(_))
    }

    /// Check if value is a number.
    pub fn is_number(&self) -> bool {
        matches!(self, HostValue::Number(_))
    }

    /// Check if value is a string.
    pub fn is_string(&self) -> bool {
        matches!(self, HostValue::String(_))
    }

    /// Check if value is a symbol.
    pub fn is_symbol(&self) -> bool {
        matches!(self, HostValue::Symbol(_))
    }

    /// Get the type of value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Boolean(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Symbol(_) => "symbol",
        }
    }
}

/// Core boundary value, the low-level wire representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbiValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

/// Extract an i32 boundary value at the given position.
pub fn expect_i32(values: &[AbiValue], idx: usize) -> Result<i32, BridgeError> {
    match values.get(idx) {
        Some(AbiValue::I32(v)) => Ok(*v),
        _ => Err(BridgeError::TypeMismatch(String::from(
            "expected i32 boundary value",
        ))),
    }
}

/// Extract an i32 boundary value and reinterpret it as an unsigned offset.
pub fn expect_u32(values: &[AbiValue], idx: usize) -> Result<u32, BridgeError> {
    Ok(expect_i32(values, idx)? as u32)
}

/// Extract an f64 boundary value at the given position.
pub fn expect_f64(values: &[AbiValue], idx: usize) -> Result<f64, BridgeError> {
    match values.get(idx) {
        Some(AbiValue::F64(v)) => Ok(*v),
        _ => Err(BridgeError::TypeMismatch(String::from(
            "expected f64 boundary value",
        ))),
    }
}
