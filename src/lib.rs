//! Host-side interop bridge for WASM guest modules.
//!
//! This crate connects a guest module (linear memory plus named exports) to a
//! host environment. Strings cross the boundary as UTF-8 bytes in guest
//! memory, opaque host values cross as integer handles backed by a
//! reference-counted table, and auxiliary integers travel through a fixed
//! argument slot area in guest memory.
//!
//! # Architecture
//!
//! - `memory`: paged linear memory + byte/word view overlays
//! - `value`: host value model + boundary scalars
//! - `handle` / `slab`: handle encoding + reference-counted value table
//! - `bridge`: configuration, shared context, call dispatch
//! - `codec`: string encode/decode with scoped release
//! - `argslot`: global argument slot access
//! - `shims`: intrinsic imports + the alert sink
//! - `guest`: scripted greeter guest for tests and demos
//!
//! # Usage
//!
//! ```
//! use hostbridge::{greeter_bridge, BridgeConfig};
//!
//! let mut bridge = greeter_bridge(BridgeConfig::default()).unwrap();
//! bridge.greet("World").unwrap();
//! assert_eq!(bridge.alerts()[0], "Hello, World!");
//! ```

#![no_std]

extern crate alloc;

pub mod argslot;
pub mod bridge;
pub mod codec;
pub mod guest;
pub mod handle;
pub mod memory;
pub mod shims;
pub mod slab;
pub mod value;

use alloc::string::String;

pub use bridge::{Bridge, BridgeContext, GuestFn, HostFn};
pub use handle::Handle;
pub use memory::{LinearMemory, MemoryView, MemoryViewMut, ViewCache};
pub use shims::IntrinsicSet;
pub use slab::{HandleTable, TableStats};
pub use value::{AbiValue, HostValue};

/// Bridge error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Memory access outside the guest buffer.
    MemoryOutOfBounds {
        offset: usize,
        len: usize,
        memory_size: usize,
    },
    /// Memory sizing or growth failure.
    MemoryError(String),
    /// Malformed text in guest memory.
    InvalidUtf8 { ptr: u32, len: u32 },
    /// Handle referring to no live table entry.
    InvalidHandle(u32),
    /// Guest export missing from the bridge.
    ExportNotFound(String),
    /// Host import missing from the bridge.
    ImportNotFound(String),
    /// Wrong value shape at the boundary.
    TypeMismatch(String),
    /// Error raised by the guest through the throw intrinsic.
    Thrown(String),
}

impl core::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BridgeError::MemoryOutOfBounds {
                offset,
                len,
                memory_size,
            } => {
                write!(
                    f,
                    "out of bounds memory access: {} + {} > {}",
                    offset, len, memory_size
                )
            }
            BridgeError::MemoryError(msg) => write!(f, "memory error: {}", msg),
            BridgeError::InvalidUtf8 { ptr, len } => {
                write!(f, "invalid utf-8 in guest memory: ptr={} len={}", ptr, len)
            }
            BridgeError::InvalidHandle(raw) => write!(f, "invalid handle: {}", raw),
            BridgeError::ExportNotFound(name) => write!(f, "export not found: {}", name),
            BridgeError::ImportNotFound(name) => write!(f, "import not found: {}", name),
            BridgeError::TypeMismatch(msg) => write!(f, "type mismatch: {}", msg),
            BridgeError::Thrown(msg) => write!(f, "thrown: {}", msg),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Initial guest memory size (in pages, 64KB each).
    pub initial_pages: u32,
    /// Maximum guest memory size in pages.
    pub max_pages: Option<u32>,
    /// Intrinsic shim families to install.
    pub intrinsics: IntrinsicSet,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            initial_pages: 2,     // 128 KB
            max_pages: Some(256), // 16 MB
            intrinsics: IntrinsicSet::ALL,
        }
    }
}

/// Build a bridge wired to the scripted greeter guest.
///
/// Installs the intrinsic imports selected by the config, the default alert
/// sink, and the guest's `greet`/`malloc`/`free`/`global_argument_ptr`
/// exports.
pub fn greeter_bridge(config: BridgeConfig) -> Result<Bridge, BridgeError> {
    let mut bridge = Bridge::new(config)?;
    shims::install(&mut bridge);
    guest::install(&mut bridge)?;
    Ok(bridge)
}
