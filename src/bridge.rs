//! Bridge assembly: shared context and call dispatch.
//!
//! The [`Bridge`] owns everything both sides of the boundary touch and is
//! passed explicitly into every host and guest function; there is no
//! ambient state. Imports are host functions the guest calls, keyed by
//! (module, name); exports are guest functions the host calls, keyed by
//! name.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::memory::{LinearMemory, MemoryView, MemoryViewMut, ViewCache};
use crate::slab::HandleTable;
use crate::value::AbiValue;
use crate::{argslot, codec};
use crate::{BridgeConfig, BridgeError};

/// Host function signature: host-implemented imports the guest calls.
pub type HostFn = fn(&mut Bridge, &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError>;

/// Guest function signature: guest-implemented exports the host calls.
pub type GuestFn = fn(&mut Bridge, &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError>;

/// Shared state both sides of the boundary operate on.
pub struct BridgeContext {
    /// Guest linear memory.
    pub memory: LinearMemory,

    /// Host-side value registry.
    pub handles: HandleTable,

    /// Captured alert messages.
    pub alerts: Vec<String>,

    /// Overlay cache revalidated before every view access.
    views: ViewCache,

    /// Resolved base of the argument slot area.
    pub(crate) argument_base: Option<u32>,
}

impl BridgeContext {
    /// Create a context with a fresh guest memory.
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Ok(BridgeContext {
            memory: LinearMemory::new(config.initial_pages, config.max_pages)?,
            handles: HandleTable::new(),
            alerts: Vec::new(),
            views: ViewCache::new(),
            argument_base: None,
        })
    }

    /// Read-only view over guest memory, revalidated against the current
    /// buffer generation.
    pub fn view(&mut self) -> MemoryView<'_> {
        self.views.refresh(&self.memory);
        MemoryView::new(&self.memory)
    }

    /// Mutable view over guest memory, revalidated against the current
    /// buffer generation.
    pub fn view_mut(&mut self) -> MemoryViewMut<'_> {
        self.views.refresh(&self.memory);
        MemoryViewMut::new(&mut self.memory)
    }

    /// Number of times the view overlays were (re)built.
    pub fn view_rebuilds(&self) -> u64 {
        self.views.rebuilds()
    }
}

/// The interop bridge between a guest module and the host.
pub struct Bridge {
    /// Shared boundary state.
    pub(crate) ctx: BridgeContext,

    /// Host functions the guest can call: (module, name) -> HostFn.
    imports: BTreeMap<(String, String), HostFn>,

    /// Guest functions the host can call: name -> GuestFn.
    exports: BTreeMap<String, GuestFn>,

    /// Configuration the bridge was built with.
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge with empty import/export tables.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let ctx = BridgeContext::new(&config)?;
        Ok(Bridge {
            ctx,
            imports: BTreeMap::new(),
            exports: BTreeMap::new(),
            config,
        })
    }

    /// Register a host function import. Re-registering a name replaces the
    /// previous function.
    pub fn add_import(&mut self, module: &str, name: &str, func: HostFn) {
        self.imports.insert((module.into(), name.into()), func);
    }

    /// Register a guest function export.
    pub fn add_export(&mut self, name: &str, func: GuestFn) {
        self.exports.insert(name.into(), func);
    }

    /// Invoke a host import on behalf of the guest.
    pub fn call_import(
        &mut self,
        module: &str,
        name: &str,
        args: &[AbiValue],
    ) -> Result<Vec<AbiValue>, BridgeError> {
        let key = (String::from(module), String::from(name));
        let func = *self
            .imports
            .get(&key)
            .ok_or_else(|| BridgeError::ImportNotFound(alloc::format!("{}#{}", module, name)))?;
        func(self, args)
    }

    /// Invoke a guest export on behalf of the host.
    pub fn call_export(
        &mut self,
        name: &str,
        args: &[AbiValue],
    ) -> Result<Vec<AbiValue>, BridgeError> {
        let func = *self
            .exports
            .get(name)
            .ok_or_else(|| BridgeError::ExportNotFound(String::from(name)))?;
        func(self, args)
    }

    /// Invoke the guest's `greet` export with a host string.
    ///
    /// The argument is encoded into guest memory, its byte length is parked
    /// in argument slot 0, and the backing allocation is released once the
    /// call returns, whether it succeeded or not.
    pub fn greet(&mut self, name: &str) -> Result<(), BridgeError> {
        log::debug!("[Bridge] greet({:?})", name);
        codec::with_encoded(self, name, |bridge, ptr, len| {
            argslot::set(bridge, 0, len)?;
            bridge.call_export("greet", &[AbiValue::I32(ptr as i32)])?;
            Ok(())
        })
    }

    /// Messages delivered through the default alert sink.
    pub fn alerts(&self) -> &[String] {
        &self.ctx.alerts
    }

    /// The configuration the bridge was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Get a reference to the shared context.
    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    /// Get mutable access to the shared context.
    pub fn context_mut(&mut self) -> &mut BridgeContext {
        &mut self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::expect_i32;

    fn answer(_bridge: &mut Bridge, _args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
        Ok(alloc::vec![AbiValue::I32(41)])
    }

    fn add_answer(bridge: &mut Bridge, args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
        // An import that re-enters the guest through an export.
        let base = expect_i32(args, 0)?;
        let results = bridge.call_export("answer", &[])?;
        let answer = expect_i32(&results, 0)?;
        Ok(alloc::vec![AbiValue::I32(base + answer)])
    }

    fn zero(_bridge: &mut Bridge, _args: &[AbiValue]) -> Result<Vec<AbiValue>, BridgeError> {
        Ok(alloc::vec![AbiValue::I32(0)])
    }

    #[test]
    fn test_export_dispatch() {
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        bridge.add_export("answer", answer);
        let results = bridge.call_export("answer", &[]).unwrap();
        assert_eq!(results, alloc::vec![AbiValue::I32(41)]);
    }

    #[test]
    fn test_missing_export() {
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        let result = bridge.call_export("greet", &[]);
        assert!(
            matches!(result, Err(BridgeError::ExportNotFound(ref name)) if name == "greet")
        );
    }

    #[test]
    fn test_import_reenters_export() {
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        bridge.add_export("answer", answer);
        bridge.add_import("test", "add_answer", add_answer);
        let results = bridge
            .call_import("test", "add_answer", &[AbiValue::I32(1)])
            .unwrap();
        assert_eq!(results, alloc::vec![AbiValue::I32(42)]);
    }

    #[test]
    fn test_missing_import() {
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        let result = bridge.call_import("test", "missing", &[]);
        assert!(
            matches!(result, Err(BridgeError::ImportNotFound(ref name)) if name == "test#missing")
        );
    }

    #[test]
    fn test_reregistering_import_replaces() {
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        bridge.add_import("test", "f", answer);
        bridge.add_import("test", "f", zero);
        let results = bridge.call_import("test", "f", &[]).unwrap();
        assert_eq!(results, alloc::vec![AbiValue::I32(0)]);
    }

    #[test]
    fn test_view_rebuilds_after_growth() {
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        let ctx = bridge.context_mut();
        ctx.view();
        ctx.view();
        let before = ctx.view_rebuilds();

        ctx.memory.grow(1).unwrap();
        ctx.view();
        ctx.view();
        assert_eq!(ctx.view_rebuilds(), before + 1);
    }

    #[test]
    fn test_new_rejects_bad_memory_config() {
        let config = BridgeConfig {
            initial_pages: 8,
            max_pages: Some(4),
            ..BridgeConfig::default()
        };
        assert!(matches!(
            Bridge::new(config),
            Err(BridgeError::MemoryError(_))
        ));
    }
}
