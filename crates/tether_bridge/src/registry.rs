//! Module registry and contract generation
//!
//! An ordered list of registered modules. The position of a module in the
//! list is its index on the wire; the registry is sealed when the startup
//! contract is generated and rejects registration afterwards.

use crate::error::{BridgeError, Result};
use crate::module::{FrameTick, ModuleContext, ModuleDescriptor, NativeModule};

struct RegisteredModule {
    descriptor: ModuleDescriptor,
    module: Box<dyn NativeModule>,
}

/// Ordered collection of native modules
pub struct ModuleRegistry {
    modules: Vec<RegisteredModule>,
    sealed: bool,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            sealed: false,
        }
    }

    /// Append a module
    ///
    /// Registering after the contract was sealed is a caller defect and
    /// is reported, not recovered.
    pub fn register(&mut self, module: Box<dyn NativeModule>) -> Result<()> {
        let descriptor = module.descriptor();
        if self.sealed {
            return Err(BridgeError::RegistrySealed(descriptor.name));
        }
        log::debug!(
            "registering module '{}' at index {}",
            descriptor.name,
            self.modules.len()
        );
        self.modules.push(RegisteredModule { descriptor, module });
        Ok(())
    }

    /// Freeze the registry; indices are stable from here on
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether the registry was sealed
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module was registered
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The ordered descriptor list forming the startup contract
    pub fn describe(&self) -> Vec<ModuleDescriptor> {
        self.modules.iter().map(|m| m.descriptor.clone()).collect()
    }

    /// Descriptor of the module at `index`
    pub fn descriptor(&self, index: usize) -> Option<&ModuleDescriptor> {
        self.modules.get(index).map(|m| &m.descriptor)
    }

    /// Resolve a module index into its descriptor and implementation
    pub(crate) fn entry_mut(
        &mut self,
        index: usize,
    ) -> Option<(&ModuleDescriptor, &mut (dyn NativeModule + 'static))> {
        self.modules.get_mut(index).map(|entry| {
            let RegisteredModule { descriptor, module } = entry;
            (&*descriptor, module.as_mut())
        })
    }

    /// Run every module's per-frame hook in registration order
    pub fn frame_all(&mut self, tick: &FrameTick, ctx: &ModuleContext) {
        for entry in &mut self.modules {
            entry.module.frame(tick, ctx);
        }
    }

    /// Run every module's shutdown hook in registration order
    pub fn shutdown_all(&mut self) {
        for entry in &mut self.modules {
            entry.module.shutdown();
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct Noop(&'static str);

    impl NativeModule for Noop {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::builder(self.0).function("poke").build()
        }

        fn invoke(&mut self, _function: usize, _args: &[Value], _ctx: &ModuleContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_describe_preserves_registration_order() {
        let mut registry = ModuleRegistry::new();
        registry.register(Box::new(Noop("First"))).unwrap();
        registry.register(Box::new(Noop("Second"))).unwrap();

        let contract = registry.describe();
        assert_eq!(contract.len(), 2);
        assert_eq!(contract[0].name, "First");
        assert_eq!(contract[1].name, "Second");
    }

    #[test]
    fn test_register_after_seal_is_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.register(Box::new(Noop("Early"))).unwrap();
        registry.seal();

        match registry.register(Box::new(Noop("Late"))) {
            Err(BridgeError::RegistrySealed(name)) => assert_eq!(name, "Late"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(registry.len(), 1);
    }
}
