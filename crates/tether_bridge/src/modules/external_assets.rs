//! Asset-root resolution module

use serde_json::{json, Value};

use crate::error::{DispatchError, Result};
use crate::module::{ModuleContext, ModuleDescriptor, NativeModule};

/// Scheme marking a location as relative to the configured asset root
pub const ASSET_SCHEME: &str = "asset://";

/// Publishes the asset root to the app context
///
/// The root is exported as a constant in the module contract so the app
/// can resolve `asset://` locations itself; [`resolve`] performs the same
/// rewrite on the native side.
///
/// [`resolve`]: ExternalAssetsModule::resolve
pub struct ExternalAssetsModule {
    asset_root: String,
}

impl ExternalAssetsModule {
    /// Create the module for a given asset root
    pub fn new(asset_root: impl Into<String>) -> Self {
        let mut asset_root = asset_root.into();
        if !asset_root.ends_with('/') {
            asset_root.push('/');
        }
        Self { asset_root }
    }

    /// The configured asset root, always slash-terminated
    pub fn asset_root(&self) -> &str {
        &self.asset_root
    }

    /// Rewrite an `asset://` location against the asset root
    ///
    /// Other locations pass through untouched.
    pub fn resolve(&self, source: &str) -> String {
        match source.strip_prefix(ASSET_SCHEME) {
            Some(relative) => format!("{}{}", self.asset_root, relative),
            None => source.to_string(),
        }
    }
}

impl NativeModule for ExternalAssetsModule {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::builder("ExternalAssets")
            .constant("assetRoot", json!(self.asset_root))
            .build()
    }

    fn invoke(&mut self, function: usize, _args: &[Value], _ctx: &ModuleContext) -> Result<()> {
        Err(DispatchError::FunctionOutOfRange {
            module: "ExternalAssets".to_string(),
            function: function as u32,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rewrites_asset_scheme() {
        let module = ExternalAssetsModule::new("https://cdn.example/static");
        assert_eq!(
            module.resolve("asset://meshes/chair.obj"),
            "https://cdn.example/static/meshes/chair.obj"
        );
        assert_eq!(
            module.resolve("https://elsewhere.example/x.obj"),
            "https://elsewhere.example/x.obj"
        );
    }

    #[test]
    fn test_asset_root_exported_as_constant() {
        let module = ExternalAssetsModule::new("static/");
        let descriptor = module.descriptor();
        assert!(descriptor.functions.is_empty());
        assert_eq!(descriptor.constants["assetRoot"], "static/");
    }
}
