//! App exception sink module

use serde_json::Value;

use crate::error::{DispatchError, Result};
use crate::module::{ModuleContext, ModuleDescriptor, NativeModule};

/// Routes app-side exception reports into the native log
pub struct ExceptionsModule;

impl ExceptionsModule {
    /// Create the module
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExceptionsModule {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_report(args: &[Value]) -> String {
    match args.first() {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => "<no message>".to_string(),
    }
}

impl NativeModule for ExceptionsModule {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::builder("ExceptionsManager")
            .function("reportSoftException")
            .function("reportFatalException")
            .build()
    }

    fn invoke(&mut self, function: usize, args: &[Value], _ctx: &ModuleContext) -> Result<()> {
        match function {
            0 => {
                log::warn!("app exception: {}", describe_report(args));
                Ok(())
            }
            1 => {
                log::error!("fatal app exception: {}", describe_report(args));
                Ok(())
            }
            other => Err(DispatchError::FunctionOutOfRange {
                module: "ExceptionsManager".to_string(),
                function: other as u32,
            }
            .into()),
        }
    }
}
