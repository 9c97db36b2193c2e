//! Script source lookup module

use serde_json::{json, Value};

use crate::error::{DispatchError, Result};
use crate::module::{ModuleContext, ModuleDescriptor, NativeModule, Responder};

/// Lets the app context look up where its script was loaded from
///
/// `getScriptText` is async: it answers through the callback protocol
/// with the configured script URL.
pub struct SourceCodeModule {
    script_url: String,
}

impl SourceCodeModule {
    /// Create the module for a given script location
    pub fn new(script_url: impl Into<String>) -> Self {
        Self {
            script_url: script_url.into(),
        }
    }
}

impl NativeModule for SourceCodeModule {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::builder("SourceCode")
            .function("$getScriptText")
            .constant("scriptURL", json!(self.script_url))
            .build()
    }

    fn invoke(&mut self, function: usize, args: &[Value], ctx: &ModuleContext) -> Result<()> {
        match function {
            0 => {
                let (_, responder) = Responder::split_args("getScriptText", args, ctx)?;
                responder.resolve(vec![json!({
                    "fullSourceMappingURL": self.script_url,
                })])
            }
            other => Err(DispatchError::FunctionOutOfRange {
                module: "SourceCode".to_string(),
                function: other as u32,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelEndpoint;
    use crate::envelope::Envelope;

    #[test]
    fn test_get_script_text_resolves() {
        let (native, app) = ChannelEndpoint::pair();
        let ctx = ModuleContext::new(native.sender());
        let mut module = SourceCodeModule::new("http://localhost:8081/main.bundle");

        module
            .invoke(0, &[json!(5), json!(6)], &ctx)
            .unwrap();

        match app.try_recv() {
            Some(Ok(Envelope::Invoke { id, args })) => {
                assert_eq!(id, 5);
                assert_eq!(
                    args[0]["fullSourceMappingURL"],
                    "http://localhost:8081/main.bundle"
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
