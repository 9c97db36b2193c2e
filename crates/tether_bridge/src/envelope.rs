//! Bridge wire protocol
//!
//! Every message crossing the channel is one [`Envelope`], serialized as
//! JSON text with a `cmd` tag. The native runtime sends named `exec`
//! calls, `invoke` callback resolutions, the startup `moduleConfig` and
//! `bundle` envelopes, and one `flush` per frame tick. The app context
//! answers with `batch` envelopes: a triple of equal-length index and
//! argument sequences collected since the last flush.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, DispatchError, Result};
use crate::module::ModuleDescriptor;

/// One structured message unit sent over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Envelope {
    /// Single named call, native runtime -> app context
    Exec {
        module: String,
        function: String,
        #[serde(default)]
        args: Vec<Value>,
    },

    /// Batched indexed calls, app context -> native runtime
    Batch(InboundBatch),

    /// Resolve or reject a previously issued callback id
    Invoke {
        id: u64,
        #[serde(default)]
        args: Vec<Value>,
    },

    /// Request all buffered remote output; no payload
    Flush,

    /// Ordered module contract, sent once at startup
    ModuleConfig { modules: Vec<ModuleDescriptor> },

    /// Application entry-point location, sent once at startup
    Bundle { path: String },
}

impl Envelope {
    /// Serialize to the wire representation
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BridgeError::Encode(e.to_string()))
    }

    /// Decode from the wire representation
    pub fn from_json(raw: &str) -> std::result::Result<Self, DispatchError> {
        serde_json::from_str(raw).map_err(|e| DispatchError::Undecodable(e.to_string()))
    }

    /// Build a named exec call
    pub fn exec(module: impl Into<String>, function: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Exec {
            module: module.into(),
            function: function.into(),
            args,
        }
    }
}

/// Calls accumulated by the app context between two flush cycles
///
/// The three sequences must have equal lengths; each position holds one
/// `(module index, function index, argument list)` triple. A batch that
/// violates this is protocol malformation and is handled per
/// [`MalformedPolicy`].
///
/// [`MalformedPolicy`]: crate::dispatch::MalformedPolicy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundBatch {
    #[serde(default)]
    pub modules: Vec<u32>,
    #[serde(default)]
    pub functions: Vec<u32>,
    #[serde(default)]
    pub args: Vec<Vec<Value>>,
}

impl InboundBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one call triple
    pub fn push(&mut self, module: u32, function: u32, args: Vec<Value>) {
        self.modules.push(module);
        self.functions.push(function);
        self.args.push(args);
    }

    /// Number of calls carried by the batch
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the batch carries no calls
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Whether the three sequences have equal lengths
    pub fn is_well_formed(&self) -> bool {
        self.modules.len() == self.functions.len() && self.functions.len() == self.args.len()
    }

    /// Iterate call triples in arrival order
    pub fn calls(&self) -> impl Iterator<Item = (u32, u32, &[Value])> + '_ {
        self.modules
            .iter()
            .zip(&self.functions)
            .zip(&self.args)
            .map(|((&module, &function), args)| (module, function, args.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flush_wire_shape() {
        let raw = Envelope::Flush.to_json().unwrap();
        assert_eq!(raw, r#"{"cmd":"flush"}"#);
    }

    #[test]
    fn test_exec_roundtrip() {
        let envelope = Envelope::exec("AppRegistry", "runApplication", vec![json!("main")]);
        let raw = envelope.to_json().unwrap();
        assert!(raw.contains(r#""cmd":"exec""#));

        let decoded = Envelope::from_json(&raw).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_batch_roundtrip() {
        let mut batch = InboundBatch::new();
        batch.push(0, 1, vec![json!(42)]);
        batch.push(2, 0, vec![json!("a"), json!("b")]);

        let raw = Envelope::Batch(batch.clone()).to_json().unwrap();
        let decoded = Envelope::from_json(&raw).unwrap();
        assert_eq!(decoded, Envelope::Batch(batch));
    }

    #[test]
    fn test_batch_missing_args_is_malformed() {
        let decoded = Envelope::from_json(r#"{"cmd":"batch","modules":[0,1],"functions":[0,0]}"#);
        match decoded {
            Ok(Envelope::Batch(batch)) => assert!(!batch.is_well_formed()),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_payload() {
        assert!(matches!(
            Envelope::from_json("not json"),
            Err(DispatchError::Undecodable(_))
        ));
    }

    #[test]
    fn test_batch_call_order() {
        let mut batch = InboundBatch::new();
        for i in 0..4u32 {
            batch.push(i, i + 1, vec![json!(i)]);
        }
        let calls: Vec<_> = batch.calls().collect();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].0, 0);
        assert_eq!(calls[3].1, 4);
    }
}
