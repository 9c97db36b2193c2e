//! Native module contract
//!
//! A module is a named collection of native functions callable from the
//! app context. Its surface is declared once through a [`SurfaceBuilder`]
//! and frozen into a [`ModuleDescriptor`]; the ordered descriptor list is
//! the contract both sides dispatch against.
//!
//! # Surface conventions
//!
//! - Members whose declared name starts with `_` are hidden and never
//!   exported.
//! - Function names starting with `$` are exported (marker stripped) as
//!   async functions: the remote side appends two trailing callback-id
//!   arguments (resolve, reject) which the native implementation answers
//!   through [`Responder`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::channel::OutboundSender;
use crate::error::{DispatchError, Result};

/// Marker prefix excluding a member from the exported surface
pub const HIDDEN_MARKER: char = '_';

/// Marker prefix declaring a function async (resolve/reject callbacks)
pub const ASYNC_MARKER: char = '$';

/// How a function returns to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    /// Fire-and-forget; nothing comes back
    Sync,
    /// Takes two extra trailing callback ids and answers via `invoke`
    Async,
}

/// One exported function of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub kind: FunctionKind,
}

/// Immutable description of one module's exported surface
///
/// Built once at registration time, owned by the registry afterwards.
/// Function index is the position in `functions`, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub functions: Vec<FunctionDescriptor>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub constants: Map<String, Value>,
    /// Hidden members were already stripped when this descriptor was built
    pub hidden_excluded: bool,
}

impl ModuleDescriptor {
    /// Start declaring a module surface
    pub fn builder(name: impl Into<String>) -> SurfaceBuilder {
        SurfaceBuilder {
            name: name.into(),
            functions: Vec::new(),
            constants: Map::new(),
        }
    }

    /// Look up a function by exported name
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }

    /// Look up a function by index
    pub fn function(&self, index: usize) -> Option<&FunctionDescriptor> {
        self.functions.get(index)
    }
}

/// Builder enumerating a module's declared surface in declaration order
pub struct SurfaceBuilder {
    name: String,
    functions: Vec<FunctionDescriptor>,
    constants: Map<String, Value>,
}

impl SurfaceBuilder {
    /// Declare a function-valued member
    ///
    /// Applies the marker conventions: `_`-prefixed names are dropped,
    /// `$`-prefixed names are exported without the marker as async.
    pub fn function(mut self, declared: &str) -> Self {
        if declared.starts_with(HIDDEN_MARKER) {
            return self;
        }
        let (name, kind) = match declared.strip_prefix(ASYNC_MARKER) {
            Some(stripped) => (stripped, FunctionKind::Async),
            None => (declared, FunctionKind::Sync),
        };
        self.functions.push(FunctionDescriptor {
            name: name.to_string(),
            kind,
        });
        self
    }

    /// Declare a data-valued member
    ///
    /// `_`-prefixed names are dropped.
    pub fn constant(mut self, declared: &str, value: Value) -> Self {
        if !declared.starts_with(HIDDEN_MARKER) {
            self.constants.insert(declared.to_string(), value);
        }
        self
    }

    /// Freeze the surface
    pub fn build(self) -> ModuleDescriptor {
        ModuleDescriptor {
            name: self.name,
            functions: self.functions,
            constants: self.constants,
            hidden_excluded: true,
        }
    }
}

/// Timing information handed to module frame hooks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Monotonically increasing frame counter
    pub frame: u64,
    /// Frame timestamp in milliseconds, as supplied by the render loop
    pub time_ms: f64,
}

/// Outbound capabilities handed to modules during dispatch
///
/// Modules never touch the channel directly; everything they send goes
/// through this context.
pub struct ModuleContext {
    sender: OutboundSender,
}

impl ModuleContext {
    /// Wrap an outbound sender
    pub fn new(sender: OutboundSender) -> Self {
        Self { sender }
    }

    /// Clone the underlying sender
    pub fn sender(&self) -> OutboundSender {
        self.sender.clone()
    }

    /// Send a named exec call to the app context
    pub fn call_function(&self, module: &str, function: &str, args: Vec<Value>) -> Result<()> {
        self.sender.call_function(module, function, args)
    }

    /// Resolve or reject a remote callback by id
    pub fn invoke_callback(&self, id: u64, args: Vec<Value>) -> Result<()> {
        self.sender.invoke_callback(id, args)
    }
}

/// A native-side module callable from the app context
pub trait NativeModule: Send {
    /// The module's exported surface
    fn descriptor(&self) -> ModuleDescriptor;

    /// Invoke an exported function by index with positional arguments
    fn invoke(&mut self, function: usize, args: &[Value], ctx: &ModuleContext) -> Result<()>;

    /// Per-frame servicing hook, called after dispatch each frame
    fn frame(&mut self, _tick: &FrameTick, _ctx: &ModuleContext) {}

    /// Called once when the owning context shuts down
    fn shutdown(&mut self) {}
}

/// The resolve/reject pair of an async function call
///
/// Split off the trailing two arguments with [`Responder::split_args`],
/// then consume the responder exactly once. There is no timeout anywhere
/// in the bridge: a responder that is dropped without answering leaves
/// the remote promise pending forever.
pub struct Responder {
    resolve_id: u64,
    reject_id: u64,
    sender: OutboundSender,
}

impl Responder {
    /// Split an async call's argument list into payload and responder
    pub fn split_args<'a>(
        function: &str,
        args: &'a [Value],
        ctx: &ModuleContext,
    ) -> Result<(&'a [Value], Responder)> {
        let missing = || DispatchError::MissingCallbacks {
            function: function.to_string(),
        };
        if args.len() < 2 {
            return Err(missing().into());
        }
        let (payload, ids) = args.split_at(args.len() - 2);
        let resolve_id = ids[0].as_u64().ok_or_else(missing)?;
        let reject_id = ids[1].as_u64().ok_or_else(missing)?;
        Ok((
            payload,
            Responder {
                resolve_id,
                reject_id,
                sender: ctx.sender(),
            },
        ))
    }

    /// Answer the call successfully
    pub fn resolve(self, args: Vec<Value>) -> Result<()> {
        self.sender.invoke_callback(self.resolve_id, args)
    }

    /// Answer the call with a failure
    pub fn reject(self, args: Vec<Value>) -> Result<()> {
        self.sender.invoke_callback(self.reject_id, args)
    }
}
