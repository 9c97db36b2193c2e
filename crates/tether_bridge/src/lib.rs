//! # tether_bridge - Frame-Synchronized App Bridge
//!
//! Structured, asynchronous, ordered message passing between a native
//! runtime that owns the scene graph and an isolated context running
//! declarative app logic:
//! - Tagged JSON envelopes over paired FIFO channels
//! - Ordered module registry with startup contract generation
//! - Frame pump that buffers inbound batches and drains them in order
//! - Event router reducing scene hits to enter/exit call pairs
//! - Root-view lifecycle with strided handles and transform anchoring
//!
//! The bridge never blocks on remote work: each frame dispatches only
//! what had already arrived by the time the flush response drained, and
//! async results come back through tagged callback ids. There are no
//! timeouts anywhere; a callback that is never answered stays pending on
//! the remote side.

pub mod channel;
pub mod context;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod events;
pub mod module;
pub mod modules;
pub mod registry;
pub mod scene;

pub use channel::{ChannelEndpoint, OutboundSender};
pub use context::{BridgeConfig, BridgeContext, FrameReport, ROOT_TAG_STRIDE};
pub use dispatch::{DispatchStats, MalformedPolicy, MessagePump, PumpState};
pub use envelope::{Envelope, InboundBatch};
pub use error::{BridgeError, DispatchError, Result};
pub use events::{EventRouter, HitClass};
pub use module::{
    FrameTick, FunctionDescriptor, FunctionKind, ModuleContext, ModuleDescriptor, NativeModule,
    Responder,
};
pub use registry::ModuleRegistry;
pub use scene::{NodeId, SceneGraph, SceneIndex, Tag};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::channel::ChannelEndpoint;
    pub use crate::context::{BridgeConfig, BridgeContext, FrameReport};
    pub use crate::dispatch::MalformedPolicy;
    pub use crate::envelope::{Envelope, InboundBatch};
    pub use crate::error::{BridgeError, Result};
    pub use crate::events::HitClass;
    pub use crate::module::{ModuleContext, ModuleDescriptor, NativeModule, Responder};
    pub use crate::scene::{NodeId, SceneGraph, SceneIndex, Tag};
}
