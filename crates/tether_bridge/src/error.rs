//! Error types for the bridge

use thiserror::Error;

use crate::scene::Tag;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The peer endpoint of the message channel was dropped
    #[error("message channel closed")]
    ChannelClosed,

    /// An envelope could not be serialized
    #[error("failed to encode envelope: {0}")]
    Encode(String),

    /// A module was registered after the contract was generated
    #[error("module '{0}' registered after the module contract was sealed")]
    RegistrySealed(String),

    /// `init` was called twice on the same context
    #[error("bridge context is already initialized")]
    AlreadyInitialized,

    /// A lifecycle call was made before `init`
    #[error("bridge context is not initialized")]
    NotInitialized,

    /// The frame pump was invoked while a pump cycle was in progress
    #[error("frame pump invoked while a pump cycle is in progress")]
    PumpBusy,

    /// A root-view call referenced a handle that was never created
    /// (or was already destroyed)
    #[error("unknown root handle {0}")]
    UnknownRoot(Tag),

    /// The bundle location could not be parsed for live-reload activation
    #[error("bundle location '{url}' is not a valid URL: {message}")]
    InvalidBundleUrl { url: String, message: String },

    /// Protocol malformation surfaced under [`MalformedPolicy::Fail`]
    ///
    /// [`MalformedPolicy::Fail`]: crate::dispatch::MalformedPolicy
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Protocol-malformation errors detected while buffering or draining
/// inbound batches
///
/// Under the default [`MalformedPolicy::Drop`] these are logged at debug
/// level and counted, never returned.
///
/// [`MalformedPolicy::Drop`]: crate::dispatch::MalformedPolicy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Inbound payload was not a valid envelope
    #[error("undecodable inbound envelope: {0}")]
    Undecodable(String),

    /// Batch index/argument sequences have different lengths
    #[error(
        "batch arity mismatch: {modules} module indices, {functions} function indices, {args} argument lists"
    )]
    ArityMismatch {
        modules: usize,
        functions: usize,
        args: usize,
    },

    /// Module index does not resolve against the registry
    #[error("module index {0} out of range")]
    ModuleOutOfRange(u32),

    /// Function index does not resolve against the module's function table
    #[error("function index {function} out of range for module '{module}'")]
    FunctionOutOfRange { module: String, function: u32 },

    /// An async function was called without its two trailing callback ids
    #[error("async function '{function}' called without resolve/reject callback ids")]
    MissingCallbacks { function: String },
}
