//! Error types for the asset system

use thiserror::Error;

/// Errors produced by cached loads
///
/// Cloneable so one failed load can reject every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The underlying retrieval failed
    #[error("failed to fetch '{key}': {message}")]
    Fetch { key: String, message: String },

    /// Retrieval succeeded but the payload would not parse
    #[error("failed to parse '{key}': {message}")]
    Parse { key: String, message: String },
}

/// Errors from the text retrieval layer
#[derive(Debug, Error)]
pub enum TransportError {
    /// No resource exists at the location
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Retrieval failed for another reason
    #[error("error reading '{url}': {message}")]
    Io { url: String, message: String },
}

/// Error from a format-specific parse step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

/// Errors from the model loading facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A model cannot be loaded without a mesh location
    #[error("a mesh location is required")]
    MissingMesh,

    /// The material source shape is not one the loader understands
    ///
    /// This indicates a caller defect and is reported immediately rather
    /// than deferred.
    #[error("unsupported material source: {0}")]
    UnsupportedMaterial(String),

    /// A cached load failed
    #[error(transparent)]
    Cache(#[from] CacheError),
}
