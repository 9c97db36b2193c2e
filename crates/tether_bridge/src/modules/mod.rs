//! Built-in native modules
//!
//! The small set of modules most hosted apps expect. They are not
//! registered automatically; a session registers what it wants before
//! `init`.

pub mod exceptions;
pub mod external_assets;
pub mod source_code;

pub use exceptions::ExceptionsModule;
pub use external_assets::ExternalAssetsModule;
pub use source_code::SourceCodeModule;
