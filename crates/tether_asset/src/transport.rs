//! Text retrieval layer
//!
//! The cache and loader are agnostic to where asset text comes from;
//! they only see this trait. [`FileTransport`] serves a rooted directory
//! and is what tests and local deployments use.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::TransportError;

/// Retrieves asset text by location
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the text at `url`
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError>;
}

/// Transport over a rooted local directory
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    /// Serve files under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        self.root.join(url.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        let path = self.resolve(url);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                TransportError::NotFound(url.to_string())
            } else {
                TransportError::Io {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}
