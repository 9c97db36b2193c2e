//! Swap-safe model binding
//!
//! A [`ModelSlot`] represents one logical consumer of a model, such as a
//! mesh view changing what it displays. Swapping acquires the replacement
//! before releasing the previous keys, so a shared cache entry is never
//! evicted and reloaded while the same slot transiently still wants it.

use crate::error::ModelError;
use crate::model::{LoadedModel, MaterialSource, ModelKeys, ModelLoader, ModelParser};

/// One logical model slot holding at most one set of cache keys
#[derive(Debug, Default)]
pub struct ModelSlot {
    keys: Option<ModelKeys>,
}

impl ModelSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self { keys: None }
    }

    /// Keys currently pinned by this slot
    pub fn keys(&self) -> Option<&ModelKeys> {
        self.keys.as_ref()
    }

    /// Load a replacement model, then release whatever was held before
    ///
    /// On failure the slot keeps its previous model.
    pub async fn swap<P: ModelParser>(
        &mut self,
        loader: &ModelLoader<P>,
        mesh_url: &str,
        material: MaterialSource,
    ) -> Result<LoadedModel<P::Geometry, P::Materials>, ModelError> {
        let model = loader.load(mesh_url, material).await?;
        let previous = self.keys.replace(model.keys().clone());
        if let Some(previous) = previous {
            loader.release(&previous);
        }
        Ok(model)
    }

    /// Release the held model, if any
    pub fn clear<P: ModelParser>(&mut self, loader: &ModelLoader<P>) {
        if let Some(keys) = self.keys.take() {
            loader.release(&keys);
        }
    }
}
