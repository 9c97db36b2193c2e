//! Model loading facade
//!
//! Composes two [`ResourceCache`]s (parsed geometry, parsed material
//! libraries) over one [`Transport`]. The format-specific grammar lives
//! behind [`ModelParser`]; the facade only moves text in and opaque parse
//! results out. Geometry and material are fetched concurrently and both
//! are deduplicated across every view that displays the same files.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::ResourceCache;
use crate::error::{CacheError, ModelError, ParseError};
use crate::transport::Transport;

/// Format-specific parse steps producing opaque intermediate state
pub trait ModelParser: Send + Sync + 'static {
    /// Parsed mesh geometry
    type Geometry: Send + Sync + 'static;
    /// Parsed material library
    type Materials: Send + Sync + 'static;

    /// Parse mesh text
    fn parse_geometry(&self, source: &str) -> Result<Self::Geometry, ParseError>;

    /// Parse material library text
    fn parse_materials(&self, source: &str) -> Result<Self::Materials, ParseError>;
}

/// Where a model's material information comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialSource {
    /// External material library, fetched and cached alongside the mesh
    Library(String),
    /// No material information; the consumer applies its own default
    Default,
}

impl MaterialSource {
    /// Interpret a declarative property value
    ///
    /// Accepts a string location, an object carrying a `uri` string, or
    /// null. Anything else is a caller defect and fails immediately.
    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        match value {
            Value::String(path) => Ok(Self::Library(path.clone())),
            Value::Object(fields) => match fields.get("uri") {
                Some(Value::String(path)) => Ok(Self::Library(path.clone())),
                _ => Err(ModelError::UnsupportedMaterial(
                    "object without a 'uri' string".to_string(),
                )),
            },
            Value::Null => Ok(Self::Default),
            other => Err(ModelError::UnsupportedMaterial(format!(
                "unexpected value {}",
                other
            ))),
        }
    }
}

/// Cache keys held by a loaded model, needed to release it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelKeys {
    pub mesh: String,
    pub materials: Option<String>,
}

/// A loaded model: shared parse results plus the keys that pin them
pub struct LoadedModel<G, M> {
    geometry: Arc<G>,
    materials: Option<Arc<M>>,
    keys: ModelKeys,
}

impl<G, M> LoadedModel<G, M> {
    /// The shared parsed geometry
    pub fn geometry(&self) -> &Arc<G> {
        &self.geometry
    }

    /// The shared parsed material library, if one was requested
    pub fn materials(&self) -> Option<&Arc<M>> {
        self.materials.as_ref()
    }

    /// The cache keys pinning this model
    pub fn keys(&self) -> &ModelKeys {
        &self.keys
    }
}

/// Loads models through the caches, one retrieval per distinct file
pub struct ModelLoader<P: ModelParser> {
    parser: Arc<P>,
    transport: Arc<dyn Transport>,
    geometry: ResourceCache<P::Geometry>,
    materials: ResourceCache<P::Materials>,
}

impl<P: ModelParser> ModelLoader<P> {
    /// Create a loader over a parser and a transport
    pub fn new(parser: P, transport: Arc<dyn Transport>) -> Self {
        Self {
            parser: Arc::new(parser),
            transport,
            geometry: ResourceCache::new(),
            materials: ResourceCache::new(),
        }
    }

    /// Load a model, acquiring one reference per underlying file
    ///
    /// Geometry and material library are fetched concurrently. On a
    /// partial failure the reference that did land is released again, so
    /// a failed load never pins anything.
    pub async fn load(
        &self,
        mesh_url: &str,
        material: MaterialSource,
    ) -> Result<LoadedModel<P::Geometry, P::Materials>, ModelError> {
        if mesh_url.is_empty() {
            return Err(ModelError::MissingMesh);
        }
        match material {
            MaterialSource::Library(material_url) => {
                let (geometry, materials) = futures::join!(
                    self.fetch_geometry(mesh_url),
                    self.fetch_materials(&material_url)
                );
                match (geometry, materials) {
                    (Ok(geometry), Ok(materials)) => Ok(LoadedModel {
                        geometry,
                        materials: Some(materials),
                        keys: ModelKeys {
                            mesh: mesh_url.to_string(),
                            materials: Some(material_url),
                        },
                    }),
                    (Ok(_), Err(e)) => {
                        self.geometry.release(mesh_url);
                        Err(e.into())
                    }
                    (Err(e), Ok(_)) => {
                        self.materials.release(&material_url);
                        Err(e.into())
                    }
                    (Err(e), Err(_)) => Err(e.into()),
                }
            }
            MaterialSource::Default => {
                let geometry = self.fetch_geometry(mesh_url).await?;
                Ok(LoadedModel {
                    geometry,
                    materials: None,
                    keys: ModelKeys {
                        mesh: mesh_url.to_string(),
                        materials: None,
                    },
                })
            }
        }
    }

    /// Drop the references a loaded model was holding
    pub fn release(&self, keys: &ModelKeys) {
        self.geometry.release(&keys.mesh);
        if let Some(materials) = &keys.materials {
            self.materials.release(materials);
        }
    }

    /// The geometry cache
    pub fn geometry_cache(&self) -> &ResourceCache<P::Geometry> {
        &self.geometry
    }

    /// The material cache
    pub fn materials_cache(&self) -> &ResourceCache<P::Materials> {
        &self.materials
    }

    fn fetch_geometry(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Arc<P::Geometry>, CacheError>> + Send {
        let transport = Arc::clone(&self.transport);
        let parser = Arc::clone(&self.parser);
        let key = url.to_string();
        self.geometry.fetch_and_cache(url, move || async move {
            let text = transport.fetch_text(&key).await.map_err(|e| CacheError::Fetch {
                key: key.clone(),
                message: e.to_string(),
            })?;
            parser.parse_geometry(&text).map_err(|e| CacheError::Parse {
                key: key.clone(),
                message: e.to_string(),
            })
        })
    }

    fn fetch_materials(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Arc<P::Materials>, CacheError>> + Send {
        let transport = Arc::clone(&self.transport);
        let parser = Arc::clone(&self.parser);
        let key = url.to_string();
        self.materials.fetch_and_cache(url, move || async move {
            let text = transport.fetch_text(&key).await.map_err(|e| CacheError::Fetch {
                key: key.clone(),
                message: e.to_string(),
            })?;
            parser.parse_materials(&text).map_err(|e| CacheError::Parse {
                key: key.clone(),
                message: e.to_string(),
            })
        })
    }
}

impl<P: ModelParser> Clone for ModelLoader<P> {
    fn clone(&self) -> Self {
        Self {
            parser: Arc::clone(&self.parser),
            transport: Arc::clone(&self.transport),
            geometry: self.geometry.clone(),
            materials: self.materials.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_material_source_shapes() {
        assert_eq!(
            MaterialSource::from_value(&json!("mats/wood.mtl")).unwrap(),
            MaterialSource::Library("mats/wood.mtl".to_string())
        );
        assert_eq!(
            MaterialSource::from_value(&json!({"uri": "mats/wood.mtl"})).unwrap(),
            MaterialSource::Library("mats/wood.mtl".to_string())
        );
        assert_eq!(
            MaterialSource::from_value(&Value::Null).unwrap(),
            MaterialSource::Default
        );
        assert!(MaterialSource::from_value(&json!(42)).is_err());
        assert!(MaterialSource::from_value(&json!({"path": "x"})).is_err());
    }
}
