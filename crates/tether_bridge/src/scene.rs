//! Scene graph collaborator interfaces
//!
//! The bridge never owns scene objects. It talks to the renderer's scene
//! graph through these traits: [`SceneIndex`] for the read-only ownership
//! chain used by event routing, [`SceneGraph`] for the node operations
//! needed by root-view lifecycle and transform anchoring.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a node owned by the scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

/// Tag naming a view across the bridge
///
/// Root handles share this space: they start at 1 and increase by
/// [`ROOT_TAG_STRIDE`] per creation, leaving the gaps for the views
/// mounted beneath each root.
///
/// [`ROOT_TAG_STRIDE`]: crate::context::ROOT_TAG_STRIDE
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub u32);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of scene ownership used by the event router
pub trait SceneIndex {
    /// Parent of a node, if it has one
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    /// Routable tag carried by a node
    ///
    /// Nodes without a tag are transparent to event routing.
    fn tag_of(&self, node: NodeId) -> Option<Tag>;
}

/// Mutating scene operations needed by root lifecycle and transform
/// anchoring
pub trait SceneGraph: SceneIndex {
    /// Create a detached node
    fn create_node(&mut self) -> NodeId;

    /// Remove a node from the graph
    fn remove_node(&mut self, node: NodeId);

    /// Attach `child` under `parent`
    fn attach(&mut self, parent: NodeId, child: NodeId);

    /// Detach every child of `node`, returning how many were detached
    fn detach_children(&mut self, node: NodeId) -> usize;

    /// Set a node's local transform from a column-major 4x4 matrix
    fn set_local_matrix(&mut self, node: NodeId, matrix: [f32; 16]);

    /// The camera node
    fn camera(&self) -> NodeId;
}
