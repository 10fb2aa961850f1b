/// Scene nodes that carry the geometry of each anchor
use nalgebra::Matrix4;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::anchor::AnchorId;
use crate::geometry::RenderableGeometry;

/// A node of the scene graph.
///
/// Geometry is replaced wholesale: the previous geometry is detached and
/// handed back, never merged with the new one.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub transform: Matrix4<f32>,
    geometry: Option<Arc<RenderableGeometry>>,
}

impl SceneNode {
    pub fn new(transform: Matrix4<f32>) -> Self {
        Self {
            transform,
            geometry: None,
        }
    }

    pub fn geometry(&self) -> Option<&Arc<RenderableGeometry>> {
        self.geometry.as_ref()
    }

    /// Attach `geometry`, returning whatever was attached before
    pub fn set_geometry(&mut self, geometry: RenderableGeometry) -> Option<Arc<RenderableGeometry>> {
        self.geometry.replace(Arc::new(geometry))
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new(Matrix4::identity())
    }
}

/// Nodes keyed by the anchor they render
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<AnchorId, SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: AnchorId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: AnchorId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    /// Add a node, replacing any node already attached for `id`
    pub fn insert(&mut self, id: AnchorId, node: SceneNode) -> Option<SceneNode> {
        self.nodes.insert(id, node)
    }

    pub fn remove(&mut self, id: AnchorId) -> Option<SceneNode> {
        self.nodes.remove(&id)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnchorId, &SceneNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }
}
