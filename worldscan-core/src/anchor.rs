/// Anchors tracked by the depth-sensing session
use nalgebra::{Matrix4, Vector3};

use crate::buffer::{FaceBuffer, MeshBuffer};

/// Stable identity of an anchor across add/update/remove events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

/// Raw buffers of one reconstructed surface patch
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub vertices: MeshBuffer,
    pub normals: MeshBuffer,
    pub faces: FaceBuffer,
}

impl MeshGeometry {
    pub fn new(vertices: MeshBuffer, normals: MeshBuffer, faces: FaceBuffer) -> Self {
        Self {
            vertices,
            normals,
            faces,
        }
    }

    /// Build packed buffers from a triangle list
    pub fn from_triangles(
        positions: &[[f32; 3]],
        normals: &[[f32; 3]],
        triangles: &[[u32; 3]],
    ) -> Self {
        Self::new(
            MeshBuffer::from_float3(positions),
            MeshBuffer::from_float3(normals),
            FaceBuffer::from_triangles(triangles),
        )
    }
}

/// A connected patch of reconstructed surface
#[derive(Debug, Clone)]
pub struct MeshAnchor {
    pub id: AnchorId,
    /// Mesh-local to world
    pub transform: Matrix4<f32>,
    pub geometry: MeshGeometry,
}

impl MeshAnchor {
    pub fn new(id: AnchorId, transform: Matrix4<f32>, geometry: MeshGeometry) -> Self {
        Self {
            id,
            transform,
            geometry,
        }
    }
}

/// A region the session gathers environment lighting for
#[derive(Debug, Clone)]
pub struct EnvironmentProbeAnchor {
    pub id: AnchorId,
    pub transform: Matrix4<f32>,
    pub extent: Vector3<f32>,
}

#[derive(Debug, Clone)]
pub enum Anchor {
    Mesh(MeshAnchor),
    EnvironmentProbe(EnvironmentProbeAnchor),
}

impl Anchor {
    pub fn id(&self) -> AnchorId {
        match self {
            Anchor::Mesh(mesh) => mesh.id,
            Anchor::EnvironmentProbe(probe) => probe.id,
        }
    }

    pub fn transform(&self) -> &Matrix4<f32> {
        match self {
            Anchor::Mesh(mesh) => &mesh.transform,
            Anchor::EnvironmentProbe(probe) => &probe.transform,
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshAnchor> {
        match self {
            Anchor::Mesh(mesh) => Some(mesh),
            Anchor::EnvironmentProbe(_) => None,
        }
    }

    pub fn as_probe(&self) -> Option<&EnvironmentProbeAnchor> {
        match self {
            Anchor::EnvironmentProbe(probe) => Some(probe),
            Anchor::Mesh(_) => None,
        }
    }
}

/// Mesh anchors of a heterogeneous anchor list, in order
pub fn mesh_anchors<'a, I>(anchors: I) -> impl Iterator<Item = &'a MeshAnchor>
where
    I: IntoIterator<Item = &'a Anchor>,
{
    anchors.into_iter().filter_map(Anchor::as_mesh)
}

/// Environment probe anchors of a heterogeneous anchor list, in order
pub fn probe_anchors<'a, I>(anchors: I) -> impl Iterator<Item = &'a EnvironmentProbeAnchor>
where
    I: IntoIterator<Item = &'a Anchor>,
{
    anchors.into_iter().filter_map(Anchor::as_probe)
}
