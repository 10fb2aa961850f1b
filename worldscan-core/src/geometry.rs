/// Renderable geometry assembled from raw mesh buffers
use image::RgbaImage;
use nalgebra::Point3;
use std::sync::Arc;

use crate::buffer::{FaceBuffer, MeshBuffer, MeshPrimitive, SharedBytes, VertexFormat};
use crate::projector::TextureCoordinateSet;

/// What a geometry source supplies to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantic {
    Vertex,
    Normal,
    Texcoord,
}

/// Topology understood by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Line,
    Triangles,
}

impl PrimitiveType {
    /// Panics on topologies the renderer has no drawing mode for.
    pub fn from_mesh(primitive: MeshPrimitive) -> Self {
        match primitive {
            MeshPrimitive::Line => PrimitiveType::Line,
            MeshPrimitive::Triangle => PrimitiveType::Triangles,
            MeshPrimitive::Unknown(raw) => panic!("unknown mesh primitive type {raw}"),
        }
    }

    pub fn indices_per_primitive(self) -> usize {
        match self {
            PrimitiveType::Line => 2,
            PrimitiveType::Triangles => 3,
        }
    }
}

/// A typed, strided attribute stream
#[derive(Debug, Clone)]
pub struct GeometrySource {
    data: SharedBytes,
    pub semantic: Semantic,
    pub format: VertexFormat,
    pub vector_count: usize,
    pub offset: usize,
    pub stride: usize,
}

impl GeometrySource {
    /// Wrap a mesh buffer without copying it
    pub fn from_mesh_buffer(buffer: &MeshBuffer, semantic: Semantic) -> Self {
        Self {
            data: Arc::clone(&buffer.buffer),
            semantic,
            format: buffer.format,
            vector_count: buffer.count,
            offset: buffer.offset,
            stride: buffer.stride,
        }
    }

    /// Owned, tightly packed float2 stream
    pub fn texture_coordinates(coordinates: &TextureCoordinateSet) -> Self {
        Self {
            data: Arc::from(coordinates.as_bytes()),
            semantic: Semantic::Texcoord,
            format: VertexFormat::Float2,
            vector_count: coordinates.len(),
            offset: 0,
            stride: VertexFormat::Float2.size(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether this source reads from the same memory as `buffer`
    pub fn shares_memory_with(&self, buffer: &MeshBuffer) -> bool {
        Arc::ptr_eq(&self.data, &buffer.buffer)
    }

    fn element(&self, index: usize) -> Option<&[u8]> {
        if index >= self.vector_count {
            return None;
        }
        let start = index.checked_mul(self.stride)?.checked_add(self.offset)?;
        let end = start.checked_add(self.format.size())?;
        self.data.get(start..end)
    }

    /// Element `index` of a float3 stream
    pub fn float3(&self, index: usize) -> Option<Point3<f32>> {
        if self.format != VertexFormat::Float3 {
            return None;
        }
        self.element(index)
            .map(|bytes| Point3::from(bytemuck::pod_read_unaligned::<[f32; 3]>(bytes)))
    }

    /// Element `index` of a float2 stream
    pub fn float2(&self, index: usize) -> Option<[f32; 2]> {
        if self.format != VertexFormat::Float2 {
            return None;
        }
        self.element(index).map(bytemuck::pod_read_unaligned::<[f32; 2]>)
    }
}

/// Owned index data with its topology
#[derive(Debug, Clone)]
pub struct GeometryElement {
    data: Vec<u8>,
    pub primitive_type: PrimitiveType,
    pub primitive_count: usize,
    pub bytes_per_index: usize,
}

impl GeometryElement {
    /// Copy a face buffer. Panics on unknown topologies.
    pub fn from_faces(faces: &FaceBuffer) -> Self {
        Self {
            data: faces.buffer[..faces.buffer_length()].to_vec(),
            primitive_type: PrimitiveType::from_mesh(faces.primitive),
            primitive_count: faces.count,
            bytes_per_index: faces.bytes_per_index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn index_count(&self) -> usize {
        self.primitive_count * self.primitive_type.indices_per_primitive()
    }

    /// Decode the indices of every primitive.
    ///
    /// Panics if the index width is not 1, 2 or 4 bytes or the data is short.
    pub fn indices(&self) -> Vec<u32> {
        let width = self.bytes_per_index;
        let needed = self.index_count() * width;
        assert!(
            needed <= self.data.len(),
            "face data holds {} bytes, {} indices need {}",
            self.data.len(),
            self.index_count(),
            needed
        );
        self.data[..needed]
            .chunks_exact(width)
            .map(|bytes| match width {
                1 => u32::from(bytes[0]),
                2 => u32::from(bytemuck::pod_read_unaligned::<u16>(bytes)),
                4 => bytemuck::pod_read_unaligned::<u32>(bytes),
                _ => panic!("unsupported index width {width}"),
            })
            .collect()
    }

    /// Triangles of a triangle element, empty for lines
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        if self.primitive_type != PrimitiveType::Triangles {
            return Vec::new();
        }
        self.indices()
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
            .collect()
    }
}

/// Diffuse contents of a material
#[derive(Debug, Clone)]
pub enum Diffuse {
    Image(Arc<RgbaImage>),
    /// Linear RGBA
    Color([f32; 4]),
}

#[derive(Debug, Clone)]
pub struct Material {
    pub diffuse: Diffuse,
}

impl Material {
    /// Tint of surfaces that have not been textured yet
    pub const PENDING_TINT: [f32; 4] = [0.5, 1.0, 0.0, 0.7];

    pub fn pending() -> Self {
        Self {
            diffuse: Diffuse::Color(Self::PENDING_TINT),
        }
    }

    pub fn textured(image: Arc<RgbaImage>) -> Self {
        Self {
            diffuse: Diffuse::Image(image),
        }
    }

    pub fn is_textured(&self) -> bool {
        matches!(self.diffuse, Diffuse::Image(_))
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::pending()
    }
}

/// Attribute streams, index elements and material handed to the renderer
#[derive(Debug, Clone)]
pub struct RenderableGeometry {
    pub sources: Vec<GeometrySource>,
    pub elements: Vec<GeometryElement>,
    pub material: Material,
}

impl RenderableGeometry {
    pub fn new(sources: Vec<GeometrySource>, elements: Vec<GeometryElement>) -> Self {
        Self {
            sources,
            elements,
            material: Material::default(),
        }
    }

    /// First source with the given semantic
    pub fn source(&self, semantic: Semantic) -> Option<&GeometrySource> {
        self.sources.iter().find(|source| source.semantic == semantic)
    }

    pub fn vertex_count(&self) -> usize {
        self.source(Semantic::Vertex)
            .map_or(0, |source| source.vector_count)
    }
}

/// Assemble raw mesh buffers into renderable geometry.
///
/// Positions and normals are shared with the mesh buffers as-is, faces are
/// copied, and texture coordinates (when given) become a third packed source.
/// Panics if the face topology is unknown or if `texcoords` is not
/// index-aligned with `vertices`.
pub fn assemble(
    vertices: &MeshBuffer,
    normals: &MeshBuffer,
    faces: &FaceBuffer,
    texcoords: Option<&TextureCoordinateSet>,
) -> RenderableGeometry {
    let element = GeometryElement::from_faces(faces);

    let mut sources = vec![
        GeometrySource::from_mesh_buffer(vertices, Semantic::Vertex),
        GeometrySource::from_mesh_buffer(normals, Semantic::Normal),
    ];
    if let Some(texcoords) = texcoords {
        assert_eq!(
            texcoords.len(),
            vertices.count,
            "texture coordinates must be index-aligned with the vertex buffer"
        );
        sources.push(GeometrySource::texture_coordinates(texcoords));
    }

    RenderableGeometry::new(sources, vec![element])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> (MeshBuffer, MeshBuffer, FaceBuffer) {
        (
            MeshBuffer::from_float3(&[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ]),
            MeshBuffer::from_float3(&[[0.0, 0.0, 1.0]; 4]),
            FaceBuffer::from_triangles(&[[0, 1, 2], [0, 2, 3]]),
        )
    }

    #[test]
    fn test_untextured_has_two_sources() {
        let (vertices, normals, faces) = unit_square();
        let geometry = assemble(&vertices, &normals, &faces, None);

        assert_eq!(geometry.sources.len(), 2);
        assert_eq!(geometry.elements.len(), 1);
        assert!(geometry.source(Semantic::Texcoord).is_none());
        assert_eq!(geometry.vertex_count(), 4);
    }

    #[test]
    fn test_textured_has_three_sources() {
        let (vertices, normals, faces) = unit_square();
        let texcoords = TextureCoordinateSet::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        let geometry = assemble(&vertices, &normals, &faces, Some(&texcoords));

        assert_eq!(geometry.sources.len(), 3);
        let uv = geometry.source(Semantic::Texcoord).unwrap();
        assert_eq!(uv.stride, 8);
        assert_eq!(uv.format, VertexFormat::Float2);
        assert_eq!(uv.data().len(), 32);
        assert_eq!(uv.float2(2), Some([1.0, 1.0]));
    }

    #[test]
    fn test_positions_and_normals_are_not_copied() {
        let (vertices, normals, faces) = unit_square();
        let geometry = assemble(&vertices, &normals, &faces, None);

        let positions = geometry.source(Semantic::Vertex).unwrap();
        assert!(positions.shares_memory_with(&vertices));
        assert!(geometry.source(Semantic::Normal).unwrap().shares_memory_with(&normals));
        assert_eq!(positions.float3(2), Some(Point3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_strided_source_keeps_layout() {
        let data: [f32; 12] = [
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            2.0, 3.0, 4.0, 0.0, 0.0, 1.0,
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let shared: SharedBytes = Arc::from(bytes);
        let vertices = MeshBuffer::new(Arc::clone(&shared), 0, 24, 2, VertexFormat::Float3);
        let normals = MeshBuffer::new(shared, 12, 24, 2, VertexFormat::Float3);
        let faces = FaceBuffer::from_lines(&[[0, 1]]);

        let geometry = assemble(&vertices, &normals, &faces, None);
        let positions = geometry.source(Semantic::Vertex).unwrap();
        assert_eq!((positions.offset, positions.stride), (0, 24));
        assert_eq!(positions.float3(1), Some(Point3::new(2.0, 3.0, 4.0)));
        let normal = geometry.source(Semantic::Normal).unwrap();
        assert_eq!(normal.float3(0), Some(Point3::new(0.0, 0.0, 1.0)));
        assert_eq!(geometry.elements[0].primitive_type, PrimitiveType::Line);
        assert!(geometry.elements[0].triangles().is_empty());
    }

    #[test]
    fn test_faces_round_trip() {
        let (vertices, normals, faces) = unit_square();
        let geometry = assemble(&vertices, &normals, &faces, None);

        let element = &geometry.elements[0];
        assert_eq!(element.primitive_type, PrimitiveType::Triangles);
        assert_eq!(element.index_count(), 6);
        assert_eq!(element.data().len(), faces.buffer_length());
        assert_eq!(element.triangles(), vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_sixteen_bit_indices() {
        let indices: [u16; 3] = [2, 1, 0];
        let bytes: &[u8] = bytemuck::cast_slice(&indices);
        let faces = FaceBuffer::new(Arc::from(bytes), 1, MeshPrimitive::Triangle, 2);

        let element = GeometryElement::from_faces(&faces);
        assert_eq!(element.indices(), vec![2, 1, 0]);
    }

    #[test]
    #[should_panic(expected = "unknown mesh primitive type")]
    fn test_unknown_primitive_is_fatal() {
        let (vertices, normals, mut faces) = unit_square();
        faces.primitive = MeshPrimitive::Unknown(5);
        assemble(&vertices, &normals, &faces, None);
    }

    #[test]
    #[should_panic(expected = "index-aligned")]
    fn test_mismatched_texcoords_are_fatal() {
        let (vertices, normals, faces) = unit_square();
        let texcoords = TextureCoordinateSet::new(vec![[0.0, 0.0]]);
        assemble(&vertices, &normals, &faces, Some(&texcoords));
    }

    #[test]
    fn test_pending_material() {
        let material = Material::default();
        assert!(!material.is_textured());
        match material.diffuse {
            Diffuse::Color(color) => assert_eq!(color, [0.5, 1.0, 0.0, 0.7]),
            Diffuse::Image(_) => panic!("expected a tint"),
        }
    }
}
