//! Per-vertex texture coordinates from the live camera image.
//!
//! Every vertex of a mesh anchor is carried to world space by the anchor's
//! transform and projected through the frame's camera. The projected pixel is
//! normalized over the native camera image so the captured frame can be used
//! directly as the mesh's diffuse texture.

use nalgebra::{Matrix4, Point3};

use crate::buffer::MeshBuffer;
use crate::projection::{CameraPose, ImageOrientation};

/// Texture coordinates, index-aligned with the vertex buffer they were
/// computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureCoordinateSet {
    coordinates: Vec<[f32; 2]>,
}

impl TextureCoordinateSet {
    pub fn new(coordinates: Vec<[f32; 2]>) -> Self {
        Self { coordinates }
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<[f32; 2]> {
        self.coordinates.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32; 2]> {
        self.coordinates.iter()
    }

    /// Tightly packed `(u, v)` pairs, eight bytes each
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.coordinates)
    }
}

/// Projects mesh vertices into the camera image
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexProjector {
    /// Orientation correction between the sensor image and the texture.
    /// [`ImageOrientation::Portrait`] swaps the viewport axes and flips `v`.
    pub orientation: ImageOrientation,
}

impl VertexProjector {
    pub fn new(orientation: ImageOrientation) -> Self {
        Self { orientation }
    }

    /// Texture coordinate of one world-space point
    pub fn project_point(&self, world: &Point3<f32>, camera: &CameraPose) -> [f32; 2] {
        let viewport = self.orientation.viewport(camera.image_resolution);
        let pixel = camera.project_point(world, self.orientation, viewport);
        let uv = self.orientation.texture_coordinate(pixel, camera.image_resolution);
        [uv.x, uv.y]
    }

    /// Texture coordinates for every vertex of `vertices`.
    ///
    /// Panics unless the buffer holds packed float3 elements within its
    /// backing memory.
    pub fn project(
        &self,
        vertices: &MeshBuffer,
        anchor_transform: &Matrix4<f32>,
        camera: &CameraPose,
    ) -> TextureCoordinateSet {
        let coordinates = vertices
            .float3_iter()
            .map(|vertex| {
                let world = anchor_transform * vertex.to_homogeneous();
                self.project_point(&Point3::new(world.x, world.y, world.z), camera)
            })
            .collect();
        TextureCoordinateSet::new(coordinates)
    }
}

/// [`VertexProjector::project`] with the portrait correction
pub fn project(
    vertices: &MeshBuffer,
    anchor_transform: &Matrix4<f32>,
    camera: &CameraPose,
) -> TextureCoordinateSet {
    VertexProjector::default().project(vertices, anchor_transform, camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::VertexFormat;
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn camera_at(z: f32) -> CameraPose {
        CameraPose::look_at(
            &Point3::new(0.0, 0.0, z),
            &Point3::origin(),
            &Vector3::y(),
            std::f32::consts::FRAC_PI_3,
            (1920, 1440),
        )
    }

    #[test]
    fn test_one_coordinate_per_vertex() {
        let positions: Vec<[f32; 3]> = (0..37).map(|i| [i as f32 * 0.01, 0.0, 0.0]).collect();
        let vertices = MeshBuffer::from_float3(&positions);

        let coords = project(&vertices, &Matrix4::identity(), &camera_at(2.0));
        assert_eq!(coords.len(), 37);
        // moving right along x moves along the image's first axis
        let first = coords.get(0).unwrap();
        let last = coords.get(36).unwrap();
        assert!(last[0] > first[0]);
        assert!((last[1] - first[1]).abs() < 1e-5);
    }

    #[test]
    fn test_optical_center_maps_to_image_center() {
        let vertices = MeshBuffer::from_float3(&[[0.0, 0.0, 0.0]]);
        let coords = project(&vertices, &Matrix4::identity(), &camera_at(1.0));

        let [u, v] = coords.get(0).unwrap();
        assert!((u - 0.5).abs() < 1e-5);
        assert!((v - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_anchor_transform_is_applied() {
        let vertices = MeshBuffer::from_float3(&[[-1.0, 0.0, 0.0]]);
        let transform = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));

        let coords = project(&vertices, &transform, &camera_at(1.0));
        let [u, v] = coords.get(0).unwrap();
        assert!((u - 0.5).abs() < 1e-5);
        assert!((v - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_strided_buffer() {
        // float3 positions followed by a padding float
        let data: [f32; 8] = [0.0, 0.0, 0.0, 99.0, 0.0, 0.0, 0.0, 99.0];
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let vertices = MeshBuffer::new(Arc::from(bytes), 0, 16, 2, VertexFormat::Float3);

        let coords = project(&vertices, &Matrix4::identity(), &camera_at(1.0));
        assert_eq!(coords.len(), 2);
        assert_eq!(coords.get(0), coords.get(1));
    }

    #[test]
    #[should_panic(expected = "Expected three floats")]
    fn test_rejects_other_formats() {
        let mut vertices = MeshBuffer::from_float3(&[[0.0; 3]]);
        vertices.format = VertexFormat::Float4;
        project(&vertices, &Matrix4::identity(), &camera_at(1.0));
    }

    #[test]
    fn test_packed_bytes() {
        let coords = TextureCoordinateSet::new(vec![[0.25, 0.75]]);
        let bytes = coords.as_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytemuck::pod_read_unaligned::<[f32; 2]>(bytes), [0.25, 0.75]);
    }
}
