/// Strided attribute buffers shared with the tracking subsystem
use nalgebra::Point3;
use std::sync::Arc;

/// Backing memory of a mesh buffer. Cloning shares the allocation.
pub type SharedBytes = Arc<[u8]>;

/// Per-element layout of an attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float2,
    Float3,
    Float4,
    Half3,
}

impl VertexFormat {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            VertexFormat::Float2 => 8,
            VertexFormat::Float3 => 12,
            VertexFormat::Float4 => 16,
            VertexFormat::Half3 => 6,
        }
    }
}

/// A read-only strided view over one attribute stream of a mesh.
///
/// Element `i` starts at byte `offset + i * stride` of `buffer`.
#[derive(Debug, Clone)]
pub struct MeshBuffer {
    pub buffer: SharedBytes,
    pub offset: usize,
    pub stride: usize,
    pub count: usize,
    pub format: VertexFormat,
}

impl MeshBuffer {
    pub fn new(
        buffer: SharedBytes,
        offset: usize,
        stride: usize,
        count: usize,
        format: VertexFormat,
    ) -> Self {
        Self {
            buffer,
            offset,
            stride,
            count,
            format,
        }
    }

    /// Tightly packed float3 stream
    pub fn from_float3(elements: &[[f32; 3]]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(elements);
        Self::new(
            Arc::from(bytes),
            0,
            VertexFormat::Float3.size(),
            elements.len(),
            VertexFormat::Float3,
        )
    }

    /// Number of bytes the view reaches into its buffer, `None` if that
    /// extent does not fit in `usize`
    pub fn required_len(&self) -> Option<usize> {
        match self.count {
            0 => Some(self.offset),
            n => (n - 1)
                .checked_mul(self.stride)
                .and_then(|last| last.checked_add(self.offset))
                .and_then(|last| last.checked_add(self.format.size())),
        }
    }

    /// Panics if the view reaches past the end of the backing buffer.
    pub fn assert_in_bounds(&self) {
        let Some(needed) = self.required_len() else {
            panic!(
                "mesh buffer view of {} elements with stride {} overflows the address space",
                self.count, self.stride
            );
        };
        assert!(
            needed <= self.buffer.len(),
            "mesh buffer view needs {} bytes but the buffer holds {}",
            needed,
            self.buffer.len()
        );
    }

    /// Read element `index` as three packed floats without bounds checks.
    ///
    /// # Safety
    ///
    /// `format` must be [`VertexFormat::Float3`] and `offset + index * stride + 12`
    /// must not exceed `buffer.len()`.
    #[inline]
    pub unsafe fn float3_unchecked(&self, index: usize) -> Point3<f32> {
        let ptr = self.buffer.as_ptr().add(self.offset + index * self.stride);
        Point3::from(ptr.cast::<[f32; 3]>().read_unaligned())
    }

    /// Iterate every element as a point.
    ///
    /// The format and the extent of the view are asserted once up front, each
    /// element is then read straight from memory.
    pub fn float3_iter(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        assert_eq!(
            self.format,
            VertexFormat::Float3,
            "Expected three floats (twelve bytes) per vertex."
        );
        self.assert_in_bounds();
        // SAFETY: format and extent checked above.
        (0..self.count).map(move |i| unsafe { self.float3_unchecked(i) })
    }
}

/// Face topology as reported by the tracking subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshPrimitive {
    Line,
    Triangle,
    /// A topology this build does not know about
    Unknown(u32),
}

/// Index buffer of a mesh
#[derive(Debug, Clone)]
pub struct FaceBuffer {
    pub buffer: SharedBytes,
    /// Number of primitives
    pub count: usize,
    pub primitive: MeshPrimitive,
    pub bytes_per_index: usize,
}

impl FaceBuffer {
    pub fn new(
        buffer: SharedBytes,
        count: usize,
        primitive: MeshPrimitive,
        bytes_per_index: usize,
    ) -> Self {
        Self {
            buffer,
            count,
            primitive,
            bytes_per_index,
        }
    }

    /// 32-bit triangle list
    pub fn from_triangles(triangles: &[[u32; 3]]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(triangles);
        Self::new(
            Arc::from(bytes),
            triangles.len(),
            MeshPrimitive::Triangle,
            std::mem::size_of::<u32>(),
        )
    }

    /// 32-bit line list
    pub fn from_lines(lines: &[[u32; 2]]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(lines);
        Self::new(
            Arc::from(bytes),
            lines.len(),
            MeshPrimitive::Line,
            std::mem::size_of::<u32>(),
        )
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer.len()
    }
}
