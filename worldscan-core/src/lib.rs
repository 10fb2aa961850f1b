/// WorldScan Core Library - Mesh texturing from a live camera
///
/// This library projects the vertices of reconstructed mesh anchors into the
/// current camera image, assembles renderable geometry from the raw mesh
/// buffers, and keeps a scene of anchor nodes up to date from session events.

pub mod anchor;
pub mod buffer;
pub mod capture;
pub mod geometry;
pub mod projection;
pub mod projector;
pub mod scene;
pub mod session;
pub mod world_map;

// Re-export commonly used types
pub use anchor::{Anchor, AnchorId, EnvironmentProbeAnchor, MeshAnchor, MeshGeometry};
pub use buffer::{FaceBuffer, MeshBuffer, MeshPrimitive, VertexFormat};
pub use capture::{capture, PixelBuffer, PixelFormat};
pub use geometry::{assemble, Material, PrimitiveType, RenderableGeometry, Semantic};
pub use projection::{CameraPose, ImageOrientation};
pub use projector::{project, TextureCoordinateSet, VertexProjector};
pub use scene::{SceneGraph, SceneNode};
pub use session::{ArSession, CaptureConfiguration, Frame, ScanController, ScanOptions, SessionEvent};
pub use world_map::{OrbitControl, ReviewController, WorldMap};
