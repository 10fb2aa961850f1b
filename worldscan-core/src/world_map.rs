/// World map snapshots and the offline review scene built from them
use log::{debug, info};
use nalgebra::{Point3, Vector3};

use crate::anchor::{self, Anchor, EnvironmentProbeAnchor, MeshAnchor};
use crate::geometry::assemble;
use crate::projection::CameraPose;
use crate::scene::{SceneGraph, SceneNode};

/// Number of anchors of each kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnchorCensus {
    pub mesh: usize,
    pub probe: usize,
}

/// Every anchor discovered during a scanning session.
///
/// Mesh buffers are shared with the session, so cloning a map is cheap.
#[derive(Debug, Clone, Default)]
pub struct WorldMap {
    anchors: Vec<Anchor>,
}

impl WorldMap {
    pub fn new(anchors: Vec<Anchor>) -> Self {
        Self { anchors }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn mesh_anchors(&self) -> impl Iterator<Item = &MeshAnchor> {
        anchor::mesh_anchors(&self.anchors)
    }

    pub fn probe_anchors(&self) -> impl Iterator<Item = &EnvironmentProbeAnchor> {
        anchor::probe_anchors(&self.anchors)
    }

    pub fn census(&self) -> AnchorCensus {
        AnchorCensus {
            mesh: self.mesh_anchors().count(),
            probe: self.probe_anchors().count(),
        }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// Orbiting camera for inspecting a scene
#[derive(Debug, Clone, Copy)]
pub struct OrbitControl {
    pub target: Point3<f32>,
    pub distance: f32,
    /// Rotation about +Y in radians, zero looks down -Z
    pub yaw: f32,
    /// Elevation above the target in radians
    pub pitch: f32,
}

impl OrbitControl {
    const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
    const MIN_DISTANCE: f32 = 0.1;

    pub fn from_eye(eye: Point3<f32>, target: Point3<f32>) -> Self {
        let offset = eye - target;
        let distance = offset.norm().max(Self::MIN_DISTANCE);
        Self {
            target,
            distance,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
        }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dyaw: f32, dpitch: f32) {
        self.yaw += dyaw;
        self.pitch = (self.pitch + dpitch).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    /// Scale the distance to the target
    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance * factor).max(Self::MIN_DISTANCE);
    }

    pub fn eye(&self) -> Point3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub fn camera(&self, fov_y: f32, resolution: (u32, u32)) -> CameraPose {
        CameraPose::look_at(&self.eye(), &self.target, &Vector3::y(), fov_y, resolution)
    }
}

/// Offline view of a captured world map.
///
/// Every mesh anchor gets a node with untextured geometry; the camera starts
/// above and in front of the origin and can be orbited.
pub struct ReviewController {
    world_map: WorldMap,
    scene: SceneGraph,
    pub orbit: OrbitControl,
    /// Linear RGBA
    pub background: [f32; 4],
}

impl ReviewController {
    pub const CAMERA_POSITION: [f32; 3] = [0.0, 5.0, 10.0];

    pub fn new(world_map: WorldMap) -> Self {
        let [x, y, z] = Self::CAMERA_POSITION;
        let mut controller = Self {
            world_map,
            scene: SceneGraph::new(),
            orbit: OrbitControl::from_eye(Point3::new(x, y, z), Point3::origin()),
            background: [0.0, 0.0, 0.0, 1.0],
        };
        controller.create_scene();
        controller
    }

    /// Build one node per mesh anchor of the world map
    pub fn create_scene(&mut self) {
        self.clear_scene();
        for mesh in self.world_map.mesh_anchors() {
            let geometry = &mesh.geometry;
            let mut node = SceneNode::new(mesh.transform);
            node.set_geometry(assemble(
                &geometry.vertices,
                &geometry.normals,
                &geometry.faces,
                None,
            ));
            self.scene.insert(mesh.id, node);
        }
        info!("review scene holds {} mesh nodes", self.scene.len());
    }

    pub fn clear_scene(&mut self) {
        self.scene.clear();
    }

    /// Per-frame hook of the review view
    pub fn update(&self, time: f64) -> AnchorCensus {
        let census = self.world_map.census();
        debug!(
            "t={time:.2}s world map has {} mesh anchors {} probe anchors",
            census.mesh, census.probe
        );
        census
    }

    pub fn world_map(&self) -> &WorldMap {
        &self.world_map
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn camera(&self, fov_y: f32, resolution: (u32, u32)) -> CameraPose {
        self.orbit.camera(fov_y, resolution)
    }
}
