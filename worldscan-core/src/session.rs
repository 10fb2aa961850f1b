//! Scanning session: configuration, events and the controller that keeps the
//! scene's geometry in step with the reconstructed mesh.
//!
//! The tracking subsystem delivers [`SessionEvent`]s in order over a single
//! channel. Each event is handled to completion before the next one is read,
//! so projection and assembly for an anchor never overlap.

use image::RgbaImage;
use log::{debug, info, trace, warn};
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::anchor::{self, Anchor, AnchorId, MeshAnchor};
use crate::capture::{capture, PixelBuffer};
use crate::geometry::{assemble, Material, RenderableGeometry};
use crate::projection::{CameraPose, ImageOrientation};
use crate::projector::VertexProjector;
use crate::scene::{SceneGraph, SceneNode};
use crate::world_map::WorldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneReconstruction {
    None,
    Mesh,
    MeshWithClassification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentTexturing {
    None,
    Manual,
    Automatic,
}

/// How the tracking session is run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfiguration {
    pub scene_reconstruction: SceneReconstruction,
    pub environment_texturing: EnvironmentTexturing,
    /// Deliver per-frame scene depth
    pub scene_depth: bool,
}

impl CaptureConfiguration {
    /// Mesh reconstruction with automatic environment texturing, and scene
    /// depth when the device supports it
    pub fn world_tracking(supports_scene_depth: bool) -> Self {
        Self {
            scene_reconstruction: SceneReconstruction::Mesh,
            environment_texturing: EnvironmentTexturing::Automatic,
            scene_depth: supports_scene_depth,
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self::world_tracking(false)
    }
}

/// The tracking subsystem as seen by the scan controller
pub trait ArSession {
    fn supports_scene_depth(&self) -> bool;
    fn run(&mut self, configuration: &CaptureConfiguration);
    fn pause(&mut self);
}

/// Everything the session knows at one rendered frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp: f64,
    pub camera: CameraPose,
    pub captured_image: PixelBuffer,
    /// All anchors currently tracked
    pub anchors: Vec<Anchor>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    AnchorAdded(Vec<Anchor>),
    AnchorUpdated(Vec<Anchor>),
    AnchorRemoved(Vec<AnchorId>),
    FrameRendered(Frame),
    SessionFailed(String),
    SessionInterrupted,
    InterruptionEnded,
}

/// Session state surfaced to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Interrupted,
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Texture meshes with the camera image on every rendered frame
    pub texturing: bool,
    pub orientation: ImageOrientation,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            texturing: true,
            orientation: ImageOrientation::Portrait,
        }
    }
}

/// Geometry for one mesh anchor as seen from `camera`.
///
/// Texture coordinates are computed when `need_texture` is set; the camera
/// image becomes the diffuse texture only if one is supplied as well,
/// otherwise the surface gets the pending tint.
pub fn scan_geometry(
    camera: &CameraPose,
    anchor: &MeshAnchor,
    projector: &VertexProjector,
    need_texture: bool,
    camera_image: Option<&Arc<RgbaImage>>,
) -> RenderableGeometry {
    let mesh = &anchor.geometry;
    let texcoords =
        need_texture.then(|| projector.project(&mesh.vertices, &anchor.transform, camera));
    let mut geometry = assemble(&mesh.vertices, &mesh.normals, &mesh.faces, texcoords.as_ref());

    geometry.material = match camera_image {
        Some(image) if need_texture => Material::textured(Arc::clone(image)),
        _ => Material::pending(),
    };
    geometry
}

/// Drives the scene from session events and hands out the world map when
/// scanning stops.
pub struct ScanController<S: ArSession> {
    session: S,
    options: ScanOptions,
    projector: VertexProjector,
    scene: SceneGraph,
    anchors: BTreeMap<AnchorId, Anchor>,
    current_frame: Option<Frame>,
    status: SessionStatus,
}

impl<S: ArSession> ScanController<S> {
    pub fn new(session: S, options: ScanOptions) -> Self {
        Self {
            session,
            projector: VertexProjector::new(options.orientation),
            options,
            scene: SceneGraph::new(),
            anchors: BTreeMap::new(),
            current_frame: None,
            status: SessionStatus::Idle,
        }
    }

    /// Run the session with the world-tracking configuration
    pub fn start(&mut self) -> CaptureConfiguration {
        let configuration = CaptureConfiguration::world_tracking(self.session.supports_scene_depth());
        self.session.run(&configuration);
        self.status = SessionStatus::Running;
        info!("scanning started with {configuration:?}");
        configuration
    }

    /// Pause the session and return everything discovered so far
    pub fn stop(&mut self) -> WorldMap {
        self.session.pause();
        self.status = SessionStatus::Paused;
        let map = self.world_map();
        info!(
            "scanning stopped, world map holds {} anchors",
            map.len()
        );
        map
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Interrupted)
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.current_frame.as_ref()
    }

    /// Snapshot of every anchor tracked so far
    pub fn world_map(&self) -> WorldMap {
        WorldMap::new(self.anchors.values().cloned().collect())
    }

    /// Handle every event already queued on `events`, in order
    pub fn drain(&mut self, events: &Receiver<SessionEvent>) -> usize {
        let mut handled = 0;
        for event in events.try_iter() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SessionFailed(reason) => {
                warn!("session failed: {reason}");
                self.status = SessionStatus::Failed(reason);
            }
            SessionEvent::SessionInterrupted => {
                if self.status == SessionStatus::Running {
                    warn!("session interrupted");
                    self.status = SessionStatus::Interrupted;
                }
            }
            SessionEvent::InterruptionEnded => {
                if self.status == SessionStatus::Interrupted {
                    info!("session interruption ended");
                    self.status = SessionStatus::Running;
                } else {
                    debug!("ignoring interruption end while {:?}", self.status);
                }
            }
            _ if !self.is_scanning() => {
                trace!("dropping session event while not scanning");
            }
            SessionEvent::AnchorAdded(anchors) => self.anchors_added(anchors),
            SessionEvent::AnchorUpdated(anchors) => self.anchors_updated(anchors),
            SessionEvent::AnchorRemoved(ids) => self.anchors_removed(&ids),
            SessionEvent::FrameRendered(frame) => self.frame_rendered(frame),
        }
    }

    fn anchors_added(&mut self, anchors: Vec<Anchor>) {
        debug!("session added {} meshes", anchor::mesh_anchors(&anchors).count());
        for anchor in anchors {
            if let (Anchor::Mesh(mesh), Some(frame)) = (&anchor, &self.current_frame) {
                let mut node = SceneNode::new(mesh.transform);
                node.set_geometry(scan_geometry(&frame.camera, mesh, &self.projector, false, None));
                self.scene.insert(mesh.id, node);
            }
            self.anchors.insert(anchor.id(), anchor);
        }
    }

    fn anchors_updated(&mut self, anchors: Vec<Anchor>) {
        debug!("session updated {} meshes", anchor::mesh_anchors(&anchors).count());
        for anchor in anchors {
            if let (Anchor::Mesh(mesh), Some(frame)) = (&anchor, &self.current_frame) {
                if let Some(node) = self.scene.node_mut(mesh.id) {
                    node.transform = mesh.transform;
                    node.set_geometry(scan_geometry(&frame.camera, mesh, &self.projector, false, None));
                }
            }
            self.anchors.insert(anchor.id(), anchor);
        }
    }

    fn anchors_removed(&mut self, ids: &[AnchorId]) {
        let mut meshes = 0;
        for id in ids {
            if let Some(Anchor::Mesh(_)) = self.anchors.remove(id) {
                meshes += 1;
            }
            self.scene.remove(*id);
        }
        debug!("session removed {meshes} meshes");
    }

    fn frame_rendered(&mut self, frame: Frame) {
        self.current_frame = Some(frame);
        let census = self.world_map().census();
        trace!(
            "mesh anchors: {}   probe anchors: {}",
            census.mesh,
            census.probe
        );
        self.scan_all_geometry(self.options.texturing);
    }

    /// Re-project every mesh anchor of the current frame that has a node.
    ///
    /// Returns how many nodes got new geometry; the whole pass is skipped
    /// when there is no frame or its image cannot be captured.
    pub fn scan_all_geometry(&mut self, need_texture: bool) -> usize {
        let Some(frame) = self.current_frame.as_ref() else {
            return 0;
        };
        let Some(image) = capture(&frame.captured_image).map(Arc::new) else {
            debug!("skipping frame {:.3}: no camera image", frame.timestamp);
            return 0;
        };

        let mut updated = 0;
        for mesh in anchor::mesh_anchors(&frame.anchors) {
            let Some(node) = self.scene.node_mut(mesh.id) else {
                continue;
            };
            let geometry = scan_geometry(&frame.camera, mesh, &self.projector, need_texture, Some(&image));
            node.transform = mesh.transform;
            node.set_geometry(geometry);
            updated += 1;
        }
        debug!("frame {:.3}: textured {updated} mesh nodes", frame.timestamp);
        updated
    }
}
