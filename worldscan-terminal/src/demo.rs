/// Scripted depth-sensing session over a synthetic room
use log::debug;
use nalgebra::{Matrix4, Point3, Vector3};
use std::f32::consts::FRAC_PI_2;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use worldscan_core::{
    Anchor, AnchorId, ArSession, CameraPose, CaptureConfiguration, EnvironmentProbeAnchor,
    FaceBuffer, Frame, MeshAnchor, MeshBuffer, MeshGeometry, PixelBuffer, SessionEvent,
    VertexFormat,
};

/// Native resolution of the simulated sensor
pub const SENSOR_RESOLUTION: (u32, u32) = (192, 144);

/// Frames between two newly discovered anchors
const REVEAL_INTERVAL: u64 = 5;
/// Frames between two refinements of the newest mesh
const REFINE_INTERVAL: u64 = 7;

const ROOM_HALF_SIZE: f32 = 2.0;
const ROOM_HEIGHT: f32 = 2.5;

/// A session that walks a camera around a box-shaped room and discovers its
/// floor and walls one anchor at a time.
pub struct SimulatedSession {
    events: Sender<SessionEvent>,
    configuration: Option<CaptureConfiguration>,
    room: Vec<Anchor>,
    revealed: usize,
    frame: u64,
    /// Grid subdivisions per anchor, raised when a mesh is refined
    detail: Vec<u32>,
}

impl SimulatedSession {
    pub fn new(events: Sender<SessionEvent>) -> Self {
        let room = room(4);
        let detail = vec![4; room.len()];
        Self {
            events,
            configuration: None,
            room,
            revealed: 0,
            frame: 0,
            detail,
        }
    }

    pub fn is_running(&self) -> bool {
        self.configuration.is_some()
    }

    /// Advance one frame and emit its events.
    ///
    /// Returns false once the receiving side has gone away.
    pub fn step(&mut self) -> bool {
        if !self.is_running() {
            return true;
        }

        let mut events = vec![SessionEvent::FrameRendered(self.render_frame())];
        if self.frame % REVEAL_INTERVAL == 0 && self.revealed < self.room.len() {
            events.push(SessionEvent::AnchorAdded(vec![self.room[self.revealed].clone()]));
            self.revealed += 1;
        }
        if self.frame % REFINE_INTERVAL == REFINE_INTERVAL - 1 {
            if let Some(anchor) = self.refine_newest_mesh() {
                events.push(SessionEvent::AnchorUpdated(vec![anchor]));
            }
        }
        self.frame += 1;

        events.into_iter().all(|event| self.events.send(event).is_ok())
    }

    fn refine_newest_mesh(&mut self) -> Option<Anchor> {
        let index = (0..self.revealed)
            .rev()
            .find(|&i| matches!(self.room[i], Anchor::Mesh(_)))?;
        let Anchor::Mesh(mesh) = &mut self.room[index] else {
            return None;
        };
        self.detail[index] = (self.detail[index] + 2).min(16);
        mesh.geometry = grid(wall_size(mesh.id), self.detail[index]);
        debug!("refined anchor {:?} to {} subdivisions", mesh.id, self.detail[index]);
        Some(self.room[index].clone())
    }

    fn render_frame(&self) -> Frame {
        let angle = self.frame as f32 * 0.05;
        let eye = Point3::new(1.2 * angle.sin(), 1.6, 1.2 * angle.cos());
        let camera = CameraPose::look_at(
            &eye,
            &Point3::new(0.0, 1.0, -ROOM_HALF_SIZE),
            &Vector3::y(),
            std::f32::consts::FRAC_PI_3,
            SENSOR_RESOLUTION,
        );
        Frame {
            timestamp: self.frame as f64 / 60.0,
            camera,
            captured_image: sensor_image(self.frame),
            anchors: self.room[..self.revealed].to_vec(),
        }
    }
}

impl ArSession for SimulatedSession {
    fn supports_scene_depth(&self) -> bool {
        true
    }

    fn run(&mut self, configuration: &CaptureConfiguration) {
        self.configuration = Some(*configuration);
    }

    fn pause(&mut self) {
        self.configuration = None;
    }
}

/// Floor, three walls and a lighting probe
fn room(subdivisions: u32) -> Vec<Anchor> {
    let placements = [
        (
            // floor faces up
            Matrix4::new_rotation(Vector3::new(-FRAC_PI_2, 0.0, 0.0)),
            Vector3::new(0.0, 0.0, 0.0),
        ),
        (Matrix4::identity(), Vector3::new(0.0, ROOM_HEIGHT / 2.0, -ROOM_HALF_SIZE)),
        (
            Matrix4::new_rotation(Vector3::new(0.0, FRAC_PI_2, 0.0)),
            Vector3::new(-ROOM_HALF_SIZE, ROOM_HEIGHT / 2.0, 0.0),
        ),
        (
            Matrix4::new_rotation(Vector3::new(0.0, -FRAC_PI_2, 0.0)),
            Vector3::new(ROOM_HALF_SIZE, ROOM_HEIGHT / 2.0, 0.0),
        ),
    ];

    let mut anchors: Vec<Anchor> = placements
        .iter()
        .enumerate()
        .map(|(i, (rotation, offset))| {
            let id = AnchorId(i as u64 + 1);
            let transform = Matrix4::new_translation(offset) * rotation;
            Anchor::Mesh(MeshAnchor::new(id, transform, grid(wall_size(id), subdivisions)))
        })
        .collect();

    anchors.push(Anchor::EnvironmentProbe(EnvironmentProbeAnchor {
        id: AnchorId(100),
        transform: Matrix4::new_translation(&Vector3::new(0.0, ROOM_HEIGHT / 2.0, 0.0)),
        extent: Vector3::new(2.0 * ROOM_HALF_SIZE, ROOM_HEIGHT, 2.0 * ROOM_HALF_SIZE),
    }));
    anchors
}

fn wall_size(id: AnchorId) -> (f32, f32) {
    match id {
        AnchorId(1) => (2.0 * ROOM_HALF_SIZE, 2.0 * ROOM_HALF_SIZE),
        _ => (2.0 * ROOM_HALF_SIZE, ROOM_HEIGHT),
    }
}

/// A subdivided rectangle in the local XY plane facing +Z.
///
/// Positions and normals are interleaved in one buffer the way the tracking
/// subsystem hands them out.
pub fn grid((width, height): (f32, f32), subdivisions: u32) -> MeshGeometry {
    let n = subdivisions.max(1);
    let mut interleaved: Vec<[f32; 3]> = Vec::with_capacity(((n + 1) * (n + 1) * 2) as usize);
    for row in 0..=n {
        for column in 0..=n {
            let x = (column as f32 / n as f32 - 0.5) * width;
            let y = (row as f32 / n as f32 - 0.5) * height;
            interleaved.push([x, y, 0.0]);
            interleaved.push([0.0, 0.0, 1.0]);
        }
    }

    let mut triangles = Vec::with_capacity((n * n * 2) as usize);
    for row in 0..n {
        for column in 0..n {
            let current = row * (n + 1) + column;
            let above = current + n + 1;
            triangles.push([current, current + 1, above + 1]);
            triangles.push([current, above + 1, above]);
        }
    }

    let count = interleaved.len() / 2;
    let bytes: &[u8] = bytemuck::cast_slice(&interleaved);
    let shared: Arc<[u8]> = Arc::from(bytes);
    MeshGeometry::new(
        MeshBuffer::new(Arc::clone(&shared), 0, 24, count, VertexFormat::Float3),
        MeshBuffer::new(shared, 12, 24, count, VertexFormat::Float3),
        FaceBuffer::from_triangles(&triangles),
    )
}

/// A moving diagonal gradient in the sensor's bi-planar format
fn sensor_image(frame: u64) -> PixelBuffer {
    let (width, height) = SENSOR_RESOLUTION;
    let shift = (frame * 3) as u32;
    let luma = (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x + y + shift) % 256) as u8))
        .collect();
    let chroma = (0..height / 2)
        .flat_map(|y| (0..width / 2).flat_map(move |x| [(96 + x % 64) as u8, (96 + y % 64) as u8]))
        .collect();
    PixelBuffer::ycbcr(width, height, luma, chroma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use worldscan_core::{capture, ScanController, ScanOptions};

    #[test]
    fn test_grid_layout() {
        let grid = grid((2.0, 1.0), 2);
        assert_eq!(grid.vertices.count, 9);
        assert_eq!(grid.faces.count, 8);
        let corner = grid.vertices.float3_iter().last().unwrap();
        assert_eq!(corner, Point3::new(1.0, 0.5, 0.0));
        assert!(grid.normals.float3_iter().all(|n| n == Point3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_sensor_image_converts() {
        let image = capture(&sensor_image(3)).unwrap();
        assert_eq!(image.dimensions(), SENSOR_RESOLUTION);
    }

    #[test]
    fn test_idle_session_emits_nothing() {
        let (tx, rx) = mpsc::channel();
        let mut session = SimulatedSession::new(tx);
        assert!(session.step());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_scripted_scan_textures_every_mesh() {
        let (tx, rx) = mpsc::channel();
        let mut controller = ScanController::new(SimulatedSession::new(tx), ScanOptions::default());
        controller.start();
        for _ in 0..30 {
            assert!(controller.session_mut().step());
            controller.drain(&rx);
        }

        let map = controller.stop();
        assert_eq!(map.census().mesh, 4);
        assert_eq!(map.census().probe, 1);
        assert_eq!(controller.scene().len(), 4);
        for (_, node) in controller.scene().iter() {
            assert!(node.geometry().unwrap().material.is_textured());
        }
    }
}
