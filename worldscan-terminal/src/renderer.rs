/// ASCII rasterizer for reviewing scanned geometry in the terminal
use crossterm::{
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix4, Point3};
use std::io::Write;
use worldscan_core::{
    CameraPose, ImageOrientation, OrbitControl, RenderableGeometry, SceneGraph, Semantic,
};

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Terminal cells are about twice as tall as they are wide
pub const CELL_ASPECT: f32 = 2.0;

/// Geometry closer than this to the camera is not drawn
const NEAR_PLANE: f32 = 0.05;

/// ASCII renderer that converts scene geometry to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
    /// Cells covered by geometry that has no camera texture yet
    pending_buffer: Vec<bool>,
    background: Color,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
            pending_buffer: vec![false; size],
            background: Color::Black,
        }
    }

    /// Fill empty cells with a linear RGBA colour, alpha is ignored
    pub fn set_background(&mut self, rgba: [f32; 4]) {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.background = Color::Rgb {
            r: channel(rgba[0]),
            g: channel(rgba[1]),
            b: channel(rgba[2]),
        };
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
        self.pending_buffer.fill(false);
    }

    /// Orbit camera for this character grid with square pixels on screen
    pub fn camera(&self, orbit: &OrbitControl, fov_y: f32) -> CameraPose {
        let mut camera = orbit.camera(fov_y, (self.width as u32, self.height as u32));
        camera.intrinsics[(0, 0)] *= CELL_ASPECT;
        camera
    }

    pub fn render_scene(&mut self, scene: &SceneGraph, camera: &CameraPose) {
        for (_, node) in scene.iter() {
            if let Some(geometry) = node.geometry() {
                self.render_geometry(geometry, &node.transform, camera);
            }
        }
    }

    pub fn render_geometry(
        &mut self,
        geometry: &RenderableGeometry,
        model_matrix: &Matrix4<f32>,
        camera: &CameraPose,
    ) {
        let Some(positions) = geometry.source(Semantic::Vertex) else {
            return;
        };
        let pending = !geometry.material.is_textured();

        for element in &geometry.elements {
            for triangle in element.triangles() {
                let mut world = [Point3::origin(); 3];
                for (corner, index) in world.iter_mut().zip(triangle) {
                    match positions.float3(index as usize) {
                        Some(local) => *corner = model_matrix.transform_point(&local),
                        None => return,
                    }
                }
                self.render_triangle(&world, camera, pending);
            }
        }
    }

    fn render_triangle(&mut self, world: &[Point3<f32>; 3], camera: &CameraPose, pending: bool) {
        let viewport = (self.width as f32, self.height as f32);

        // Project vertices to screen space
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (screen, point) in screen_coords.iter_mut().zip(world) {
            let depth = camera.depth_of(point);
            if depth < NEAR_PLANE {
                return; // Triangle is clipped
            }
            let pixel = camera.project_point(point, ImageOrientation::LandscapeRight, viewport);
            *screen = (pixel.x, pixel.y, depth);
        }

        // Scan meshes have no reliable winding, shade both sides
        let Some(normal) = (world[1] - world[0])
            .cross(&(world[2] - world[0]))
            .try_normalize(1e-9)
        else {
            return;
        };
        let centroid = Point3::from((world[0].coords + world[1].coords + world[2].coords) / 3.0);
        let Some(light_dir) = (camera.position() - centroid).try_normalize(1e-9) else {
            return;
        };
        let brightness = normal.dot(&light_dir).abs();

        // Map brightness to character
        let char_index = (brightness * (LUMINOSITY_RAMP.len() - 1) as f32) as usize;
        let char_index = char_index.min(LUMINOSITY_RAMP.len() - 1);
        let character = LUMINOSITY_RAMP[char_index];

        self.rasterize_triangle(&screen_coords, character, pending);
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], character: char, pending: bool) {
        let [v0, v1, v2] = *coords;

        // Bounding box, clipped to the screen
        let min_x = (v0.0.min(v1.0).min(v2.0).floor() as i32).max(0);
        let max_x = (v0.0.max(v1.0).max(v2.0).ceil() as i32).min(self.width as i32 - 1);
        let min_y = (v0.1.min(v1.1).min(v2.1).floor() as i32).max(0);
        let max_y = (v0.1.max(v1.1).max(v2.1).ceil() as i32).min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) = barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), p)
                else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    self.depth_buffer[idx] = depth;
                    self.char_buffer[idx] = character;
                    self.pending_buffer[idx] = pending;
                }
            }
        }
    }

    /// Number of cells covered by geometry
    pub fn covered_cells(&self) -> usize {
        self.depth_buffer.iter().filter(|d| d.is_finite()).count()
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.queue(SetBackgroundColor(self.background))?;
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let c = self.char_buffer[idx];

                // Untextured surfaces keep the pending tint
                let color = match c {
                    _ if self.pending_buffer[idx] => Color::Green,
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    _ => Color::Cyan,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            writer.queue(Print('\n'))?;
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldscan_core::{assemble, FaceBuffer, MeshBuffer};

    fn quad() -> RenderableGeometry {
        assemble(
            &MeshBuffer::from_float3(&[
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ]),
            &MeshBuffer::from_float3(&[[0.0, 0.0, 1.0]; 4]),
            &FaceBuffer::from_triangles(&[[0, 1, 2], [0, 2, 3]]),
            None,
        )
    }

    fn front_camera(renderer: &AsciiRenderer) -> CameraPose {
        let orbit = OrbitControl::from_eye(Point3::new(0.0, 0.0, 5.0), Point3::origin());
        renderer.camera(&orbit, std::f32::consts::FRAC_PI_3)
    }

    #[test]
    fn test_barycentric_center() {
        let (w0, w1, w2) = barycentric((0.0, 0.0), (3.0, 0.0), (0.0, 3.0), (1.0, 1.0)).unwrap();
        assert!((w0 + w1 + w2 - 1.0).abs() < 1e-6);
        assert!((w1 - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_triangle() {
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.5, 0.5)).is_none());
    }

    #[test]
    fn test_quad_covers_center() {
        let mut renderer = AsciiRenderer::new(40, 20);
        let camera = front_camera(&renderer);
        renderer.render_geometry(&quad(), &Matrix4::identity(), &camera);

        assert!(renderer.covered_cells() > 0);
        let center = 10 * 40 + 20;
        assert!(renderer.depth_buffer[center].is_finite());
        assert!(renderer.pending_buffer[center]);
    }

    #[test]
    fn test_draw_uses_background_colour() {
        let mut renderer = AsciiRenderer::new(2, 1);
        renderer.set_background([1.0, 0.5, 0.0, 1.0]);
        assert_eq!(renderer.background, Color::Rgb { r: 255, g: 128, b: 0 });

        let mut out = Vec::new();
        renderer.draw(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("48;2;255;128;0"));
    }

    #[test]
    fn test_geometry_behind_camera_is_skipped() {
        let mut renderer = AsciiRenderer::new(40, 20);
        let camera = front_camera(&renderer);
        let behind = Matrix4::new_translation(&nalgebra::Vector3::new(0.0, 0.0, 50.0));
        renderer.render_geometry(&quad(), &behind, &camera);
        assert_eq!(renderer.covered_cells(), 0);

        renderer.clear();
        assert!(renderer.char_buffer.iter().all(|&c| c == ' '));
    }
}
