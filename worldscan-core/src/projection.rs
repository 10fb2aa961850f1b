/// Camera pose and pinhole projection
use nalgebra::{Isometry3, Matrix3, Matrix4, Point2, Point3, Vector2, Vector3};

/// Orientation of the viewport a point is projected into.
///
/// The sensor's native image is landscape with the home side to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageOrientation {
    LandscapeRight,
    #[default]
    Portrait,
}

impl ImageOrientation {
    /// Viewport size for an image of the given native resolution
    pub fn viewport(self, (width, height): (u32, u32)) -> (f32, f32) {
        match self {
            ImageOrientation::LandscapeRight => (width as f32, height as f32),
            ImageOrientation::Portrait => (height as f32, width as f32),
        }
    }

    /// Convert a point projected into [`Self::viewport`] into a texture
    /// coordinate over the native image.
    pub fn texture_coordinate(self, point: Point2<f32>, (width, height): (u32, u32)) -> Vector2<f32> {
        let (width, height) = (width as f32, height as f32);
        match self {
            ImageOrientation::LandscapeRight => Vector2::new(point.x / width, point.y / height),
            ImageOrientation::Portrait => Vector2::new(point.y / width, 1.0 - point.x / height),
        }
    }
}

/// Camera pose and intrinsics for one video frame.
///
/// The camera looks down its local -Z axis with +Y up. Intrinsics map camera
/// space to native image pixels with the origin at the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    /// Camera to world
    pub transform: Isometry3<f32>,
    pub intrinsics: Matrix3<f32>,
    /// Native (landscape) resolution in pixels
    pub image_resolution: (u32, u32),
}

impl CameraPose {
    pub fn new(transform: Isometry3<f32>, intrinsics: Matrix3<f32>, image_resolution: (u32, u32)) -> Self {
        Self {
            transform,
            intrinsics,
            image_resolution,
        }
    }

    /// Camera at `eye` looking at `target` with a symmetric vertical field of view
    pub fn look_at(
        eye: &Point3<f32>,
        target: &Point3<f32>,
        up: &Vector3<f32>,
        fov_y: f32,
        image_resolution: (u32, u32),
    ) -> Self {
        let (width, height) = (image_resolution.0 as f32, image_resolution.1 as f32);
        let focal = (height / 2.0) / (fov_y / 2.0).tan();
        let intrinsics = Matrix3::new(
            focal, 0.0, width / 2.0, //
            0.0, focal, height / 2.0, //
            0.0, 0.0, 1.0,
        );
        let view = Isometry3::look_at_rh(eye, target, up);
        Self::new(view.inverse(), intrinsics, image_resolution)
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::from(self.transform.translation.vector)
    }

    /// World to camera
    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.transform.inverse().to_homogeneous()
    }

    /// Distance of a world point in front of the camera along the view axis
    pub fn depth_of(&self, point: &Point3<f32>) -> f32 {
        -self.transform.inverse_transform_point(point).z
    }

    /// Project a world point into a viewport of the given size.
    ///
    /// Points on or behind the image plane produce non-finite or mirrored
    /// coordinates; callers that care must check [`Self::depth_of`].
    pub fn project_point(
        &self,
        point: &Point3<f32>,
        orientation: ImageOrientation,
        viewport: (f32, f32),
    ) -> Point2<f32> {
        let camera = self.transform.inverse_transform_point(point);
        // flip to the image convention: +Y down, +Z forward
        let pixel = self.intrinsics * Vector3::new(camera.x, -camera.y, -camera.z);
        let (width, height) = (self.image_resolution.0 as f32, self.image_resolution.1 as f32);
        let nx = pixel.x / pixel.z / width;
        let ny = pixel.y / pixel.z / height;

        let (viewport_width, viewport_height) = viewport;
        match orientation {
            ImageOrientation::LandscapeRight => Point2::new(nx * viewport_width, ny * viewport_height),
            ImageOrientation::Portrait => Point2::new((1.0 - ny) * viewport_width, nx * viewport_height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraPose {
        CameraPose::look_at(
            &Point3::new(0.0, 0.0, 1.0),
            &Point3::origin(),
            &Vector3::y(),
            std::f32::consts::FRAC_PI_2,
            (1920, 1440),
        )
    }

    #[test]
    fn test_optical_axis_hits_center() {
        let camera = camera();
        let viewport = ImageOrientation::LandscapeRight.viewport(camera.image_resolution);
        let p = camera.project_point(&Point3::origin(), ImageOrientation::LandscapeRight, viewport);
        assert!((p.x - 960.0).abs() < 1e-3);
        assert!((p.y - 720.0).abs() < 1e-3);
        assert!((camera.depth_of(&Point3::origin()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_image_axes() {
        let camera = camera();
        let viewport = (1920.0, 1440.0);
        // up in the world is up in the image, right is right
        let up = camera.project_point(&Point3::new(0.0, 0.5, 0.0), ImageOrientation::LandscapeRight, viewport);
        let right = camera.project_point(&Point3::new(0.5, 0.0, 0.0), ImageOrientation::LandscapeRight, viewport);
        assert!(up.y < 720.0);
        assert!(right.x > 960.0);
    }

    #[test]
    fn test_portrait_rotates_viewport() {
        let camera = camera();
        let resolution = camera.image_resolution;
        let viewport = ImageOrientation::Portrait.viewport(resolution);
        assert_eq!(viewport, (1440.0, 1920.0));

        // a point right of center in the sensor lands low in the portrait viewport
        let p = camera.project_point(&Point3::new(0.5, 0.0, 0.0), ImageOrientation::Portrait, viewport);
        assert!((p.x - 720.0).abs() < 1e-3);
        assert!(p.y > 960.0);
    }

    #[test]
    fn test_orientations_agree_on_texture_coordinates() {
        let camera = camera();
        let point = Point3::new(0.3, -0.2, 0.1);
        let uv = |orientation: ImageOrientation| {
            let viewport = orientation.viewport(camera.image_resolution);
            let p = camera.project_point(&point, orientation, viewport);
            orientation.texture_coordinate(p, camera.image_resolution)
        };
        let portrait = uv(ImageOrientation::Portrait);
        let landscape = uv(ImageOrientation::LandscapeRight);
        assert!((portrait - landscape).norm() < 1e-5);
    }

    #[test]
    fn test_view_matrix_moves_eye_to_origin() {
        let camera = camera();
        let eye = camera.view_matrix().transform_point(&camera.position());
        assert!(eye.coords.norm() < 1e-6);
    }
}
