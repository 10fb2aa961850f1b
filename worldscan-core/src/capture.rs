/// Conversion of camera sensor buffers into bitmap images
use image::{Rgba, RgbaImage};
use log::debug;
use thiserror::Error;

/// Pixel layout of a sensor buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One plane, four bytes per pixel in B, G, R, A order
    Bgra8,
    /// Full-range luma plane followed by an interleaved CbCr plane at half
    /// resolution in both directions
    YCbCr420BiPlanar,
}

impl PixelFormat {
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 1,
            PixelFormat::YCbCr420BiPlanar => 2,
        }
    }
}

/// One plane of a pixel buffer
#[derive(Debug, Clone)]
pub struct Plane {
    pub data: Vec<u8>,
    pub bytes_per_row: usize,
}

/// Image delivered by the camera sensor for one frame
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<Plane>,
}

impl PixelBuffer {
    pub fn bgra(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Bgra8,
            planes: vec![Plane {
                data,
                bytes_per_row: width as usize * 4,
            }],
        }
    }

    /// Bi-planar 4:2:0 buffer with tightly packed rows
    pub fn ycbcr(width: u32, height: u32, luma: Vec<u8>, chroma: Vec<u8>) -> Self {
        let chroma_width = (width as usize).div_ceil(2);
        Self {
            width,
            height,
            format: PixelFormat::YCbCr420BiPlanar,
            planes: vec![
                Plane {
                    data: luma,
                    bytes_per_row: width as usize,
                },
                Plane {
                    data: chroma,
                    bytes_per_row: chroma_width * 2,
                },
            ],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("pixel buffer is empty")]
    Empty,
    #[error("expected {expected} planes, found {found}")]
    PlaneCount { expected: usize, found: usize },
    #[error("plane {plane} holds {actual} bytes, {needed} needed")]
    PlaneTooSmall {
        plane: usize,
        needed: usize,
        actual: usize,
    },
}

/// Convert the sensor buffer of a frame into an RGBA bitmap.
///
/// Returns `None` when the buffer cannot be converted; the caller skips the
/// frame.
pub fn capture(pixel_buffer: &PixelBuffer) -> Option<RgbaImage> {
    match convert(pixel_buffer) {
        Ok(image) => Some(image),
        Err(err) => {
            debug!("camera image unavailable: {err}");
            None
        }
    }
}

/// Fallible form of [`capture`]
pub fn convert(pixel_buffer: &PixelBuffer) -> Result<RgbaImage, CaptureError> {
    let (width, height) = (pixel_buffer.width, pixel_buffer.height);
    if width == 0 || height == 0 {
        return Err(CaptureError::Empty);
    }

    let expected = pixel_buffer.format.plane_count();
    if pixel_buffer.planes.len() != expected {
        return Err(CaptureError::PlaneCount {
            expected,
            found: pixel_buffer.planes.len(),
        });
    }

    match pixel_buffer.format {
        PixelFormat::Bgra8 => {
            let plane = &pixel_buffer.planes[0];
            check_plane(0, plane, width as usize * 4, height as usize)?;
            Ok(RgbaImage::from_fn(width, height, |x, y| {
                let at = y as usize * plane.bytes_per_row + x as usize * 4;
                let bgra = &plane.data[at..at + 4];
                Rgba([bgra[2], bgra[1], bgra[0], bgra[3]])
            }))
        }
        PixelFormat::YCbCr420BiPlanar => {
            let (luma, chroma) = (&pixel_buffer.planes[0], &pixel_buffer.planes[1]);
            let chroma_width = (width as usize).div_ceil(2);
            let chroma_height = (height as usize).div_ceil(2);
            check_plane(0, luma, width as usize, height as usize)?;
            check_plane(1, chroma, chroma_width * 2, chroma_height)?;
            Ok(RgbaImage::from_fn(width, height, |x, y| {
                let (x, y) = (x as usize, y as usize);
                let luma_value = luma.data[y * luma.bytes_per_row + x];
                let at = (y / 2) * chroma.bytes_per_row + (x / 2) * 2;
                ycbcr_to_rgba(luma_value, chroma.data[at], chroma.data[at + 1])
            }))
        }
    }
}

fn check_plane(index: usize, plane: &Plane, row_bytes: usize, rows: usize) -> Result<(), CaptureError> {
    // rows narrower than a pixel row can never hold the image
    let needed = (plane.bytes_per_row >= row_bytes)
        .then(|| rows.checked_sub(1)?.checked_mul(plane.bytes_per_row)?.checked_add(row_bytes))
        .flatten()
        .unwrap_or(usize::MAX);
    if plane.data.len() < needed {
        return Err(CaptureError::PlaneTooSmall {
            plane: index,
            needed,
            actual: plane.data.len(),
        });
    }
    Ok(())
}

/// Full-range BT.601
fn ycbcr_to_rgba(y: u8, cb: u8, cr: u8) -> Rgba<u8> {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;
    Rgba([clamp(r), clamp(g), clamp(b), 255])
}

fn clamp(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_swizzle() {
        let buffer = PixelBuffer::bgra(2, 1, vec![10, 20, 30, 255, 1, 2, 3, 128]);
        let image = capture(&buffer).unwrap();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(0, 0), &Rgba([30, 20, 10, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([3, 2, 1, 128]));
    }

    #[test]
    fn test_neutral_chroma_is_grey() {
        let buffer = PixelBuffer::ycbcr(4, 2, vec![0, 64, 128, 255, 0, 64, 128, 255], vec![128; 4]);
        let image = capture(&buffer).unwrap();
        assert_eq!(image.get_pixel(1, 1), &Rgba([64, 64, 64, 255]));
        assert_eq!(image.get_pixel(3, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_chroma_shared_by_two_by_two_block() {
        // strong red chroma on the left block, neutral on the right
        let buffer = PixelBuffer::ycbcr(4, 2, vec![128; 8], vec![128, 255, 128, 128]);
        let image = capture(&buffer).unwrap();
        let left = image.get_pixel(1, 1);
        assert!(left[0] > 200 && left[2] < 140);
        assert_eq!(image.get_pixel(2, 0), &Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_odd_dimensions() {
        let buffer = PixelBuffer::ycbcr(3, 3, vec![50; 9], vec![128; 8]);
        let image = capture(&buffer).unwrap();
        assert_eq!(image.dimensions(), (3, 3));
        assert_eq!(image.get_pixel(2, 2), &Rgba([50, 50, 50, 255]));
    }

    #[test]
    fn test_short_plane_yields_nothing() {
        let buffer = PixelBuffer::bgra(4, 4, vec![0; 15]);
        assert!(capture(&buffer).is_none());
        assert!(matches!(
            convert(&buffer),
            Err(CaptureError::PlaneTooSmall { plane: 0, .. })
        ));
    }

    #[test]
    fn test_oversized_row_pitch_yields_nothing() {
        let mut buffer = PixelBuffer::bgra(2, 2, vec![0; 16]);
        buffer.planes[0].bytes_per_row = usize::MAX;
        assert!(capture(&buffer).is_none());
        assert_eq!(
            convert(&buffer).unwrap_err(),
            CaptureError::PlaneTooSmall {
                plane: 0,
                needed: usize::MAX,
                actual: 16
            }
        );
    }

    #[test]
    fn test_missing_plane_yields_nothing() {
        let mut buffer = PixelBuffer::ycbcr(2, 2, vec![0; 4], vec![128; 2]);
        buffer.planes.pop();
        assert_eq!(
            convert(&buffer).unwrap_err(),
            CaptureError::PlaneCount {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let buffer = PixelBuffer::bgra(0, 0, Vec::new());
        assert_eq!(convert(&buffer).unwrap_err(), CaptureError::Empty);
    }
}
