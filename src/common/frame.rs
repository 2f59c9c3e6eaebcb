use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelFormat {
    Rgb8,
    /// Sensor already yields single-channel intensity.
    Luma8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Luma8 => "Luma8",
        }
    }
}

/// Immutable pixel buffer produced by one capture. Scoped to the cycle that
/// captured it; nothing long-lived keeps a frame.
#[derive(Clone)]
pub struct Frame {
    frame_id: Uuid,
    image: Arc<DynamicImage>,
    format: PixelFormat,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap a decoded image. Anything that is not 8-bit RGB or 8-bit
    /// grayscale is converted to RGB8.
    pub fn new(image: DynamicImage) -> Self {
        let (image, format) = match image {
            DynamicImage::ImageRgb8(_) => (image, PixelFormat::Rgb8),
            DynamicImage::ImageLuma8(_) => (image, PixelFormat::Luma8),
            other => (DynamicImage::ImageRgb8(other.to_rgb8()), PixelFormat::Rgb8),
        };
        Self {
            frame_id: Uuid::new_v4(),
            image: Arc::new(image),
            format,
            captured_at: Utc::now(),
        }
    }

    /// Build a frame from a raw sensor buffer.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimension(width, height));
        }
        let expected = width as usize * height as usize * format.channels();
        if pixels.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                format: format.name(),
                expected,
                actual: pixels.len(),
            });
        }

        // Lengths were checked above, so the buffers always fit.
        let image = match format {
            PixelFormat::Rgb8 => image::RgbImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageRgb8),
            PixelFormat::Luma8 => image::GrayImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageLuma8),
        };
        match image {
            Some(image) => Ok(Self::new(image)),
            None => Err(FrameError::ZeroDimension(width, height)),
        }
    }

    /// Decode an encoded (JPEG, PNG, ...) sensor payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::new(image))
    }

    pub fn id(&self) -> Uuid {
        self.frame_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn byte_len(&self) -> usize {
        self.image.as_bytes().len()
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Channel values of the pixel at a row-major index. Grayscale pixels
    /// report the intensity on all three channels.
    pub fn rgb_at(&self, index: usize) -> [u8; 3] {
        let bytes = self.image.as_bytes();
        match self.format {
            PixelFormat::Rgb8 => {
                let offset = index * 3;
                [bytes[offset], bytes[offset + 1], bytes[offset + 2]]
            }
            PixelFormat::Luma8 => {
                let v = bytes[index];
                [v, v, v]
            }
        }
    }

    /// Perceptual luminance (ITU-R BT.601) of the pixel at a row-major index.
    pub fn luminance_at(&self, index: usize) -> f32 {
        match self.format {
            PixelFormat::Rgb8 => {
                let [r, g, b] = self.rgb_at(index);
                0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
            }
            PixelFormat::Luma8 => self.image.as_bytes()[index] as f32,
        }
    }

    /// Row-major indices 0, N, 2N, ... below the pixel count.
    pub fn sample_indices(&self, stride: usize) -> impl Iterator<Item = usize> {
        (0..self.pixel_count()).step_by(stride.max(1))
    }

    /// Number of pixels a stride visits on this frame.
    pub fn sample_count(&self, stride: usize) -> usize {
        self.pixel_count().div_ceil(stride.max(1))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("frame_id", &self.frame_id)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format)
            .field("byte_len", &self.byte_len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
