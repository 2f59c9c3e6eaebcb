use crate::capture::FrameSource;
use crate::common::Frame;
use crate::error::{AppError, CaptureError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];

/// Stands in for the camera: replays the images of a directory in name
/// order, wrapping around at the end.
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(AppError::Coordinator(format!(
                "No image files found in {}",
                dir.display()
            )));
        }
        files.sort();
        info!("Replaying {} frames from {}", files.len(), dir.display());
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let path = &self.files[self.next % self.files.len()];
        self.next = (self.next + 1) % self.files.len();
        debug!("Capturing from {}", path.display());

        let bytes = fs::read(path)
            .map_err(|e| CaptureError::Sensor(format!("{}: {}", path.display(), e)))?;
        Ok(Frame::decode(&bytes)?)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("skywatch-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn replays_images_in_name_order() {
        let dir = scratch_dir();
        ImageBuffer::from_pixel(4, 4, Rgb([200u8, 0, 0]))
            .save(dir.join("b.png"))
            .unwrap();
        ImageBuffer::from_pixel(4, 4, Rgb([0u8, 0, 200]))
            .save(dir.join("a.png"))
            .unwrap();
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = DirectorySource::open(&dir).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.capture().unwrap().rgb_at(0), [0, 0, 200]);
        assert_eq!(source.capture().unwrap().rgb_at(0), [200, 0, 0]);
        assert_eq!(source.capture().unwrap().rgb_at(0), [0, 0, 200]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_a_capture_failure() {
        let dir = scratch_dir();
        fs::write(dir.join("broken.png"), [0u8, 1, 2, 3]).unwrap();

        let mut source = DirectorySource::open(&dir).unwrap();
        assert!(matches!(
            source.capture(),
            Err(CaptureError::InvalidFrame(_))
        ));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = scratch_dir();
        assert!(DirectorySource::open(&dir).is_err());
        fs::remove_dir_all(dir).unwrap();
    }
}
