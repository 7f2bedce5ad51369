//! Single-image frame source.

use std::path::Path;

use image::RgbImage;
use tracing::debug;

use crate::error::SourceError;
use crate::source::{Frame, FrameSource, SourceMode};

/// Serves one decoded image on every tick until the session stops, so a
/// photo runs through the same pipeline as a camera stream.
#[derive(Debug)]
pub struct StillSource {
    frame: Frame,
    open: bool,
}

impl StillSource {
    /// Decodes an image file into a still source.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let image = image::open(path)
            .map_err(|e| SourceError::Decode(format!("{}: {e}", path.display())))?
            .to_rgb8();
        debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "still image decoded"
        );
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self {
            frame: Frame::new(image),
            open: false,
        }
    }
}

impl FrameSource for StillSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Still
    }

    fn open(&mut self) -> Result<(), SourceError> {
        self.open = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if !self.open {
            return Err(SourceError::Closed);
        }
        Ok(self.frame.clone())
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_serves_same_frame_repeatedly() {
        let mut source = StillSource::from_image(RgbImage::new(32, 24));
        source.open().unwrap();

        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        assert_eq!(a.width, 32);
        assert_eq!(a.height, 24);
        assert!(Arc::ptr_eq(&a.image, &b.image));
    }

    #[test]
    fn test_closed_source_refuses_frames() {
        let mut source = StillSource::from_image(RgbImage::new(4, 4));
        assert!(matches!(source.next_frame(), Err(SourceError::Closed)));

        source.open().unwrap();
        source.close();
        assert!(matches!(source.next_frame(), Err(SourceError::Closed)));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = StillSource::from_path(Path::new("/nonexistent/face.jpg")).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }
}
