//! Frame acquisition: live cameras and still images.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;

use crate::error::SourceError;

#[cfg(feature = "camera")]
pub mod camera;
pub mod still;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use still::StillSource;

/// Whether a source produces an ongoing stream or a single picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Live,
    Still,
}

/// One captured frame.
///
/// Pixel data is shared, so clones are cheap and a still source can serve
/// the same image on every tick.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<RgbImage>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image: Arc::new(image),
            width,
            height,
            timestamp: Instant::now(),
        }
    }
}

/// A source of frames for a tracking session.
///
/// `open` acquires the device or input during session initialization and
/// `close` releases it on stop. `next_frame` runs on the session's tick
/// and should return promptly; the session bounds the overall rate.
pub trait FrameSource: Send {
    fn mode(&self) -> SourceMode;

    fn open(&mut self) -> Result<(), SourceError>;

    fn next_frame(&mut self) -> Result<Frame, SourceError>;

    fn close(&mut self);
}
