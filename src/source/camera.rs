//! Live camera frame source built on nokhwa.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use tracing::{debug, info};

use crate::config::CameraConfig;
use crate::error::SourceError;
use crate::source::{Frame, FrameSource, SourceMode};

/// Streams frames from a local capture device.
pub struct CameraSource {
    config: CameraConfig,
    camera: Option<Camera>,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            camera: None,
        }
    }

    /// Enumerates capture devices, for the CLI listing.
    pub fn list_devices() -> Result<Vec<String>, SourceError> {
        let devices = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| SourceError::DeviceAccess(e.to_string()))?;
        Ok(devices
            .into_iter()
            .map(|d| format!("{}: {}", d.index(), d.human_name()))
            .collect())
    }
}

impl FrameSource for CameraSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Live
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(self.config.width, self.config.height),
                FrameFormat::MJPEG,
                self.config.fps,
            ),
        ));
        let mut camera = Camera::new(CameraIndex::Index(self.config.device_index), requested)
            .map_err(|e| SourceError::DeviceAccess(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| SourceError::DeviceAccess(e.to_string()))?;
        info!(
            index = self.config.device_index,
            format = %camera.camera_format(),
            "camera stream opened"
        );
        self.camera = Some(camera);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let camera = self.camera.as_mut().ok_or(SourceError::Closed)?;
        let raw = camera
            .frame()
            .map_err(|e| SourceError::DeviceAccess(e.to_string()))?;
        let image = raw
            .decode_image::<RgbFormat>()
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(Frame::new(image))
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                debug!(error = %e, "camera stream stop failed");
            }
        }
    }
}
