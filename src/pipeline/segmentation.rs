//! Person/background segmentation stage.

use std::sync::Arc;

use image::{ImageBuffer, Luma, Rgb, RgbImage};
use tokio::task;

use crate::error::{ModelError, Result, VeilfitError};
use crate::source::Frame;

/// Per-pixel foreground confidence aligned to one frame.
///
/// Values are in `[0, 1]`, 1 meaning the pixel is certainly the person.
/// The mask lives for exactly one tracking cycle: it gates occlusion in
/// the compositor and blanks the background before landmark inference.
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    confidence: ImageBuffer<Luma<f32>, Vec<f32>>,
}

impl SegmentationMask {
    /// Builds a mask from row-major confidence values. Returns `None` when
    /// the value count does not match the dimensions.
    pub fn from_confidence(width: u32, height: u32, values: Vec<f32>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, values).map(|confidence| Self { confidence })
    }

    /// A mask with the same confidence at every pixel.
    pub fn uniform(width: u32, height: u32, value: f32) -> Self {
        Self {
            confidence: ImageBuffer::from_pixel(width, height, Luma([value])),
        }
    }

    pub fn width(&self) -> u32 {
        self.confidence.width()
    }

    pub fn height(&self) -> u32 {
        self.confidence.height()
    }

    pub fn foreground_at(&self, x: u32, y: u32) -> f32 {
        self.confidence.get_pixel(x, y)[0]
    }

    /// True when the pixel is confidently part of the person.
    pub fn is_foreground(&self, x: u32, y: u32, threshold: f32) -> bool {
        self.foreground_at(x, y) >= threshold
    }

    /// Blanks background pixels of an aligned image; the landmark stage
    /// runs on the result so it only ever sees the person. The image must
    /// have the mask's dimensions; [`SegmentationStage`] guarantees this
    /// for masks it hands out.
    pub fn apply_to(&self, image: &RgbImage, threshold: f32) -> RgbImage {
        debug_assert_eq!(image.dimensions(), self.confidence.dimensions());
        let mut out = image.clone();
        for (x, y, px) in out.enumerate_pixels_mut() {
            if self.foreground_at(x, y) < threshold {
                *px = Rgb([0, 0, 0]);
            }
        }
        out
    }
}

/// A person-segmentation inference backend.
///
/// Called from a blocking worker; implementations are shared across cycles
/// and must serialize any internal mutability themselves.
pub trait SegmentationModel: Send + Sync {
    fn segment(&self, frame: &Frame) -> std::result::Result<SegmentationMask, ModelError>;
}

/// Output of the segmentation stage for a single frame.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub frame: Frame,
    pub mask: SegmentationMask,
}

/// Async wrapper driving a [`SegmentationModel`] on the blocking pool, so
/// the session loop suspends while inference runs.
#[derive(Clone)]
pub struct SegmentationStage {
    model: Arc<dyn SegmentationModel>,
}

impl SegmentationStage {
    pub fn new(model: Arc<dyn SegmentationModel>) -> Self {
        Self { model }
    }

    pub async fn run(&self, frame: Frame) -> Result<SegmentationResult> {
        let model = Arc::clone(&self.model);
        let task_frame = frame.clone();
        let mask = task::spawn_blocking(move || model.segment(&task_frame))
            .await
            .map_err(|e| VeilfitError::Model(ModelError::Inference(e.to_string())))??;
        // A backend is free to fail, but a mask it does return must align
        // with the frame; everything downstream indexes by frame coords.
        if mask.width() != frame.width || mask.height() != frame.height {
            return Err(ModelError::InvalidOutput(format!(
                "segmentation mask {}x{} does not match frame {}x{}",
                mask.width(),
                mask.height(),
                frame.width,
                frame.height
            ))
            .into());
        }
        Ok(SegmentationResult { frame, mask })
    }
}
