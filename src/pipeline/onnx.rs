//! ONNX Runtime inference backends for both pipeline stages.
//!
//! The crate ships no model weights; configuration points at a selfie
//! segmentation model and a refined face-landmark model on disk.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::{ImageBuffer, Luma, RgbImage};
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use crate::config::{LandmarksConfig, SegmentationConfig};
use crate::error::ModelError;
use crate::pipeline::landmarks::{Landmark, LandmarkModel, LandmarkSet, EXPECTED_LANDMARKS};
use crate::pipeline::segmentation::{SegmentationMask, SegmentationModel};
use crate::source::Frame;

fn build_session(path: &Path) -> Result<Session, ModelError> {
    let build = || -> ort::Result<Session> { Session::builder()?.commit_from_file(path) };
    build().map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))
}

/// NCHW float tensor in `[0, 1]` from a packed RGB image.
fn rgb_to_nchw(image: &RgbImage) -> Result<ort::value::DynValue, ModelError> {
    let (w, h) = image.dimensions();
    let plane = (w * h) as usize;
    let raw = image.as_raw();
    let mut data = vec![0f32; 3 * plane];
    for idx in 0..plane {
        data[idx] = f32::from(raw[idx * 3]) / 255.0;
        data[plane + idx] = f32::from(raw[idx * 3 + 1]) / 255.0;
        data[2 * plane + idx] = f32::from(raw[idx * 3 + 2]) / 255.0;
    }
    let shape = [1usize, 3, h as usize, w as usize];
    Ok(Tensor::from_array((shape, data.into_boxed_slice()))
        .map_err(|e| ModelError::Inference(e.to_string()))?
        .into_dyn())
}

/// Squashes raw logits into `[0, 1]`; already-normalized outputs pass
/// through untouched.
fn to_confidence(values: &mut [f32]) {
    if values.iter().any(|v| *v < 0.0 || *v > 1.0) {
        for v in values.iter_mut() {
            *v = 1.0 / (1.0 + (-*v).exp());
        }
    }
}

/// Selfie-segmentation backend.
pub struct OnnxSegmentation {
    session: Mutex<Session>,
    input_name: String,
    input_width: u32,
    input_height: u32,
}

impl OnnxSegmentation {
    pub fn load(config: &SegmentationConfig) -> Result<Self, ModelError> {
        Ok(Self {
            session: Mutex::new(build_session(&config.model_path)?),
            input_name: config.input_name.clone(),
            input_width: config.input_width,
            input_height: config.input_height,
        })
    }
}

impl SegmentationModel for OnnxSegmentation {
    fn segment(&self, frame: &Frame) -> Result<SegmentationMask, ModelError> {
        let resized = image::imageops::resize(
            frame.image.as_ref(),
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );
        let tensor = rgb_to_nchw(&resized)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Inference("segmentation session poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        if outputs.is_empty() {
            return Err(ModelError::InvalidOutput(
                "segmentation produced no outputs".to_string(),
            ));
        }
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InvalidOutput(e.to_string()))?;

        let pixels = (self.input_width * self.input_height) as usize;
        let mut confidence = if data.len() == pixels {
            data.to_vec()
        } else if data.len() == 2 * pixels {
            // two-class output, foreground plane second
            data[pixels..].to_vec()
        } else {
            return Err(ModelError::InvalidOutput(format!(
                "segmentation output shape {shape:?} does not cover {}x{}",
                self.input_width, self.input_height
            )));
        };
        to_confidence(&mut confidence);

        let small: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(self.input_width, self.input_height, confidence)
                .ok_or_else(|| ModelError::InvalidOutput("confidence buffer mismatch".to_string()))?;
        let full = image::imageops::resize(&small, frame.width, frame.height, FilterType::Triangle);
        debug!(width = frame.width, height = frame.height, "segmentation mask ready");
        SegmentationMask::from_confidence(frame.width, frame.height, full.into_raw())
            .ok_or_else(|| ModelError::InvalidOutput("mask resize mismatch".to_string()))
    }
}

/// Refined face-landmark backend (478-point mesh).
pub struct OnnxLandmarks {
    session: Mutex<Session>,
    input_name: String,
    input_size: u32,
    min_confidence: f32,
}

impl OnnxLandmarks {
    pub fn load(config: &LandmarksConfig) -> Result<Self, ModelError> {
        Ok(Self {
            session: Mutex::new(build_session(&config.model_path)?),
            input_name: config.input_name.clone(),
            input_size: config.input_size,
            min_confidence: config.min_confidence,
        })
    }
}

impl LandmarkModel for OnnxLandmarks {
    fn detect(&self, image: &RgbImage) -> Result<Option<LandmarkSet>, ModelError> {
        let resized =
            image::imageops::resize(image, self.input_size, self.input_size, FilterType::Triangle);
        let tensor = rgb_to_nchw(&resized)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Inference("landmark session poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        if outputs.is_empty() {
            return Err(ModelError::InvalidOutput(
                "landmark model produced no outputs".to_string(),
            ));
        }

        // second output, when present, is the face presence score
        if outputs.len() > 1 {
            if let Ok((_, data)) = outputs[1].try_extract_tensor::<f32>() {
                if let Some(&raw) = data.first() {
                    let mut score = [raw];
                    to_confidence(&mut score);
                    if score[0] < self.min_confidence {
                        debug!(score = score[0], "no face above confidence threshold");
                        return Ok(None);
                    }
                }
            }
        }

        let (shape, coords) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InvalidOutput(e.to_string()))?;

        let expected = EXPECTED_LANDMARKS * 3;
        if coords.len() != expected {
            return Err(ModelError::InvalidOutput(format!(
                "landmark output shape {shape:?}, expected {expected} values"
            )));
        }

        // coordinates come back in input-pixel space
        let scale = self.input_size as f32;
        let points = coords
            .chunks_exact(3)
            .map(|c| Landmark::new(c[0] / scale, c[1] / scale, c[2] / scale))
            .collect();
        Ok(Some(LandmarkSet::new(points)))
    }
}
