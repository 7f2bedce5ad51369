//! Facial landmark detection stage.

use std::sync::Arc;

use image::RgbImage;
use tokio::task;

use crate::error::{ModelError, Result, VeilfitError};

/// Number of points in a complete (refined) landmark set.
pub const EXPECTED_LANDMARKS: usize = 478;

/// One 3D landmark in normalized image coordinates; x and y are roughly
/// in `[0, 1]` over the frame, z is relative depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// An ordered set of facial landmarks.
///
/// A set may arrive with fewer points than expected; consumers must check
/// [`LandmarkSet::is_complete`] before indexing by position. Incomplete
/// sets count as no detection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True only at exactly the expected cardinality.
    pub fn is_complete(&self) -> bool {
        self.points.len() == EXPECTED_LANDMARKS
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }
}

/// A face-landmark inference backend.
pub trait LandmarkModel: Send + Sync {
    /// Returns `Ok(None)` when no face is visible in the image.
    fn detect(&self, image: &RgbImage) -> std::result::Result<Option<LandmarkSet>, ModelError>;
}

/// Output of the landmark stage.
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    pub landmarks: Option<LandmarkSet>,
}

/// Async wrapper driving a [`LandmarkModel`] on the blocking pool.
#[derive(Clone)]
pub struct LandmarkStage {
    model: Arc<dyn LandmarkModel>,
}

impl LandmarkStage {
    pub fn new(model: Arc<dyn LandmarkModel>) -> Self {
        Self { model }
    }

    /// Runs detection on the mask-applied image for one cycle.
    pub async fn run(&self, image: RgbImage) -> Result<LandmarkResult> {
        let model = Arc::clone(&self.model);
        let landmarks = task::spawn_blocking(move || model.detect(&image))
            .await
            .map_err(|e| VeilfitError::Model(ModelError::Inference(e.to_string())))??;
        Ok(LandmarkResult { landmarks })
    }
}
