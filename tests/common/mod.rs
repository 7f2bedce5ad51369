//! Shared fixtures for the session integration tests: scripted inference
//! backends, synthetic landmark sets, and a looping live source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::RgbImage;

use veilfit::config::Config;
use veilfit::error::{ModelError, SourceError};
use veilfit::pipeline::landmarks::{Landmark, LandmarkModel, LandmarkSet, EXPECTED_LANDMARKS};
use veilfit::pipeline::registry::ModelRegistry;
use veilfit::pipeline::segmentation::{SegmentationMask, SegmentationModel};
use veilfit::render::anchors::{CHIN, FOREHEAD_TOP, LEFT_TEMPLE, RIGHT_TEMPLE};
use veilfit::session::{CycleReport, ResultCallback};
use veilfit::source::{Frame, FrameSource, SourceMode};

/// 478-point set with the four garment anchors at the given normalized
/// positions and everything else mid-frame.
pub fn anchored_landmarks(
    head_top: (f32, f32),
    left_temple: (f32, f32),
    right_temple: (f32, f32),
    chin: (f32, f32),
) -> LandmarkSet {
    let mut points = vec![Landmark::new(0.5, 0.5, 0.0); EXPECTED_LANDMARKS];
    points[FOREHEAD_TOP] = Landmark::new(head_top.0, head_top.1, 0.0);
    points[LEFT_TEMPLE] = Landmark::new(left_temple.0, left_temple.1, 0.0);
    points[RIGHT_TEMPLE] = Landmark::new(right_temple.0, right_temple.1, 0.0);
    points[CHIN] = Landmark::new(chin.0, chin.1, 0.0);
    LandmarkSet::new(points)
}

/// The canonical face used across the scenarios: on a 640x480 frame the
/// control points land at (320,16), (88,144), (552,144), and (320,384).
pub fn default_landmarks() -> LandmarkSet {
    anchored_landmarks((0.5, 0.2), (0.2, 0.3), (0.8, 0.3), (0.5, 0.8))
}

/// A landmark set too short to ever be usable.
pub fn short_landmarks() -> LandmarkSet {
    LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.0); 300])
}

/// Config tuned for fast test cycles.
pub fn fast_config(still_timeout_ms: u64) -> Config {
    let mut config = Config::default();
    config.session.target_fps = 100;
    config.session.still_timeout_ms = still_timeout_ms;
    config
}

/// Segmentation backend returning a uniform-confidence mask, optionally
/// after a blocking delay.
pub struct ScriptedSegmentation {
    foreground: f32,
    delay: Duration,
    mask_size: Option<(u32, u32)>,
}

impl ScriptedSegmentation {
    /// Everything is background; the garment is never occluded.
    pub fn background() -> Arc<Self> {
        Arc::new(Self {
            foreground: 0.0,
            delay: Duration::ZERO,
            mask_size: None,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            foreground: 0.0,
            delay,
            mask_size: None,
        })
    }

    /// Mask dimensions pinned regardless of the frame, for backends that
    /// misbehave.
    pub fn fixed_size(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            foreground: 0.0,
            delay: Duration::ZERO,
            mask_size: Some((width, height)),
        })
    }
}

impl SegmentationModel for ScriptedSegmentation {
    fn segment(&self, frame: &Frame) -> Result<SegmentationMask, ModelError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let (width, height) = self.mask_size.unwrap_or((frame.width, frame.height));
        Ok(SegmentationMask::uniform(width, height, self.foreground))
    }
}

/// Landmark backend returning a fixed detection and counting calls.
pub struct ScriptedLandmarks {
    landmarks: Option<LandmarkSet>,
    calls: AtomicUsize,
}

impl ScriptedLandmarks {
    pub fn detecting(landmarks: LandmarkSet) -> Arc<Self> {
        Arc::new(Self {
            landmarks: Some(landmarks),
            calls: AtomicUsize::new(0),
        })
    }

    /// Never sees a face.
    pub fn blind() -> Arc<Self> {
        Arc::new(Self {
            landmarks: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LandmarkModel for ScriptedLandmarks {
    fn detect(&self, _image: &RgbImage) -> Result<Option<LandmarkSet>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.landmarks.clone())
    }
}

/// Live-mode source serving the same blank frame forever.
pub struct LoopingSource {
    frame: Frame,
    open: bool,
}

impl LoopingSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: Frame::new(RgbImage::new(width, height)),
            open: false,
        }
    }
}

impl FrameSource for LoopingSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Live
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

/// Registry preloaded with scripted backends; nothing touches the ONNX
/// loaders.
pub fn registry_with(
    segmentation: Arc<dyn SegmentationModel>,
    landmarks: Arc<dyn LandmarkModel>,
) -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::with_models(segmentation, landmarks))
}

/// Callback capturing every report for later assertions.
pub fn collecting_callback() -> (ResultCallback, Arc<Mutex<Vec<CycleReport>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let callback: ResultCallback = Box::new(move |report| {
        sink.lock().unwrap().push(report);
    });
    (callback, reports)
}
