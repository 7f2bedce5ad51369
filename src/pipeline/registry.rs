//! Lazy, shared model loading.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::pipeline::landmarks::LandmarkModel;
use crate::pipeline::segmentation::SegmentationModel;

/// Loads the heavy inference backends once and hands out shared handles.
///
/// Sessions come and go; the registry outlives them so repeated try-ons
/// never reload model weights. `ensure_loaded` is safe to call
/// concurrently; only one load runs per backend.
#[derive(Default)]
pub struct ModelRegistry {
    segmentation: OnceCell<Arc<dyn SegmentationModel>>,
    landmarks: OnceCell<Arc<dyn LandmarkModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with pre-built backends, for tests and embedders that
    /// bring their own models.
    pub fn with_models(
        segmentation: Arc<dyn SegmentationModel>,
        landmarks: Arc<dyn LandmarkModel>,
    ) -> Self {
        let registry = Self::new();
        // fresh cells, the sets cannot fail
        let _ = registry.segmentation.set(segmentation);
        let _ = registry.landmarks.set(landmarks);
        registry
    }

    /// True once both backends are resident.
    pub fn is_loaded(&self) -> bool {
        self.segmentation.initialized() && self.landmarks.initialized()
    }

    /// Loads any backend that is not already resident.
    pub async fn ensure_loaded(&self, config: &Config) -> Result<()> {
        self.segmentation
            .get_or_try_init(|| load_segmentation_model(config))
            .await?;
        self.landmarks
            .get_or_try_init(|| load_landmark_model(config))
            .await?;
        Ok(())
    }

    pub fn segmentation(&self) -> Result<Arc<dyn SegmentationModel>> {
        self.segmentation
            .get()
            .cloned()
            .ok_or_else(|| ModelError::Load("segmentation model not loaded".to_string()).into())
    }

    pub fn landmarks(&self) -> Result<Arc<dyn LandmarkModel>> {
        self.landmarks
            .get()
            .cloned()
            .ok_or_else(|| ModelError::Load("landmark model not loaded".to_string()).into())
    }

    /// Drops resident backends. Sessions started earlier keep their own
    /// handles alive until they stop.
    pub fn teardown(&mut self) {
        self.segmentation.take();
        self.landmarks.take();
    }
}

#[cfg(feature = "onnx")]
async fn load_segmentation_model(config: &Config) -> Result<Arc<dyn SegmentationModel>> {
    let cfg = config.segmentation.clone();
    info!(model = %cfg.model_path.display(), "loading segmentation model");
    let model = tokio::task::spawn_blocking(move || {
        crate::pipeline::onnx::OnnxSegmentation::load(&cfg)
    })
    .await
    .map_err(|e| ModelError::Load(e.to_string()))??;
    Ok(Arc::new(model) as Arc<dyn SegmentationModel>)
}

#[cfg(not(feature = "onnx"))]
async fn load_segmentation_model(_config: &Config) -> Result<Arc<dyn SegmentationModel>> {
    Err(ModelError::BackendUnavailable(
        "built without the `onnx` feature".to_string(),
    )
    .into())
}

#[cfg(feature = "onnx")]
async fn load_landmark_model(config: &Config) -> Result<Arc<dyn LandmarkModel>> {
    let cfg = config.landmarks.clone();
    info!(model = %cfg.model_path.display(), "loading landmark model");
    let model =
        tokio::task::spawn_blocking(move || crate::pipeline::onnx::OnnxLandmarks::load(&cfg))
            .await
            .map_err(|e| ModelError::Load(e.to_string()))??;
    Ok(Arc::new(model) as Arc<dyn LandmarkModel>)
}

#[cfg(not(feature = "onnx"))]
async fn load_landmark_model(_config: &Config) -> Result<Arc<dyn LandmarkModel>> {
    Err(ModelError::BackendUnavailable(
        "built without the `onnx` feature".to_string(),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VeilfitError;
    use crate::pipeline::landmarks::LandmarkSet;
    use crate::pipeline::segmentation::SegmentationMask;
    use crate::source::Frame;

    struct FakeSeg;
    impl SegmentationModel for FakeSeg {
        fn segment(&self, frame: &Frame) -> std::result::Result<SegmentationMask, ModelError> {
            Ok(SegmentationMask::uniform(frame.width, frame.height, 0.0))
        }
    }

    struct FakeLm;
    impl LandmarkModel for FakeLm {
        fn detect(
            &self,
            _image: &image::RgbImage,
        ) -> std::result::Result<Option<LandmarkSet>, ModelError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_preloaded_registry_skips_loading() {
        let registry = ModelRegistry::with_models(Arc::new(FakeSeg), Arc::new(FakeLm));
        assert!(registry.is_loaded());

        // would fail without the onnx feature if it actually tried to load
        registry.ensure_loaded(&Config::default()).await.unwrap();
        assert!(registry.segmentation().is_ok());
        assert!(registry.landmarks().is_ok());
    }

    #[test]
    fn test_empty_registry_has_no_handles() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_loaded());
        assert!(matches!(
            registry.segmentation(),
            Err(VeilfitError::Model(ModelError::Load(_)))
        ));
    }

    #[tokio::test]
    async fn test_teardown_clears_backends() {
        let mut registry = ModelRegistry::with_models(Arc::new(FakeSeg), Arc::new(FakeLm));
        registry.teardown();
        assert!(!registry.is_loaded());
        assert!(registry.landmarks().is_err());
    }
}
