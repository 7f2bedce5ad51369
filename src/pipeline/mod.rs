//! Two-stage inference pipeline: segmentation feeding landmark detection,
//! with latest-wins synchronization between the stages.

pub mod landmarks;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod registry;
pub mod segmentation;
pub mod sync;

pub use landmarks::{
    Landmark, LandmarkModel, LandmarkResult, LandmarkSet, LandmarkStage, EXPECTED_LANDMARKS,
};
pub use registry::ModelRegistry;
pub use segmentation::{
    SegmentationMask, SegmentationModel, SegmentationResult, SegmentationStage,
};
pub use sync::{FrameResult, ResultSynchronizer};
