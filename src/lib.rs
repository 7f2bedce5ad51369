//! Veilfit - Virtual head-garment try-on core
//!
//! Renders a stylable head/neck garment onto a live camera feed or a
//! still photo:
//! - Two-stage inference per frame: person segmentation, then face
//!   landmarks on the masked image
//! - Latest-wins synchronization between the async stages, at most one
//!   cycle in flight
//! - Landmark-driven garment geometry with color, drape, and fabric
//!   texture styling
//! - Occlusion against the segmentation mask so the person reads as
//!   being in front of the fabric
//!
//! Model backends (ONNX Runtime, feature `onnx`) load once into a
//! [`ModelRegistry`] and are shared across [`TrackingSession`]s.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod source;

pub use config::Config;
pub use error::{Result, VeilfitError};
pub use pipeline::registry::ModelRegistry;
pub use session::{CycleReport, ResultCallback, SessionPhase, TrackingSession};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
