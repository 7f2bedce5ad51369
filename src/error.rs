//! Error types for the try-on pipeline.
//!
//! A single top-level [`VeilfitError`] wraps per-domain error enums so
//! callers can match on the failing subsystem while library code uses the
//! crate-wide [`Result`] alias.

use thiserror::Error;

/// Top-level error type for veilfit.
#[derive(Error, Debug)]
pub enum VeilfitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frame source error: {0}")]
    Source(#[from] SourceError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Frame acquisition failures.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The capture device is missing, busy, or permission was denied.
    /// Fatal for the session; there is no retry.
    #[error("Camera access failed: {0}")]
    DeviceAccess(String),

    #[error("Failed to decode input image: {0}")]
    Decode(String),

    #[error("Frame source is closed")]
    Closed,
}

/// Inference backend failures.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A backend failed to initialize or load its weights. Fatal at
    /// session start.
    #[error("Model load failed: {0}")]
    Load(String),

    /// A single inference call failed. Logged and absorbed; the cycle is
    /// skipped.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The backend produced output that does not match the expected shape.
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Model backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Session lifecycle failures.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No usable face was found within the still-image detection window.
    #[error("No face detected within {waited_ms} ms")]
    NoFaceDetected { waited_ms: u64 },

    /// `start` was called on a session that has already run to completion.
    #[error("Session already terminated")]
    Terminated,
}

/// Compositing failures.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(
        "Surface/mask size mismatch: surface {surface_w}x{surface_h}, mask {mask_w}x{mask_h}"
    )]
    SurfaceMismatch {
        surface_w: u32,
        surface_h: u32,
        mask_w: u32,
        mask_h: u32,
    },

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Failed to encode output image: {0}")]
    Encode(String),
}

/// Convenience result type for veilfit operations.
pub type Result<T> = std::result::Result<T, VeilfitError>;
