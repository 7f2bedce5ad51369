//! Try-on session lifecycle and the per-frame processing loop.
//!
//! A [`TrackingSession`] owns one frame source and drives the cycle
//! FrameSource -> segmentation -> landmarks -> synchronizer -> compositor
//! on a fixed tick. Sessions are one-shot: start, run, stop. The heavy
//! model backends live in the [`ModelRegistry`] and survive across
//! sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::{Result, SessionError, SourceError};
use crate::pipeline::landmarks::LandmarkStage;
use crate::pipeline::registry::ModelRegistry;
use crate::pipeline::segmentation::SegmentationStage;
use crate::pipeline::sync::{FrameResult, ResultSynchronizer};
use crate::render::anchors::control_points;
use crate::render::compositor::{Compositor, CompositorOptions};
use crate::render::style::{builtin_styles, GarmentStyle};
use crate::render::surface::RenderSurface;
use crate::source::{FrameSource, SourceMode};

/// Lifecycle phase of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Created, not started
    Uninitialized,
    /// Loading models and opening the source
    Initializing,
    /// Processing loop active
    Running,
    /// Finished normally; terminal
    Stopped,
    /// Failed during initialization or processing; terminal
    Errored,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        };
        write!(f, "{}", name)
    }
}

/// Per-cycle status delivered to the result callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Whether a complete landmark set was found this cycle
    pub has_detection: bool,
    /// Whether the garment overlay was drawn this cycle
    pub garment_applied: bool,
}

/// Callback invoked once per completed processing cycle
pub type ResultCallback = Box<dyn Fn(CycleReport) + Send + Sync>;

/// Ignores mutex poisoning: a panicked cycle must not wedge `stop()`.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the session handle and its loop task
struct SessionShared {
    phase: Mutex<SessionPhase>,
    /// Checked after every suspension point in the cycle; once false, any
    /// inference that resolves later is discarded without output
    active: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    /// Slot holding the frame source while the session runs. `stop()`
    /// takes it out and closes it synchronously.
    source: Mutex<Option<Box<dyn FrameSource>>>,
    style: Mutex<GarmentStyle>,
    compositor: Mutex<Compositor>,
}

impl SessionShared {
    fn phase(&self) -> SessionPhase {
        *lock(&self.phase)
    }

    fn set_phase(&self, phase: SessionPhase) {
        *lock(&self.phase) = phase;
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Deactivates the session, releases the source, and settles the
    /// terminal phase. Returns whether the session was active.
    fn halt(&self, terminal: SessionPhase) -> bool {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        if let Some(mut source) = lock(&self.source).take() {
            source.close();
        }

        let mut phase = lock(&self.phase);
        if *phase != SessionPhase::Errored {
            *phase = terminal;
        }

        was_active
    }
}

/// A one-shot try-on session over a live or still frame source.
pub struct TrackingSession {
    shared: Arc<SessionShared>,
    registry: Arc<ModelRegistry>,
    config: Config,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TrackingSession {
    /// Create a session using the given configuration and model registry.
    ///
    /// The initial garment style is the first catalog entry; use
    /// [`set_style`](Self::set_style) to pick another.
    pub fn new(config: Config, registry: Arc<ModelRegistry>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let options = CompositorOptions {
            mode: config.render.mode,
            mask_threshold: config.render.mask_threshold,
            texture_alpha: config.render.texture_alpha,
            drape_darken: config.render.drape_darken,
        };
        let style = config
            .styles
            .first()
            .cloned()
            // the built-in catalog is never empty
            .unwrap_or_else(|| builtin_styles().swap_remove(0));

        Self {
            shared: Arc::new(SessionShared {
                phase: Mutex::new(SessionPhase::Uninitialized),
                active: AtomicBool::new(false),
                shutdown_tx,
                source: Mutex::new(None),
                style: Mutex::new(style),
                compositor: Mutex::new(Compositor::new(0, 0, options)),
            }),
            registry,
            config,
            handle: None,
        }
    }

    /// Start processing frames from `source`, delivering one
    /// [`CycleReport`] per completed cycle to `on_result`.
    ///
    /// A no-op while already initializing or running. Starting a stopped
    /// or errored session returns [`SessionError::Terminated`]; create a
    /// fresh session instead, the registry keeps the models warm.
    pub async fn start(
        &mut self,
        mut source: Box<dyn FrameSource>,
        on_result: ResultCallback,
    ) -> Result<()> {
        {
            let mut phase = lock(&self.shared.phase);
            match *phase {
                SessionPhase::Initializing | SessionPhase::Running => {
                    debug!("Session already {}, start ignored", *phase);
                    return Ok(());
                }
                SessionPhase::Stopped | SessionPhase::Errored => {
                    return Err(SessionError::Terminated.into());
                }
                SessionPhase::Uninitialized => *phase = SessionPhase::Initializing,
            }
        }

        info!("Initializing try-on session");

        if let Err(e) = self.registry.ensure_loaded(&self.config).await {
            error!("Model loading failed: {}", e);
            self.shared.set_phase(SessionPhase::Errored);
            return Err(e);
        }

        let mode = source.mode();
        if let Err(e) = source.open() {
            error!("Failed to open frame source: {}", e);
            self.shared.set_phase(SessionPhase::Errored);
            return Err(e.into());
        }

        // ensure_loaded just succeeded, so the handles are resident
        let (seg_model, lm_model) = match (self.registry.segmentation(), self.registry.landmarks())
        {
            (Ok(s), Ok(l)) => (s, l),
            (Err(e), _) | (_, Err(e)) => {
                source.close();
                self.shared.set_phase(SessionPhase::Errored);
                return Err(e);
            }
        };

        *lock(&self.shared.source) = Some(source);
        self.shared.active.store(true, Ordering::SeqCst);
        self.shared.set_phase(SessionPhase::Running);

        let ctx = LoopContext {
            shared: Arc::clone(&self.shared),
            segmentation: SegmentationStage::new(seg_model),
            landmarks: LandmarkStage::new(lm_model),
            synchronizer: ResultSynchronizer::new(),
            on_result,
            mode,
            target_fps: self.config.session.target_fps,
            still_timeout: Duration::from_millis(self.config.session.still_timeout_ms),
            mask_threshold: self.config.render.mask_threshold,
        };
        self.handle = Some(tokio::spawn(ctx.run()));

        info!(mode = ?mode, fps = self.config.session.target_fps, "Session running");
        Ok(())
    }

    /// Stop the session. Safe from any state, any number of times.
    ///
    /// Returns with the active flag cleared and the source released;
    /// inference still in flight resolves into silence.
    pub fn stop(&self) {
        if self.shared.halt(SessionPhase::Stopped) {
            info!("Session stopped");
        }
    }

    /// Wait for the processing loop to finish and return its outcome.
    ///
    /// For a still-image session this surfaces
    /// [`SessionError::NoFaceDetected`] when the detection window elapsed
    /// without a usable face.
    pub async fn wait(&mut self) -> Result<()> {
        let handle = match self.handle.take() {
            Some(h) => h,
            None => return Ok(()),
        };

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Session loop task failed: {}", e);
                Err(SessionError::Terminated.into())
            }
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.phase()
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Switch the garment style; the next compositing cycle picks it up.
    pub fn set_style(&self, style: GarmentStyle) {
        debug!(style = %style.name, "Garment style changed");
        *lock(&self.shared.style) = style;
    }

    pub fn current_style(&self) -> GarmentStyle {
        lock(&self.shared.style).clone()
    }

    /// Copy of the overlay surface as last drawn.
    pub fn surface_snapshot(&self) -> RenderSurface {
        lock(&self.shared.compositor).surface().clone()
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        // Releases the capture device even when the caller never stopped.
        if self.shared.is_active() {
            self.stop();
        }
    }
}

/// What a single cycle produced
enum CycleOutcome {
    /// The session went inactive mid-cycle; the loop must exit
    Halt,
    /// Abandoned without output: source starved, stage error, or a stale
    /// generation
    Skipped,
    /// Completed; deliver the report
    Report(CycleReport),
}

/// Everything the spawned processing loop owns
struct LoopContext {
    shared: Arc<SessionShared>,
    segmentation: SegmentationStage,
    landmarks: LandmarkStage,
    synchronizer: ResultSynchronizer,
    on_result: ResultCallback,
    mode: SourceMode,
    target_fps: u32,
    still_timeout: Duration,
    mask_threshold: f32,
}

impl LoopContext {
    async fn run(mut self) -> Result<()> {
        let mut shutdown_rx = self.shared.shutdown_tx.subscribe();

        let period = Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)));
        let mut ticker = tokio::time::interval(period);
        // A tick falling due while a cycle is in flight is dropped, not
        // queued: at most one cycle runs at a time.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let deadline = tokio::time::sleep(self.still_timeout);
        tokio::pin!(deadline);

        debug!("Processing loop started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Processing loop shutting down");
                    return Ok(());
                }
                _ = &mut deadline, if self.mode == SourceMode::Still => {
                    let waited_ms = self.still_timeout.as_millis() as u64;
                    warn!("No face detected within {} ms, giving up", waited_ms);
                    self.shared.halt(SessionPhase::Errored);
                    return Err(SessionError::NoFaceDetected { waited_ms }.into());
                }
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        CycleOutcome::Halt => return Ok(()),
                        CycleOutcome::Skipped => {}
                        CycleOutcome::Report(report) => {
                            (self.on_result)(report);
                            if report.has_detection && self.mode == SourceMode::Still {
                                // One good detection is all a still image
                                // needs; the overlay stays for snapshots.
                                info!("Still image processed, session complete");
                                self.shared.halt(SessionPhase::Stopped);
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }

    /// One full tracking cycle: frame, mask, landmarks, composite.
    async fn run_cycle(&mut self) -> CycleOutcome {
        let frame = {
            let mut slot = lock(&self.shared.source);
            let source = match slot.as_mut() {
                Some(s) => s,
                None => return CycleOutcome::Halt,
            };
            match source.next_frame() {
                Ok(f) => f,
                Err(SourceError::Closed) => return CycleOutcome::Halt,
                Err(e) => {
                    warn!("Frame acquisition failed: {}", e);
                    return CycleOutcome::Skipped;
                }
            }
        };

        if !self.shared.is_active() {
            return CycleOutcome::Halt;
        }

        let segmentation = match self.segmentation.run(frame).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Segmentation failed: {}", e);
                return CycleOutcome::Skipped;
            }
        };

        if !self.shared.is_active() {
            trace!("Dropping segmentation result, session no longer active");
            return CycleOutcome::Halt;
        }

        // Landmarks run on the masked image so the background cannot
        // contribute false features.
        let masked = segmentation
            .mask
            .apply_to(&segmentation.frame.image, self.mask_threshold);
        let generation = self.synchronizer.begin_cycle(segmentation);

        let landmarks = match self.landmarks.run(masked).await {
            Ok(l) => l,
            Err(e) => {
                warn!("Landmark detection failed: {}", e);
                return CycleOutcome::Skipped;
            }
        };

        if !self.shared.is_active() {
            trace!("Dropping landmark result, session no longer active");
            return CycleOutcome::Halt;
        }

        let result = match self.synchronizer.complete(generation, landmarks) {
            Some(r) => r,
            None => return CycleOutcome::Skipped,
        };

        CycleOutcome::Report(self.composite(&result))
    }

    /// Maps landmarks to control points and redraws the overlay.
    fn composite(&self, result: &FrameResult) -> CycleReport {
        let mut compositor = lock(&self.shared.compositor);
        compositor.ensure_size(result.frame.width, result.frame.height);

        let points = result
            .landmarks
            .as_ref()
            .and_then(|set| control_points(set, result.frame.width, result.frame.height));

        let points = match points {
            Some(p) => p,
            None => {
                // No usable face this cycle; never leave a stale garment up
                compositor.clear();
                return CycleReport {
                    has_detection: false,
                    garment_applied: false,
                };
            }
        };

        let style = lock(&self.shared.style).clone();
        match compositor.render(&result.mask, &points, &style) {
            Ok(()) => CycleReport {
                has_detection: true,
                garment_applied: true,
            },
            Err(e) => {
                warn!("Compositing failed: {}", e);
                CycleReport {
                    has_detection: true,
                    garment_applied: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(SessionPhase::Uninitialized.to_string(), "uninitialized");
        assert_eq!(SessionPhase::Running.to_string(), "running");
        assert_eq!(SessionPhase::Errored.to_string(), "errored");
    }

    #[test]
    fn test_new_session_is_uninitialized() {
        let session = TrackingSession::new(Config::default(), Arc::new(ModelRegistry::new()));
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
        assert!(!session.is_active());
    }

    #[test]
    fn test_stop_before_start_is_safe() {
        let session = TrackingSession::new(Config::default(), Arc::new(ModelRegistry::new()));
        session.stop();
        session.stop();
        assert_eq!(session.phase(), SessionPhase::Stopped);
    }

    #[test]
    fn test_report_serializes_for_status_output() {
        let report = CycleReport {
            has_detection: true,
            garment_applied: false,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"has_detection":true,"garment_applied":false}"#);
    }
}
