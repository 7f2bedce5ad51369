//! Pairing of segmentation and landmark results across cycles.

use tracing::trace;

use crate::pipeline::landmarks::{LandmarkResult, LandmarkSet};
use crate::pipeline::segmentation::{SegmentationMask, SegmentationResult};
use crate::source::Frame;

/// The synchronized output of one tracking cycle: the frame, its mask, and
/// the landmarks detected on the masked image (absent when no face was
/// found).
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub frame: Frame,
    pub mask: SegmentationMask,
    pub landmarks: Option<LandmarkSet>,
}

/// Pairs each landmark result with the segmentation output that produced
/// it.
///
/// The segmentation half of a cycle is cached under a generation number.
/// Starting a new cycle overwrites the cache and bumps the generation, so
/// a landmark completion carrying a stale generation is dropped rather
/// than paired against the wrong mask: only the newest cycle is ever
/// delivered.
#[derive(Debug, Default)]
pub struct ResultSynchronizer {
    cached: Option<SegmentationResult>,
    generation: u64,
}

impl ResultSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a cycle: caches the segmentation output and returns the new
    /// generation the landmark completion must present.
    pub fn begin_cycle(&mut self, segmentation: SegmentationResult) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.cached = Some(segmentation);
        self.generation
    }

    /// Completes a cycle, pairing landmarks with the cached segmentation.
    /// Returns `None` when a newer cycle has superseded `generation` or
    /// the cache was already consumed.
    pub fn complete(&mut self, generation: u64, landmarks: LandmarkResult) -> Option<FrameResult> {
        if generation != self.generation {
            trace!(
                stale = generation,
                current = self.generation,
                "dropping superseded landmark result"
            );
            return None;
        }
        let segmentation = self.cached.take()?;
        Some(FrameResult {
            frame: segmentation.frame,
            mask: segmentation.mask,
            landmarks: landmarks.landmarks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn seg_result(width: u32) -> SegmentationResult {
        SegmentationResult {
            frame: Frame::new(RgbImage::new(width, 4)),
            mask: SegmentationMask::uniform(width, 4, 0.0),
        }
    }

    fn lm_result() -> LandmarkResult {
        LandmarkResult { landmarks: None }
    }

    #[test]
    fn test_pairs_matching_generation() {
        let mut sync = ResultSynchronizer::new();
        let generation = sync.begin_cycle(seg_result(8));

        let result = sync.complete(generation, lm_result()).unwrap();
        assert_eq!(result.frame.width, 8);
        assert_eq!(result.mask.width(), 8);
        assert!(result.landmarks.is_none());
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let mut sync = ResultSynchronizer::new();
        let old = sync.begin_cycle(seg_result(8));
        // a newer cycle begins before the old landmarks resolve
        let new = sync.begin_cycle(seg_result(16));

        assert!(sync.complete(old, lm_result()).is_none());

        // the new cycle still pairs against its own mask
        let result = sync.complete(new, lm_result()).unwrap();
        assert_eq!(result.mask.width(), 16);
    }

    #[test]
    fn test_cache_consumed_once() {
        let mut sync = ResultSynchronizer::new();
        let generation = sync.begin_cycle(seg_result(8));
        assert!(sync.complete(generation, lm_result()).is_some());
        assert!(sync.complete(generation, lm_result()).is_none());
    }
}
