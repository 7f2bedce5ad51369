//! Mapping from facial landmarks to garment control points.

use crate::pipeline::landmarks::LandmarkSet;

/// Landmark indices anchoring the garment, in the refined face-mesh
/// numbering.
pub const FOREHEAD_TOP: usize = 10;
pub const LEFT_TEMPLE: usize = 234;
pub const RIGHT_TEMPLE: usize = 454;
pub const CHIN: usize = 175;

/// Vertical raise of the crown above the forehead landmark, in pixels.
pub const HEAD_TOP_RAISE: f32 = 80.0;
/// Horizontal margin outside each temple landmark, in pixels.
pub const TEMPLE_MARGIN: f32 = 40.0;

/// The four pixel-space anchor points the garment is drawn through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoints {
    pub head_top: (f32, f32),
    pub head_left: (f32, f32),
    pub head_right: (f32, f32),
    pub chin: (f32, f32),
}

/// Derives the garment control points from a landmark set.
///
/// Returns `None` unless the set has the full expected cardinality and all
/// four anchor landmarks are finite; a partial set is never indexed.
/// Normalized coordinates are scaled to the surface and clamped to
/// `[0, width] x [0, height]`, so the result is always drawable. The
/// mapping is pure: identical inputs produce bit-identical outputs.
pub fn control_points(landmarks: &LandmarkSet, width: u32, height: u32) -> Option<ControlPoints> {
    if !landmarks.is_complete() {
        return None;
    }

    let forehead = landmarks.get(FOREHEAD_TOP)?;
    let left = landmarks.get(LEFT_TEMPLE)?;
    let right = landmarks.get(RIGHT_TEMPLE)?;
    let chin = landmarks.get(CHIN)?;
    for lm in [forehead, left, right, chin] {
        if !lm.x.is_finite() || !lm.y.is_finite() {
            return None;
        }
    }

    let w = width as f32;
    let h = height as f32;
    let cx = |x: f32| x.clamp(0.0, w);
    let cy = |y: f32| y.clamp(0.0, h);

    Some(ControlPoints {
        head_top: (cx(forehead.x * w), cy(forehead.y * h - HEAD_TOP_RAISE)),
        head_left: (cx(left.x * w - TEMPLE_MARGIN), cy(left.y * h)),
        head_right: (cx(right.x * w + TEMPLE_MARGIN), cy(right.y * h)),
        chin: (cx(chin.x * w), cy(chin.y * h)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::landmarks::{Landmark, LandmarkSet, EXPECTED_LANDMARKS};

    fn landmarks_with_anchors(
        forehead: (f32, f32),
        left: (f32, f32),
        right: (f32, f32),
        chin: (f32, f32),
    ) -> LandmarkSet {
        let mut points = vec![Landmark::new(0.5, 0.5, 0.0); EXPECTED_LANDMARKS];
        points[FOREHEAD_TOP] = Landmark::new(forehead.0, forehead.1, 0.0);
        points[LEFT_TEMPLE] = Landmark::new(left.0, left.1, 0.0);
        points[RIGHT_TEMPLE] = Landmark::new(right.0, right.1, 0.0);
        points[CHIN] = Landmark::new(chin.0, chin.1, 0.0);
        LandmarkSet::new(points)
    }

    #[test]
    fn test_anchor_mapping() {
        let set = landmarks_with_anchors((0.5, 0.2), (0.2, 0.3), (0.8, 0.3), (0.5, 0.8));
        let points = control_points(&set, 640, 480).unwrap();

        assert_eq!(points.head_top, (320.0, 16.0)); // 0.2 * 480 - 80
        assert_eq!(points.head_left, (88.0, 144.0)); // 0.2 * 640 - 40
        assert_eq!(points.head_right, (552.0, 144.0));
        assert_eq!(points.chin, (320.0, 384.0));
    }

    #[test]
    fn test_clamped_to_surface() {
        // forehead near the top edge: the raise would go negative
        let set = landmarks_with_anchors((0.5, 0.05), (0.01, 0.3), (0.99, 0.3), (0.5, 1.5));
        let points = control_points(&set, 640, 480).unwrap();

        assert_eq!(points.head_top.1, 0.0);
        assert_eq!(points.head_left.0, 0.0); // 6.4 - 40 clamps
        assert_eq!(points.head_right.0, 640.0); // 633.6 + 40 clamps
        assert_eq!(points.chin.1, 480.0);
    }

    #[test]
    fn test_partial_set_yields_nothing() {
        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.0); 300]);
        assert!(control_points(&set, 640, 480).is_none());

        let empty = LandmarkSet::new(Vec::new());
        assert!(control_points(&empty, 640, 480).is_none());
    }

    #[test]
    fn test_non_finite_anchor_yields_nothing() {
        let set = landmarks_with_anchors((f32::NAN, 0.2), (0.2, 0.3), (0.8, 0.3), (0.5, 0.8));
        assert!(control_points(&set, 640, 480).is_none());

        let set = landmarks_with_anchors((0.5, 0.2), (0.2, f32::INFINITY), (0.8, 0.3), (0.5, 0.8));
        assert!(control_points(&set, 640, 480).is_none());
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let set = landmarks_with_anchors((0.513, 0.207), (0.199, 0.313), (0.801, 0.299), (0.502, 0.788));
        let a = control_points(&set, 1280, 720).unwrap();
        let b = control_points(&set, 1280, 720).unwrap();
        assert_eq!(a, b);
    }
}
