//! Geometry-driven garment compositing.
//!
//! The compositor turns one cycle's control points, style, and
//! segmentation mask into a finished overlay: a closed garment outline
//! filled with the style color, drape strokes in a darkened tone, an
//! optional fabric texture, and occlusion against the person in the frame.

use std::collections::HashMap;

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::pipeline::segmentation::SegmentationMask;
use crate::render::anchors::ControlPoints;
use crate::render::fabric::{self, TILE_SIZE};
use crate::render::style::{FabricKind, GarmentStyle};
use crate::render::surface::RenderSurface;

/// How the garment interacts with the person in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    /// The person occludes the garment: garment pixels are dropped where
    /// the mask reports foreground, so the face and body read as being in
    /// front of the fabric.
    BehindPerson,
    /// Plain source-over painting; the garment covers the person.
    OverPerson,
}

impl Default for CompositeMode {
    fn default() -> Self {
        Self::BehindPerson
    }
}

// Outline and drape margins relative to the control points, in pixels.
const SIDE_CURVE_PULL: f32 = 20.0;
const CHIN_INSET_X: f32 = 20.0;
const CHIN_DROP_Y: f32 = 10.0;
const CHIN_CURVE_DROP: f32 = 15.0;
const DRAPE_PULL_X: f32 = 15.0;
const DRAPE_DROP_Y: f32 = 30.0;
const DRAPE_END_X: f32 = 25.0;
const DRAPE_END_Y: f32 = 20.0;

/// Samples per flattened quadratic curve.
const CURVE_STEPS: usize = 24;

/// Tuning knobs for the compositor, mirrored from
/// [`RenderConfig`](crate::config::RenderConfig).
#[derive(Debug, Clone, Copy)]
pub struct CompositorOptions {
    pub mode: CompositeMode,
    /// Mask confidence at or above which a pixel counts as the person.
    pub mask_threshold: f32,
    /// Global alpha of the fabric texture overlay.
    pub texture_alpha: f32,
    /// Darkening amount for the drape strokes.
    pub drape_darken: f32,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            mode: CompositeMode::default(),
            mask_threshold: 0.5,
            texture_alpha: 0.3,
            drape_darken: 0.2,
        }
    }
}

/// Draws the garment overlay for one frame result at a time.
pub struct Compositor {
    surface: RenderSurface,
    options: CompositorOptions,
    tiles: HashMap<FabricKind, Option<RgbaImage>>,
}

impl Compositor {
    pub fn new(width: u32, height: u32, options: CompositorOptions) -> Self {
        Self {
            surface: RenderSurface::new(width, height),
            options,
            tiles: HashMap::new(),
        }
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn options(&self) -> CompositorOptions {
        self.options
    }

    /// Matches the surface to the incoming frame dimensions.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        self.surface.ensure_size(width, height);
    }

    /// Wipes the overlay, used on cycles without a detection so a stale
    /// garment never lingers.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    /// Redraws the full garment for one cycle.
    ///
    /// All validation happens before the first pixel is touched; on error
    /// the surface keeps its previous contents.
    pub fn render(
        &mut self,
        mask: &SegmentationMask,
        points: &ControlPoints,
        style: &GarmentStyle,
    ) -> Result<(), RenderError> {
        let (w, h) = (self.surface.width(), self.surface.height());
        if mask.width() != w || mask.height() != h {
            return Err(RenderError::SurfaceMismatch {
                surface_w: w,
                surface_h: h,
                mask_w: mask.width(),
                mask_h: mask.height(),
            });
        }

        let opts = self.options;
        let visible = |x: u32, y: u32| match opts.mode {
            CompositeMode::OverPerson => true,
            CompositeMode::BehindPerson => !mask.is_foreground(x, y, opts.mask_threshold),
        };

        self.surface.clear();

        // garment body
        let outline = garment_outline(points);
        let fill_stencil = rasterize_polygon(&outline, w, h);
        let tile = if style.texture.is_some() {
            self.tiles
                .entry(style.fabric)
                .or_insert_with(|| fabric::tile(style.fabric))
                .as_ref()
        } else {
            None
        };
        let base = style.color;
        for (x, y, s) in fill_stencil.enumerate_pixels() {
            if s[0] == 0 || !visible(x, y) {
                continue;
            }
            let mut px = [f32::from(base.r), f32::from(base.g), f32::from(base.b)];
            if let Some(tile) = tile {
                let t = tile.get_pixel(x % TILE_SIZE, y % TILE_SIZE);
                let a = f32::from(t[3]) / 255.0 * opts.texture_alpha;
                if a > 0.0 {
                    for c in 0..3 {
                        px[c] = f32::from(t[c]) * a + px[c] * (1.0 - a);
                    }
                }
            }
            self.surface.put_pixel(
                x,
                y,
                Rgba([px[0].round() as u8, px[1].round() as u8, px[2].round() as u8, 255]),
            );
        }

        // drape strokes over the fill
        let drape_color = base.darken(opts.drape_darken);
        let drape = Rgba([drape_color.r, drape_color.g, drape_color.b, 255]);
        let drape_stencil = rasterize_drape(points, w, h);
        for (x, y, s) in drape_stencil.enumerate_pixels() {
            if s[0] == 0 || !visible(x, y) {
                continue;
            }
            self.surface.put_pixel(x, y, drape);
        }

        Ok(())
    }
}

/// Appends a flattened quadratic curve, excluding the start point.
fn flatten_quadratic(p0: (f32, f32), ctrl: (f32, f32), p1: (f32, f32), out: &mut Vec<(f32, f32)>) {
    for i in 1..=CURVE_STEPS {
        let t = i as f32 / CURVE_STEPS as f32;
        let u = 1.0 - t;
        out.push((
            u * u * p0.0 + 2.0 * u * t * ctrl.0 + t * t * p1.0,
            u * u * p0.1 + 2.0 * u * t * ctrl.1 + t * t * p1.1,
        ));
    }
}

/// The closed garment outline as a flattened polyline: crown curve down to
/// the left temple, cheek line to the chin, a shallow curve under the chin,
/// back up the right side, and a crown curve home.
fn garment_outline(p: &ControlPoints) -> Vec<(f32, f32)> {
    let (tx, ty) = p.head_top;
    let (lx, ly) = p.head_left;
    let (rx, ry) = p.head_right;
    let (cx, cy) = p.chin;

    let mut pts = Vec::with_capacity(3 * CURVE_STEPS + 3);
    pts.push((tx, ty));
    flatten_quadratic((tx, ty), (lx - SIDE_CURVE_PULL, ly - SIDE_CURVE_PULL), (lx, ly), &mut pts);
    pts.push((cx - CHIN_INSET_X, cy + CHIN_DROP_Y));
    flatten_quadratic(
        (cx - CHIN_INSET_X, cy + CHIN_DROP_Y),
        (cx, cy + CHIN_CURVE_DROP),
        (cx + CHIN_INSET_X, cy + CHIN_DROP_Y),
        &mut pts,
    );
    pts.push((rx, ry));
    flatten_quadratic((rx, ry), (rx + SIDE_CURVE_PULL, ry - SIDE_CURVE_PULL), (tx, ty), &mut pts);
    pts
}

/// Fills a flattened outline into a fresh stencil. Degenerate outlines
/// (fewer than three distinct vertices) produce an empty stencil.
fn rasterize_polygon(outline: &[(f32, f32)], width: u32, height: u32) -> GrayImage {
    let mut stencil = GrayImage::new(width, height);
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(outline.len());
    for &(x, y) in outline {
        let p = Point::new(x.round() as i32, y.round() as i32);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    // draw_polygon_mut wants an open path
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() >= 3 {
        draw_polygon_mut(&mut stencil, &poly, Luma([255u8]));
    }
    stencil
}

/// Stamps the two drape curves into a fresh stencil.
fn rasterize_drape(p: &ControlPoints, width: u32, height: u32) -> GrayImage {
    let mut stencil = GrayImage::new(width, height);
    let (lx, ly) = p.head_left;
    let (rx, ry) = p.head_right;
    let (cx, cy) = p.chin;

    let mut side = |start: (f32, f32), ctrl: (f32, f32), end: (f32, f32)| {
        let mut pts = vec![start];
        flatten_quadratic(start, ctrl, end, &mut pts);
        stroke_polyline(&mut stencil, &pts);
    };
    side(
        (lx, ly),
        (lx - DRAPE_PULL_X, ly + DRAPE_DROP_Y),
        (cx - DRAPE_END_X, cy + DRAPE_END_Y),
    );
    side(
        (rx, ry),
        (rx + DRAPE_PULL_X, ry + DRAPE_DROP_Y),
        (cx + DRAPE_END_X, cy + DRAPE_END_Y),
    );
    stencil
}

/// Stamps a polyline roughly two pixels wide.
fn stroke_polyline(stencil: &mut GrayImage, pts: &[(f32, f32)]) {
    const THICKNESS: [(f32, f32); 3] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
    for pair in pts.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        for (dx, dy) in THICKNESS {
            draw_line_segment_mut(
                stencil,
                (a.0 + dx, a.1 + dy),
                (b.0 + dx, b.1 + dy),
                Luma([255u8]),
            );
        }
    }
}
