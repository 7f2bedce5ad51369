//! The compositor's output buffer.

use std::path::Path;

use image::{Rgba, RgbImage, RgbaImage};

use crate::error::RenderError;

/// RGBA overlay surface the compositor owns and redraws every cycle.
///
/// Garment pixels are opaque; everything else stays transparent so the
/// surface can sit above a live video layer or be flattened onto a still
/// frame for export.
#[derive(Debug, Clone)]
pub struct RenderSurface {
    buffer: RgbaImage,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Resets every pixel to fully transparent.
    pub fn clear(&mut self) {
        for px in self.buffer.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Reallocates the buffer when the incoming frame dimensions change.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        if self.buffer.width() != width || self.buffer.height() != height {
            self.buffer = RgbaImage::new(width, height);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.buffer
    }

    pub(crate) fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        self.buffer.put_pixel(x, y, pixel);
    }

    /// Flattens the overlay onto an opaque base frame of the same size,
    /// the export path for photo mode.
    pub fn composited_over(&self, base: &RgbImage) -> RgbImage {
        debug_assert_eq!(self.buffer.dimensions(), base.dimensions());
        let mut out = base.clone();
        for (x, y, px) in self.buffer.enumerate_pixels() {
            if x >= out.width() || y >= out.height() {
                continue;
            }
            let alpha = f32::from(px[3]) / 255.0;
            if alpha <= 0.0 {
                continue;
            }
            let dst = out.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended = f32::from(px[c]) * alpha + f32::from(dst[c]) * (1.0 - alpha);
                dst[c] = blended.round() as u8;
            }
        }
        out
    }

    /// Writes the overlay as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        self.buffer
            .save(path)
            .map_err(|e| RenderError::Encode(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_surface_is_transparent() {
        let surface = RenderSurface::new(8, 8);
        assert!(surface.image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_clear_resets_pixels() {
        let mut surface = RenderSurface::new(4, 4);
        surface.put_pixel(1, 2, Rgba([10, 20, 30, 255]));
        surface.clear();
        assert!(surface.image().pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_ensure_size_reallocates_only_on_change() {
        let mut surface = RenderSurface::new(4, 4);
        surface.put_pixel(0, 0, Rgba([1, 2, 3, 255]));

        surface.ensure_size(4, 4);
        assert_eq!(*surface.image().get_pixel(0, 0), Rgba([1, 2, 3, 255]));

        surface.ensure_size(6, 4);
        assert_eq!(surface.width(), 6);
        assert_eq!(*surface.image().get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_composited_over_blends_by_alpha() {
        let mut surface = RenderSurface::new(2, 1);
        surface.put_pixel(0, 0, Rgba([200, 100, 0, 255]));
        // pixel (1, 0) stays transparent

        let base = RgbImage::from_pixel(2, 1, image::Rgb([10, 10, 10]));
        let out = surface.composited_over(&base);

        assert_eq!(*out.get_pixel(0, 0), image::Rgb([200, 100, 0]));
        assert_eq!(*out.get_pixel(1, 0), image::Rgb([10, 10, 10]));
    }
}
