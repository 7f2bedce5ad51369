//! Procedural fabric texture tiles.

use image::{Rgba, RgbaImage};

use crate::render::style::FabricKind;

/// Edge length of a repeating texture tile, in pixels.
pub const TILE_SIZE: u32 = 20;

/// Alpha of the weave overlay within a tile (10% of full).
const WEAVE_ALPHA: u8 = 26;

/// Builds the repeating texture tile for a fabric kind.
///
/// Chiffon gets a sheer white wash, jersey a vertical rib pattern. The
/// remaining fabrics render flat and have no tile.
pub fn tile(kind: FabricKind) -> Option<RgbaImage> {
    match kind {
        FabricKind::Chiffon => Some(RgbaImage::from_pixel(
            TILE_SIZE,
            TILE_SIZE,
            Rgba([255, 255, 255, WEAVE_ALPHA]),
        )),
        FabricKind::Jersey => {
            let mut img = RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, Rgba([0, 0, 0, 0]));
            // ribs every second column
            for x in (0..TILE_SIZE).step_by(2) {
                for y in 0..TILE_SIZE {
                    img.put_pixel(x, y, Rgba([0, 0, 0, WEAVE_ALPHA]));
                }
            }
            Some(img)
        }
        FabricKind::Silk | FabricKind::Cotton | FabricKind::Satin => None,
    }
}
