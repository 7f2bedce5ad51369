//! Garment styles: colors, fabric kinds, and the built-in catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// An sRGB color with 8-bit channels.
///
/// Serialized as a `#RRGGBB` hex string, the form the style catalog uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses a `#RRGGBB` hex string.
    pub fn from_hex(s: &str) -> Result<Self, RenderError> {
        let invalid = || RenderError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |range| u8::from_str_radix(&hex[range], 16).map_err(|_| invalid());
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Returns the color scaled toward black.
    ///
    /// `amount` is clamped to `[0, 1]`: 0 is the identity, 1 is black.
    /// Each channel is scaled by `1 - amount` and floored, independently of
    /// the others.
    pub fn darken(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        let scale = |c: u8| (f32::from(c) * (1.0 - amount)).floor() as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = RenderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Fabric family of a garment style. Chiffon and jersey carry a woven
/// texture tile; the rest render flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FabricKind {
    Chiffon,
    Jersey,
    Silk,
    Cotton,
    Satin,
}

impl fmt::Display for FabricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FabricKind::Chiffon => "chiffon",
            FabricKind::Jersey => "jersey",
            FabricKind::Silk => "silk",
            FabricKind::Cotton => "cotton",
            FabricKind::Satin => "satin",
        };
        write!(f, "{name}")
    }
}

/// An immutable garment style selected by the user.
///
/// Ids are free-form strings; the built-in catalog uses `"1"` through
/// `"5"` but a config-supplied catalog can use any naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarmentStyle {
    pub id: String,
    pub name: String,
    pub color: Color,
    pub fabric: FabricKind,
    /// Texture variant name; absent means the garment renders untextured.
    #[serde(default)]
    pub texture: Option<String>,
}

/// The style catalog shipped with the product.
pub fn builtin_styles() -> Vec<GarmentStyle> {
    fn style(id: &str, name: &str, color: Color, fabric: FabricKind) -> GarmentStyle {
        GarmentStyle {
            id: id.to_string(),
            name: name.to_string(),
            color,
            fabric,
            texture: Some(fabric.to_string()),
        }
    }
    vec![
        style("1", "Classic Wrap", Color::rgb(0x8B, 0x45, 0x13), FabricKind::Chiffon),
        style("2", "Modern Drape", Color::rgb(0x2C, 0x3E, 0x50), FabricKind::Jersey),
        style("3", "Elegant Style", Color::rgb(0xE7, 0x4C, 0x3C), FabricKind::Silk),
        style("4", "Casual Wrap", Color::rgb(0x34, 0x98, 0xDB), FabricKind::Cotton),
        style("5", "Formal Style", Color::rgb(0x9B, 0x59, 0xB6), FabricKind::Satin),
    ]
}

/// Looks a style up by its catalog id.
pub fn style_by_id<'a>(styles: &'a [GarmentStyle], id: &str) -> Option<&'a GarmentStyle> {
    styles.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let color = Color::from_hex("#8B4513").unwrap();
        assert_eq!(color, Color::rgb(0x8B, 0x45, 0x13));
        assert_eq!(color.to_hex(), "#8B4513");

        assert_eq!(Color::from_hex("#2c3e50").unwrap(), Color::rgb(0x2C, 0x3E, 0x50));
    }

    #[test]
    fn test_hex_rejects_malformed() {
        assert!(Color::from_hex("8B4513").is_err());
        assert!(Color::from_hex("#8B45").is_err());
        assert!(Color::from_hex("#8B4513FF").is_err());
        assert!(Color::from_hex("#GGGGGG").is_err());
        assert!(Color::from_hex("").is_err());
    }

    #[test]
    fn test_darken_identity_and_black() {
        let color = Color::rgb(0x8B, 0x45, 0x13);
        assert_eq!(color.darken(0.0), color);
        assert_eq!(color.darken(1.0), Color::rgb(0, 0, 0));
        // out-of-range amounts clamp
        assert_eq!(color.darken(-0.5), color);
        assert_eq!(color.darken(2.0), Color::rgb(0, 0, 0));
    }

    #[test]
    fn test_darken_is_monotone_per_channel() {
        let color = Color::rgb(200, 100, 50);
        let mut prev = color;
        for step in 1..=10 {
            let next = color.darken(step as f32 / 10.0);
            assert!(next.r <= prev.r && next.g <= prev.g && next.b <= prev.b);
            prev = next;
        }
    }

    #[test]
    fn test_darken_channels_independent() {
        let a = Color::rgb(139, 0, 0).darken(0.2);
        let b = Color::rgb(139, 255, 17).darken(0.2);
        assert_eq!(a.r, b.r);
        assert_eq!(a.r, 111); // floor(139 * 0.8)
    }

    #[test]
    fn test_builtin_catalog() {
        let styles = builtin_styles();
        assert_eq!(styles.len(), 5);

        let mut ids: Vec<&str> = styles.iter().map(|s| s.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 5);

        let classic = style_by_id(&styles, "1").unwrap();
        assert_eq!(classic.color.to_hex(), "#8B4513");
        assert_eq!(classic.fabric, FabricKind::Chiffon);
        assert!(style_by_id(&styles, "99").is_none());
    }

    #[test]
    fn test_style_deserializes_from_toml() {
        // ids are strings, not numbers; non-catalog names are fine
        let style: GarmentStyle = toml::from_str(
            r##"
            id = "midnight"
            name = "Midnight"
            color = "#123456"
            fabric = "satin"
            "##,
        )
        .unwrap();
        assert_eq!(style.id, "midnight");
        assert_eq!(style.color, Color::rgb(0x12, 0x34, 0x56));
        assert_eq!(style.fabric, FabricKind::Satin);
        assert!(style.texture.is_none());

        let bad: Result<GarmentStyle, _> = toml::from_str(
            r##"
            id = "8"
            name = "Broken"
            color = "123456"
            fabric = "silk"
            "##,
        );
        assert!(bad.is_err());
    }
}
