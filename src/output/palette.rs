//! Palette redefinition
//!
//! Themes list the 16 legacy colors in PC order. They are sent through the
//! `initc` capability, which takes components scaled to 0..=1000.

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityTable;
use crate::core::Color;

/// Built-in 16-color themes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteTheme {
    /// Classic VGA colors
    #[default]
    Classic,
    /// Softer colors for dark backgrounds
    Dark,
}

impl PaletteTheme {
    /// RGB values in PC order
    pub fn colors(self) -> [(u8, u8, u8); 16] {
        match self {
            PaletteTheme::Classic => [
                (0x00, 0x00, 0x00), // black
                (0x22, 0x22, 0xb2), // blue
                (0x18, 0x78, 0x18), // green
                (0x4a, 0x8a, 0xa8), // cyan
                (0xb2, 0x18, 0x18), // red
                (0xb2, 0x18, 0xb2), // magenta
                (0xa0, 0x82, 0x3c), // brown
                (0xbc, 0xbc, 0xbc), // light gray
                (0x50, 0x50, 0x50), // dark gray
                (0x50, 0x70, 0xff), // light blue
                (0x70, 0xe0, 0x70), // light green
                (0x70, 0xe0, 0xe0), // light cyan
                (0xff, 0x68, 0x68), // light red
                (0xff, 0x68, 0xff), // light magenta
                (0xff, 0xff, 0x68), // yellow
                (0xff, 0xff, 0xff), // white
            ],
            PaletteTheme::Dark => [
                (0x00, 0x00, 0x00),
                (0x38, 0x58, 0xa8),
                (0x30, 0x80, 0x30),
                (0x38, 0x88, 0x88),
                (0xa8, 0x38, 0x38),
                (0x88, 0x48, 0x98),
                (0xa0, 0x80, 0x50),
                (0xc0, 0xc0, 0xc0),
                (0x40, 0x40, 0x40),
                (0x68, 0x90, 0xd8),
                (0x60, 0xc0, 0x60),
                (0x70, 0xc8, 0xc8),
                (0xe0, 0x70, 0x70),
                (0xc0, 0x88, 0xd0),
                (0xf0, 0xe0, 0x78),
                (0xf0, 0xf0, 0xf0),
            ],
        }
    }
}

/// 0..=255 to 0..=1000, rounded up so the terminal's reverse scaling
/// gives back the same component
fn scale(component: u8) -> i32 {
    (i32::from(component) * 1000 + 254) / 255
}

/// Sequence redefining the 16 legacy colors, empty without `initc`
pub fn palette_sequence(caps: &CapabilityTable, theme: PaletteTheme) -> Vec<u8> {
    let mut out = Vec::new();
    let Some(initc) = caps.colors.initialize_color.as_deref() else {
        return out;
    };
    let count = usize::from(caps.max_colors.min(16));
    for (index, (r, g, b)) in theme.colors().into_iter().enumerate().take(count) {
        let slot = if caps.colors.set_a_foreground.is_some() {
            Color::ansi_index(index as u8)
        } else {
            index as u8
        };
        let params = [i32::from(slot), scale(r), scale(g), scale(b)];
        if let Some(bytes) = caps.expand(Some(initc), &params) {
            out.extend_from_slice(&bytes);
        }
    }
    out
}

/// Sequence restoring the terminal's original palette
pub fn restore_sequence(caps: &CapabilityTable) -> Vec<u8> {
    caps.expand(caps.colors.orig_colors.as_deref(), &[])
        .unwrap_or_default()
}
