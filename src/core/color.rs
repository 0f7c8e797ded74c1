//! Color representation for terminal cells
//!
//! Colors are palette indices. The first 16 entries follow the legacy PC
//! (VGA) ordering used throughout the toolkit; they are permuted into ANSI
//! ordering only when emitted through indexed ANSI escapes.

use serde::{Deserialize, Serialize};

/// PC palette index -> ANSI palette index for the 16 legacy colors
const PC_TO_ANSI: [u8; 16] = [0, 4, 2, 6, 1, 5, 3, 7, 8, 12, 10, 14, 9, 13, 11, 15];

/// A foreground or background color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    /// The terminal's default color for the channel
    #[default]
    Default,
    /// Palette index (0-15 legacy PC colors, 16-255 extended palette)
    Indexed(u8),
}

impl Color {
    pub const BLACK: Color = Color::Indexed(0);
    pub const BLUE: Color = Color::Indexed(1);
    pub const GREEN: Color = Color::Indexed(2);
    pub const CYAN: Color = Color::Indexed(3);
    pub const RED: Color = Color::Indexed(4);
    pub const MAGENTA: Color = Color::Indexed(5);
    pub const BROWN: Color = Color::Indexed(6);
    pub const LIGHT_GRAY: Color = Color::Indexed(7);
    pub const DARK_GRAY: Color = Color::Indexed(8);
    pub const LIGHT_BLUE: Color = Color::Indexed(9);
    pub const LIGHT_GREEN: Color = Color::Indexed(10);
    pub const LIGHT_CYAN: Color = Color::Indexed(11);
    pub const LIGHT_RED: Color = Color::Indexed(12);
    pub const LIGHT_MAGENTA: Color = Color::Indexed(13);
    pub const YELLOW: Color = Color::Indexed(14);
    pub const WHITE: Color = Color::Indexed(15);

    /// Check if this is the default-color sentinel
    pub fn is_default(self) -> bool {
        self == Color::Default
    }

    /// Palette index, if any
    pub fn index(self) -> Option<u8> {
        match self {
            Color::Default => None,
            Color::Indexed(i) => Some(i),
        }
    }

    /// Reduce the index modulo the terminal's color count.
    ///
    /// `Default` is exempt, and a zero color count leaves the color untouched.
    pub fn normalize(self, max_colors: u16) -> Color {
        match self {
            Color::Indexed(i) if max_colors > 0 && u16::from(i) >= max_colors => {
                Color::Indexed((u16::from(i) % max_colors) as u8)
            }
            other => other,
        }
    }

    /// Index to pass to an ANSI indexed-color escape.
    ///
    /// Legacy colors (0-15) go through the PC -> ANSI permutation; extended
    /// palette entries pass through unchanged.
    pub fn ansi_index(index: u8) -> u8 {
        PC_TO_ANSI.get(usize::from(index)).copied().unwrap_or(index)
    }
}
