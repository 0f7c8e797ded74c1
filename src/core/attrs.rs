//! Visual attributes and render-control flags
//!
//! Both are plain bit sets. Visual attributes describe how the terminal
//! should draw a cell; render flags steer the compositor and output engine
//! and are never sent to the terminal.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Visual attributes of a cell
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Attributes: u16 {
        const BOLD = 1 << 0;
        const DIM = 1 << 1;
        const ITALIC = 1 << 2;
        const UNDERLINE = 1 << 3;
        const DBL_UNDERLINE = 1 << 4;
        const BLINK = 1 << 5;
        const REVERSE = 1 << 6;
        const STANDOUT = 1 << 7;
        const INVISIBLE = 1 << 8;
        const PROTECT = 1 << 9;
        const CROSSED_OUT = 1 << 10;
        const ALT_CHARSET = 1 << 11;
        const PC_CHARSET = 1 << 12;
    }
}

bitflags! {
    /// Render-control flags of a cell
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFlags: u8 {
        /// Cell shows whatever lies beneath it
        const TRANSPARENT = 1 << 0;
        /// Cell keeps the glyph beneath it but imposes its own colors
        const COLOR_OVERLAY = 1 << 1;
        /// Cell keeps its own glyph but takes the background from beneath
        const INHERIT_BACKGROUND = 1 << 2;
        /// Cell matches what was last painted to the terminal
        const NO_CHANGES = 1 << 3;
        /// Cell has been painted to the terminal
        const PRINTED = 1 << 4;
        /// Right half of a full-width glyph
        const FULL_WIDTH_PADDING = 1 << 5;
    }
}

impl Attributes {
    /// Attributes that a combined set-attributes call cannot express
    pub const NOT_IN_SGR: Attributes = Attributes::ITALIC
        .union(Attributes::CROSSED_OUT)
        .union(Attributes::DBL_UNDERLINE)
        .union(Attributes::PC_CHARSET);

    /// Attribute bits in the fixed order used for per-bit switching
    pub const SWITCH_ORDER: [Attributes; 13] = [
        Attributes::BOLD,
        Attributes::DIM,
        Attributes::ITALIC,
        Attributes::UNDERLINE,
        Attributes::DBL_UNDERLINE,
        Attributes::BLINK,
        Attributes::REVERSE,
        Attributes::STANDOUT,
        Attributes::INVISIBLE,
        Attributes::PROTECT,
        Attributes::CROSSED_OUT,
        Attributes::ALT_CHARSET,
        Attributes::PC_CHARSET,
    ];
}

impl RenderFlags {
    /// Flags that change how the compositor blends a cell
    pub const BLENDING: RenderFlags = RenderFlags::TRANSPARENT
        .union(RenderFlags::COLOR_OVERLAY)
        .union(RenderFlags::INHERIT_BACKGROUND);

    /// Flags tracking paint state on the terminal surface
    pub const PAINT_STATE: RenderFlags = RenderFlags::NO_CHANGES.union(RenderFlags::PRINTED);

    /// Check if the cell fully occludes what lies beneath it
    pub fn is_opaque(self) -> bool {
        !self.intersects(Self::BLENDING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_order_covers_all_bits() {
        let all = Attributes::SWITCH_ORDER
            .iter()
            .fold(Attributes::empty(), |acc, bit| acc | *bit);
        assert_eq!(all, Attributes::all());
    }

    #[test]
    fn test_blending_flags() {
        assert!(RenderFlags::empty().is_opaque());
        assert!(RenderFlags::PRINTED.is_opaque());
        assert!(!RenderFlags::TRANSPARENT.is_opaque());
        assert!(!RenderFlags::COLOR_OVERLAY.is_opaque());
        assert!(!RenderFlags::INHERIT_BACKGROUND.is_opaque());
    }
}
