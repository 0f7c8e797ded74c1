//! Terminal cell representation
//!
//! A cell is the full render state of one terminal position: its glyph
//! (base character plus combining marks), the glyph as encoded for the
//! terminal, a color pair, visual attributes and render-control flags.
//!
//! A cell of width 2 at column x is followed by a padding cell at x + 1
//! carrying [`RenderFlags::FULL_WIDTH_PADDING`].

use unicode_width::UnicodeWidthChar;

use super::attrs::{Attributes, RenderFlags};
use super::color::Color;

/// Maximum code points per glyph (base + combining marks)
pub const MAX_CODEPOINTS: usize = 5;

/// A bounded sequence of code points drawn in one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Glyph {
    chars: [char; MAX_CODEPOINTS],
    len: u8,
}

impl Glyph {
    /// Glyph of a single character
    pub const fn new(c: char) -> Self {
        Self {
            chars: [c, '\0', '\0', '\0', '\0'],
            len: 1,
        }
    }

    /// Glyph with no code points (used by padding cells)
    pub const fn empty() -> Self {
        Self {
            chars: ['\0'; MAX_CODEPOINTS],
            len: 0,
        }
    }

    /// Build a glyph from a string, keeping at most [`MAX_CODEPOINTS`] chars
    pub fn from_text(s: &str) -> Self {
        let mut glyph = Self::empty();
        for c in s.chars().take(MAX_CODEPOINTS) {
            glyph.chars[usize::from(glyph.len)] = c;
            glyph.len += 1;
        }
        glyph
    }

    /// Append a combining mark. Returns false when the glyph is full.
    pub fn push_combining(&mut self, c: char) -> bool {
        let len = usize::from(self.len);
        if len >= MAX_CODEPOINTS {
            return false;
        }
        self.chars[len] = c;
        self.len += 1;
        true
    }

    /// Base character, or a space for an empty glyph
    pub fn base(&self) -> char {
        if self.len == 0 {
            ' '
        } else {
            self.chars[0]
        }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars[..usize::from(self.len)]
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append the glyph's UTF-8 encoding to `out`
    pub fn encode_utf8(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4];
        for c in self.chars() {
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
}

impl Default for Glyph {
    fn default() -> Self {
        Self::new(' ')
    }
}

impl std::fmt::Display for Glyph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in self.chars() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// A single cell in a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Code points drawn in this cell
    pub glyph: Glyph,
    /// Glyph after charset remapping for the terminal encoding
    pub encoded: char,
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Visual attributes
    pub attrs: Attributes,
    /// Render-control flags
    pub flags: RenderFlags,
    /// Display width: 1 for normal, 2 for full-width glyphs
    width: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            glyph: Glyph::default(),
            encoded: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attributes::empty(),
            flags: RenderFlags::empty(),
            width: 1,
        }
    }
}

impl Cell {
    /// Create a cell with a single character and default style
    pub fn new(c: char) -> Self {
        Self {
            glyph: Glyph::new(c),
            encoded: c,
            width: char_width(c),
            ..Default::default()
        }
    }

    /// Create a cell with a character, colors and attributes
    pub fn styled(c: char, fg: Color, bg: Color, attrs: Attributes) -> Self {
        Self {
            fg,
            bg,
            attrs,
            ..Self::new(c)
        }
    }

    /// A space in the given colors
    pub fn blank(fg: Color, bg: Color) -> Self {
        Self::styled(' ', fg, bg, Attributes::empty())
    }

    /// A fully transparent cell
    pub fn transparent() -> Self {
        Self {
            flags: RenderFlags::TRANSPARENT,
            ..Default::default()
        }
    }

    /// Same cell with different render flags
    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Padding cell for the right half of `wide`
    pub fn padding_for(wide: &Cell) -> Self {
        Self {
            glyph: Glyph::empty(),
            encoded: '\0',
            fg: wide.fg,
            bg: wide.bg,
            attrs: wide.attrs,
            flags: (wide.flags & RenderFlags::BLENDING) | RenderFlags::FULL_WIDTH_PADDING,
            width: 1,
        }
    }

    /// Replace the glyph, recomputing width and encoded character
    pub fn set_glyph(&mut self, glyph: Glyph) {
        self.glyph = glyph;
        self.encoded = glyph.base();
        self.width = char_width(glyph.base());
    }

    pub fn set_char(&mut self, c: char) {
        self.set_glyph(Glyph::new(c));
    }

    /// Display width of this cell
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Check if this cell holds a full-width glyph
    pub fn is_wide(&self) -> bool {
        self.width == 2 && !self.is_padding()
    }

    /// Check if this is the right half of a full-width glyph
    pub fn is_padding(&self) -> bool {
        self.flags.contains(RenderFlags::FULL_WIDTH_PADDING)
    }

    /// Check if the cell is a plain space (attributes may still color it)
    pub fn is_space(&self) -> bool {
        !self.is_padding() && self.glyph.len() == 1 && self.glyph.base() == ' '
    }

    /// Same colors and attributes
    pub fn same_style(&self, other: &Cell) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.attrs == other.attrs
    }

    /// Same visible result on the terminal: glyph, width, style and padding
    pub fn same_appearance(&self, other: &Cell) -> bool {
        self.glyph == other.glyph
            && self.width == other.width
            && self.same_style(other)
            && self.is_padding() == other.is_padding()
    }

    /// Copy of this cell with paint-state flags stripped
    pub fn without_paint_state(mut self) -> Self {
        self.flags.remove(RenderFlags::PAINT_STATE);
        self
    }

    /// Check if the cell has neither attributes nor non-default colors
    pub fn is_plain(&self) -> bool {
        self.attrs.is_empty() && self.fg.is_default() && self.bg.is_default()
    }
}

/// Display width of a character: 2 for full-width, 1 otherwise
pub fn char_width(c: char) -> u8 {
    match c.width() {
        Some(2) => 2,
        _ => 1,
    }
}
