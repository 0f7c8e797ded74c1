//! Cell and attribute model
//!
//! The value types every other component speaks in:
//! - Cells holding a glyph, encoded glyph, colors, attributes and flags
//! - Palette colors with the legacy PC ordering
//! - Attribute and render-flag bit sets
//! - Points, sizes and rectangles

mod attrs;
mod cell;
mod color;
mod geometry;

pub use attrs::{Attributes, RenderFlags};
pub use cell::{char_width, Cell, Glyph, MAX_CODEPOINTS};
pub use color::Color;
pub use geometry::{Point, Rect, Size};

pub(crate) use geometry::to_i32;
