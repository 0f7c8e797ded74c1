//! Surface model
//!
//! A surface is a rectangular cell buffer owned by one producer. It keeps:
//! - Its position on the terminal and an optional shadow margin
//! - A print cursor with a current style, and an input cursor
//! - One dirty span per row, plus a count of transparent cells per row
//! - Pre-composition handlers run before every composition pass
//!
//! Row coordinates are surface-local. The shadow margin extends the buffer
//! by extra trailing columns and rows beyond the printable area.

mod blit;

pub use blit::{blit, get_rect, put_rect, CellBlock};

use std::fmt;

use crate::core::{char_width, Attributes, Cell, Color, Point, Rect, RenderFlags, Size};
use crate::core::to_i32;

/// Pending change range of one row.
///
/// The row is clean while `xmin > xmax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtySpan {
    pub xmin: usize,
    pub xmax: usize,
    /// Number of cells in the row carrying the transparent flag
    pub trans_count: usize,
}

impl DirtySpan {
    fn clean(width: usize) -> Self {
        Self {
            xmin: width.max(1),
            xmax: 0,
            trans_count: 0,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.xmin <= self.xmax
    }

    fn include(&mut self, x: usize) {
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
    }

    fn reset(&mut self, width: usize) {
        self.xmin = width.max(1);
        self.xmax = 0;
    }
}

/// Identifies who registered a pre-composition handler
pub type HandlerOwner = u64;

type PreprocessFn = Box<dyn FnMut(&mut Surface)>;

/// A rectangular, dirty-tracked cell buffer
pub struct Surface {
    offset: Point,
    /// Printable area
    width: usize,
    height: usize,
    /// Extra columns and rows for the drop shadow
    shadow: Size,
    rows: Vec<Vec<Cell>>,
    changes: Vec<DirtySpan>,
    /// Print cursor, surface-local
    cursor: Point,
    /// Style applied by the print functions
    style: Cell,
    input_cursor: Point,
    input_cursor_visible: bool,
    layer: i32,
    visible: bool,
    minimized: bool,
    blank: Cell,
    handlers: Vec<(HandlerOwner, PreprocessFn)>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("offset", &self.offset)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("shadow", &self.shadow)
            .field("layer", &self.layer)
            .field("visible", &self.visible)
            .field("minimized", &self.minimized)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl Surface {
    /// Create a blank surface covering `rect` plus a shadow margin.
    ///
    /// Shadow cells start out transparent. Every row starts clean.
    pub fn new(rect: Rect, shadow: Size) -> Self {
        let blank = Cell::default();
        let mut surface = Self {
            offset: rect.origin(),
            width: rect.width,
            height: rect.height,
            shadow,
            rows: Vec::new(),
            changes: Vec::new(),
            cursor: Point::default(),
            style: blank,
            input_cursor: Point::default(),
            input_cursor_visible: false,
            layer: -1,
            visible: false,
            minimized: false,
            blank,
            handlers: Vec::new(),
        };
        surface.rows = surface.blank_rows(surface.total_width(), surface.total_height());
        surface.changes = vec![DirtySpan::clean(surface.total_width()); surface.total_height()];
        surface.recount_transparent();
        surface
    }

    fn blank_rows(&self, total_width: usize, total_height: usize) -> Vec<Vec<Cell>> {
        (0..total_height)
            .map(|y| (0..total_width).map(|x| self.initial_cell(x, y)).collect())
            .collect()
    }

    fn initial_cell(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.blank
        } else {
            Cell::transparent()
        }
    }

    /// Position of the top-left corner on the terminal
    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    /// Printable width, shadow excluded
    pub fn width(&self) -> usize {
        self.width
    }

    /// Printable height, shadow excluded
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn shadow(&self) -> Size {
        self.shadow
    }

    pub fn total_width(&self) -> usize {
        self.width + self.shadow.width
    }

    pub fn total_height(&self) -> usize {
        self.height + self.shadow.height
    }

    /// Terminal area covered, shadow included
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.offset.x,
            self.offset.y,
            self.total_width(),
            self.total_height(),
        )
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn set_minimized(&mut self, minimized: bool) {
        self.minimized = minimized;
    }

    /// Check if the surface takes part in composition
    pub fn is_shown(&self) -> bool {
        self.visible && !self.minimized
    }

    /// Cell used to clear and to fill scrolled-in rows
    pub fn blank(&self) -> Cell {
        self.blank
    }

    pub fn set_blank(&mut self, blank: Cell) {
        self.blank = blank;
    }

    // --- Cell access -------------------------------------------------------

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.rows.get(y).and_then(|row| row.get(x))
    }

    /// Cell under a terminal coordinate
    pub fn cell_at(&self, p: Point) -> Option<&Cell> {
        let x = usize::try_from(p.x - self.offset.x).ok()?;
        let y = usize::try_from(p.y - self.offset.y).ok()?;
        self.cell(x, y)
    }

    pub fn row(&self, y: usize) -> Option<&[Cell]> {
        self.rows.get(y).map(Vec::as_slice)
    }

    /// Write one cell.
    ///
    /// Out-of-bounds writes are ignored and return false. The row's dirty
    /// span grows to include `x`.
    pub fn write(&mut self, x: usize, y: usize, cell: Cell) -> bool {
        let Some(slot) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) else {
            return false;
        };
        let was_transparent = slot.flags.contains(RenderFlags::TRANSPARENT);
        let is_transparent = cell.flags.contains(RenderFlags::TRANSPARENT);
        *slot = cell;

        let span = &mut self.changes[y];
        match (was_transparent, is_transparent) {
            (false, true) => span.trans_count += 1,
            (true, false) => span.trans_count -= 1,
            _ => {},
        }
        span.include(x);
        true
    }

    /// Replace a cell's render flags without touching its dirty span
    pub(crate) fn set_flags(&mut self, x: usize, y: usize, flags: RenderFlags) {
        if let Some(cell) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            debug_assert_eq!(
                cell.flags.contains(RenderFlags::TRANSPARENT),
                flags.contains(RenderFlags::TRANSPARENT)
            );
            cell.flags = flags;
        }
    }

    // --- Dirty tracking ----------------------------------------------------

    pub fn span(&self, y: usize) -> Option<&DirtySpan> {
        self.changes.get(y)
    }

    /// Mark a row clean
    pub fn clear_span(&mut self, y: usize) {
        let width = self.total_width();
        if let Some(span) = self.changes.get_mut(y) {
            span.reset(width);
        }
    }

    /// Mark every row fully dirty
    pub fn mark_all(&mut self) {
        let width = self.total_width();
        if width == 0 {
            return;
        }
        for span in &mut self.changes {
            span.xmin = 0;
            span.xmax = width - 1;
        }
    }

    /// Check if any row carries a pending change
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(DirtySpan::is_dirty)
    }

    /// Check if every cell of a row is transparent
    pub fn is_row_transparent(&self, y: usize) -> bool {
        self.changes
            .get(y)
            .is_some_and(|span| span.trans_count == self.total_width())
    }

    fn recount_transparent(&mut self) {
        for (row, span) in self.rows.iter().zip(self.changes.iter_mut()) {
            span.trans_count = row
                .iter()
                .filter(|c| c.flags.contains(RenderFlags::TRANSPARENT))
                .count();
        }
    }

    // --- Bulk operations ---------------------------------------------------

    /// Fill the printable area with `cell`
    pub fn fill(&mut self, cell: Cell) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.write(x, y, cell);
            }
        }
    }

    /// Fill the printable area with the blank cell and home the print cursor
    pub fn clear(&mut self) {
        self.fill(self.blank);
        self.cursor = Point::default();
    }

    /// Draw a drop shadow into the shadow margin.
    ///
    /// The corners touching the printable area stay transparent so the
    /// shadow appears offset.
    pub fn draw_shadow(&mut self, fg: Color, bg: Color) {
        let shade = Cell::blank(fg, bg).with_flags(RenderFlags::COLOR_OVERLAY);
        let total_w = self.total_width();
        let total_h = self.total_height();
        for y in 0..total_h {
            for x in 0..total_w {
                let in_right = x >= self.width && y < self.height;
                let in_bottom = y >= self.height;
                if !in_right && !in_bottom {
                    continue;
                }
                let corner = (in_right && y < self.shadow.height.max(1).min(self.height))
                    || (in_bottom && x < self.shadow.width.max(1).min(self.width));
                let cell = if corner { Cell::transparent() } else { shade };
                self.write(x, y, cell);
            }
        }
    }

    /// Relocate and resize the surface.
    ///
    /// Content of the overlapping printable area is preserved; every row is
    /// marked fully dirty.
    pub fn resize(&mut self, rect: Rect, shadow: Size) {
        let old_rows = std::mem::take(&mut self.rows);
        let old_width = self.width;
        let old_height = self.height;

        self.offset = rect.origin();
        self.width = rect.width;
        self.height = rect.height;
        self.shadow = shadow;
        self.rows = self.blank_rows(self.total_width(), self.total_height());

        let keep_w = old_width.min(self.width);
        for (y, old_row) in old_rows.into_iter().enumerate().take(old_height.min(self.height)) {
            self.rows[y][..keep_w].copy_from_slice(&old_row[..keep_w]);
        }

        self.changes = vec![DirtySpan::clean(self.total_width()); self.total_height()];
        self.recount_transparent();
        self.mark_all();
        self.cursor.x = self.cursor.x.min(to_i32(self.width));
        self.cursor.y = self.cursor.y.min(to_i32(self.height.saturating_sub(1)));
        self.input_cursor.x = self.input_cursor.x.min(to_i32(self.width.saturating_sub(1)));
        self.input_cursor.y = self.input_cursor.y.min(to_i32(self.height.saturating_sub(1)));
    }

    /// Shift the printable rows up by one, blanking the bottom row
    pub fn scroll_forward(&mut self) {
        if self.height == 0 {
            return;
        }
        let width = self.width;
        let blank = self.blank;
        for y in 0..self.height - 1 {
            let (upper, lower) = self.rows.split_at_mut(y + 1);
            upper[y][..width].copy_from_slice(&lower[0][..width]);
        }
        self.rows[self.height - 1][..width].fill(blank);
        self.recount_transparent();
        self.mark_all();
    }

    /// Shift the printable rows down by one, blanking the top row
    pub fn scroll_reverse(&mut self) {
        if self.height == 0 {
            return;
        }
        let width = self.width;
        let blank = self.blank;
        for y in (1..self.height).rev() {
            let (upper, lower) = self.rows.split_at_mut(y);
            lower[0][..width].copy_from_slice(&upper[y - 1][..width]);
        }
        self.rows[0][..width].fill(blank);
        self.recount_transparent();
        self.mark_all();
    }

    // --- Printing ----------------------------------------------------------

    /// Print cursor position, surface-local
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    /// Move the print cursor, clamped to the printable area
    pub fn set_cursor(&mut self, x: i32, y: i32) {
        self.cursor = Point::new(
            x.clamp(0, to_i32(self.width.saturating_sub(1))),
            y.clamp(0, to_i32(self.height.saturating_sub(1))),
        );
    }

    /// Colors used by subsequent prints
    pub fn set_color(&mut self, fg: Color, bg: Color) {
        self.style.fg = fg;
        self.style.bg = bg;
    }

    /// Attributes used by subsequent prints
    pub fn set_attributes(&mut self, attrs: Attributes) {
        self.style.attrs = attrs;
    }

    /// Blending flags used by subsequent prints
    pub fn set_print_flags(&mut self, flags: RenderFlags) {
        self.style.flags = flags & RenderFlags::BLENDING;
    }

    /// Print a string at the print cursor
    pub fn print_str(&mut self, s: &str) {
        for c in s.chars() {
            self.print_char(c);
        }
    }

    /// Print a string with an explicit style, restoring the previous style
    pub fn print_styled(&mut self, s: &str, fg: Color, bg: Color, attrs: Attributes) {
        let saved = self.style;
        self.set_color(fg, bg);
        self.set_attributes(attrs);
        self.print_str(s);
        self.style = saved;
    }

    /// Print one character at the print cursor.
    ///
    /// Wraps at the right edge and scrolls at the bottom. Combining marks
    /// join the previously printed cell. Full-width characters occupy two
    /// cells; one that does not fit in the last column wraps first.
    pub fn print_char(&mut self, c: char) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        match c {
            '\n' => {
                self.cursor.x = 0;
                self.line_feed();
                return;
            },
            '\r' => {
                self.cursor.x = 0;
                return;
            },
            _ => {},
        }
        if unicode_width::UnicodeWidthChar::width(c) == Some(0) {
            self.attach_combining(c);
            return;
        }

        let width = usize::from(char_width(c));
        if self.cursor.x as usize + width > self.width {
            self.cursor.x = 0;
            self.line_feed();
        }
        if width > self.width {
            return;
        }

        let (x, y) = (self.cursor.x as usize, self.cursor.y as usize);
        let mut cell = self.style;
        cell.set_char(c);
        self.write(x, y, cell);
        if cell.is_wide() {
            self.write(x + 1, y, Cell::padding_for(&cell));
        }
        self.cursor.x += to_i32(width);
        if self.cursor.x as usize >= self.width {
            self.cursor.x = 0;
            self.line_feed();
        }
    }

    fn line_feed(&mut self) {
        if self.cursor.y as usize + 1 >= self.height {
            self.scroll_forward();
        } else {
            self.cursor.y += 1;
        }
    }

    fn attach_combining(&mut self, c: char) {
        let (mut x, mut y) = (self.cursor.x as usize, self.cursor.y as usize);
        if x == 0 {
            if y == 0 {
                return;
            }
            y -= 1;
            x = self.width;
        }
        x -= 1;
        let Some(mut cell) = self.cell(x, y).copied() else {
            return;
        };
        if cell.is_padding() && x > 0 {
            x -= 1;
            cell = self.rows[y][x];
        }
        if cell.glyph.push_combining(c) {
            self.write(x, y, cell);
        }
    }

    // --- Input cursor ------------------------------------------------------

    /// Place the input cursor (surface-local) and make it visible
    pub fn set_input_cursor(&mut self, x: i32, y: i32) {
        self.input_cursor = Point::new(x, y);
        self.input_cursor_visible = true;
    }

    pub fn hide_input_cursor(&mut self) {
        self.input_cursor_visible = false;
    }

    /// Input cursor position if visible
    pub fn input_cursor(&self) -> Option<Point> {
        self.input_cursor_visible.then_some(self.input_cursor)
    }

    // --- Pre-composition handlers ------------------------------------------

    /// Register a callback run before each composition pass
    pub fn add_preprocessing_handler<F>(&mut self, owner: HandlerOwner, handler: F)
    where
        F: FnMut(&mut Surface) + 'static,
    {
        self.handlers.push((owner, Box::new(handler)));
    }

    /// Drop every handler registered by `owner`
    pub fn remove_preprocessing_handler(&mut self, owner: HandlerOwner) {
        self.handlers.retain(|(o, _)| *o != owner);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run all pre-composition handlers in registration order
    pub fn run_preprocessing(&mut self) {
        if self.handlers.is_empty() {
            return;
        }
        let mut handlers = std::mem::take(&mut self.handlers);
        for (_, handler) in handlers.iter_mut() {
            handler(self);
        }
        // Handlers registered while running go after the existing ones
        handlers.append(&mut self.handlers);
        self.handlers = handlers;
    }
}

/// Surface at the origin covering `size`, without a shadow
impl From<Size> for Surface {
    fn from(size: Size) -> Self {
        Surface::new(Rect::from_size(size), Size::new(0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as Counter;
    use std::rc::Rc;

    fn surface(w: usize, h: usize) -> Surface {
        Surface::new(Rect::new(0, 0, w, h), Size::new(0, 0))
    }

    #[test]
    fn test_new_surface_is_clean() {
        let s = surface(10, 3);
        assert!(!s.has_changes());
        for y in 0..3 {
            let span = s.span(y).unwrap();
            assert_eq!((span.xmin, span.xmax), (10, 0));
        }
        assert_eq!(s.layer(), -1);
    }

    #[test]
    fn test_write_expands_span() {
        let mut s = surface(10, 3);
        assert!(s.write(4, 1, Cell::new('a')));
        assert!(s.write(7, 1, Cell::new('b')));
        let span = s.span(1).unwrap();
        assert_eq!((span.xmin, span.xmax), (4, 7));
        assert!(!s.span(0).unwrap().is_dirty());
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut s = surface(4, 2);
        assert!(!s.write(4, 0, Cell::new('x')));
        assert!(!s.write(0, 2, Cell::new('x')));
        assert!(!s.has_changes());
    }

    #[test]
    fn test_transparent_count() {
        let mut s = surface(3, 1);
        for x in 0..3 {
            s.write(x, 0, Cell::transparent());
        }
        assert!(s.is_row_transparent(0));
        s.write(1, 0, Cell::new('x'));
        assert_eq!(s.span(0).unwrap().trans_count, 2);
        assert!(!s.is_row_transparent(0));
        // Overwriting a transparent cell with another one keeps the count
        s.write(0, 0, Cell::transparent());
        assert_eq!(s.span(0).unwrap().trans_count, 2);
    }

    #[test]
    fn test_shadow_starts_transparent() {
        let s = Surface::new(Rect::new(0, 0, 4, 2), Size::new(2, 1));
        assert_eq!(s.rect(), Rect::new(0, 0, 6, 3));
        assert_eq!(s.span(0).unwrap().trans_count, 2);
        assert!(s.is_row_transparent(2));
    }

    #[test]
    fn test_draw_shadow_corners() {
        let mut s = Surface::new(Rect::new(0, 0, 4, 3), Size::new(1, 1));
        s.draw_shadow(Color::DARK_GRAY, Color::BLACK);
        assert!(s.cell(4, 0).unwrap().flags.contains(RenderFlags::TRANSPARENT));
        assert!(s.cell(4, 1).unwrap().flags.contains(RenderFlags::COLOR_OVERLAY));
        assert!(s.cell(0, 3).unwrap().flags.contains(RenderFlags::TRANSPARENT));
        assert!(s.cell(1, 3).unwrap().flags.contains(RenderFlags::COLOR_OVERLAY));
        assert!(s.cell(4, 3).unwrap().flags.contains(RenderFlags::COLOR_OVERLAY));
    }

    #[test]
    fn test_resize_preserves_overlap() {
        let mut s = surface(4, 2);
        s.print_str("abcdefg");
        s.resize(Rect::new(2, 3, 6, 3), Size::new(0, 0));
        assert_eq!(s.offset(), Point::new(2, 3));
        assert_eq!(s.cell(0, 0).unwrap().glyph.base(), 'a');
        assert_eq!(s.cell(2, 1).unwrap().glyph.base(), 'g');
        assert!(s.cell(4, 0).unwrap().is_space());
        for y in 0..3 {
            let span = s.span(y).unwrap();
            assert_eq!((span.xmin, span.xmax), (0, 5));
        }
    }

    #[test]
    fn test_scroll_forward_and_reverse() {
        let mut s = surface(3, 3);
        s.print_str("aaabbbcc");
        s.scroll_forward();
        assert_eq!(s.cell(0, 0).unwrap().glyph.base(), 'b');
        assert_eq!(s.cell(0, 1).unwrap().glyph.base(), 'c');
        assert!(s.cell(0, 2).unwrap().is_space());
        assert!(s.span(2).unwrap().is_dirty());

        s.scroll_reverse();
        assert!(s.cell(0, 0).unwrap().is_space());
        assert_eq!(s.cell(0, 1).unwrap().glyph.base(), 'b');
        assert_eq!(s.cell(0, 2).unwrap().glyph.base(), 'c');
    }

    #[test]
    fn test_print_wraps_and_scrolls() {
        let mut s = surface(3, 2);
        s.print_str("abcdefg");
        // "abc" scrolled off after "def" filled the second row and "g" wrapped
        assert_eq!(s.cell(0, 0).unwrap().glyph.base(), 'd');
        assert_eq!(s.cell(0, 1).unwrap().glyph.base(), 'g');
        assert_eq!(s.cursor(), Point::new(1, 1));
    }

    #[test]
    fn test_print_wide_char_pads() {
        let mut s = surface(3, 2);
        s.print_str("a中");
        assert!(s.cell(1, 0).unwrap().is_wide());
        assert!(s.cell(2, 0).unwrap().is_padding());
        // Does not fit in the last column of the next print: wraps first
        s.set_cursor(2, 1);
        s.print_str("字");
        assert!(s.cell(2, 1).unwrap().is_space());
    }

    #[test]
    fn test_print_combining_mark() {
        let mut s = surface(5, 1);
        s.print_str("e\u{301}x");
        assert_eq!(s.cell(0, 0).unwrap().glyph.to_string(), "e\u{301}");
        assert_eq!(s.cell(1, 0).unwrap().glyph.base(), 'x');
    }

    #[test]
    fn test_print_styled_restores_style() {
        let mut s = surface(4, 1);
        s.print_styled("a", Color::RED, Color::BLUE, Attributes::BOLD);
        s.print_str("b");
        let a = s.cell(0, 0).unwrap();
        assert_eq!((a.fg, a.bg, a.attrs), (Color::RED, Color::BLUE, Attributes::BOLD));
        assert!(s.cell(1, 0).unwrap().is_plain());
    }

    #[test]
    fn test_input_cursor() {
        let mut s = surface(4, 4);
        assert_eq!(s.input_cursor(), None);
        s.set_input_cursor(2, 3);
        assert_eq!(s.input_cursor(), Some(Point::new(2, 3)));
        s.hide_input_cursor();
        assert_eq!(s.input_cursor(), None);
    }

    #[test]
    fn test_preprocessing_handlers() {
        let mut s = surface(4, 1);
        let calls = Rc::new(Counter::new(0));
        let seen = Rc::clone(&calls);
        s.add_preprocessing_handler(7, move |surface| {
            seen.set(seen.get() + 1);
            surface.write(0, 0, Cell::new('h'));
        });
        s.run_preprocessing();
        assert_eq!(calls.get(), 1);
        assert_eq!(s.cell(0, 0).unwrap().glyph.base(), 'h');

        s.remove_preprocessing_handler(7);
        s.run_preprocessing();
        assert_eq!(calls.get(), 1);
        assert_eq!(s.handler_count(), 0);
    }
}
