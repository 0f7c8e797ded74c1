//! Rectangular copies between surfaces
//!
//! All coordinates are clamped to the region both sides actually cover;
//! an empty overlap copies nothing.

use super::Surface;
use crate::core::{Cell, Point, Rect};

/// A detached rectangle of cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellBlock {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
}

impl CellBlock {
    pub fn new(width: usize, height: usize, fill: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width * height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&Cell> {
        if x >= self.width {
            return None;
        }
        self.cells.get(y * self.width + x)
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }
}

/// Surface-local bounds of `surface`, shadow included
fn local_bounds(surface: &Surface) -> Rect {
    Rect::new(0, 0, surface.total_width(), surface.total_height())
}

/// Copy the cells of `src` inside `rect` (surface-local) into a block.
///
/// The block covers only the part of `rect` inside the surface.
pub fn get_rect(src: &Surface, rect: Rect) -> CellBlock {
    let Some(area) = rect.intersect(&local_bounds(src)) else {
        return CellBlock::new(0, 0, Cell::default());
    };
    let mut block = CellBlock::new(area.width, area.height, Cell::default());
    for dy in 0..area.height {
        let y = area.y as usize + dy;
        if let Some(row) = src.row(y) {
            let x0 = area.x as usize;
            let dst = &mut block.cells[dy * area.width..(dy + 1) * area.width];
            dst.copy_from_slice(&row[x0..x0 + area.width]);
        }
    }
    block
}

/// Write `block` into `dst` with its top-left corner at `pos` (surface-local).
///
/// Cells falling outside `dst` are dropped. Returns the number of cells
/// written.
pub fn put_rect(dst: &mut Surface, pos: Point, block: &CellBlock) -> usize {
    let target = Rect::new(pos.x, pos.y, block.width, block.height);
    let Some(area) = target.intersect(&local_bounds(dst)) else {
        return 0;
    };
    let mut written = 0;
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            let bx = (x - pos.x) as usize;
            let by = (y - pos.y) as usize;
            if let Some(cell) = block.get(bx, by) {
                if dst.write(x as usize, y as usize, *cell) {
                    written += 1;
                }
            }
        }
    }
    written
}

/// Copy between two surfaces in terminal coordinates.
///
/// `area` is clamped to both surfaces' terminal rectangles; the cells under
/// it are copied from `src` to `dst`. Returns the number of cells written.
pub fn blit(src: &Surface, dst: &mut Surface, area: Rect) -> usize {
    let Some(area) = area
        .intersect(&src.rect())
        .and_then(|a| a.intersect(&dst.rect()))
    else {
        return 0;
    };
    let src_local = area.translated(-src.offset().x, -src.offset().y);
    let block = get_rect(src, src_local);
    let dst_pos = Point::new(area.x - dst.offset().x, area.y - dst.offset().y);
    put_rect(dst, dst_pos, &block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Color, Size};

    fn filled(w: usize, h: usize) -> Surface {
        let mut s = Surface::new(Rect::new(0, 0, w, h), Size::new(0, 0));
        for y in 0..h {
            for x in 0..w {
                let c = char::from(b'a' + ((x + y * w) % 26) as u8);
                s.write(x, y, Cell::new(c));
            }
        }
        s
    }

    #[test]
    fn test_get_rect_clamps() {
        let s = filled(4, 3);
        let block = get_rect(&s, Rect::new(2, 1, 10, 10));
        assert_eq!((block.width, block.height), (2, 2));
        assert_eq!(block.get(0, 0).unwrap().glyph.base(), 'g');
        assert_eq!(get_rect(&s, Rect::new(5, 5, 2, 2)).cells.len(), 0);
    }

    #[test]
    fn test_put_rect_partially_outside() {
        let mut s = Surface::new(Rect::new(0, 0, 3, 3), Size::new(0, 0));
        let block = CellBlock::new(2, 2, Cell::styled('#', Color::RED, Color::Default, Default::default()));
        assert_eq!(put_rect(&mut s, Point::new(-1, 2), &block), 1);
        assert_eq!(s.cell(0, 2).unwrap().glyph.base(), '#');
        let span = s.span(2).unwrap();
        assert_eq!((span.xmin, span.xmax), (0, 0));
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let src = filled(5, 4);
        let block = get_rect(&src, Rect::new(1, 1, 3, 2));
        let mut dst = Surface::new(Rect::new(0, 0, 6, 6), Size::new(0, 0));
        put_rect(&mut dst, Point::new(2, 3), &block);
        assert_eq!(get_rect(&dst, Rect::new(2, 3, 3, 2)), block);
    }

    #[test]
    fn test_blit_in_terminal_space() {
        let mut src = filled(4, 4);
        src.set_offset(Point::new(10, 10));
        let mut dst = Surface::new(Rect::new(12, 11, 4, 4), Size::new(0, 0));
        let n = blit(&src, &mut dst, Rect::new(0, 0, 100, 100));
        // Overlap is columns 12..14 and rows 11..14
        assert_eq!(n, 6);
        assert_eq!(dst.cell(0, 0).unwrap().glyph.base(), src.cell(2, 1).unwrap().glyph.base());
    }

    #[test]
    fn test_blit_disjoint_is_noop() {
        let src = filled(2, 2);
        let mut dst = Surface::new(Rect::new(5, 5, 2, 2), Size::new(0, 0));
        assert_eq!(blit(&src, &mut dst, Rect::new(0, 0, 10, 10)), 0);
        assert!(!dst.has_changes());
    }
}
