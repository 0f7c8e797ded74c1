//! Compositor and window registry
//!
//! Keeps every live surface in a slot table addressed by [`SurfaceId`] and
//! merges them, by layer, into one terminal-sized surface. The registry
//! order decides the layers: the first window sits directly above the
//! desktop, the last one is on top.
//!
//! Blending per cell, scanning from the topmost shown surface downward:
//! - Opaque cells win outright
//! - Transparent cells show whatever lies beneath
//! - Inherit-background cells keep their glyph but take the background
//!   from beneath
//! - Color-overlay cells keep the glyph beneath but impose their colors

use tracing::{debug, trace};

use crate::core::{Attributes, Cell, Point, Rect, RenderFlags, Size};
use crate::surface::Surface;

/// Stable handle of a registered surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(usize);

/// Layer of the desktop surface
pub const DESKTOP_LAYER: i32 = -1;

/// Layered surface compositor
#[derive(Debug)]
pub struct Compositor {
    slots: Vec<Option<Surface>>,
    /// Registry order, bottom to top
    order: Vec<SurfaceId>,
    desktop: Surface,
    terminal: Surface,
}

impl Compositor {
    /// Create a compositor for a terminal of the given size
    pub fn new(size: Size) -> Self {
        let mut desktop = Surface::from(size);
        desktop.set_layer(DESKTOP_LAYER);
        desktop.set_visible(true);
        let mut terminal = Surface::from(size);
        terminal.set_visible(true);
        Self {
            slots: Vec::new(),
            order: Vec::new(),
            desktop,
            terminal,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.terminal.width(), self.terminal.height())
    }

    pub fn desktop(&self) -> &Surface {
        &self.desktop
    }

    pub fn desktop_mut(&mut self) -> &mut Surface {
        &mut self.desktop
    }

    /// The merged output surface
    pub fn terminal(&self) -> &Surface {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Surface {
        &mut self.terminal
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Registered windows, bottom to top
    pub fn window_ids(&self) -> &[SurfaceId] {
        &self.order
    }

    // --- Registry ----------------------------------------------------------

    /// Register a new hidden window on top of the stack
    pub fn create_window(&mut self, rect: Rect, shadow: Size) -> SurfaceId {
        let id = SurfaceId(self.slots.len());
        self.slots.push(Some(Surface::new(rect, shadow)));
        self.order.push(id);
        self.determine_layers();
        debug!("Created window {:?} at {:?}", id, rect);
        id
    }

    /// Unregister a window and restore the area it covered
    pub fn remove_window(&mut self, id: SurfaceId) -> Option<Surface> {
        let surface = self.slots.get_mut(id.0)?.take()?;
        self.order.retain(|other| *other != id);
        self.determine_layers();
        if surface.is_shown() {
            self.compose(surface.rect());
        }
        debug!("Removed window {:?}", id);
        Some(surface)
    }

    /// Assign layers from the registry order, starting at 1
    pub fn determine_layers(&mut self) {
        for (index, id) in self.order.iter().enumerate() {
            if let Some(surface) = self.slots.get_mut(id.0).and_then(Option::as_mut) {
                surface.set_layer(index as i32 + 1);
            }
        }
        self.desktop.set_layer(DESKTOP_LAYER);
    }

    /// Move a window to the top of the stack
    pub fn raise(&mut self, id: SurfaceId) {
        if self.surface(id).is_none() || self.order.last() == Some(&id) {
            return;
        }
        self.order.retain(|other| *other != id);
        self.order.push(id);
        self.restack(id);
    }

    /// Move a window to the bottom of the stack, just above the desktop
    pub fn lower(&mut self, id: SurfaceId) {
        if self.surface(id).is_none() || self.order.first() == Some(&id) {
            return;
        }
        self.order.retain(|other| *other != id);
        self.order.insert(0, id);
        self.restack(id);
    }

    fn restack(&mut self, id: SurfaceId) {
        self.determine_layers();
        if let Some(rect) = self.shown_rect(id) {
            self.compose(rect);
        }
    }

    fn shown_rect(&self, id: SurfaceId) -> Option<Rect> {
        self.surface(id)
            .filter(|surface| surface.is_shown())
            .map(Surface::rect)
    }

    pub fn show(&mut self, id: SurfaceId) {
        self.set_state(id, |surface| surface.set_visible(true));
    }

    pub fn hide(&mut self, id: SurfaceId) {
        self.set_state(id, |surface| surface.set_visible(false));
    }

    pub fn minimize(&mut self, id: SurfaceId) {
        self.set_state(id, |surface| surface.set_minimized(true));
    }

    pub fn restore(&mut self, id: SurfaceId) {
        self.set_state(id, |surface| surface.set_minimized(false));
    }

    fn set_state(&mut self, id: SurfaceId, change: impl FnOnce(&mut Surface)) {
        let Some(surface) = self.surface_mut(id) else {
            return;
        };
        let was_shown = surface.is_shown();
        change(surface);
        if surface.is_shown() != was_shown {
            let rect = surface.rect();
            self.compose(rect);
        }
    }

    /// Move a window: restore the vacated area, then draw it at `pos`
    pub fn move_window(&mut self, id: SurfaceId, pos: Point) {
        let Some(surface) = self.surface_mut(id) else {
            return;
        };
        let old = surface.rect();
        surface.set_offset(pos);
        let new = surface.rect();
        if surface.is_shown() {
            self.compose(old);
            self.compose(new);
        }
    }

    /// Resize a window, recomposing both the old and the new area
    pub fn resize_window(&mut self, id: SurfaceId, rect: Rect) {
        let Some(surface) = self.surface_mut(id) else {
            return;
        };
        let old = surface.rect();
        let shadow = surface.shadow();
        surface.resize(rect, shadow);
        let new = surface.rect();
        if surface.is_shown() {
            self.compose(old);
            self.compose(new);
        }
    }

    /// Change a window's shadow margin
    pub fn set_shadow(&mut self, id: SurfaceId, shadow: Size) {
        let Some(surface) = self.surface_mut(id) else {
            return;
        };
        let old = surface.rect();
        let rect = Rect::new(
            surface.offset().x,
            surface.offset().y,
            surface.width(),
            surface.height(),
        );
        surface.resize(rect, shadow);
        let new = surface.rect();
        if surface.is_shown() {
            self.compose(old);
            self.compose(new);
        }
    }

    /// Relay out for a new terminal size, keeping composed content.
    ///
    /// Window geometry, shadows included, is left alone. Composition clips
    /// every window against the new extent, so a shadow cut off by a
    /// shrink comes back on the next grow.
    pub fn resize_terminal(&mut self, size: Size) {
        debug!(
            "Resizing terminal from {}x{} to {}x{}",
            self.terminal.width(),
            self.terminal.height(),
            size.width,
            size.height
        );
        self.terminal.resize(Rect::from_size(size), Size::new(0, 0));
        self.desktop.resize(Rect::from_size(size), Size::new(0, 0));
        self.compose(Rect::from_size(size));
    }

    // --- Composition -------------------------------------------------------

    /// Run pre-composition handlers, then compose every pending change.
    ///
    /// All surface spans are consumed; the changes end up in the terminal
    /// surface's own spans.
    pub fn update(&mut self) {
        self.desktop.run_preprocessing();
        for surface in self.slots.iter_mut().flatten() {
            surface.run_preprocessing();
        }

        let mut regions = Vec::new();
        collect_dirty(&mut self.desktop, &mut regions);
        for surface in self.slots.iter_mut().flatten() {
            if surface.is_shown() {
                collect_dirty(surface, &mut regions);
            } else {
                for y in 0..surface.total_height() {
                    surface.clear_span(y);
                }
            }
        }
        trace!("Composing {} dirty regions", regions.len());
        for region in regions {
            self.compose(region);
        }
    }

    /// Recompose the terminal cells inside `rect` (terminal coordinates)
    pub fn compose(&mut self, rect: Rect) {
        let Some(area) = rect.intersect(&self.terminal.rect()) else {
            return;
        };
        let mut stack: Vec<&Surface> = self
            .order
            .iter()
            .filter_map(|id| self.slots.get(id.0).and_then(Option::as_ref))
            .filter(|s| s.is_shown() && s.rect().intersect(&area).is_some())
            .collect();
        stack.sort_by_key(|s| std::cmp::Reverse(s.layer()));

        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let p = Point::new(x, y);
                let cell = resolve(&stack, &self.desktop, p);
                store(&mut self.terminal, x as usize, y as usize, cell);
            }
        }
    }

    /// Terminal position of a window's input cursor.
    ///
    /// `None` when the window or its cursor is hidden, the position lies
    /// off-terminal, or a higher window covers it.
    pub fn input_cursor(&self, id: SurfaceId) -> Option<Point> {
        let surface = self.surface(id).filter(|s| s.is_shown())?;
        let local = surface.input_cursor()?;
        let p = Point::new(surface.offset().x + local.x, surface.offset().y + local.y);
        if !self.terminal.rect().contains(p) {
            return None;
        }
        let covered = self
            .slots
            .iter()
            .flatten()
            .filter(|other| other.is_shown() && other.layer() > surface.layer())
            .filter_map(|other| other.cell_at(p))
            .any(|cell| {
                !cell
                    .flags
                    .intersects(RenderFlags::TRANSPARENT | RenderFlags::COLOR_OVERLAY)
            });
        (!covered).then_some(p)
    }
}

/// Turn a surface's dirty spans into terminal regions and clear them
fn collect_dirty(surface: &mut Surface, regions: &mut Vec<Rect>) {
    let offset = surface.offset();
    for y in 0..surface.total_height() {
        let Some(span) = surface.span(y).copied() else {
            continue;
        };
        if span.is_dirty() {
            regions.push(Rect::new(
                offset.x + span.xmin as i32,
                offset.y + y as i32,
                span.xmax - span.xmin + 1,
                1,
            ));
            surface.clear_span(y);
        }
    }
}

/// Blend the stack at one terminal position
fn resolve(stack: &[&Surface], desktop: &Surface, p: Point) -> Cell {
    for (i, surface) in stack.iter().enumerate() {
        let local_y = p.y - surface.offset().y;
        if local_y >= 0 && surface.is_row_transparent(local_y as usize) {
            continue;
        }
        let Some(cell) = surface.cell_at(p) else {
            continue;
        };
        if cell.flags.contains(RenderFlags::TRANSPARENT) {
            continue;
        }
        if cell.flags.contains(RenderFlags::COLOR_OVERLAY) {
            let mut below = resolve(&stack[i + 1..], desktop, p);
            below.fg = cell.fg;
            below.bg = cell.bg;
            below.attrs.remove(Attributes::REVERSE | Attributes::STANDOUT);
            return below;
        }
        if cell.flags.contains(RenderFlags::INHERIT_BACKGROUND) {
            let below = resolve(&stack[i + 1..], desktop, p);
            let mut own = *cell;
            own.bg = below.bg;
            return own;
        }
        return *cell;
    }
    desktop.cell_at(p).copied().unwrap_or_default()
}

/// Write a composed cell into the terminal surface, flagging cells that
/// match what was last painted
fn store(terminal: &mut Surface, x: usize, y: usize, mut cell: Cell) {
    cell.flags.remove(RenderFlags::BLENDING | RenderFlags::PAINT_STATE);
    if let Some(prev) = terminal.cell(x, y) {
        if prev.flags.contains(RenderFlags::PRINTED) && prev.same_appearance(&cell) {
            cell.flags.insert(RenderFlags::NO_CHANGES | RenderFlags::PRINTED);
        }
    }
    terminal.write(x, y, cell);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Color;

    fn solid(c: char, fg: Color, bg: Color) -> Cell {
        Cell::styled(c, fg, bg, Attributes::empty())
    }

    fn shown(comp: &mut Compositor, rect: Rect, fill: Cell) -> SurfaceId {
        let id = comp.create_window(rect, Size::new(0, 0));
        comp.surface_mut(id).unwrap().fill(fill);
        comp.show(id);
        id
    }

    fn glyph_at(comp: &Compositor, x: usize, y: usize) -> char {
        comp.terminal().cell(x, y).unwrap().glyph.base()
    }

    #[test]
    fn test_layers_follow_registry_order() {
        let mut comp = Compositor::new(Size::new(10, 5));
        let a = comp.create_window(Rect::new(0, 0, 2, 2), Size::new(0, 0));
        let b = comp.create_window(Rect::new(0, 0, 2, 2), Size::new(0, 0));
        assert_eq!(comp.surface(a).unwrap().layer(), 1);
        assert_eq!(comp.surface(b).unwrap().layer(), 2);
        assert_eq!(comp.desktop().layer(), DESKTOP_LAYER);
        comp.lower(b);
        assert_eq!(comp.surface(b).unwrap().layer(), 1);
        comp.raise(b);
        assert_eq!(comp.surface(b).unwrap().layer(), 2);
    }

    #[test]
    fn test_opaque_window_occludes() {
        let mut comp = Compositor::new(Size::new(10, 5));
        comp.desktop_mut().fill(solid('.', Color::Default, Color::BLUE));
        comp.update();
        shown(&mut comp, Rect::new(2, 1, 3, 2), solid('#', Color::WHITE, Color::RED));
        assert_eq!(glyph_at(&comp, 2, 1), '#');
        assert_eq!(glyph_at(&comp, 5, 1), '.');
        assert_eq!(comp.terminal().cell(4, 2).unwrap().bg, Color::RED);
    }

    #[test]
    fn test_transparent_inherit_and_overlay() {
        let mut comp = Compositor::new(Size::new(6, 1));
        comp.desktop_mut()
            .fill(solid('d', Color::WHITE, Color::BLUE));
        comp.update();

        let mut transparent = Cell::transparent();
        transparent.set_char('t');
        shown(&mut comp, Rect::new(0, 0, 2, 1), transparent);

        let inherit = solid('i', Color::YELLOW, Color::RED).with_flags(RenderFlags::INHERIT_BACKGROUND);
        shown(&mut comp, Rect::new(2, 0, 2, 1), inherit);

        let overlay = Cell::styled('o', Color::BLACK, Color::GREEN, Attributes::REVERSE)
            .with_flags(RenderFlags::COLOR_OVERLAY);
        shown(&mut comp, Rect::new(4, 0, 2, 1), overlay);

        let t = comp.terminal().cell(0, 0).unwrap();
        assert_eq!((t.glyph.base(), t.bg), ('d', Color::BLUE));
        let i = comp.terminal().cell(2, 0).unwrap();
        assert_eq!((i.glyph.base(), i.fg, i.bg), ('i', Color::YELLOW, Color::BLUE));
        let o = comp.terminal().cell(4, 0).unwrap();
        assert_eq!((o.glyph.base(), o.fg, o.bg), ('d', Color::BLACK, Color::GREEN));
        assert!(!o.attrs.contains(Attributes::REVERSE));
        assert!(o.flags.is_opaque());
    }

    #[test]
    fn test_move_restores_vacated_area() {
        let mut comp = Compositor::new(Size::new(10, 3));
        comp.desktop_mut().fill(solid('.', Color::Default, Color::Default));
        comp.update();
        let id = shown(&mut comp, Rect::new(0, 0, 2, 1), solid('w', Color::RED, Color::Default));
        comp.move_window(id, Point::new(5, 2));
        assert_eq!(glyph_at(&comp, 0, 0), '.');
        assert_eq!(glyph_at(&comp, 5, 2), 'w');

        // Entirely off-terminal still clears the old spot
        comp.move_window(id, Point::new(50, 50));
        assert_eq!(glyph_at(&comp, 5, 2), '.');
    }

    #[test]
    fn test_update_consumes_surface_spans() {
        let mut comp = Compositor::new(Size::new(8, 2));
        let id = shown(&mut comp, Rect::new(1, 0, 4, 2), solid(' ', Color::Default, Color::Default));
        comp.update();
        for y in 0..2 {
            comp.terminal_mut().clear_span(y);
        }
        comp.surface_mut(id).unwrap().write(2, 1, Cell::new('x'));
        comp.update();
        assert!(!comp.surface(id).unwrap().has_changes());
        assert_eq!(glyph_at(&comp, 3, 1), 'x');
        let span = comp.terminal().span(1).unwrap();
        assert_eq!((span.xmin, span.xmax), (3, 3));
        assert!(!comp.terminal().span(0).unwrap().is_dirty());
    }

    #[test]
    fn test_hide_minimize_and_remove() {
        let mut comp = Compositor::new(Size::new(4, 1));
        let id = shown(&mut comp, Rect::new(0, 0, 4, 1), solid('w', Color::Default, Color::Default));
        comp.minimize(id);
        assert_eq!(glyph_at(&comp, 0, 0), ' ');
        comp.restore(id);
        assert_eq!(glyph_at(&comp, 0, 0), 'w');
        comp.hide(id);
        assert_eq!(glyph_at(&comp, 0, 0), ' ');
        comp.show(id);
        assert!(comp.remove_window(id).is_some());
        assert_eq!(glyph_at(&comp, 0, 0), ' ');
        assert!(comp.surface(id).is_none());
        assert!(comp.remove_window(id).is_none());
    }

    #[test]
    fn test_unchanged_cells_marked() {
        let mut comp = Compositor::new(Size::new(3, 1));
        comp.compose(Rect::new(0, 0, 3, 1));
        let printed = comp.terminal().cell(0, 0).unwrap().flags | RenderFlags::PRINTED;
        comp.terminal_mut().set_flags(0, 0, printed);
        comp.compose(Rect::new(0, 0, 3, 1));
        assert!(comp.terminal().cell(0, 0).unwrap().flags.contains(RenderFlags::NO_CHANGES));
        assert!(!comp.terminal().cell(1, 0).unwrap().flags.contains(RenderFlags::NO_CHANGES));
    }

    #[test]
    fn test_input_cursor_occlusion() {
        let mut comp = Compositor::new(Size::new(10, 5));
        let low = shown(&mut comp, Rect::new(0, 0, 5, 5), Cell::default());
        comp.surface_mut(low).unwrap().set_input_cursor(1, 1);
        assert_eq!(comp.input_cursor(low), Some(Point::new(1, 1)));

        let high = shown(&mut comp, Rect::new(1, 1, 2, 2), Cell::default());
        assert_eq!(comp.input_cursor(low), None);
        comp.move_window(high, Point::new(6, 3));
        assert_eq!(comp.input_cursor(low), Some(Point::new(1, 1)));
    }

    #[test]
    fn test_shadow_overlays_beneath() {
        let mut comp = Compositor::new(Size::new(8, 4));
        comp.desktop_mut().fill(solid('.', Color::WHITE, Color::BLUE));
        comp.update();
        let id = comp.create_window(Rect::new(0, 0, 3, 2), Size::new(1, 1));
        {
            let surface = comp.surface_mut(id).unwrap();
            surface.fill(solid('w', Color::Default, Color::Default));
            surface.draw_shadow(Color::DARK_GRAY, Color::BLACK);
        }
        comp.show(id);
        let shade = comp.terminal().cell(3, 1).unwrap();
        assert_eq!((shade.glyph.base(), shade.bg), ('.', Color::BLACK));
        assert_eq!(comp.terminal().cell(3, 0).unwrap().bg, Color::BLUE);
    }

    #[test]
    fn test_resize_terminal_keeps_content() {
        let mut comp = Compositor::new(Size::new(4, 2));
        shown(&mut comp, Rect::new(0, 0, 2, 1), solid('w', Color::Default, Color::Default));
        comp.resize_terminal(Size::new(6, 3));
        assert_eq!(comp.size(), Size::new(6, 3));
        assert_eq!(glyph_at(&comp, 1, 0), 'w');
        assert!(comp.terminal().span(2).unwrap().is_dirty());
    }

    #[test]
    fn test_resize_terminal_clips_shadow() {
        let mut comp = Compositor::new(Size::new(8, 4));
        comp.desktop_mut().fill(solid('.', Color::WHITE, Color::BLUE));
        comp.update();
        let id = comp.create_window(Rect::new(4, 1, 3, 2), Size::new(1, 1));
        {
            let surface = comp.surface_mut(id).unwrap();
            surface.fill(solid('w', Color::Default, Color::Default));
            surface.draw_shadow(Color::DARK_GRAY, Color::BLACK);
        }
        comp.show(id);
        assert_eq!(comp.terminal().cell(7, 2).unwrap().bg, Color::BLACK);

        // Shadow falls entirely outside the smaller terminal
        comp.resize_terminal(Size::new(7, 3));
        assert_eq!(glyph_at(&comp, 6, 2), 'w');
        assert!(comp.terminal().cell(7, 2).is_none());
        assert_eq!(comp.surface(id).unwrap().shadow(), Size::new(1, 1));

        comp.resize_terminal(Size::new(8, 4));
        comp.desktop_mut().fill(solid('.', Color::WHITE, Color::BLUE));
        comp.update();
        let shade = comp.terminal().cell(7, 2).unwrap();
        assert_eq!((shade.glyph.base(), shade.fg, shade.bg), ('.', Color::DARK_GRAY, Color::BLACK));
        assert_eq!(comp.terminal().cell(5, 3).unwrap().bg, Color::BLACK);
        // Corner beside the window stays clear
        assert_eq!(comp.terminal().cell(7, 1).unwrap().bg, Color::BLUE);
        assert_eq!(comp.terminal().cell(4, 3).unwrap().bg, Color::BLUE);
    }
}
