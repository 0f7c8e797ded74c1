//! Output engine
//!
//! Turns the dirty rows of the composed terminal surface into bytes:
//! - `reduce` drops cells that already match what the terminal shows
//! - `redraw` picks, per run of cells, between clear-line, erase, repeat,
//!   skip and literal printing by byte cost
//! - Output is queued in an [`OutputBuffer`] and written out under the
//!   control of a [`FlushPacer`]
//!
//! The engine keeps its own record of every cell it painted. Unknown cells
//! (after start-up, a resize, or a clear without `clear`) never compare
//! equal to anything and are always repainted.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use super::buffer::OutputBuffer;
use super::cursor::CursorPlanner;
use super::encoding::Encoding;
use super::pacing::FlushPacer;
use super::palette::{palette_sequence, restore_sequence, PaletteTheme};
use crate::capability::CapabilityTable;
use crate::compositor::Compositor;
use crate::config::{CostThresholds, RenderConfig};
use crate::core::to_i32;
use crate::core::{Cell, Point, RenderFlags, Size};
use crate::error::Result;
use crate::optimizer::AttributeOptimizer;
use crate::surface::Surface;

/// Drawn in place of a wide glyph cut off by the right margin
const RIGHT_ELLIPSIS: char = '›';
/// Drawn in place of the exposed right half of a wide glyph
const LEFT_ELLIPSIS: char = '‹';

/// Hardware cursor visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Invisible,
    Normal,
    VeryVisible,
}

impl CursorMode {
    /// Mode from its numeric code: 0 invisible, 1 normal, 2 very visible.
    ///
    /// # Panics
    ///
    /// Panics on any other code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => CursorMode::Invisible,
            1 => CursorMode::Normal,
            2 => CursorMode::VeryVisible,
            _ => panic!("invalid cursor mode {code}"),
        }
    }
}

/// Callback run after every flush while pointer rendering is enabled
pub type PointerHook = Box<dyn FnMut()>;

/// Insert-mode sequences wrapped around a single inserted character
struct InsertSequences {
    before: Vec<u8>,
    after: Vec<u8>,
}

/// Paints a composed terminal surface onto a real terminal
pub struct OutputEngine<W: Write> {
    writer: W,
    caps: Arc<CapabilityTable>,
    optimizer: AttributeOptimizer,
    planner: CursorPlanner,
    encoding: Encoding,
    thresholds: CostThresholds,
    palette_redefinable: bool,
    palette_theme: PaletteTheme,
    palette_applied: bool,
    size: Size,
    /// What the terminal shows, row-major. `None` is unknown.
    physical: Vec<Option<Cell>>,
    /// Terminal cursor, `None` when unknown
    cursor: Option<Point>,
    /// Style the terminal is currently in
    current: Cell,
    style_known: bool,
    /// Mark every row of the next surface dirty
    full_redraw: bool,
    buffer: OutputBuffer,
    pacer: FlushPacer,
    force: bool,
    paused: bool,
    cursor_mode: Option<CursorMode>,
    pointer_hook: Option<PointerHook>,
    pointer_hook_enabled: bool,
}

impl<W: Write> OutputEngine<W> {
    pub fn new(writer: W, caps: Arc<CapabilityTable>, config: &RenderConfig, size: Size) -> Self {
        let optimizer =
            AttributeOptimizer::new(Arc::clone(&caps)).with_coalescing(config.coalesce_sequences);
        let planner = CursorPlanner::new(Arc::clone(&caps), config.cursor_optimization);
        Self {
            writer,
            caps,
            optimizer,
            planner,
            encoding: config.encoding,
            thresholds: config.thresholds,
            palette_redefinable: config.palette_redefinable,
            palette_theme: config.palette_theme,
            palette_applied: false,
            size,
            physical: vec![None; size.area()],
            cursor: None,
            current: Cell::default(),
            style_known: false,
            full_redraw: false,
            buffer: OutputBuffer::new(config.queue_capacity),
            pacer: FlushPacer::new(&config.pacing),
            force: false,
            paused: false,
            cursor_mode: None,
            pointer_hook: None,
            pointer_hook_enabled: config.pointer_hook_enabled,
        }
    }

    /// Engine for the terminal named in `config`, falling back to `ansi`
    pub fn from_config(writer: W, config: &RenderConfig, size: Size) -> Self {
        let caps = Arc::new(CapabilityTable::load_or_ansi(&config.terminal));
        Self::new(writer, caps, config, size)
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.caps
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Terminal cursor position, if known
    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    pub fn cursor_mode(&self) -> Option<CursorMode> {
        self.cursor_mode
    }

    /// Bytes waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn pacer(&self) -> &FlushPacer {
        &self.pacer
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Forget everything known about the terminal and adopt a new size
    pub fn resize(&mut self, size: Size) {
        debug!("Output resized to {}x{}", size.width, size.height);
        self.size = size;
        self.physical = vec![None; size.area()];
        self.cursor = None;
        self.full_redraw = true;
    }

    /// Compose pending changes and send them to the terminal
    pub fn render(&mut self, compositor: &mut Compositor) -> Result<()> {
        compositor.update();
        self.update_terminal(compositor.terminal_mut())?;
        self.flush()
    }

    /// Queue output for every dirty row of `terminal` and mark the rows clean
    pub fn update_terminal(&mut self, terminal: &mut Surface) -> Result<()> {
        let size = Size::new(terminal.width(), terminal.height());
        if size != self.size {
            self.resize(size);
        }
        if self.full_redraw {
            terminal.mark_all();
            self.full_redraw = false;
        }
        let width = self.size.width;
        if width == 0 {
            return Ok(());
        }

        for y in 0..self.size.height {
            let Some(span) = terminal.span(y).copied() else {
                continue;
            };
            if !span.is_dirty() {
                continue;
            }
            let Some(row) = terminal.row(y).map(|r| r[..width.min(r.len())].to_vec()) else {
                continue;
            };
            if row.len() < width {
                continue;
            }

            if let Some((xmin, xmax)) = self.reduce(&row, y, span.xmin, span.xmax.min(width - 1)) {
                let (first, last) = self.redraw(&row, y, xmin, xmax);
                for (x, cell) in row.iter().enumerate().take(last + 1).skip(first) {
                    if self.is_painted(y, x, cell) {
                        let flags = (cell.flags | RenderFlags::PRINTED) - RenderFlags::NO_CHANGES;
                        terminal.set_flags(x, y, flags);
                    }
                }
            }
            terminal.clear_span(y);

            if self.buffer.is_full() && !self.paused {
                debug!("Output queue full at {} bytes, flushing early", self.buffer.len());
                self.force = true;
                self.flush()?;
            }
        }
        Ok(())
    }

    // --- Redraw ------------------------------------------------------------

    /// Trim cells matching the terminal off both ends of a dirty range
    fn reduce(&self, row: &[Cell], y: usize, xmin: usize, xmax: usize) -> Option<(usize, usize)> {
        let (mut xmin, mut xmax) = (xmin, xmax);
        while xmin <= xmax && self.is_painted(y, xmin, &row[xmin]) {
            xmin += 1;
        }
        while xmax > xmin && self.is_painted(y, xmax, &row[xmax]) {
            xmax -= 1;
        }
        (xmin <= xmax).then_some((xmin, xmax))
    }

    /// Paint `[xmin, xmax]` of row `y`. Returns the range now up to date.
    fn redraw(&mut self, row: &[Cell], y: usize, xmin: usize, xmax: usize) -> (usize, usize) {
        let width = self.size.width;
        let (mut xmin, mut xmax) = (xmin, xmax);

        // Never split a wide glyph, old or new
        if xmin > 0
            && (row[xmin].is_padding() || self.physical_at(y, xmin).is_some_and(Cell::is_padding))
        {
            xmin -= 1;
        }
        if xmax + 1 < width
            && (row[xmax].is_wide() || self.physical_at(y, xmax).is_some_and(Cell::is_wide))
        {
            xmax += 1;
        }
        let first = xmin;

        let el = self.caps.cost(self.caps.edit.clr_eol.as_deref(), &[]);

        // Rest of the line is blank
        if let Some(el) = el {
            let reach = self.reach_cost(xmin, y);
            if self.blank_run_end(row, xmin) == width && el.saturating_add(reach) < xmax - xmin + 1 {
                if self.erase(row, y, xmin, width, self.caps.edit.clr_eol.clone()) {
                    return (first, width - 1);
                }
            }
        }

        // Blank run from the left margin
        if let Some(el1) = self.caps.cost(self.caps.edit.clr_bol.as_deref(), &[]) {
            let lead_end = self.blank_run_end(row, 0).min(xmax + 1);
            if lead_end > xmin
                && el1.saturating_add(self.reach_cost(lead_end - 1, y)) < lead_end - xmin
            {
                let cap = self.caps.edit.clr_bol.clone();
                if self.erase_to_cursor(row, y, lead_end - 1, cap) {
                    xmin = lead_end;
                    if xmin > xmax {
                        return (first, xmax);
                    }
                }
            }
        }

        // Blank run to the right margin
        let mut tail = None;
        if let Some(el) = el {
            if let Some(start) = self.trailing_blank_start(row) {
                if start > xmin && start <= xmax && el < xmax - start + 1 {
                    tail = Some(start);
                    xmax = start - 1;
                }
            }
        }

        let mut x = xmin;
        while x <= xmax {
            if self.is_painted(y, x, &row[x]) {
                let run = self.painted_run(row, y, x, xmax);
                if x + run > xmax {
                    break;
                }
                if run >= self.thresholds.skip_min_run && self.skip_is_cheaper(row, y, x, run) {
                    x += run;
                    continue;
                }
            }
            x += self.draw_at(row, y, x, xmax);
        }

        match tail {
            Some(start) if self.erase(row, y, start, width, self.caps.edit.clr_eol.clone()) => {
                (first, width - 1)
            },
            Some(start) => (first, start - 1),
            None => (first, xmax),
        }
    }

    /// Draw the cell at `x` by the cheapest means. Returns columns consumed.
    fn draw_at(&mut self, row: &[Cell], y: usize, x: usize, end: usize) -> usize {
        let width = self.size.width;
        let cell = row[x];

        if cell.is_padding() {
            if x > 0 && row[x - 1].is_wide() {
                self.emit(row, y, x - 1, &row[x - 1]);
            } else {
                self.emit(row, y, x, &marker(LEFT_ELLIPSIS, &cell));
            }
            return 1;
        }
        if cell.is_wide() {
            if x + 1 < width && row[x + 1].is_padding() {
                self.emit(row, y, x, &cell);
                return 2;
            }
            self.emit(row, y, x, &marker(RIGHT_ELLIPSIS, &cell));
            return 1;
        }

        let run = identical_run(row, x, end);
        if run > 1 {
            if cell.is_space() && self.try_erase_chars(row, y, x, run, end) {
                return run;
            }
            if self.try_repeat(row, y, x, run) {
                return run;
            }
        }
        self.emit(row, y, x, &cell);
        1
    }

    /// Blank out `run` cells with `ech`, when cheaper than printing them
    fn try_erase_chars(&mut self, row: &[Cell], y: usize, x: usize, run: usize, end: usize) -> bool {
        let cell = row[x];
        if run < self.thresholds.erase_min_run || !self.is_erasable(&cell) {
            return false;
        }
        let caps = Arc::clone(&self.caps);
        let ech = caps.edit.erase_chars.as_deref();
        let Some(ech_cost) = caps.cost(ech, &[to_i32(run)]) else {
            return false;
        };
        // ech leaves the cursor in place
        let resume = if x + run > end {
            0
        } else {
            self.planner
                .cost(Some(point(x, y)), point(x + run, y))
                .unwrap_or(usize::MAX)
        };
        if ech_cost.saturating_add(resume) >= run || !self.move_to(x, y) {
            return false;
        }
        let Some(seq) = caps.expand(ech, &[to_i32(run)]) else {
            return false;
        };
        self.apply_style(&cell);
        self.buffer.push_control(&seq);
        for i in x..x + run {
            self.record(y, i, &cell);
        }
        true
    }

    /// Print `run` identical cells with a repeat capability, when cheaper
    fn try_repeat(&mut self, row: &[Cell], y: usize, x: usize, run: usize) -> bool {
        let cell = row[x];
        if run < self.thresholds.repeat_min_run || cell.glyph.len() != 1 || self.touches_corner(x + run, y) {
            return false;
        }
        let mut sample = cell;
        self.encoding.encode_cell(&mut sample);
        let glyph_len = self.encoding.glyph_len(&sample);
        let literal = glyph_len * run;

        let edit = &self.caps.edit;
        let rep = if sample.encoded.is_ascii() && edit.repeat_char.is_some() {
            self.caps
                .expand(edit.repeat_char.as_deref(), &[u32::from(sample.encoded) as i32, to_i32(run)])
                .filter(|seq| seq.len() < literal)
                .map(|seq| (false, seq))
        } else {
            None
        };
        let rep = rep.or_else(|| {
            self.caps
                .expand(edit.repeat_last_char.as_deref(), &[to_i32(run - 1)])
                .filter(|seq| glyph_len + seq.len() < literal)
                .map(|seq| (true, seq))
        });
        let Some((print_first, seq)) = rep else {
            return false;
        };
        if !self.move_to(x, y) {
            return false;
        }

        let target = self.apply_style(&cell);
        if print_first {
            self.put_glyph(&target);
        }
        self.buffer.push_control(&seq);
        for i in x..x + run {
            self.record(y, i, &cell);
        }
        self.advance(x + run, y);
        true
    }

    /// Skip a painted run when jumping over it costs less than reprinting
    fn skip_is_cheaper(&self, row: &[Cell], y: usize, x: usize, run: usize) -> bool {
        let Some(jump) = self.planner.cost(self.cursor, point(x + run, y)) else {
            return false;
        };
        let reprint: usize = row[x..x + run]
            .iter()
            .map(|cell| self.encoding.glyph_len(cell))
            .sum();
        jump < self.reach_cost(x, y).saturating_add(reprint)
    }

    /// Clear from `x` to the right margin with `el`
    fn erase(&mut self, row: &[Cell], y: usize, x: usize, end: usize, cap: Option<String>) -> bool {
        let Some(seq) = self.caps.expand(cap.as_deref(), &[]) else {
            return false;
        };
        if !self.move_to(x, y) {
            return false;
        }
        self.apply_style(&row[x]);
        self.buffer.push_control(&seq);
        for (i, cell) in row.iter().enumerate().take(end).skip(x) {
            self.record(y, i, cell);
        }
        true
    }

    /// Clear from the left margin through `x` with `el1`
    fn erase_to_cursor(&mut self, row: &[Cell], y: usize, x: usize, cap: Option<String>) -> bool {
        let Some(seq) = self.caps.expand(cap.as_deref(), &[]) else {
            return false;
        };
        if !self.move_to(x, y) {
            return false;
        }
        self.apply_style(&row[0]);
        self.buffer.push_control(&seq);
        for (i, cell) in row.iter().enumerate().take(x + 1) {
            self.record(y, i, cell);
        }
        true
    }

    // --- Cell output -------------------------------------------------------

    /// Print one cell (two columns for a wide glyph) at `(x, y)`
    fn emit(&mut self, row: &[Cell], y: usize, x: usize, cell: &Cell) -> bool {
        let cols = if cell.is_wide() { 2 } else { 1 };
        if self.touches_corner(x + cols, y) {
            return self.emit_corner(row, y, x, cell);
        }
        if !self.move_to(x, y) {
            return false;
        }
        self.put(cell);
        self.record(y, x, cell);
        self.advance(x + cols, y);
        true
    }

    /// Print into the bottom-right corner without scrolling the screen
    fn emit_corner(&mut self, row: &[Cell], y: usize, x: usize, cell: &Cell) -> bool {
        let edit = &self.caps.edit;
        let margins_off = self.caps.expand(edit.exit_am_mode.as_deref(), &[]);
        let margins_on = self.caps.expand(edit.enter_am_mode.as_deref(), &[]);
        if let (Some(off), Some(on)) = (margins_off, margins_on) {
            if !self.move_to(x, y) {
                return false;
            }
            let target = self.apply_style(cell);
            self.buffer.push_control(&off);
            self.put_glyph(&target);
            self.buffer.push_control(&on);
            self.record(y, x, cell);
            self.cursor = Some(point(self.size.width - 1, y));
            return true;
        }

        // Print the corner one column early, then insert its left
        // neighbour in front of it
        let prev = x.checked_sub(1).map(|px| row[px]);
        if let (false, Some(prev), Some(insert)) = (cell.is_wide(), prev, self.insert_sequences()) {
            if prev.width() == 1 && !prev.is_padding() {
                if !self.move_to(x - 1, y) {
                    return false;
                }
                self.put(cell);
                self.cursor = Some(point(x, y));
                if !self.move_to(x - 1, y) {
                    self.physical[y * self.size.width + x - 1] = None;
                    return false;
                }
                self.buffer.push_control(&insert.before);
                self.put(&prev);
                self.buffer.push_control(&insert.after);
                self.record(y, x - 1, &prev);
                self.record(y, x, cell);
                self.cursor = Some(point(x, y));
                return true;
            }
        }

        trace!("Leaving the bottom-right corner unpainted");
        false
    }

    fn insert_sequences(&self) -> Option<InsertSequences> {
        let edit = &self.caps.edit;
        let padding = self
            .caps
            .expand(edit.insert_padding.as_deref(), &[])
            .unwrap_or_default();
        let smir = self.caps.expand(edit.enter_insert_mode.as_deref(), &[]);
        let rmir = self.caps.expand(edit.exit_insert_mode.as_deref(), &[]);
        if let (Some(smir), Some(rmir)) = (smir, rmir) {
            let mut after = padding;
            after.extend_from_slice(&rmir);
            return Some(InsertSequences {
                before: smir,
                after,
            });
        }
        self.caps
            .expand(edit.parm_ich.as_deref(), &[1])
            .or_else(|| self.caps.expand(edit.insert_character.as_deref(), &[]))
            .map(|before| InsertSequences {
                before,
                after: padding,
            })
    }

    /// Switch to the cell's style and queue its glyph
    fn put(&mut self, cell: &Cell) {
        let target = self.apply_style(cell);
        self.put_glyph(&target);
    }

    fn put_glyph(&mut self, target: &Cell) {
        let mut text = Vec::with_capacity(8);
        self.encoding.push_glyph(target, &mut text);
        self.buffer.push_text(&text);
    }

    /// Queue the attribute change to `cell`'s style. Returns the cell as it
    /// will be drawn.
    fn apply_style(&mut self, cell: &Cell) -> Cell {
        if !self.style_known {
            let reset = self.reset_sequence();
            self.buffer.push_control(&reset);
            self.current = Cell::default();
            self.style_known = true;
        }
        let mut target = *cell;
        self.encoding.encode_cell(&mut target);
        let seq = self.optimizer.change_attribute(&mut self.current, &mut target);
        self.buffer.push_control(&seq);
        target
    }

    fn reset_sequence(&self) -> Vec<u8> {
        let mut seq = self.optimizer.reset_sequence();
        if let Some(op) = self.caps.expand(self.caps.colors.orig_pair.as_deref(), &[]) {
            seq.extend_from_slice(&op);
        }
        seq
    }

    fn move_to(&mut self, x: usize, y: usize) -> bool {
        let to = point(x, y);
        if self.cursor == Some(to) {
            return true;
        }
        match self.planner.plan(self.cursor, to) {
            Some(seq) => {
                self.buffer.push_control(&seq);
                self.cursor = Some(to);
                true
            },
            None => false,
        }
    }

    /// Bytes needed to bring the cursor to (x, y)
    fn reach_cost(&self, x: usize, y: usize) -> usize {
        self.planner
            .cost(self.cursor, point(x, y))
            .unwrap_or(usize::MAX)
    }

    /// Cursor position after printing up to column `next_x`
    fn advance(&mut self, next_x: usize, y: usize) {
        let width = self.size.width;
        let wraps = self.caps.automatic_right_margin && !self.caps.eat_newline_glitch;
        self.cursor = Some(if next_x < width {
            point(next_x, y)
        } else if wraps && y + 1 < self.size.height {
            point(0, y + 1)
        } else {
            point(width - 1, y)
        });
    }

    /// Check if printing up to column `next_x` of row `y` writes the
    /// bottom-right cell of a wrapping terminal
    fn touches_corner(&self, next_x: usize, y: usize) -> bool {
        self.caps.automatic_right_margin && y + 1 == self.size.height && next_x >= self.size.width
    }

    // --- Physical state ----------------------------------------------------

    fn physical_at(&self, y: usize, x: usize) -> Option<&Cell> {
        self.physical.get(y * self.size.width + x)?.as_ref()
    }

    fn is_painted(&self, y: usize, x: usize, cell: &Cell) -> bool {
        self.physical_at(y, x)
            .is_some_and(|painted| painted.same_appearance(cell))
    }

    fn record(&mut self, y: usize, x: usize, cell: &Cell) {
        let width = self.size.width;
        let idx = y * width + x;
        if let Some(slot) = self.physical.get_mut(idx) {
            *slot = Some(cell.without_paint_state());
        }
        if cell.is_wide() && x + 1 < width {
            self.physical[idx + 1] = Some(Cell::padding_for(cell).without_paint_state());
        }
    }

    fn painted_run(&self, row: &[Cell], y: usize, x: usize, end: usize) -> usize {
        (x..=end)
            .take_while(|&i| self.is_painted(y, i, &row[i]))
            .count()
    }

    /// Blank cell that `el`, `el1` or `ech` can reproduce
    fn is_erasable(&self, cell: &Cell) -> bool {
        cell.is_space()
            && cell.attrs.is_empty()
            && (self.caps.background_color_erase || cell.bg.is_default())
    }

    /// End (exclusive) of the erasable run starting at `x`
    fn blank_run_end(&self, row: &[Cell], x: usize) -> usize {
        let first = row[x];
        if !self.is_erasable(&first) {
            return x;
        }
        x + row[x..]
            .iter()
            .take_while(|cell| cell.is_space() && cell.same_style(&first))
            .count()
    }

    /// Start of the erasable run ending at the right margin
    fn trailing_blank_start(&self, row: &[Cell]) -> Option<usize> {
        let last = row.last()?;
        if !self.is_erasable(last) {
            return None;
        }
        let len = row
            .iter()
            .rev()
            .take_while(|cell| cell.is_space() && cell.same_style(last))
            .count();
        Some(row.len() - len)
    }

    /// Clear the screen and reset the tracked terminal state.
    ///
    /// Every row of the next surface passed to
    /// [`update_terminal`](Self::update_terminal) is redrawn.
    pub fn clear_terminal(&mut self) {
        let reset = self.reset_sequence();
        self.buffer.push_control(&reset);
        self.current = Cell::default();
        self.style_known = true;
        match self.caps.expand(self.caps.edit.clear_screen.as_deref(), &[]) {
            Some(clear) => {
                self.buffer.push_control(&clear);
                self.physical.fill(Some(Cell::default()));
                self.cursor = Some(Point::new(0, 0));
            },
            None => {
                self.physical.fill(None);
                self.cursor = None;
            },
        }
        self.full_redraw = true;
    }

    // --- Cursor ------------------------------------------------------------

    /// Change the hardware cursor's visibility
    pub fn set_cursor_mode(&mut self, mode: CursorMode) {
        let cursor = &self.caps.cursor;
        let cap = match mode {
            CursorMode::Invisible => cursor.cursor_invisible.as_deref(),
            CursorMode::Normal => cursor.cursor_normal.as_deref(),
            CursorMode::VeryVisible => cursor
                .cursor_visible
                .as_deref()
                .or(cursor.cursor_normal.as_deref()),
        };
        if let Some(seq) = self.caps.expand(cap, &[]) {
            self.buffer.push_control(&seq);
        }
        self.cursor_mode = Some(mode);
    }

    /// Show the hardware cursor at `pos`, or hide it for `None`
    pub fn place_cursor(&mut self, pos: Option<Point>) {
        let target = pos.and_then(|p| {
            let x = usize::try_from(p.x).ok()?;
            let y = usize::try_from(p.y).ok()?;
            (x < self.size.width && y < self.size.height).then_some((x, y))
        });
        match target {
            Some((x, y)) if self.move_to(x, y) => {
                if matches!(self.cursor_mode, None | Some(CursorMode::Invisible)) {
                    self.set_cursor_mode(CursorMode::Normal);
                }
            },
            _ => {
                if self.cursor_mode != Some(CursorMode::Invisible) {
                    self.set_cursor_mode(CursorMode::Invisible);
                }
            },
        }
    }

    // --- Palette -----------------------------------------------------------

    /// Load the configured palette theme. Returns false when palette
    /// redefinition is disabled or unsupported.
    pub fn apply_palette(&mut self) -> bool {
        if !self.palette_redefinable {
            return false;
        }
        let seq = palette_sequence(&self.caps, self.palette_theme);
        if seq.is_empty() {
            return false;
        }
        self.buffer.push_control(&seq);
        self.palette_applied = true;
        true
    }

    /// Give the terminal back its own palette
    pub fn restore_palette(&mut self) {
        self.buffer.push_control(&restore_sequence(&self.caps));
        self.palette_applied = false;
    }

    // --- Flushing ----------------------------------------------------------

    /// Write queued output if a flush was forced or the pacing interval
    /// elapsed. Does nothing while paused.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_at(Instant::now())
    }

    /// [`flush`](Self::flush) with an explicit clock reading
    pub fn flush_at(&mut self, now: Instant) -> Result<()> {
        if self.paused || self.buffer.is_empty() {
            return Ok(());
        }
        if !self.force && !self.pacer.is_due(now) {
            return Ok(());
        }
        let bytes = self.buffer.take();
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.force = false;
        self.pacer.record_flush(now);
        trace!(
            "Flushed {} bytes, next flush in {:?}",
            bytes.len(),
            self.pacer.wait()
        );
        if self.pointer_hook_enabled {
            if let Some(hook) = self.pointer_hook.as_mut() {
                hook();
            }
        }
        Ok(())
    }

    /// Make the next flush ignore pacing
    pub fn request_forced_flush(&mut self) {
        self.force = true;
    }

    /// Flush now regardless of pacing
    pub fn force_flush(&mut self) -> Result<()> {
        self.force = true;
        self.flush()
    }

    /// Hold all output until [`resume`](Self::resume)
    pub fn pause(&mut self) {
        debug!("Output paused");
        self.paused = true;
    }

    /// Send everything queued while paused
    pub fn resume(&mut self) -> Result<()> {
        debug!("Output resumed with {} bytes queued", self.buffer.len());
        self.paused = false;
        self.force_flush()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Install the callback that redraws the mouse pointer after a flush
    pub fn set_pointer_hook<F>(&mut self, hook: F)
    where
        F: FnMut() + 'static,
    {
        self.pointer_hook = Some(Box::new(hook));
    }

    pub fn set_pointer_hook_enabled(&mut self, enabled: bool) {
        self.pointer_hook_enabled = enabled;
    }

    /// Reset attributes, cursor and palette, then flush
    pub fn restore_terminal(&mut self) -> Result<()> {
        let reset = self.reset_sequence();
        self.buffer.push_control(&reset);
        self.current = Cell::default();
        if self.palette_applied {
            self.restore_palette();
        }
        if self.cursor_mode.is_some_and(|mode| mode != CursorMode::Normal) {
            self.set_cursor_mode(CursorMode::Normal);
        }
        self.paused = false;
        self.force_flush()
    }
}

fn point(x: usize, y: usize) -> Point {
    Point::new(to_i32(x), to_i32(y))
}

/// Number of cells from `x` through `end` drawn exactly like `row[x]`
fn identical_run(row: &[Cell], x: usize, end: usize) -> usize {
    let first = row[x];
    row[x..=end]
        .iter()
        .take_while(|cell| cell.width() == 1 && cell.same_appearance(&first))
        .count()
}

/// Single-width stand-in for part of a wide glyph
fn marker(c: char, cell: &Cell) -> Cell {
    Cell::styled(c, cell.fg, cell.bg, cell.attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Attributes, Color};
    use std::cell::Cell as Counter;
    use std::rc::Rc;
    use std::time::Duration;

    fn engine(caps: CapabilityTable, size: Size) -> OutputEngine<Vec<u8>> {
        OutputEngine::new(Vec::new(), Arc::new(caps), &RenderConfig::default(), size)
    }

    fn write_str(surface: &mut Surface, x: usize, y: usize, s: &str) {
        for (i, c) in s.chars().enumerate() {
            surface.write(x + i, y, Cell::new(c));
        }
    }

    fn frame(engine: &mut OutputEngine<Vec<u8>>, terminal: &mut Surface) -> Vec<u8> {
        let start = engine.writer().len();
        engine.update_terminal(terminal).unwrap();
        engine.force_flush().unwrap();
        engine.writer()[start..].to_vec()
    }

    #[test]
    fn test_first_frame() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        write_str(&mut term, 0, 0, "hi");
        assert_eq!(frame(&mut e, &mut term), b"\x1b[H\x1b[0m\x1b[39;49mhi");
        assert!(!term.has_changes());
        assert!(term.cell(0, 0).unwrap().flags.contains(RenderFlags::PRINTED));
    }

    #[test]
    fn test_unchanged_cells_not_resent() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        write_str(&mut term, 0, 0, "hello");
        frame(&mut e, &mut term);
        write_str(&mut term, 0, 0, "hello");
        assert!(frame(&mut e, &mut term).is_empty());
    }

    #[test]
    fn test_skip_unchanged_run() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        write_str(&mut term, 0, 0, "abcdefghij");
        frame(&mut e, &mut term);
        // Wrapped past the margin
        assert_eq!(e.cursor(), Some(Point::new(0, 1)));
        term.write(0, 0, Cell::new('X'));
        term.write(9, 0, Cell::new('Y'));
        assert_eq!(frame(&mut e, &mut term), b"\x1b[AX\x1b[8CY");
    }

    #[test]
    fn test_clear_to_end_of_line() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(20, 2));
        let mut term = Surface::from(Size::new(20, 2));
        write_str(&mut term, 0, 0, "hello world");
        frame(&mut e, &mut term);
        write_str(&mut term, 0, 0, "           ");
        assert_eq!(frame(&mut e, &mut term), b"\r\x1b[K");
    }

    #[test]
    fn test_clear_to_end_of_line_counts_cursor_move() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(20, 3));
        let mut term = Surface::from(Size::new(20, 3));
        term.write(0, 1, Cell::new('a'));
        write_str(&mut term, 15, 1, "vwxyz");
        frame(&mut e, &mut term);
        assert_eq!(e.cursor(), Some(Point::new(0, 2)));

        // el alone beats five spaces, but not with the jump back up
        write_str(&mut term, 15, 1, "     ");
        let out = frame(&mut e, &mut term);
        assert!(!out.windows(3).any(|w| w == b"\x1b[K"), "got {:?}", out);
        assert!(out.ends_with(b"\x1b[5X"), "got {:?}", out);
    }

    #[test]
    fn test_clear_to_beginning_of_line() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(20, 2));
        let mut term = Surface::from(Size::new(20, 2));
        write_str(&mut term, 0, 0, "abcdefghij");
        frame(&mut e, &mut term);
        write_str(&mut term, 0, 0, "         ");
        assert_eq!(frame(&mut e, &mut term), b"\x08\x08\x1b[1K");
    }

    #[test]
    fn test_repeat_ascii_run() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(20, 2));
        let mut term = Surface::from(Size::new(20, 2));
        write_str(&mut term, 0, 0, "==========");
        let out = frame(&mut e, &mut term);
        assert!(out.ends_with(b"=\x1b[9b"));
    }

    #[test]
    fn test_repeat_multibyte_run() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(20, 2));
        let mut term = Surface::from(Size::new(20, 2));
        write_str(&mut term, 0, 0, "──────────");
        let out = frame(&mut e, &mut term);
        assert!(out.ends_with("─\x1b[9b".as_bytes()));
    }

    #[test]
    fn test_colored_text() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        term.write(0, 0, Cell::styled('x', Color::LIGHT_GRAY, Color::BLUE, Attributes::BOLD));
        let out = frame(&mut e, &mut term);
        assert!(out.ends_with(b"\x1b[1;37;44mx"));
    }

    #[test]
    fn test_wide_glyph_cut_by_margin() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(5, 2));
        let mut term = Surface::from(Size::new(5, 2));
        term.write(4, 0, Cell::new('中'));
        let out = String::from_utf8(frame(&mut e, &mut term)).unwrap();
        assert!(out.ends_with('›'));
        assert!(!out.contains('中'));
    }

    #[test]
    fn test_exposed_padding() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(5, 2));
        let mut term = Surface::from(Size::new(5, 2));
        term.write(0, 0, Cell::padding_for(&Cell::new('中')));
        let out = String::from_utf8(frame(&mut e, &mut term)).unwrap();
        assert!(out.ends_with('‹'));
    }

    #[test]
    fn test_wide_glyph_with_padding() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(6, 2));
        let mut term = Surface::from(Size::new(6, 2));
        term.print_str("中a");
        let out = String::from_utf8(frame(&mut e, &mut term)).unwrap();
        assert!(out.ends_with("中a"));
        assert_eq!(e.cursor(), Some(Point::new(3, 0)));
    }

    #[test]
    fn test_corner_with_margin_toggle() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(4, 2));
        let mut term = Surface::from(Size::new(4, 2));
        term.write(3, 1, Cell::new('z'));
        let out = frame(&mut e, &mut term);
        assert!(out.ends_with(b"\x1b[?7lz\x1b[?7h"));
    }

    #[test]
    fn test_corner_with_insert_character() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(4, 2));
        let mut term = Surface::from(Size::new(4, 2));
        term.write(2, 1, Cell::new('y'));
        term.write(3, 1, Cell::new('z'));
        let out = frame(&mut e, &mut term);
        assert!(out.ends_with(b"y\x08z\x08\x1b[1@y"));
    }

    #[test]
    fn test_corner_skipped_without_support() {
        let mut e = engine(CapabilityTable::vt100(), Size::new(4, 2));
        let mut term = Surface::from(Size::new(4, 2));
        term.write(3, 1, Cell::new('z'));
        let out = frame(&mut e, &mut term);
        assert!(!out.contains(&b'z'));
        assert!(!term.cell(3, 1).unwrap().flags.contains(RenderFlags::PRINTED));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        e.pause();
        write_str(&mut term, 0, 0, "a");
        e.update_terminal(&mut term).unwrap();
        e.force_flush().unwrap();
        write_str(&mut term, 1, 0, "b");
        e.update_terminal(&mut term).unwrap();
        assert!(e.writer().is_empty());
        e.resume().unwrap();
        assert!(e.writer().ends_with(b"ab"));
        assert_eq!(e.pending(), 0);
    }

    #[test]
    fn test_flush_respects_pacing() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        let start = Instant::now();
        write_str(&mut term, 0, 0, "a");
        e.update_terminal(&mut term).unwrap();
        e.flush_at(start).unwrap();
        let sent = e.writer().len();
        assert!(sent > 0);

        write_str(&mut term, 1, 0, "b");
        e.update_terminal(&mut term).unwrap();
        e.flush_at(start + Duration::from_millis(1)).unwrap();
        assert_eq!(e.writer().len(), sent);
        e.flush_at(start + Duration::from_millis(20)).unwrap();
        assert_eq!(e.writer().len(), sent + 1);
    }

    #[test]
    fn test_full_queue_flushes_early() {
        let config = RenderConfig {
            queue_capacity: 8,
            ..Default::default()
        };
        let mut e = OutputEngine::new(
            Vec::new(),
            Arc::new(CapabilityTable::ansi()),
            &config,
            Size::new(20, 3),
        );
        let mut term = Surface::from(Size::new(20, 3));
        write_str(&mut term, 0, 0, "abcdefghijkl");
        e.update_terminal(&mut term).unwrap();
        assert!(e.writer().ends_with(b"abcdefghijkl"));
    }

    #[test]
    fn test_pointer_hook_only_when_enabled() {
        let calls = Rc::new(Counter::new(0));
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let seen = Rc::clone(&calls);
        e.set_pointer_hook(move || seen.set(seen.get() + 1));
        let mut term = Surface::from(Size::new(10, 2));

        write_str(&mut term, 0, 0, "a");
        frame(&mut e, &mut term);
        assert_eq!(calls.get(), 0);

        e.set_pointer_hook_enabled(true);
        write_str(&mut term, 0, 0, "b");
        frame(&mut e, &mut term);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cursor_modes() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(10, 2));
        e.set_cursor_mode(CursorMode::from_code(0));
        e.force_flush().unwrap();
        assert_eq!(e.writer().as_slice(), b"\x1b[?25l");

        e.place_cursor(Some(Point::new(2, 1)));
        e.force_flush().unwrap();
        assert!(e.writer().ends_with(b"\x1b[?12l\x1b[?25h"));
        assert_eq!(e.cursor_mode(), Some(CursorMode::Normal));

        e.place_cursor(None);
        assert_eq!(e.cursor_mode(), Some(CursorMode::Invisible));
    }

    #[test]
    #[should_panic(expected = "invalid cursor mode")]
    fn test_invalid_cursor_mode_panics() {
        CursorMode::from_code(7);
    }

    #[test]
    fn test_clear_terminal() {
        let mut e = engine(CapabilityTable::xterm_256color(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        e.clear_terminal();
        // Blank cells are already known to be blank
        assert_eq!(frame(&mut e, &mut term), b"\x1b(B\x1b[m\x1b[39;49m\x1b[H\x1b[2J");
        assert_eq!(e.cursor(), Some(Point::new(0, 0)));
    }

    #[test]
    fn test_resize_forgets_state() {
        let mut e = engine(CapabilityTable::ansi(), Size::new(10, 2));
        let mut term = Surface::from(Size::new(10, 2));
        write_str(&mut term, 0, 0, "abc");
        frame(&mut e, &mut term);

        let mut bigger = Surface::from(Size::new(12, 3));
        write_str(&mut bigger, 0, 0, "abc");
        bigger.clear_span(0);
        let out = frame(&mut e, &mut bigger);
        assert_eq!(e.size(), Size::new(12, 3));
        assert!(out.windows(3).any(|w| w == b"abc"));
    }

    #[test]
    fn test_palette() {
        let config = RenderConfig {
            palette_redefinable: true,
            ..Default::default()
        };
        let mut e = OutputEngine::new(
            Vec::new(),
            Arc::new(CapabilityTable::linux()),
            &config,
            Size::new(10, 2),
        );
        assert!(e.apply_palette());
        e.restore_terminal().unwrap();
        assert!(e.writer().starts_with(b"\x1b]P0"));
        assert!(e.writer().ends_with(b"\x1b]R"));

        let mut plain = engine(CapabilityTable::linux(), Size::new(10, 2));
        assert!(!plain.apply_palette());
    }

    #[test]
    fn test_vt100_line_drawing() {
        let config = RenderConfig {
            encoding: Encoding::Vt100,
            ..Default::default()
        };
        let mut e = OutputEngine::new(
            Vec::new(),
            Arc::new(CapabilityTable::vt100()),
            &config,
            Size::new(10, 2),
        );
        let mut term = Surface::from(Size::new(10, 2));
        write_str(&mut term, 0, 0, "┌a");
        let out = frame(&mut e, &mut term);
        assert!(out.contains(&b'l'));
        assert!(out.contains(&0x0e));
        assert!(out.ends_with(b"a"));
        assert!(!String::from_utf8_lossy(&out).contains('┌'));
    }
}
