//! Attribute optimizer
//!
//! Turns a (current, target) pair of cell styles into the shortest control
//! sequence the capability table allows:
//! - A single full reset when every attribute goes away
//! - One combined `sgr` call when the table has one
//! - Per-bit enter/exit sequences otherwise
//! - Color changes last, with default-color and fake-reverse handling
//!
//! The tracked `current` cell always ends up with the target's requested
//! style. What is actually emitted is derived from a physical projection of
//! both styles, so attributes the terminal cannot show never cause repeated
//! output.

mod coalesce;

pub use coalesce::coalesce;

use std::sync::Arc;

use crate::capability::CapabilityTable;
use crate::core::{Attributes, Cell, Color};

/// Style as the terminal will actually show it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TermState {
    attrs: Attributes,
    /// `None` after a full reset: the color must be re-sent
    fg: Option<Color>,
    bg: Option<Color>,
}

impl TermState {
    fn reset() -> Self {
        Self {
            attrs: Attributes::empty(),
            fg: None,
            bg: None,
        }
    }
}

/// Computes minimal attribute and color transitions for one terminal type
#[derive(Debug, Clone)]
pub struct AttributeOptimizer {
    caps: Arc<CapabilityTable>,
    coalesce: bool,
}

impl AttributeOptimizer {
    pub fn new(caps: Arc<CapabilityTable>) -> Self {
        Self {
            caps,
            coalesce: false,
        }
    }

    /// Enable or disable the SGR coalescing pass
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce = enabled;
        self
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.caps
    }

    /// Sequence switching `current` to the style of `target`.
    ///
    /// On return `current` carries the target's colors and attributes. When
    /// the terminal has no invisible mode, an invisible `target` gets a
    /// space as its encoded glyph.
    pub fn change_attribute(&self, current: &mut Cell, target: &mut Cell) -> Vec<u8> {
        if target.attrs.contains(Attributes::INVISIBLE) && !self.caps.has_invisible() {
            target.encoded = ' ';
        }
        if current.same_style(target) {
            return Vec::new();
        }

        let mut from = self.project(current);
        let to = self.project(target);
        let mut out = Vec::new();

        if from != to {
            if to.attrs.is_empty() && !from.attrs.is_empty() && self.caps.exit_attribute_mode.is_some() {
                self.full_reset(&mut from, &mut out);
            } else if from.attrs != to.attrs && self.sgr_usable(from.attrs, to.attrs) {
                self.set_all_attributes(&mut from, to.attrs, &mut out);
            } else {
                self.switch_off(&mut from, to.attrs, &mut out);
            }
            self.switch_on(&mut from, to.attrs, &mut out);
            self.change_color(&mut from, &to, &mut out);
        }

        current.fg = target.fg;
        current.bg = target.bg;
        current.attrs = target.attrs;

        if self.coalesce {
            coalesce(&out)
        } else {
            out
        }
    }

    /// Full attribute reset sequence, if the terminal has one
    pub fn reset_sequence(&self) -> Vec<u8> {
        self.caps
            .expand(self.caps.exit_attribute_mode.as_deref(), &[])
            .unwrap_or_default()
    }

    /// Physical style: ncv stripping, fake reverse, color normalization
    fn project(&self, cell: &Cell) -> TermState {
        let caps = &*self.caps;
        let mut attrs = cell.attrs;
        let mut fg = cell.fg.normalize(caps.max_colors);
        let mut bg = cell.bg.normalize(caps.max_colors);

        // Modes the terminal cannot enter are never on
        for bit in Attributes::SWITCH_ORDER {
            if caps.attributes.get(bit).map_or(true, |c| c.enter.is_none()) {
                attrs.remove(bit);
            }
        }

        if !caps.has_color() {
            return TermState {
                attrs,
                fg: Some(Color::Default),
                bg: Some(Color::Default),
            };
        }

        let color_active = !fg.is_default() || !bg.is_default();
        let mut fake_reverse = false;
        if color_active && !caps.no_color_video.is_empty() {
            let blocked = attrs & caps.no_color_video;
            if blocked.contains(Attributes::REVERSE) {
                fake_reverse = true;
            }
            attrs.remove(blocked);
        }

        if !caps.ansi_default_color && caps.colors.orig_pair.is_none() && caps.colors.orig_colors.is_none() {
            if fg.is_default() {
                fg = Color::LIGHT_GRAY;
            }
            if bg.is_default() {
                bg = Color::BLACK;
            }
        }
        if fake_reverse {
            std::mem::swap(&mut fg, &mut bg);
        }

        TermState {
            attrs,
            fg: Some(fg),
            bg: Some(bg),
        }
    }

    fn push_cap(&self, cap: Option<&str>, params: &[i32], out: &mut Vec<u8>) -> bool {
        match self.caps.expand(cap, params) {
            Some(bytes) => {
                out.extend_from_slice(&bytes);
                true
            },
            None => false,
        }
    }

    fn full_reset(&self, from: &mut TermState, out: &mut Vec<u8>) {
        self.push_cap(self.caps.exit_attribute_mode.as_deref(), &[], out);
        *from = TermState::reset();
    }

    fn sgr_usable(&self, from: Attributes, to: Attributes) -> bool {
        self.caps.set_attributes.is_some()
            && !from.contains(Attributes::PC_CHARSET)
            && !to.contains(Attributes::PC_CHARSET)
    }

    /// Absolute attribute setting through `sgr`
    fn set_all_attributes(&self, from: &mut TermState, to: Attributes, out: &mut Vec<u8>) {
        let flag = |bit: Attributes| i32::from(to.contains(bit));
        let params = [
            flag(Attributes::STANDOUT),
            flag(Attributes::UNDERLINE),
            flag(Attributes::REVERSE),
            flag(Attributes::BLINK),
            flag(Attributes::DIM),
            flag(Attributes::BOLD),
            flag(Attributes::INVISIBLE),
            flag(Attributes::PROTECT),
            flag(Attributes::ALT_CHARSET),
        ];
        self.push_cap(self.caps.set_attributes.as_deref(), &params, out);
        // sgr starts from a clean slate; colors and the uncovered bits are patched after
        *from = TermState {
            attrs: to - Attributes::NOT_IN_SGR,
            ..TermState::reset()
        };
    }

    /// Turn off bits present in `from` but not in `to`
    fn switch_off(&self, from: &mut TermState, to: Attributes, out: &mut Vec<u8>) {
        for bit in Attributes::SWITCH_ORDER {
            if !from.attrs.contains(bit) || to.contains(bit) {
                continue;
            }
            let Some(cap) = self.caps.attributes.get(bit) else {
                continue;
            };
            match cap.exit.as_deref() {
                Some(exit) if !cap.exit_resets_all => {
                    self.push_cap(Some(exit), &[], out);
                    // Other modes sharing this exit sequence went off as well
                    for other in Attributes::SWITCH_ORDER {
                        let shares = self
                            .caps
                            .attributes
                            .get(other)
                            .and_then(|c| c.exit.as_deref())
                            == Some(exit);
                        if shares {
                            from.attrs.remove(other);
                        }
                    }
                },
                Some(exit) => {
                    self.push_cap(Some(exit), &[], out);
                    *from = TermState::reset();
                    return;
                },
                None if self.caps.exit_attribute_mode.is_some() => {
                    self.full_reset(from, out);
                    return;
                },
                None => from.attrs.remove(bit),
            }
        }
    }

    /// Turn on bits present in `to` but not in `from`
    fn switch_on(&self, from: &mut TermState, to: Attributes, out: &mut Vec<u8>) {
        for bit in Attributes::SWITCH_ORDER {
            if to.contains(bit) && !from.attrs.contains(bit) {
                if let Some(cap) = self.caps.attributes.get(bit) {
                    self.push_cap(cap.enter.as_deref(), &[], out);
                }
                from.attrs.insert(bit);
            }
        }
    }

    fn change_color(&self, from: &mut TermState, to: &TermState, out: &mut Vec<u8>) {
        if !self.caps.has_color() {
            return;
        }
        let (Some(fg), Some(bg)) = (to.fg, to.bg) else {
            return;
        };
        let fg_changed = from.fg != Some(fg);
        let bg_changed = from.bg != Some(bg);
        if !fg_changed && !bg_changed {
            return;
        }

        if fg.is_default() || bg.is_default() {
            self.change_to_default_color(from, fg, bg, fg_changed, bg_changed, out);
        }

        let fg_pending = !fg.is_default() && from.fg != Some(fg);
        let bg_pending = !bg.is_default() && from.bg != Some(bg);
        if fg_pending || bg_pending {
            self.change_indexed_color(fg, bg, fg_pending, bg_pending, out);
        }
        from.fg = Some(fg);
        from.bg = Some(bg);
    }

    fn change_to_default_color(
        &self,
        from: &mut TermState,
        fg: Color,
        bg: Color,
        fg_changed: bool,
        bg_changed: bool,
        out: &mut Vec<u8>,
    ) {
        let colors = &self.caps.colors;
        let fg_to_default = fg.is_default() && fg_changed;
        let bg_to_default = bg.is_default() && bg_changed;

        if self.caps.ansi_default_color {
            if fg_to_default && bg_to_default {
                self.set_default_pair(out);
            } else if fg_to_default {
                out.extend_from_slice(b"\x1b[39m");
            } else if bg_to_default {
                out.extend_from_slice(b"\x1b[49m");
            }
            if fg_to_default {
                from.fg = Some(Color::Default);
            }
            if bg_to_default {
                from.bg = Some(Color::Default);
            }
        } else if (fg_to_default || bg_to_default)
            && (self.push_cap(colors.orig_pair.as_deref(), &[], out)
                || self.push_cap(colors.orig_colors.as_deref(), &[], out))
        {
            // The pair reset affects both channels
            from.fg = Some(Color::Default);
            from.bg = Some(Color::Default);
        }
    }

    fn set_default_pair(&self, out: &mut Vec<u8>) {
        let colors = &self.caps.colors;
        if !self.push_cap(colors.orig_pair.as_deref(), &[], out)
            && !self.push_cap(colors.orig_colors.as_deref(), &[], out)
        {
            out.extend_from_slice(b"\x1b[39;49m");
        }
    }

    fn change_indexed_color(
        &self,
        fg: Color,
        bg: Color,
        fg_pending: bool,
        bg_pending: bool,
        out: &mut Vec<u8>,
    ) {
        let colors = &self.caps.colors;
        let fg_index = fg.index().unwrap_or(0);
        let bg_index = bg.index().unwrap_or(0);

        if colors.set_a_foreground.is_some() || colors.set_a_background.is_some() {
            if fg_pending {
                let param = i32::from(Color::ansi_index(fg_index));
                self.push_cap(colors.set_a_foreground.as_deref(), &[param], out);
            }
            if bg_pending {
                let param = i32::from(Color::ansi_index(bg_index));
                self.push_cap(colors.set_a_background.as_deref(), &[param], out);
            }
        } else if colors.set_foreground.is_some() || colors.set_background.is_some() {
            if fg_pending {
                self.push_cap(colors.set_foreground.as_deref(), &[i32::from(fg_index)], out);
            }
            if bg_pending {
                self.push_cap(colors.set_background.as_deref(), &[i32::from(bg_index)], out);
            }
        } else if colors.set_color_pair.is_some() {
            let pair = i32::from(fg_index % 8) * 8 + i32::from(bg_index % 8);
            self.push_cap(colors.set_color_pair.as_deref(), &[pair], out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{AttrCap, ColorCaps};

    fn optimizer(table: CapabilityTable) -> AttributeOptimizer {
        AttributeOptimizer::new(Arc::new(table))
    }

    fn style(fg: Color, bg: Color, attrs: Attributes) -> Cell {
        Cell::styled('x', fg, bg, attrs)
    }

    fn run(opt: &AttributeOptimizer, current: &mut Cell, target: Cell) -> String {
        let mut target = target;
        String::from_utf8(opt.change_attribute(current, &mut target)).unwrap()
    }

    #[test]
    fn test_equal_style_is_empty() {
        let opt = optimizer(CapabilityTable::ansi());
        let mut current = Cell::default();
        assert_eq!(run(&opt, &mut current, Cell::new('a')), "");
    }

    #[test]
    fn test_ansi_bold_with_colors_and_back() {
        let opt = optimizer(CapabilityTable::ansi());
        let mut current = Cell::default();
        let target = style(Color::LIGHT_GRAY, Color::BLUE, Attributes::BOLD);
        assert_eq!(run(&opt, &mut current, target), "\x1b[1m\x1b[37m\x1b[44m");
        assert!(current.same_style(&target));
        assert_eq!(run(&opt, &mut current, Cell::default()), "\x1b[0m\x1b[39;49m");
    }

    #[test]
    fn test_coalesced_transition() {
        let opt = optimizer(CapabilityTable::ansi()).with_coalescing(true);
        let mut current = Cell::default();
        let target = style(Color::LIGHT_GRAY, Color::BLUE, Attributes::BOLD);
        assert_eq!(run(&opt, &mut current, target), "\x1b[1;37;44m");
    }

    #[test]
    fn test_single_default_channel() {
        let opt = optimizer(CapabilityTable::ansi());
        let mut current = style(Color::RED, Color::GREEN, Attributes::empty());
        let target = style(Color::Default, Color::GREEN, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "\x1b[39m");
        let target = style(Color::Default, Color::Default, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "\x1b[49m");
    }

    #[test]
    fn test_pc_to_ansi_permutation() {
        let opt = optimizer(CapabilityTable::xterm_256color());
        let mut current = Cell::default();
        let target = style(Color::RED, Color::YELLOW, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "\x1b[31m\x1b[103m");
    }

    #[test]
    fn test_colors_normalized_to_table() {
        let opt = optimizer(CapabilityTable::ansi());
        let mut current = Cell::default();
        // WHITE (15) wraps to LIGHT_GRAY (7) on an 8-color terminal
        let target = style(Color::WHITE, Color::Default, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "\x1b[37m");
    }

    #[test]
    fn test_sgr_is_absolute() {
        let opt = optimizer(CapabilityTable::linux());
        let mut current = style(Color::Default, Color::Default, Attributes::BOLD);
        let target = style(Color::Default, Color::Default, Attributes::BOLD | Attributes::BLINK);
        assert_eq!(run(&opt, &mut current, target), "\x1b[0;10;5;1m\x1b[39;49m");
    }

    #[test]
    fn test_sgr_patches_uncovered_bits() {
        let opt = optimizer(CapabilityTable::xterm_256color());
        let mut current = Cell::default();
        let target = style(Color::Default, Color::Default, Attributes::BOLD | Attributes::ITALIC);
        assert_eq!(
            run(&opt, &mut current, target),
            "\x1b(B\x1b[0;1m\x1b[3m\x1b[39;49m"
        );
    }

    #[test]
    fn test_pc_charset_avoids_sgr() {
        let opt = optimizer(CapabilityTable::linux());
        let mut current = Cell::default();
        let target = style(Color::Default, Color::Default, Attributes::PC_CHARSET | Attributes::BOLD);
        assert_eq!(run(&opt, &mut current, target), "\x1b[1m\x1b[11m");
    }

    #[test]
    fn test_exit_that_resets_all_reenables() {
        let opt = optimizer(CapabilityTable::ansi());
        let mut current = style(
            Color::Default,
            Color::Default,
            Attributes::BOLD | Attributes::UNDERLINE,
        );
        let target = style(Color::Default, Color::Default, Attributes::BOLD);
        // Underline's exit is a full reset: bold comes back, colors are re-sent
        assert_eq!(run(&opt, &mut current, target), "\x1b[m\x1b[1m\x1b[39;49m");
    }

    #[test]
    fn test_shared_exit_turns_off_siblings() {
        let opt = optimizer(CapabilityTable {
            set_attributes: None,
            ..CapabilityTable::xterm_256color()
        });
        let mut current = style(Color::Default, Color::Default, Attributes::BOLD | Attributes::DIM);
        let target = style(Color::Default, Color::Default, Attributes::DIM);
        assert_eq!(run(&opt, &mut current, target), "\x1b[22m\x1b[2m");
    }

    #[test]
    fn test_no_color_video_fake_reverse() {
        let mut table = CapabilityTable::ansi();
        table.no_color_video = Attributes::REVERSE | Attributes::UNDERLINE;
        let opt = optimizer(table);
        let mut current = Cell::default();
        let target = style(
            Color::RED,
            Color::BLUE,
            Attributes::REVERSE | Attributes::UNDERLINE,
        );
        // Reverse becomes a color swap, underline is dropped
        assert_eq!(run(&opt, &mut current, target), "\x1b[34m\x1b[41m");
        assert_eq!(current.attrs, Attributes::REVERSE | Attributes::UNDERLINE);
    }

    #[test]
    fn test_missing_capability_updates_state() {
        let opt = optimizer(CapabilityTable::ansi());
        let mut current = Cell::default();
        let target = style(Color::Default, Color::Default, Attributes::ITALIC);
        assert_eq!(run(&opt, &mut current, target), "");
        assert_eq!(current.attrs, Attributes::ITALIC);
    }

    #[test]
    fn test_invisible_emulation() {
        let mut table = CapabilityTable::ansi();
        table.attributes.invisible = AttrCap::default();
        let opt = optimizer(table);
        let mut current = Cell::default();
        let mut target = style(Color::Default, Color::Default, Attributes::INVISIBLE);
        opt.change_attribute(&mut current, &mut target);
        assert_eq!(target.encoded, ' ');
        assert_eq!(target.glyph.base(), 'x');
    }

    #[test]
    fn test_gray_on_black_fallback() {
        let mut table = CapabilityTable::ansi();
        table.ansi_default_color = false;
        table.colors.orig_pair = None;
        let opt = optimizer(table);
        let mut current = style(Color::RED, Color::BLUE, Attributes::empty());
        let target = style(Color::Default, Color::Default, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "\x1b[37m\x1b[40m");
    }

    #[test]
    fn test_orig_pair_then_indexed() {
        let mut table = CapabilityTable::ansi();
        table.ansi_default_color = false;
        let opt = optimizer(table);
        let mut current = style(Color::RED, Color::BLUE, Attributes::empty());
        let target = style(Color::Default, Color::BLUE, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "\x1b[39;49m\x1b[44m");
    }

    #[test]
    fn test_color_pair_capability() {
        let table = CapabilityTable {
            colors: ColorCaps {
                set_color_pair: Some("\x1b[%p1%dP".to_string()),
                orig_pair: Some("\x1b[op".to_string()),
                ..Default::default()
            },
            ..CapabilityTable::ansi()
        };
        let opt = optimizer(table);
        let mut current = Cell::default();
        let target = style(Color::RED, Color::BLUE, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "\x1b[33P");
    }

    #[test]
    fn test_monochrome_ignores_colors() {
        let opt = optimizer(CapabilityTable::vt100());
        let mut current = Cell::default();
        let target = style(Color::RED, Color::BLUE, Attributes::empty());
        assert_eq!(run(&opt, &mut current, target), "");
        assert_eq!(current.fg, Color::RED);
    }
}
