//! Built-in capability tables
//!
//! Hand-maintained descriptions of common terminal types, taken from
//! their terminfo entries with delay padding removed.

use super::table::{AttrCap, AttributeCaps, CapabilityTable, ColorCaps, CursorCaps, EditCaps};
use crate::core::Attributes;

fn s(v: &str) -> Option<String> {
    Some(v.to_string())
}

/// CSI-style cursor motion shared by every ANSI-like preset
fn ansi_cursor(cud1: &str) -> CursorCaps {
    CursorCaps {
        cursor_address: s("\x1b[%i%p1%d;%p2%dH"),
        cursor_home: s("\x1b[H"),
        carriage_return: s("\r"),
        cursor_up: s("\x1b[A"),
        cursor_down: s(cud1),
        cursor_left: s("\x08"),
        cursor_right: s("\x1b[C"),
        parm_up_cursor: s("\x1b[%p1%dA"),
        parm_down_cursor: s("\x1b[%p1%dB"),
        parm_left_cursor: s("\x1b[%p1%dD"),
        parm_right_cursor: s("\x1b[%p1%dC"),
        column_address: None,
        row_address: None,
        cursor_invisible: None,
        cursor_normal: None,
        cursor_visible: None,
    }
}

impl CapabilityTable {
    /// Look up a built-in table by terminal name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "ansi" => Some(Self::ansi()),
            "linux" => Some(Self::linux()),
            "xterm-256color" | "xterm" => Some(Self::xterm_256color()),
            "vt100" | "vt102" => Some(Self::vt100()),
            "dumb" => Some(Self::dumb()),
            _ => None,
        }
    }

    /// Generic ANSI terminal: 8 colors, no combined attribute setter
    pub fn ansi() -> Self {
        Self {
            name: "ansi".to_string(),
            max_colors: 8,
            no_color_video: Attributes::empty(),
            ansi_default_color: true,
            automatic_right_margin: true,
            eat_newline_glitch: false,
            background_color_erase: false,
            exit_attribute_mode: s("\x1b[0m"),
            set_attributes: None,
            attributes: AttributeCaps {
                bold: AttrCap::enter_only("\x1b[1m"),
                underline: AttrCap::with_reset_exit("\x1b[4m", "\x1b[m"),
                blink: AttrCap::enter_only("\x1b[5m"),
                reverse: AttrCap::enter_only("\x1b[7m"),
                standout: AttrCap::with_reset_exit("\x1b[7m", "\x1b[m"),
                invisible: AttrCap::enter_only("\x1b[8m"),
                alt_charset: AttrCap::new("\x1b[11m", "\x1b[10m"),
                pc_charset: AttrCap::new("\x1b[11m", "\x1b[10m"),
                ..Default::default()
            },
            colors: ColorCaps {
                set_a_foreground: s("\x1b[3%p1%dm"),
                set_a_background: s("\x1b[4%p1%dm"),
                orig_pair: s("\x1b[39;49m"),
                ..Default::default()
            },
            cursor: CursorCaps {
                column_address: s("\x1b[%i%p1%dG"),
                row_address: s("\x1b[%i%p1%dd"),
                ..ansi_cursor("\x1b[B")
            },
            edit: EditCaps {
                clear_screen: s("\x1b[H\x1b[J"),
                clr_eol: s("\x1b[K"),
                clr_bol: s("\x1b[1K"),
                erase_chars: s("\x1b[%p1%dX"),
                repeat_char: s("%p1%c\x1b[%p2%{1}%-%db"),
                parm_ich: s("\x1b[%p1%d@"),
                ..Default::default()
            },
        }
    }

    /// Linux virtual console
    pub fn linux() -> Self {
        Self {
            name: "linux".to_string(),
            max_colors: 8,
            no_color_video: Attributes::UNDERLINE | Attributes::DIM,
            ansi_default_color: true,
            automatic_right_margin: true,
            eat_newline_glitch: true,
            background_color_erase: true,
            exit_attribute_mode: s("\x1b[0;10m"),
            set_attributes: s(
                "\x1b[0;10%?%p1%t;7%;%?%p2%t;4%;%?%p3%t;7%;%?%p4%t;5%;%?%p5%t;2%;%?%p6%t;1%;%?%p9%t;11%;m",
            ),
            attributes: AttributeCaps {
                bold: AttrCap::enter_only("\x1b[1m"),
                dim: AttrCap::enter_only("\x1b[2m"),
                underline: AttrCap::new("\x1b[4m", "\x1b[24m"),
                blink: AttrCap::enter_only("\x1b[5m"),
                reverse: AttrCap::enter_only("\x1b[7m"),
                standout: AttrCap::new("\x1b[7m", "\x1b[27m"),
                alt_charset: AttrCap::new("\x0e", "\x0f"),
                pc_charset: AttrCap::new("\x1b[11m", "\x1b[10m"),
                ..Default::default()
            },
            colors: ColorCaps {
                set_a_foreground: s("\x1b[3%p1%dm"),
                set_a_background: s("\x1b[4%p1%dm"),
                orig_pair: s("\x1b[39;49m"),
                orig_colors: s("\x1b]R"),
                initialize_color: s(
                    "\x1b]P%p1%x%p2%{255}%*%{1000}%/%02x%p3%{255}%*%{1000}%/%02x%p4%{255}%*%{1000}%/%02x",
                ),
                ..Default::default()
            },
            cursor: CursorCaps {
                column_address: s("\x1b[%i%p1%dG"),
                row_address: s("\x1b[%i%p1%dd"),
                cursor_invisible: s("\x1b[?25l\x1b[?1c"),
                cursor_normal: s("\x1b[?25h\x1b[?0c"),
                cursor_visible: s("\x1b[?25h\x1b[?8c"),
                ..ansi_cursor("\n")
            },
            edit: EditCaps {
                clear_screen: s("\x1b[H\x1b[J"),
                clr_eol: s("\x1b[K"),
                clr_bol: s("\x1b[1K"),
                parm_ich: s("\x1b[%p1%d@"),
                insert_character: s("\x1b[@"),
                enter_insert_mode: s("\x1b[4h"),
                exit_insert_mode: s("\x1b[4l"),
                ..Default::default()
            },
        }
    }

    /// xterm with the 256-color palette
    pub fn xterm_256color() -> Self {
        Self {
            name: "xterm-256color".to_string(),
            max_colors: 256,
            no_color_video: Attributes::empty(),
            ansi_default_color: true,
            automatic_right_margin: true,
            eat_newline_glitch: true,
            background_color_erase: true,
            exit_attribute_mode: s("\x1b(B\x1b[m"),
            set_attributes: s(
                "%?%p9%t\x1b(0%e\x1b(B%;\x1b[0%?%p6%t;1%;%?%p5%t;2%;%?%p2%t;4%;%?%p1%p3%|%t;7%;%?%p4%t;5%;%?%p7%t;8%;m",
            ),
            attributes: AttributeCaps {
                bold: AttrCap::new("\x1b[1m", "\x1b[22m"),
                dim: AttrCap::new("\x1b[2m", "\x1b[22m"),
                italic: AttrCap::new("\x1b[3m", "\x1b[23m"),
                underline: AttrCap::new("\x1b[4m", "\x1b[24m"),
                dbl_underline: AttrCap::new("\x1b[21m", "\x1b[24m"),
                blink: AttrCap::new("\x1b[5m", "\x1b[25m"),
                reverse: AttrCap::new("\x1b[7m", "\x1b[27m"),
                standout: AttrCap::new("\x1b[7m", "\x1b[27m"),
                invisible: AttrCap::new("\x1b[8m", "\x1b[28m"),
                crossed_out: AttrCap::new("\x1b[9m", "\x1b[29m"),
                alt_charset: AttrCap::new("\x1b(0", "\x1b(B"),
                ..Default::default()
            },
            colors: ColorCaps {
                set_a_foreground: s(
                    "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m",
                ),
                set_a_background: s(
                    "\x1b[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48;5;%p1%d%;m",
                ),
                orig_pair: s("\x1b[39;49m"),
                orig_colors: s("\x1b]104\x07"),
                initialize_color: s(
                    "\x1b]4;%p1%d;rgb:%p2%{255}%*%{1000}%/%02x/%p3%{255}%*%{1000}%/%02x/%p4%{255}%*%{1000}%/%02x\x1b\\",
                ),
                ..Default::default()
            },
            cursor: CursorCaps {
                column_address: s("\x1b[%i%p1%dG"),
                row_address: s("\x1b[%i%p1%dd"),
                cursor_invisible: s("\x1b[?25l"),
                cursor_normal: s("\x1b[?12l\x1b[?25h"),
                cursor_visible: s("\x1b[?12;25h"),
                ..ansi_cursor("\n")
            },
            edit: EditCaps {
                clear_screen: s("\x1b[H\x1b[2J"),
                clr_eol: s("\x1b[K"),
                clr_bol: s("\x1b[1K"),
                erase_chars: s("\x1b[%p1%dX"),
                repeat_char: s("%p1%c\x1b[%p2%{1}%-%db"),
                repeat_last_char: s("\x1b[%p1%db"),
                enter_am_mode: s("\x1b[?7h"),
                exit_am_mode: s("\x1b[?7l"),
                parm_ich: s("\x1b[%p1%d@"),
                enter_insert_mode: s("\x1b[4h"),
                exit_insert_mode: s("\x1b[4l"),
                ..Default::default()
            },
        }
    }

    /// DEC VT100: monochrome with the special graphics charset
    pub fn vt100() -> Self {
        Self {
            name: "vt100".to_string(),
            max_colors: 0,
            no_color_video: Attributes::empty(),
            ansi_default_color: false,
            automatic_right_margin: true,
            eat_newline_glitch: true,
            background_color_erase: false,
            exit_attribute_mode: s("\x1b[m\x0f"),
            set_attributes: s(
                "\x1b[0%?%p1%p6%|%t;1%;%?%p2%t;4%;%?%p1%p3%|%t;7%;%?%p4%t;5%;m%?%p9%t\x0e%e\x0f%;",
            ),
            attributes: AttributeCaps {
                bold: AttrCap::enter_only("\x1b[1m"),
                underline: AttrCap::with_reset_exit("\x1b[4m", "\x1b[m"),
                blink: AttrCap::enter_only("\x1b[5m"),
                reverse: AttrCap::enter_only("\x1b[7m"),
                standout: AttrCap::with_reset_exit("\x1b[7m", "\x1b[m"),
                alt_charset: AttrCap::new("\x0e", "\x0f"),
                ..Default::default()
            },
            colors: ColorCaps::default(),
            cursor: ansi_cursor("\n"),
            edit: EditCaps {
                clear_screen: s("\x1b[H\x1b[J"),
                clr_eol: s("\x1b[K"),
                clr_bol: s("\x1b[1K"),
                ..Default::default()
            },
        }
    }

    /// A terminal that can only print and return the carriage
    pub fn dumb() -> Self {
        Self {
            name: "dumb".to_string(),
            automatic_right_margin: true,
            cursor: CursorCaps {
                carriage_return: s("\r"),
                cursor_down: s("\n"),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
