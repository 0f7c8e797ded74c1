//! Capability table
//!
//! Per-terminal-type control-sequence templates, color limits and quirk
//! flags. A table is built once at startup, from a preset or a JSON
//! document, and treated as immutable afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tparm::tparm;
use crate::core::Attributes;
use crate::error::{Error, Result};

/// Enter/exit sequences for one attribute mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrCap {
    /// Sequence switching the mode on
    pub enter: Option<String>,
    /// Sequence switching the mode off
    pub exit: Option<String>,
    /// The exit sequence also resets every other attribute and the colors
    pub exit_resets_all: bool,
}

impl AttrCap {
    pub fn new(enter: &str, exit: &str) -> Self {
        Self {
            enter: Some(enter.to_string()),
            exit: Some(exit.to_string()),
            exit_resets_all: false,
        }
    }

    /// Mode that can only be switched on
    pub fn enter_only(enter: &str) -> Self {
        Self {
            enter: Some(enter.to_string()),
            ..Default::default()
        }
    }

    /// Mode whose exit sequence is a full attribute reset
    pub fn with_reset_exit(enter: &str, exit: &str) -> Self {
        Self {
            exit_resets_all: true,
            ..Self::new(enter, exit)
        }
    }
}

/// Attribute mode capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeCaps {
    pub bold: AttrCap,
    pub dim: AttrCap,
    pub italic: AttrCap,
    pub underline: AttrCap,
    pub dbl_underline: AttrCap,
    pub blink: AttrCap,
    pub reverse: AttrCap,
    pub standout: AttrCap,
    pub invisible: AttrCap,
    pub protect: AttrCap,
    pub crossed_out: AttrCap,
    pub alt_charset: AttrCap,
    pub pc_charset: AttrCap,
}

impl AttributeCaps {
    /// Capability for a single attribute bit
    pub fn get(&self, bit: Attributes) -> Option<&AttrCap> {
        let cap = match bit {
            b if b == Attributes::BOLD => &self.bold,
            b if b == Attributes::DIM => &self.dim,
            b if b == Attributes::ITALIC => &self.italic,
            b if b == Attributes::UNDERLINE => &self.underline,
            b if b == Attributes::DBL_UNDERLINE => &self.dbl_underline,
            b if b == Attributes::BLINK => &self.blink,
            b if b == Attributes::REVERSE => &self.reverse,
            b if b == Attributes::STANDOUT => &self.standout,
            b if b == Attributes::INVISIBLE => &self.invisible,
            b if b == Attributes::PROTECT => &self.protect,
            b if b == Attributes::CROSSED_OUT => &self.crossed_out,
            b if b == Attributes::ALT_CHARSET => &self.alt_charset,
            b if b == Attributes::PC_CHARSET => &self.pc_charset,
            _ => return None,
        };
        Some(cap)
    }
}

/// Color capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorCaps {
    /// ANSI indexed foreground (`setaf`)
    pub set_a_foreground: Option<String>,
    /// ANSI indexed background (`setab`)
    pub set_a_background: Option<String>,
    /// Non-ANSI indexed foreground (`setf`), PC color ordering
    pub set_foreground: Option<String>,
    /// Non-ANSI indexed background (`setb`), PC color ordering
    pub set_background: Option<String>,
    /// Color pair selection (`scp`)
    pub set_color_pair: Option<String>,
    /// Restore the default color pair (`op`)
    pub orig_pair: Option<String>,
    /// Restore the original palette (`oc`)
    pub orig_colors: Option<String>,
    /// Redefine a palette entry (`initc`): index, r, g, b in 0..=1000
    pub initialize_color: Option<String>,
}

/// Cursor motion and visibility capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorCaps {
    /// Absolute move (`cup`): row, column
    pub cursor_address: Option<String>,
    pub cursor_home: Option<String>,
    pub carriage_return: Option<String>,
    pub cursor_up: Option<String>,
    pub cursor_down: Option<String>,
    pub cursor_left: Option<String>,
    pub cursor_right: Option<String>,
    pub parm_up_cursor: Option<String>,
    pub parm_down_cursor: Option<String>,
    pub parm_left_cursor: Option<String>,
    pub parm_right_cursor: Option<String>,
    /// Absolute column (`hpa`)
    pub column_address: Option<String>,
    /// Absolute row (`vpa`)
    pub row_address: Option<String>,
    pub cursor_invisible: Option<String>,
    pub cursor_normal: Option<String>,
    pub cursor_visible: Option<String>,
}

/// Erase, repeat, insert and margin capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditCaps {
    pub clear_screen: Option<String>,
    /// Clear to end of line (`el`)
    pub clr_eol: Option<String>,
    /// Clear to beginning of line, cursor column included (`el1`)
    pub clr_bol: Option<String>,
    /// Erase N characters without moving the cursor (`ech`)
    pub erase_chars: Option<String>,
    /// Repeat a 7-bit character N times (`rep`): char, count
    pub repeat_char: Option<String>,
    /// Repeat the last printed character N more times (`REP`): count
    pub repeat_last_char: Option<String>,
    /// Enable automatic margins (`smam`)
    pub enter_am_mode: Option<String>,
    /// Disable automatic margins (`rmam`)
    pub exit_am_mode: Option<String>,
    /// Insert N blank characters (`ich`)
    pub parm_ich: Option<String>,
    /// Insert one blank character (`ich1`)
    pub insert_character: Option<String>,
    pub enter_insert_mode: Option<String>,
    pub exit_insert_mode: Option<String>,
    /// Padding after an inserted character (`ip`)
    pub insert_padding: Option<String>,
}

/// Complete capability description of one terminal type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityTable {
    /// Terminal type name
    pub name: String,
    /// Number of colors; 0 for monochrome terminals
    pub max_colors: u16,
    /// Attributes that cannot be combined with color (`ncv`)
    pub no_color_video: Attributes,
    /// `ESC [ 39 m` / `ESC [ 49 m` select the default colors
    pub ansi_default_color: bool,
    /// Printing in the last column wraps to the next line (`am`)
    pub automatic_right_margin: bool,
    /// Newline ignored after an 80-column wrap (`xenl`)
    pub eat_newline_glitch: bool,
    /// Clears fill with the current background color (`bce`)
    pub background_color_erase: bool,
    /// Full attribute reset (`sgr0`)
    pub exit_attribute_mode: Option<String>,
    /// Combined absolute attribute setter (`sgr`), nine parameters
    pub set_attributes: Option<String>,
    pub attributes: AttributeCaps,
    pub colors: ColorCaps,
    pub cursor: CursorCaps,
    pub edit: EditCaps,
}

impl CapabilityTable {
    /// Resolve a terminal type: preset name first, then a JSON file path
    pub fn load(name_or_path: &str) -> Result<Self> {
        if let Some(table) = Self::preset(name_or_path) {
            tracing::debug!("Using built-in capability table '{}'", name_or_path);
            return Ok(table);
        }
        let path = Path::new(name_or_path);
        if path.exists() {
            return Self::from_json_file(path);
        }
        Err(Error::UnknownTerminal(name_or_path.to_string()))
    }

    /// Like [`CapabilityTable::load`] but falls back to the `ansi` preset
    pub fn load_or_ansi(name_or_path: &str) -> Self {
        Self::load(name_or_path).unwrap_or_else(|e| {
            tracing::warn!("{}; falling back to 'ansi'", e);
            Self::ansi()
        })
    }

    /// Load a table from a JSON document
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table: CapabilityTable = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded capability table '{}' from {}",
            table.name,
            path.display()
        );
        Ok(table)
    }

    /// Expand a capability with parameters.
    ///
    /// Absent capabilities yield `None`; malformed templates are logged and
    /// also yield `None` so the feature degrades silently.
    pub fn expand(&self, cap: Option<&str>, params: &[i32]) -> Option<Vec<u8>> {
        let template = cap?;
        match tparm(template, params) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("Bad capability {:?} in '{}': {}", template, self.name, e);
                None
            }
        }
    }

    /// Byte cost of a capability with parameters, `None` when absent
    pub fn cost(&self, cap: Option<&str>, params: &[i32]) -> Option<usize> {
        self.expand(cap, params).map(|bytes| bytes.len())
    }

    /// Check if the terminal can display colors
    pub fn has_color(&self) -> bool {
        self.max_colors > 0
    }

    /// Check if the terminal can make text invisible natively
    pub fn has_invisible(&self) -> bool {
        self.attributes.invisible.enter.is_some()
    }

    /// Validate every template by expanding it with zero parameters
    pub fn validate(&self) -> Result<()> {
        let json = serde_json::to_value(self)?;
        let mut bad = Vec::new();
        collect_bad_templates("", &json, &mut bad);
        match bad.first() {
            None => Ok(()),
            Some((field, reason)) => Err(Error::Capability {
                name: self.name.clone(),
                field: field.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

fn collect_bad_templates(prefix: &str, value: &serde_json::Value, bad: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_bad_templates(&path, v, bad);
            }
        }
        serde_json::Value::String(s) if prefix != "name" && prefix != "no_color_video" => {
            if let Err(e) = tparm(s, &[1, 1, 1, 1, 1, 1, 1, 1, 1]) {
                bad.push((prefix.to_string(), e.to_string()));
            }
        }
        _ => {}
    }
}
