//! Terminal character encodings
//!
//! UTF-8 terminals get glyphs as they are. Legacy terminals get a single
//! byte per cell: VT100 line drawing through the alternate character set,
//! PC terminals through code page 437, and everything else through an
//! ASCII approximation.

use serde::{Deserialize, Serialize};

use crate::core::{Attributes, Cell};

/// Output character encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    /// 7-bit with the DEC special graphics set
    Vt100,
    /// Code page 437
    Pc,
    /// 7-bit ASCII only
    Ascii,
}

/// (glyph, DEC special graphics, CP437 byte, ASCII fallback)
const CHARSET_MAP: &[(char, Option<char>, u8, char)] = &[
    ('─', Some('q'), 0xc4, '-'),
    ('│', Some('x'), 0xb3, '|'),
    ('┌', Some('l'), 0xda, '+'),
    ('┐', Some('k'), 0xbf, '+'),
    ('└', Some('m'), 0xc0, '+'),
    ('┘', Some('j'), 0xd9, '+'),
    ('├', Some('t'), 0xc3, '+'),
    ('┤', Some('u'), 0xb4, '+'),
    ('┬', Some('w'), 0xc2, '+'),
    ('┴', Some('v'), 0xc1, '+'),
    ('┼', Some('n'), 0xc5, '+'),
    ('▒', Some('a'), 0xb1, '#'),
    ('░', Some('a'), 0xb0, '#'),
    ('█', None, 0xdb, '#'),
    ('◆', Some('`'), 0x04, '*'),
    ('°', Some('f'), 0xf8, '\''),
    ('±', Some('g'), 0xf1, '#'),
    ('≤', Some('y'), 0xf3, '<'),
    ('≥', Some('z'), 0xf2, '>'),
    ('π', Some('{'), 0xe3, '*'),
    ('£', Some('}'), 0x9c, 'f'),
    ('·', Some('~'), 0xfa, '.'),
    ('▲', None, 0x1e, '^'),
    ('▼', None, 0x1f, 'v'),
    ('►', None, 0x10, '>'),
    ('◄', None, 0x11, '<'),
    ('›', None, 0xaf, '>'),
    ('‹', None, 0xae, '<'),
];

fn lookup(c: char) -> Option<&'static (char, Option<char>, u8, char)> {
    CHARSET_MAP.iter().find(|entry| entry.0 == c)
}

impl Encoding {
    /// Set a cell's encoded glyph and charset attributes for this encoding
    pub fn encode_cell(self, cell: &mut Cell) {
        let base = cell.glyph.base();
        if base.is_ascii() || cell.is_padding() {
            return;
        }
        let entry = lookup(base);
        match self {
            Encoding::Utf8 => {},
            Encoding::Vt100 => match entry {
                Some((_, Some(acs), _, _)) => {
                    cell.encoded = *acs;
                    cell.attrs.insert(Attributes::ALT_CHARSET);
                },
                Some((_, None, _, ascii)) => cell.encoded = *ascii,
                None => cell.encoded = '?',
            },
            Encoding::Pc => match entry {
                Some((_, _, byte, _)) => {
                    cell.encoded = char::from(*byte);
                    if *byte < 0x20 {
                        cell.attrs.insert(Attributes::PC_CHARSET);
                    }
                },
                None => cell.encoded = '?',
            },
            Encoding::Ascii => cell.encoded = entry.map_or('?', |e| e.3),
        }
    }

    /// Append the bytes that draw `cell`
    pub fn push_glyph(self, cell: &Cell, out: &mut Vec<u8>) {
        if cell.encoded != cell.glyph.base() {
            self.push_char(cell.encoded, out);
            return;
        }
        match self {
            Encoding::Utf8 => cell.glyph.encode_utf8(out),
            _ => self.push_char(cell.glyph.base(), out),
        }
    }

    fn push_char(self, c: char, out: &mut Vec<u8>) {
        match self {
            Encoding::Utf8 => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            },
            _ => out.push(u8::try_from(u32::from(c)).unwrap_or(b'?')),
        }
    }

    /// Byte length of `cell` when drawn
    pub fn glyph_len(self, cell: &Cell) -> usize {
        let mut buf = Vec::with_capacity(8);
        self.push_glyph(cell, &mut buf);
        buf.len()
    }
}
