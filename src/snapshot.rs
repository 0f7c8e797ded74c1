//! Surface snapshot for testing and debugging
//!
//! Provides a serializable text-plus-attributes view of any surface.

use serde::{Deserialize, Serialize};

use crate::core::{Attributes, Cell, Color, RenderFlags};
use crate::surface::Surface;

/// Contents of a surface at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub dimensions: SnapshotDimensions,
    /// Terminal position of the surface's top-left cell
    pub offset: (i32, i32),
    /// Input cursor, if shown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_cursor: Option<SnapshotCursor>,
    /// One entry per printable row
    pub lines: Vec<SnapshotLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDimensions {
    pub cols: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCursor {
    pub col: i32,
    pub row: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    /// Text content of the line, transparent cells as spaces
    pub text: String,
    /// Styled column ranges, end exclusive
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<SnapshotAttrSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAttrSpan {
    pub start: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transparent: bool,
}

impl SnapshotAttrSpan {
    fn same_style(&self, other: &SnapshotAttrSpan) -> bool {
        self.fg == other.fg
            && self.bg == other.bg
            && self.attributes == other.attributes
            && self.transparent == other.transparent
    }
}

impl Snapshot {
    /// Capture the printable area of a surface
    pub fn from_surface(surface: &Surface) -> Self {
        let lines = (0..surface.height())
            .map(|y| {
                let row = surface.row(y).unwrap_or(&[]);
                let row = &row[..surface.width().min(row.len())];
                SnapshotLine {
                    text: line_text(row),
                    attrs: extract_attr_spans(row),
                }
            })
            .collect();

        let offset = surface.offset();
        Self {
            dimensions: SnapshotDimensions {
                cols: surface.width(),
                rows: surface.height(),
            },
            offset: (offset.x, offset.y),
            input_cursor: surface.input_cursor().map(|p| SnapshotCursor { col: p.x, row: p.y }),
            lines,
        }
    }

    /// Convert snapshot to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse snapshot from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get a simple text representation of the surface
    pub fn screen_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn line_text(row: &[Cell]) -> String {
    let mut text = String::with_capacity(row.len());
    for cell in row {
        if cell.is_padding() {
            continue;
        }
        if cell.flags.contains(RenderFlags::TRANSPARENT) {
            text.push(' ');
        } else {
            text.push_str(&cell.glyph.to_string());
        }
    }
    text
}

fn color_name(color: Color) -> Option<String> {
    color.index().map(|idx| format!("idx:{idx}"))
}

/// Extract attribute spans from a row
fn extract_attr_spans(row: &[Cell]) -> Vec<SnapshotAttrSpan> {
    let mut spans: Vec<SnapshotAttrSpan> = Vec::new();
    let mut current: Option<SnapshotAttrSpan> = None;

    for (i, cell) in row.iter().enumerate() {
        if cell.is_padding() {
            continue;
        }
        let transparent = cell.flags.contains(RenderFlags::TRANSPARENT);
        if cell.is_plain() && !transparent {
            if let Some(mut span) = current.take() {
                span.end = i;
                spans.push(span);
            }
            continue;
        }

        let span = SnapshotAttrSpan {
            start: i,
            end: i,
            fg: color_name(cell.fg),
            bg: color_name(cell.bg),
            attributes: cell.attrs,
            transparent,
        };
        match current.take() {
            Some(open) if open.same_style(&span) => current = Some(open),
            Some(mut open) => {
                open.end = i;
                spans.push(open);
                current = Some(span);
            },
            None => current = Some(span),
        }
    }

    if let Some(mut span) = current {
        span.end = row.len();
        spans.push(span);
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Point, Rect, Size};

    #[test]
    fn test_snapshot_screen_text() {
        let mut surface = Surface::from(Size::new(6, 2));
        surface.print_str("Hi\n中x");
        let snapshot = Snapshot::from_surface(&surface);
        assert_eq!(snapshot.dimensions, SnapshotDimensions { cols: 6, rows: 2 });
        assert_eq!(snapshot.screen_text(), "Hi    \n中x   ");
        assert!(snapshot.lines[0].attrs.is_empty());
    }

    #[test]
    fn test_snapshot_attr_spans() {
        let mut surface = Surface::from(Size::new(8, 1));
        surface.print_styled("ab", Color::RED, Color::Default, Attributes::BOLD);
        surface.print_str("c");
        surface.print_styled("d", Color::Default, Color::BLUE, Attributes::empty());
        let spans = &Snapshot::from_surface(&surface).lines[0].attrs;
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].start, spans[0].end), (0, 2));
        assert_eq!(spans[0].fg.as_deref(), Some("idx:4"));
        assert_eq!(spans[0].attributes, Attributes::BOLD);
        assert_eq!((spans[1].start, spans[1].end), (3, 4));
    }

    #[test]
    fn test_snapshot_transparent_and_cursor() {
        let mut surface = Surface::new(Rect::new(3, 4, 4, 1), Size::new(0, 0));
        surface.write(1, 0, Cell::transparent());
        surface.set_input_cursor(2, 0);
        let snapshot = Snapshot::from_surface(&surface);
        assert_eq!(snapshot.offset, (3, 4));
        assert!(snapshot.lines[0].attrs[0].transparent);
        assert_eq!(surface.input_cursor(), Some(Point::new(2, 0)));
        assert_eq!(snapshot.input_cursor, Some(SnapshotCursor { col: 2, row: 0 }));
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut surface = Surface::from(Size::new(4, 2));
        surface.print_styled("ok", Color::GREEN, Color::BLACK, Attributes::UNDERLINE);
        let snapshot = Snapshot::from_surface(&surface);
        let json = snapshot.to_json().unwrap();
        assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);
    }
}
