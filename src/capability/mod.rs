//! Terminal capability database
//!
//! This module provides:
//! - The per-terminal capability table (sequences, color limits, quirks)
//! - Terminfo-style parameter expansion for capability templates
//! - Built-in presets for common terminal types

mod presets;
mod table;
mod tparm;

pub use table::{AttrCap, AttributeCaps, CapabilityTable, ColorCaps, CursorCaps, EditCaps};
pub use tparm::{tparm, TparmError, MAX_PARAMS};
