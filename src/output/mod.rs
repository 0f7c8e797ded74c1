//! Terminal output
//!
//! Everything between the composed terminal surface and the byte stream:
//! cursor motion, character encoding, palette setup, output queueing and
//! flush pacing.

mod buffer;
mod cursor;
mod encoding;
mod engine;
mod pacing;
mod palette;

pub use buffer::{OutputBuffer, RunKind};
pub use cursor::CursorPlanner;
pub use encoding::Encoding;
pub use engine::{CursorMode, OutputEngine, PointerHook};
pub use pacing::FlushPacer;
pub use palette::{palette_sequence, restore_sequence, PaletteTheme};
