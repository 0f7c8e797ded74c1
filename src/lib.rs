//! Mochi TUI rendering core
//!
//! Layered terminal rendering: producers draw into their own surfaces, the
//! compositor merges them into one terminal-sized surface, and the output
//! engine sends the smallest byte stream it can find to the terminal.
//!
//! - `core`: Cells, colors, attributes and geometry
//! - `capability`: Terminal capability tables and parameter expansion
//! - `optimizer`: Minimal attribute and color transitions
//! - `surface`: Dirty-tracked cell buffers
//! - `compositor`: Layered composition with transparency
//! - `output`: Cost-driven redraw, encoding and flush pacing
//! - `snapshot`: Serializable surface dumps

pub mod capability;
pub mod compositor;
pub mod config;
pub mod core;
pub mod error;
pub mod optimizer;
pub mod output;
pub mod snapshot;
pub mod surface;

pub use capability::CapabilityTable;
pub use compositor::{Compositor, SurfaceId};
pub use config::RenderConfig;
pub use error::{Error, Result};
pub use optimizer::AttributeOptimizer;
pub use output::{CursorMode, Encoding, OutputEngine};
pub use snapshot::Snapshot;
pub use surface::Surface;
