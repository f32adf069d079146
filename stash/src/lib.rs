//! Stash Core - clipboard history with a tag taxonomy
//!
//! Captures text from the clipboard, classifies it, drops duplicates and
//! password-like values, and stores it in SQLite with soft-delete (trash)
//! semantics. Items are organized through many-to-many tags and found through
//! filtered search with ALL/ANY/NONE tag matching.
//!
//! `ClipboardStore` is the entry point; the store traits in `interface` are
//! the seams for substituting fakes.

pub mod capture;
pub mod clipboard;
pub mod content_detection;
pub mod database;
pub mod filter;
pub mod interface;
pub mod items;
pub mod logging;
pub mod models;
pub mod search;
pub mod settings;
pub mod stats;
mod store;
pub mod tags;

pub use capture::{CaptureLoop, CaptureOutcome, CapturePipeline};
pub use clipboard::{ClipboardError, ClipboardReader, ClipboardWriter, MemoryClipboard};
pub use interface::*;
pub use models::{Category, ClipboardItem, ContentType, Tag, TagGroup, TagWithStats};
pub use settings::Settings;
pub use store::ClipboardStore;
