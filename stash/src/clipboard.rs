//! Clipboard I/O boundary
//!
//! The capture loop reads through `ClipboardReader`; using an item writes
//! through `ClipboardWriter`. Both are fallible OS side effects.

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("Clipboard holds no text")]
    Empty,
}

pub trait ClipboardReader: Send + Sync {
    fn read_text(&self) -> Result<String, ClipboardError>;
}

pub trait ClipboardWriter: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Process-local clipboard. Used headless and in tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
    fail: Mutex<bool>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, text: impl Into<String>) {
        *self.text.lock() = Some(text.into());
    }

    pub fn get(&self) -> Option<String> {
        self.text.lock().clone()
    }

    /// Make every read and write fail until switched back
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock() = failing;
    }
}

impl ClipboardReader for MemoryClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        if *self.fail.lock() {
            return Err(ClipboardError::Unavailable("memory clipboard set to fail".into()));
        }
        self.text.lock().clone().ok_or(ClipboardError::Empty)
    }
}

impl ClipboardWriter for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if *self.fail.lock() {
            return Err(ClipboardError::Unavailable("memory clipboard set to fail".into()));
        }
        self.set(text);
        Ok(())
    }
}

#[cfg(feature = "system-clipboard")]
pub use system::SystemClipboard;

#[cfg(feature = "system-clipboard")]
mod system {
    use super::{ClipboardError, ClipboardReader, ClipboardWriter};
    use parking_lot::Mutex;

    /// OS clipboard through `arboard`
    pub struct SystemClipboard {
        inner: Mutex<arboard::Clipboard>,
    }

    impl SystemClipboard {
        pub fn new() -> Result<Self, ClipboardError> {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            Ok(Self { inner: Mutex::new(clipboard) })
        }
    }

    impl ClipboardReader for SystemClipboard {
        fn read_text(&self) -> Result<String, ClipboardError> {
            match self.inner.lock().get_text() {
                Ok(text) => Ok(text),
                Err(arboard::Error::ContentNotAvailable) => Err(ClipboardError::Empty),
                Err(e) => Err(ClipboardError::Unavailable(e.to_string())),
            }
        }
    }

    impl ClipboardWriter for SystemClipboard {
        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            self.inner
                .lock()
                .set_text(text.to_string())
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))
        }
    }
}
