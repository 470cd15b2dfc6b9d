//! Outbound frame payload.

use std::fmt;
use std::sync::Arc;

/// One outbound text frame.
///
/// Cloning is cheap, so the same frame is handed to every observer of a
/// broadcast without copying the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame(Arc<str>);

impl Frame {
    /// Create a frame from text.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Payload as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}
