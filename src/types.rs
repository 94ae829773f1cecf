//! Basic type definitions for the chat relay
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: server-assigned, monotonically increasing client identifier
//! - `DisplayName`: length-bounded name supplied during the handshake

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::MAX_NAME_LEN;

/// Unique client identifier (newtype pattern)
///
/// Assigned once per accepted connection and never reused while the
/// server process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out client identifiers starting at 1
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Take the next identifier
    pub fn next_id(&self) -> ClientId {
        ClientId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Client display name
///
/// At most [`MAX_NAME_LEN`] bytes of UTF-8. Longer input is cut at the
/// last character boundary that fits. Names are not required to be unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Upper bound on the encoded length of a name
    pub const MAX_LEN: usize = MAX_NAME_LEN;

    /// Build a name from raw handshake bytes
    ///
    /// Invalid UTF-8 is replaced, trailing line endings are stripped.
    /// Returns None when nothing is left.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches(['\r', '\n']);

        let mut end = text.len().min(Self::MAX_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let name = text[..end].trim();
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
