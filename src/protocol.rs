//! Wire protocol
//!
//! Plain byte-stream line protocol. There is no length prefix: a frame
//! is one newline-terminated line, or the bytes of a single write when no
//! newline arrived, bounded by a fixed buffer size.
//!
//! - Handshake: the first frame, up to [`MAX_NAME_LEN`] bytes, is the name
//! - Messages: every later frame, up to [`MAX_MESSAGE_LEN`] bytes
//! - Sentinel: a frame starting with `.DISCONNECT` ends the session
//! - Server → client: `"<name> says: <message>\n"`

use tokio::io::{AsyncRead, AsyncReadExt};

/// Name buffer size, one byte reserved for the terminator
pub const NAME_BUFFER_LEN: usize = 30;
/// Longest accepted display name in bytes
pub const MAX_NAME_LEN: usize = NAME_BUFFER_LEN - 1;

/// Message buffer size, one byte reserved for the terminator
pub const BUFFER_LEN: usize = 256;
/// Longest single message frame in bytes
pub const MAX_MESSAGE_LEN: usize = BUFFER_LEN - 1;

/// Voluntary disconnect marker, compared against the start of a frame
pub const DISCONNECT_SENTINEL: &[u8] = b".DISCONNECT";

/// What to do with the rest of a line longer than the frame limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Keep the remainder as the next frame
    Split,
    /// Drop the remainder of the line
    Truncate,
}

/// Classified message frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Chat text to relay
    Message(String),
    /// Empty line, nothing to relay
    Blank,
    /// Sentinel received
    Disconnect,
}

impl Inbound {
    /// Classify one message frame
    pub fn classify(frame: &[u8]) -> Self {
        if frame.starts_with(DISCONNECT_SENTINEL) {
            return Inbound::Disconnect;
        }

        let text = String::from_utf8_lossy(frame);
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            Inbound::Blank
        } else {
            Inbound::Message(text.to_string())
        }
    }
}

/// Render the line sent to every recipient of a broadcast
pub fn format_broadcast(sender: &str, message: &str) -> String {
    format!("{} says: {}\n", sender, message)
}

/// Bytes asked for in a single read
const READ_CHUNK: usize = 4 * BUFFER_LEN;

/// Reads bounded frames from a connection
///
/// A newline-terminated line is always one frame, however the bytes were
/// split across reads. Without a newline, a read that comes back short
/// marks the end of the frame, unless the bytes are what was left behind
/// a line earlier in the same read; those wait for the next read.
pub struct FrameReader<R> {
    inner: R,
    pending: Vec<u8>,
    /// Pending bytes followed a consumed line and no read happened since
    leftover: bool,
    /// Last read filled the whole chunk, more of the same write may follow
    open_ended: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(READ_CHUNK),
            leftover: false,
            open_ended: false,
        }
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` once the peer has closed the stream and nothing
    /// is left buffered.
    pub async fn next_frame(
        &mut self,
        limit: usize,
        overflow: Overflow,
    ) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
                if newline <= limit {
                    let frame = self.take(newline, newline + 1);
                    self.leftover = !self.pending.is_empty();
                    return Ok(Some(frame));
                }
                let frame = match overflow {
                    Overflow::Split => self.take(limit, limit),
                    Overflow::Truncate => {
                        let frame = self.take(limit, newline + 1);
                        self.leftover = !self.pending.is_empty();
                        frame
                    }
                };
                return Ok(Some(frame));
            }

            if self.pending.len() > limit {
                let frame = self.take(limit, limit);
                self.leftover = false;
                if overflow == Overflow::Truncate {
                    self.discard_line().await?;
                }
                return Ok(Some(frame));
            }

            if !self.pending.is_empty() && !self.leftover && !self.open_ended {
                let len = self.pending.len();
                return Ok(Some(self.take(len, len)));
            }

            if self.fill().await? == 0 {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let len = self.pending.len();
                return Ok(Some(self.take(len, len)));
            }
        }
    }

    /// Drop the rest of an over-long line
    async fn discard_line(&mut self) -> std::io::Result<()> {
        loop {
            if let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
                self.pending.drain(..=newline);
                self.leftover = !self.pending.is_empty();
                return Ok(());
            }
            self.pending.clear();
            if !self.open_ended || self.fill().await? == 0 {
                return Ok(());
            }
        }
    }

    async fn fill(&mut self) -> std::io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let read = self.inner.read(&mut chunk).await?;
        self.pending.extend_from_slice(&chunk[..read]);
        self.leftover = false;
        self.open_ended = read == READ_CHUNK;
        Ok(read)
    }

    /// Split off `len` bytes as a frame, consuming `consumed` bytes
    fn take(&mut self, len: usize, consumed: usize) -> Vec<u8> {
        let mut frame = self.pending[..len].to_vec();
        self.pending.drain(..consumed);
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_detected() {
        assert_eq!(Inbound::classify(b".DISCONNECT"), Inbound::Disconnect);
        // Only the first 11 bytes matter
        assert_eq!(Inbound::classify(b".DISCONNECT now"), Inbound::Disconnect);
        assert_eq!(
            Inbound::classify(b"bye .DISCONNECT"),
            Inbound::Message("bye .DISCONNECT".to_string())
        );
    }

    #[test]
    fn test_blank_frames() {
        assert_eq!(Inbound::classify(b""), Inbound::Blank);
        assert_eq!(Inbound::classify(b"\r"), Inbound::Blank);
    }

    #[test]
    fn test_whitespace_is_a_message() {
        assert_eq!(Inbound::classify(b"   "), Inbound::Message("   ".to_string()));
    }

    #[test]
    fn test_format_broadcast() {
        assert_eq!(format_broadcast("A", "hello"), "A says: hello\n");
    }

    #[tokio::test]
    async fn test_reader_splits_coalesced_lines() {
        let mut reader = FrameReader::new(&b"Alice\r\nhi\n.DISCONNECT\n"[..]);

        let name = reader.next_frame(MAX_NAME_LEN, Overflow::Truncate).await.unwrap();
        assert_eq!(name.as_deref(), Some(&b"Alice"[..]));

        let msg = reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await.unwrap();
        assert_eq!(msg.as_deref(), Some(&b"hi"[..]));

        let sentinel = reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await.unwrap();
        assert_eq!(Inbound::classify(&sentinel.unwrap()), Inbound::Disconnect);

        assert!(reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reader_truncates_long_name() {
        let raw = format!("{}\nhello\n", "n".repeat(40));
        let mut reader = FrameReader::new(raw.as_bytes());

        let name = reader.next_frame(MAX_NAME_LEN, Overflow::Truncate).await.unwrap().unwrap();
        assert_eq!(name.len(), MAX_NAME_LEN);

        let msg = reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await.unwrap();
        assert_eq!(msg.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_reader_eof() {
        let mut reader = FrameReader::new(&b""[..]);
        assert!(reader.next_frame(MAX_NAME_LEN, Overflow::Truncate).await.unwrap().is_none());
    }

    async fn frame_lens<R: AsyncRead + Unpin>(reader: &mut FrameReader<R>) -> Vec<usize> {
        let mut lens = Vec::new();
        while let Some(frame) = reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await.unwrap() {
            lens.push(frame.len());
        }
        lens
    }

    #[tokio::test]
    async fn test_reader_keeps_full_line_after_short_one() {
        let raw = format!("hi\n{}\n", "x".repeat(254));
        let mut reader = FrameReader::new(raw.as_bytes());
        assert_eq!(frame_lens(&mut reader).await, vec![2, 254]);
    }

    #[tokio::test]
    async fn test_reader_joins_line_across_reads() {
        let first = format!("hi\n{}", "x".repeat(100));
        let second = format!("{}\n", "x".repeat(154));
        let mut reader = FrameReader::new(first.as_bytes().chain(second.as_bytes()));
        assert_eq!(frame_lens(&mut reader).await, vec![2, 254]);
    }

    #[tokio::test]
    async fn test_reader_newline_free_write_is_one_frame() {
        let mut reader = FrameReader::new(&b"no newline here"[..]);
        assert_eq!(frame_lens(&mut reader).await, vec![15]);
    }

    #[tokio::test]
    async fn test_reader_splits_overlong_line() {
        let raw = format!("{}\nok\n", "y".repeat(300));
        let mut reader = FrameReader::new(raw.as_bytes());
        assert_eq!(frame_lens(&mut reader).await, vec![255, 45, 2]);
    }

    #[tokio::test]
    async fn test_reader_discards_rest_of_long_name() {
        let raw = format!("{}\nhello\n", "n".repeat(300));
        let mut reader = FrameReader::new(raw.as_bytes());

        let name = reader.next_frame(MAX_NAME_LEN, Overflow::Truncate).await.unwrap().unwrap();
        assert_eq!(name, vec![b'n'; MAX_NAME_LEN]);

        let msg = reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await.unwrap();
        assert_eq!(msg.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_reader_discards_name_spanning_reads() {
        let raw = format!("{}\nhello\n", "n".repeat(3 * READ_CHUNK));
        let mut reader = FrameReader::new(raw.as_bytes());

        let name = reader.next_frame(MAX_NAME_LEN, Overflow::Truncate).await.unwrap().unwrap();
        assert_eq!(name.len(), MAX_NAME_LEN);

        let msg = reader.next_frame(MAX_MESSAGE_LEN, Overflow::Split).await.unwrap();
        assert_eq!(msg.as_deref(), Some(&b"hello"[..]));
    }
}
