//! Output framing for a raw terminal stream.
//!
//! A PTY gives no message boundaries. The [`Framer`] accumulates fragments
//! into a persistent buffer and cuts a frame as soon as a caller-chosen marker
//! appears anywhere in it, so a marker split across any number of fragments is
//! still found. Whatever follows the marker is kept for the next frame.
//!
//! Every wait is bounded by the poll interval and the overall deadline, so a
//! silent but connected remote side can never stall the caller.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::Instant;
use tracing::debug;

use crate::mcp::transport::InteractiveChannel;

/// CSI, OSC (BEL or ST terminated), then other escapes (optional
/// intermediates and one final byte: charset designation, keypad mode,
/// cursor save/restore), then stray NUL/BEL/BS bytes. Order matters: OSC and
/// CSI must win over the generic form that shares their introducer.
static CONTROL_SEQUENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\x1B\][^\x07\x1B]*(?:\x07|\x1B\\)|\x1B\[[0-?]*[ -/]*[@-~]|\x1B[ -/]*[0-~]|[\x00\x07\x08]",
    )
    .expect("control sequence regex must compile")
});

/// Remove terminal control sequences and normalise line endings to `\n`.
///
/// Removal is repeated until nothing matches, because deleting one sequence
/// can splice its neighbours into a new one. That fixpoint is what makes the
/// function idempotent.
pub fn strip_control_sequences(text: &str) -> String {
    let mut current = text.to_string();
    while CONTROL_SEQUENCE.is_match(&current) {
        current = CONTROL_SEQUENCE.replace_all(&current, "").into_owned();
    }
    current.replace("\r\n", "\n").replace('\r', "\n")
}

/// Result of waiting for a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw text before the marker's first occurrence, or the whole buffer
    /// when the marker never arrived.
    pub text: String,
    pub saw_marker: bool,
    /// Raw text after the marker. Empty unless `saw_marker`.
    pub remainder: String,
    /// The stream ended before the marker arrived.
    pub stream_closed: bool,
}

/// Incremental marker detector over an [`InteractiveChannel`].
#[derive(Debug)]
pub struct Framer {
    buffer: String,
    poll_interval: Duration,
}

impl Framer {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            buffer: String::new(),
            // A zero slice would spin
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Text currently held for the next frame.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Discard everything that arrives within `settle` (login banners, MOTD),
    /// plus anything already buffered. Returns the number of bytes discarded.
    pub async fn drain(&mut self, source: &mut dyn InteractiveChannel, settle: Duration) -> usize {
        let deadline = Instant::now() + settle;
        let mut discarded = self.buffer.len();
        self.buffer.clear();

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = self.poll_interval.min(deadline - now);
            match tokio::time::timeout(slice, source.next_chunk()).await {
                Ok(Some(chunk)) => discarded += chunk.len(),
                Ok(None) => break,
                Err(_) => {}
            }
        }

        debug!("Drained {} bytes of banner output", discarded);
        discarded
    }

    /// Wait until `marker` appears in the stream or `timeout` elapses.
    ///
    /// On success the frame holds the text before the marker's first
    /// occurrence and the text after it is retained for the next call. On
    /// timeout or stream close the frame holds the whole accumulated buffer.
    pub async fn await_marker(
        &mut self,
        source: &mut dyn InteractiveChannel,
        marker: &str,
        timeout: Duration,
    ) -> Frame {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(frame) = self.cut(marker) {
                return frame;
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Marker not seen within {:?}; returning {} buffered bytes",
                    timeout,
                    self.buffer.len()
                );
                return self.take_incomplete(false);
            }

            let slice = self.poll_interval.min(deadline - now);
            match tokio::time::timeout(slice, source.next_chunk()).await {
                Ok(Some(chunk)) => self.buffer.push_str(&chunk),
                Ok(None) => {
                    debug!("Stream closed before marker arrived");
                    return self.cut(marker).unwrap_or_else(|| self.take_incomplete(true));
                }
                Err(_) => {}
            }
        }
    }

    fn cut(&mut self, marker: &str) -> Option<Frame> {
        if marker.is_empty() {
            return None;
        }
        let start = self.buffer.find(marker)?;
        let remainder = self.buffer.split_off(start + marker.len());
        self.buffer.truncate(start);
        let text = std::mem::take(&mut self.buffer);
        self.buffer.clone_from(&remainder);
        Some(Frame {
            text,
            saw_marker: true,
            remainder,
            stream_closed: false,
        })
    }

    fn take_incomplete(&mut self, stream_closed: bool) -> Frame {
        Frame {
            text: std::mem::take(&mut self.buffer),
            saw_marker: false,
            remainder: String::new(),
            stream_closed,
        }
    }
}
