//! Server-sent-events framing.
//!
//! The instruction stream arrives as raw bytes over a long-lived HTTP
//! response. [`FrameParser`] is fed chunks as they come in and yields one
//! [`SseEvent`] per complete frame; frames may be split across chunks at
//! any byte boundary, including inside a multi-byte UTF-8 character, so
//! the buffer stays bytes until a whole frame is available.

/// Largest partial frame the parser will buffer. A server that streams
/// this much without a blank-line delimiter is not speaking SSE; the
/// parser gives up so the caller can drop the connection.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("sse frame exceeded {MAX_FRAME_BYTES} bytes without a delimiter")]
pub struct FrameOverflow;

/// One decoded event: the joined `data:` payload of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub data: String,
}

/// Incremental SSE frame parser.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the stream, returning any events completed by it.
    ///
    /// An overflowing partial frame clears the buffer and returns an
    /// error; the parser is reusable afterwards, but the caller should
    /// treat the stream as broken and reconnect.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, FrameOverflow> {
        // CRLF-tolerant: the frame delimiter is a blank line either way.
        // 0x0D never occurs inside a multi-byte UTF-8 sequence, so it is
        // safe to strip at the byte level.
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_delimiter(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame)) {
                events.push(event);
            }
        }

        if self.buffer.len() > MAX_FRAME_BYTES {
            self.buffer.clear();
            return Err(FrameOverflow);
        }
        Ok(events)
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        if line.starts_with(':') {
            // Comment, typically a keep-alive.
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // Other fields (event, id, retry) carry nothing we dispatch on.
    }

    if data_lines.is_empty() {
        None
    } else {
        Some(SseEvent {
            data: data_lines.join("\n"),
        })
    }
}
