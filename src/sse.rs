//! Server-Sent Events (SSE) payload decoding
//!
//! Transport framing for streaming endpoints: buffers incoming bytes and
//! extracts complete `data:` payloads, tolerating events split across
//! chunks, multiple events per chunk, comment and `event:` lines, and a
//! final event without a trailing newline.

/// One decoded item from the SSE stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// Payload of a `data:` line
    Data(String),
    /// The `[DONE]` sentinel used by OpenAI-style endpoints
    Done,
}

/// Incremental SSE decoder
///
/// # Example
/// ```
/// use propstream::sse::{SseDecoder, SseItem};
///
/// let mut decoder = SseDecoder::new();
/// assert_eq!(
///     decoder.push(b"data: {\"text\":\"hi\"}\n\n"),
///     vec![SseItem::Data("{\"text\":\"hi\"}".to_string())]
/// );
///
/// // An event split across chunks stays buffered until complete
/// assert!(decoder.push(b"data: [DO").is_empty());
/// assert_eq!(decoder.push(b"NE]\n\n"), vec![SseItem::Done]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    /// Incomplete trailing UTF-8 sequence held over from the last chunk
    carry: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes and extract the items completed by them
    ///
    /// Incomplete lines remain buffered for the next `push()` or `finish()`.
    /// A multi-byte character split across chunks is buffered until its
    /// remaining bytes arrive; invalid bytes become U+FFFD rather than
    /// rejecting the stream.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.decode_bytes(bytes);

        let mut items = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            if let Some(item) = Self::decode_line(&line) {
                items.push(item);
            }
        }
        items
    }

    /// Flush any remaining buffered content
    ///
    /// Call when the stream ends to extract a final event that lacked a
    /// trailing newline.
    pub fn finish(&mut self) -> Vec<SseItem> {
        if !self.carry.is_empty() {
            // The stream ended mid-character
            self.carry.clear();
            self.buffer.push('\u{FFFD}');
        }
        std::mem::take(&mut self.buffer)
            .lines()
            .filter_map(Self::decode_line)
            .collect()
    }

    /// Append a chunk to the line buffer, carrying an incomplete trailing
    /// UTF-8 sequence over to the next chunk and replacing invalid bytes
    fn decode_bytes(&mut self, bytes: &[u8]) {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(bytes);

        let mut input = data.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    self.buffer
                        .push_str(std::str::from_utf8(valid).unwrap_or(""));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push('\u{FFFD}');
                            input = &rest[len..];
                        }
                        None => {
                            self.carry = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    fn decode_line(line: &str) -> Option<SseItem> {
        let line = line.trim();
        // Comments, `event:`/`id:` lines, and blank separators carry no payload
        let payload = line.strip_prefix("data:")?.trim();
        if payload == "[DONE]" {
            Some(SseItem::Done)
        } else {
            Some(SseItem::Data(payload.to_string()))
        }
    }
}
