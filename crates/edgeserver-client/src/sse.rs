use crate::config::DEFAULT_MAX_FRAME_BYTES;
use crate::errors::StreamError;
use crate::event::BotEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Incremental SSE framer. Bytes go in as they arrive on the wire; complete
/// frames (terminated by a blank line) come out. Lines may end in CR, LF or
/// CRLF, mixed freely within one stream.
pub(crate) struct SseDecoder {
    /// Unterminated tail of the current line.
    line: Vec<u8>,
    /// Set after a line ended in CR at a chunk boundary; a leading LF in the
    /// next chunk belongs to that terminator.
    skip_lf: bool,
    event: Option<String>,
    id: Option<String>,
    data: Vec<String>,
    /// Bytes consumed by the frame being assembled, terminators included.
    frame_len: usize,
    max_frame_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl SseDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            line: Vec::new(),
            skip_lf: false,
            event: None,
            id: None,
            data: Vec::new(),
            frame_len: 0,
            max_frame_bytes,
        }
    }

    /// Feeds one chunk, appending every frame it completes to `frames`.
    ///
    /// Fails once the frame being assembled grows past the size limit; frames
    /// completed earlier in the same chunk are still appended.
    pub fn push_chunk(
        &mut self,
        chunk: &[u8],
        frames: &mut Vec<SseFrame>,
    ) -> Result<(), StreamError> {
        let mut rest = chunk;
        if self.skip_lf && !rest.is_empty() {
            self.skip_lf = false;
            if let Some(tail) = rest.strip_prefix(b"\n") {
                self.frame_len += 1;
                rest = tail;
            }
        }
        while let Some(pos) = rest.iter().position(|b| *b == b'\n' || *b == b'\r') {
            self.line.extend_from_slice(&rest[..pos]);
            let mut terminator = 1;
            if rest[pos] == b'\r' {
                match rest.get(pos + 1) {
                    Some(b'\n') => terminator = 2,
                    Some(_) => {}
                    None => self.skip_lf = true,
                }
            }
            self.frame_len += self.line.len() + terminator;
            self.check_limit(0)?;
            rest = &rest[pos + terminator..];
            let line = std::mem::take(&mut self.line);
            if let Some(frame) = self.take_line(&line) {
                frames.push(frame);
            }
        }
        self.line.extend_from_slice(rest);
        self.check_limit(self.line.len())
    }

    /// Flushes a trailing frame the server did not terminate with a blank
    /// line before closing the connection.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.line);
        if !line.is_empty() {
            self.apply_field(&line);
        }
        self.skip_lf = false;
        self.dispatch()
    }

    fn check_limit(&self, pending: usize) -> Result<(), StreamError> {
        if self.frame_len + pending > self.max_frame_bytes {
            return Err(StreamError::transport(format!(
                "event exceeds the maximum frame size of {} bytes",
                self.max_frame_bytes
            )));
        }
        Ok(())
    }

    fn take_line(&mut self, line: &[u8]) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        self.apply_field(line);
        None
    }

    fn apply_field(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        if line.starts_with(':') {
            return;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, field_value(value)),
            None => (&*line, ""),
        };
        match name {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        self.frame_len = 0;
        let event = self.event.take();
        let id = self.id.take();
        let data = std::mem::take(&mut self.data);
        if event.is_none() && data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            id,
            data: data.join("\n"),
        })
    }
}

fn field_value(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

/// Decodes a frame's `data` as a [`BotEvent`]. Frames without data (keep-alives,
/// bare `event:` lines) yield `Ok(None)`.
pub(crate) fn decode_frame(frame: &SseFrame) -> Result<Option<BotEvent>, StreamError> {
    if frame.data.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&frame.data)
        .map(Some)
        .map_err(|e| StreamError::decode(format!("failed to unmarshal event: {e}")))
}
