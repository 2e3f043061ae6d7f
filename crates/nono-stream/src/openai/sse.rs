//! Incremental `text/event-stream` decoding.

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One dispatched event-stream record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl Frame {
    /// Creates a frame with data only.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    /// Creates a frame carrying an explicit event name.
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }
}

#[derive(Default)]
struct PendingRecord {
    event: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
    malformed: bool,
}

/// Buffers raw body chunks and emits complete frames.
///
/// Lines may end in `\n`, `\r\n` or `\r`, and may be split anywhere across
/// chunks. A record containing a line that is not UTF-8 is dropped whole.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    pending: PendingRecord,
    bom_checked: bool,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        if !self.bom_checked {
            if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf) {
                return Vec::new();
            }
            if self.buf.starts_with(BOM) {
                self.buf.drain(..BOM.len());
            }
            self.bom_checked = true;
        }

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some((line_len, advance)) = find_line_end(&self.buf[consumed..]) {
            let line = &self.buf[consumed..consumed + line_len];
            if let Some(frame) = process_line(&mut self.pending, line) {
                frames.push(frame);
            }
            consumed += advance;
        }
        self.buf.drain(..consumed);
        frames
    }

    /// Returns true when bytes or fields of an undispatched record remain.
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
            || !self.pending.data_lines.is_empty()
            || self.pending.event.is_some()
    }

    /// Drops any incomplete trailing record at end of stream.
    pub fn finish(&mut self) {
        self.buf.clear();
        self.pending = PendingRecord::default();
    }
}

/// Returns `(line_len, bytes_to_consume)` for the first complete line.
fn find_line_end(buf: &[u8]) -> Option<(usize, usize)> {
    let pos = buf.iter().position(|&b| b == b'\n' || b == b'\r')?;
    if buf[pos] == b'\n' {
        return Some((pos, pos + 1));
    }
    // A trailing '\r' may be the first half of "\r\n".
    match buf.get(pos + 1) {
        Some(b'\n') => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
        None => None,
    }
}

fn process_line(pending: &mut PendingRecord, line: &[u8]) -> Option<Frame> {
    if line.is_empty() {
        return dispatch(pending);
    }
    let Ok(line) = std::str::from_utf8(line) else {
        pending.malformed = true;
        return None;
    };
    if line.starts_with(':') {
        return None;
    }
    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };
    match field {
        "event" => pending.event = Some(value.to_string()).filter(|v| !v.is_empty()),
        "data" => pending.data_lines.push(value.to_string()),
        "id" if !value.contains('\0') => pending.id = Some(value.to_string()),
        _ => {}
    }
    None
}

fn dispatch(pending: &mut PendingRecord) -> Option<Frame> {
    let record = std::mem::take(pending);
    if record.malformed || record.data_lines.is_empty() {
        return None;
    }
    Some(Frame {
        event: record.event,
        data: record.data_lines.join("\n"),
        id: record.id,
    })
}
