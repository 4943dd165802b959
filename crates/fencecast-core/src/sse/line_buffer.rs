/// Reassembles newline-terminated lines from arbitrarily split chunks.
///
/// Works on bytes and decodes only complete lines, so a multi-byte UTF-8
/// character split across two chunks is never mangled (`\n` cannot occur
/// inside a multi-byte sequence). A trailing `\r` is stripped from each line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    ///
    /// The trailing fragment after the last `\n` stays buffered for the
    /// next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(decode_line)
            .collect()
    }

    /// Drain the unterminated fragment at end of stream.
    ///
    /// Returns `None` when nothing (or only a bare `\r`) is pending. The
    /// returned line may be malformed; callers parse it best-effort.
    pub fn flush(&mut self) -> Option<String> {
        let pending = std::mem::take(&mut self.pending);
        let line = decode_line(&pending);
        if line.is_empty() { None } else { Some(line) }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
