//! Newline framing for process output channels.

/// Splits a byte stream into newline-delimited frames.
///
/// Bytes are buffered until a `\n` arrives; a `\r` directly before the
/// delimiter is stripped with it. A fragment with no delimiter stays
/// buffered until more bytes arrive or [`LineFramer::finish`] flushes it
/// when the channel ends. Invalid UTF-8 is replaced, never dropped.
#[derive(Debug, Default)]
pub(crate) struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one chunk and return every frame it completes, in order.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            frames.push(String::from_utf8_lossy(&line).into_owned());
        }
        frames
    }

    /// Flush the trailing fragment, if any, as one final frame.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}
