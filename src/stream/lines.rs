//! Newline framing for streamed HTTP bodies (SSE and NDJSON).
//!
//! [`LineBuffer`] is the pure part: feed it raw body bytes in whatever pieces
//! the network delivers, read complete lines back.  Multi-byte UTF-8
//! sequences split across pieces are reassembled because decoding happens
//! only once a full line is present.
//!
//! [`HttpLineReader`] pulls body pieces from a `reqwest::Response` on demand
//! (`Response::chunk`): one network read per call at most, never ahead.
//!
//! A line longer than the configured limit is a [`StreamError::Malformed`];
//! the buffer never holds more than one over-long line's worth of bytes.

use crate::stream::StreamError;

/// Default upper bound on one line, terminator excluded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Longest error body kept from a failed response.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

// ---------------------------------------------------------------------------
// LineBuffer
// ---------------------------------------------------------------------------

/// Accumulates bytes and splits them into `\n`-terminated lines.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Bytes after the last `\n` in `pending`.
    tail_len: usize,
    max_line_bytes: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_limit(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            tail_len: 0,
            max_line_bytes: max_line_bytes.max(1),
        }
    }

    /// Append raw body bytes.  Fails, without buffering anything, when a
    /// line would grow past the limit.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        let mut run = self.tail_len;
        for &b in bytes {
            if b == b'\n' {
                run = 0;
            } else {
                run += 1;
                if run > self.max_line_bytes {
                    return Err(StreamError::Malformed(format!(
                        "line exceeds {} bytes",
                        self.max_line_bytes
                    )));
                }
            }
        }
        self.tail_len = run;
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    /// Take the next complete line, without its `\n` / `\r\n` terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Flush a trailing unterminated line at end of body.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        self.tail_len = 0;
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim_end_matches('\r');
        Some(text.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// HttpLineReader
// ---------------------------------------------------------------------------

/// Reads a streamed HTTP response body line by line.
pub struct HttpLineReader {
    response: reqwest::Response,
    buffer: LineBuffer,
    eof: bool,
}

impl HttpLineReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self::with_limit(response, DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_limit(response: reqwest::Response, max_line_bytes: usize) -> Self {
        Self {
            response,
            buffer: LineBuffer::with_limit(max_line_bytes),
            eof: false,
        }
    }

    /// Next line of the body, or `None` once the body is exhausted.
    pub async fn next_line(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(self.buffer.finish());
            }
            match self.response.chunk().await? {
                Some(bytes) => self.buffer.push(&bytes)?,
                None => self.eof = true,
            }
        }
    }
}

/// Status code and the start of the body of a non-success response.
pub async fn failure_body(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body.chars().take(MAX_ERROR_BODY_CHARS).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
