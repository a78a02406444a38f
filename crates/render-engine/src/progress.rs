//! Transcoder stderr handling: `time=` markers and diagnostic excerpts.

use std::collections::VecDeque;

/// Lines kept for a failure diagnostic.
pub const DIAGNOSTIC_MAX_LINES: usize = 20;

/// Characters kept for a failure diagnostic.
pub const DIAGNOSTIC_MAX_CHARS: usize = 2000;

/// Longest unterminated line buffered before it is emitted as-is.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Extract the elapsed output time from a transcoder status line such as
/// `frame=  120 fps= 60 q=28.0 size=  512kB time=00:00:04.00 bitrate=...`.
///
/// Returns `None` for lines without a parseable marker (`time=N/A`,
/// negative times, banner output).
pub fn parse_time_marker(line: &str) -> Option<f64> {
    let (_, rest) = line.rsplit_once("time=")?;
    let value = rest.split_whitespace().next()?;
    parse_timestamp(value)
}

/// Parse `HH:MM:SS(.fraction)` into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// `min(100, 100 * elapsed / total)`; `None` when there is no usable total.
pub fn progress_percent(elapsed_secs: f64, total_secs: f64) -> Option<f64> {
    if !total_secs.is_finite() || total_secs <= 0.0 || !elapsed_secs.is_finite() {
        return None;
    }
    Some((100.0 * elapsed_secs / total_secs).clamp(0.0, 100.0))
}

/// Splits a byte stream into lines on `\n` or `\r`. Transcoders rewrite
/// their status line in place with bare carriage returns.
///
/// A run of `max_line_bytes` bytes without a terminator is cut and
/// emitted, so a child that never writes a newline cannot grow the buffer
/// without bound.
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max_line_bytes: usize,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }
}

impl LineSplitter {
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes: max_line_bytes.max(1),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
                if self.pending.len() >= self.max_line_bytes {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            }
        }
        lines
    }

    /// Flush a trailing line with no terminator.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Rolling window of the last stderr lines, rendered as a bounded excerpt.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl Default for DiagnosticTail {
    fn default() -> Self {
        Self::new(DIAGNOSTIC_MAX_LINES)
    }
}

impl DiagnosticTail {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines),
            max_lines,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return;
        }
        if self.lines.len() == self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(trimmed.to_string());
    }

    /// Joined lines, keeping only the last [`DIAGNOSTIC_MAX_CHARS`].
    pub fn render(&self) -> String {
        let joined = self.lines.iter().cloned().collect::<Vec<_>>().join("\n");
        truncate_tail(&joined, DIAGNOSTIC_MAX_CHARS)
    }
}

/// Keep the last `max_chars` characters of `text`.
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}
