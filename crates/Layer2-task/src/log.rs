//! Job Output Buffer - bounded capture of process output
//!
//! Provides:
//! - Combined stdout/stderr capture in arrival order
//! - FIFO retention capped at a configurable line count
//! - Per-line byte cap with UTF-8 safe clipping
//! - A sticky truncation flag once any line has been evicted

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Prefix applied to stderr lines when rendered
pub const STDERR_PREFIX: &str = "[stderr] ";

/// Suffix appended to lines clipped at the byte cap
pub const CLIPPED_LINE_MARKER: &str = "…[line truncated]";

/// Buffer shared between the reader tasks and query paths
pub type SharedOutput = Arc<RwLock<OutputBuffer>>;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// A single captured line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLine {
    /// 1-based position in the job's full output
    pub line_number: usize,

    pub stream: OutputStream,

    pub content: String,

    pub timestamp: DateTime<Utc>,
}

impl OutputLine {
    /// Text as returned to clients; stderr lines carry a prefix
    pub fn render(&self) -> String {
        match self.stream {
            OutputStream::Stdout => self.content.clone(),
            OutputStream::Stderr => format!("{}{}", STDERR_PREFIX, self.content),
        }
    }
}

/// Point-in-time copy of a buffer's tail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSnapshot {
    /// Rendered lines, oldest first
    pub lines: Vec<String>,

    /// Lines written since the job started, including evicted ones
    pub total_lines: usize,

    /// Lines currently held in memory
    pub retained_lines: usize,

    /// True once at least one line has been evicted
    pub truncated: bool,
}

/// Bounded output buffer for a single job
#[derive(Debug)]
pub struct OutputBuffer {
    lines: VecDeque<OutputLine>,

    max_lines: usize,

    max_line_bytes: usize,

    /// Total lines ever pushed
    line_count: usize,

    truncated: bool,
}

impl OutputBuffer {
    pub fn new(max_lines: usize, max_line_bytes: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines,
            max_line_bytes: max_line_bytes.max(1),
            line_count: 0,
            truncated: false,
        }
    }

    pub fn shared(max_lines: usize, max_line_bytes: usize) -> SharedOutput {
        Arc::new(RwLock::new(Self::new(max_lines, max_line_bytes)))
    }

    /// Append a line, evicting the oldest when full. Returns its line number.
    pub fn push(&mut self, stream: OutputStream, content: impl Into<String>) -> usize {
        let content = clip_line(content.into(), self.max_line_bytes);

        self.line_count += 1;
        self.lines.push_back(OutputLine {
            line_number: self.line_count,
            stream,
            content,
            timestamp: Utc::now(),
        });

        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
            self.truncated = true;
        }

        self.line_count
    }

    pub fn push_stdout(&mut self, content: impl Into<String>) -> usize {
        self.push(OutputStream::Stdout, content)
    }

    pub fn push_stderr(&mut self, content: impl Into<String>) -> usize {
        self.push(OutputStream::Stderr, content)
    }

    /// Retained lines, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &OutputLine> {
        self.lines.iter()
    }

    /// At most `n` most recent lines, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &OutputLine> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip)
    }

    /// Copy the tail, limited to `max_lines` when given
    pub fn snapshot(&self, max_lines: Option<usize>) -> OutputSnapshot {
        let take = max_lines.unwrap_or(self.lines.len());
        OutputSnapshot {
            lines: self.tail(take).map(OutputLine::render).collect(),
            total_lines: self.line_count,
            retained_lines: self.lines.len(),
            truncated: self.truncated,
        }
    }

    pub fn total_lines(&self) -> usize {
        self.line_count
    }

    pub fn retained(&self) -> usize {
        self.lines.len()
    }

    /// Number of lines dropped from the front
    pub fn evicted(&self) -> usize {
        self.line_count - self.lines.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn capacity(&self) -> usize {
        self.max_lines
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }
}

/// Cut `line` to at most `max_bytes` on a char boundary and mark it
fn clip_line(mut line: String, max_bytes: usize) -> String {
    if line.len() <= max_bytes {
        return line;
    }
    let mut cut = max_bytes;
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    line.truncate(cut);
    line.push_str(CLIPPED_LINE_MARKER);
    line
}
