//! Decoding of newline-delimited JSON completion streams.

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Fragment {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Accumulates `{response, done}` fragments from arbitrary byte chunks.
///
/// Fragments may be split anywhere, including inside a UTF-8 sequence.
/// Blank and unparseable lines are skipped. The text of the final
/// `done: true` fragment is not kept.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns true once the terminating fragment was seen.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        if self.done {
            return true;
        }
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.line(&line);
            if self.done {
                self.pending.clear();
                break;
            }
        }
        self.done
    }

    fn line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<Fragment>(line) {
            Ok(fragment) if fragment.done => self.done = true,
            Ok(fragment) => self.text.push_str(&fragment.response),
            Err(err) => debug!(error = %err, "skipping malformed stream line"),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Flush a trailing unterminated line and return the text.
    pub fn finish(mut self) -> String {
        if !self.done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.line(&rest);
        }
        self.text
    }
}

/// Pull a test body out of completion text.
///
/// Markdown fences (```` ```cpp ````, ```` ```c++ ````, ```` ``` ````) are
/// stripped; the result is accepted only if it contains `TEST` and `{`.
pub fn extract_test_body(text: &str) -> Option<String> {
    let body = match text.find("```") {
        Some(open) => {
            let after_fence = &text[open + 3..];
            let start = after_fence.find('\n').map(|n| n + 1).unwrap_or(after_fence.len());
            let inner = &after_fence[start..];
            match inner.find("```") {
                Some(close) => &inner[..close],
                None => inner,
            }
        }
        None => text,
    };
    let body = body.trim();
    if body.contains("TEST") && body.contains('{') {
        Some(body.to_string())
    } else {
        None
    }
}
