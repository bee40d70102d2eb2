//! Extraction of a tagged payload from streamed text

/// Accumulates streamed text and yields the body of the first complete `<tag>…</tag>`.
#[derive(Debug, Clone)]
pub struct TagExtractor {
    open: String,
    close: String,
    buffer: String,
    matched: Option<String>,
}

impl TagExtractor {
    pub fn new(tag: &str) -> Self {
        Self {
            open: format!("<{}>", tag),
            close: format!("</{}>", tag),
            buffer: String::new(),
            matched: None,
        }
    }

    /// Feed a chunk; returns the payload once the closing tag has been seen.
    /// Chunks after the first match are ignored.
    pub fn push(&mut self, chunk: &str) -> Option<&str> {
        if self.matched.is_none() {
            self.buffer.push_str(chunk);
            self.matched = self.scan();
        }
        self.matched.as_deref()
    }

    fn scan(&self) -> Option<String> {
        let start = self.buffer.find(&self.open)? + self.open.len();
        let end = self.buffer[start..].find(&self.close)? + start;
        Some(self.buffer[start..end].trim().to_string())
    }

    pub fn is_complete(&self) -> bool {
        self.matched.is_some()
    }

    /// Everything received so far
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// The payload if matched, otherwise the accumulated text
    pub fn finish(self) -> String {
        match self.matched {
            Some(payload) => payload,
            None => self.buffer.trim().to_string(),
        }
    }
}
