//! Newline index with LF/CRLF-robust line spans.
//!
//! One pass over the bytes records every '\n'; line numbers are 1-based
//! externally. Spans exclude the trailing '\r' of CRLF lines so that
//! hashing a span never sees carriage returns.

use memchr::memchr_iter;

#[derive(Debug, Clone)]
pub struct NewlineIndex {
    /// Total buffer length in bytes.
    len: usize,
    /// Byte positions of every '\n'.
    nl_positions: Vec<usize>,
}

impl NewlineIndex {
    pub fn build(bytes: &[u8]) -> Self {
        let mut nl_positions = Vec::with_capacity(bytes.len() / 48);
        nl_positions.extend(memchr_iter(b'\n', bytes));
        Self {
            len: bytes.len(),
            nl_positions,
        }
    }

    /// Logical line count. Empty buffer => 0; a trailing '\n' yields an
    /// additional empty last line.
    pub fn line_count(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            self.nl_positions.len() + 1
        }
    }

    /// Byte span `(start, end)` of a 1-based line, end exclusive and
    /// excluding the line terminator ('\r\n' or '\n').
    pub fn span_of_line(&self, line1: usize, bytes: &[u8]) -> Option<(usize, usize)> {
        debug_assert_eq!(bytes.len(), self.len);

        let total = self.line_count();
        if line1 == 0 || line1 > total {
            return None;
        }

        let start = if line1 == 1 {
            0
        } else {
            self.nl_positions[line1 - 2] + 1
        };

        let end = if line1 <= self.nl_positions.len() {
            let nl = self.nl_positions[line1 - 1];
            if nl > 0 && bytes.get(nl - 1) == Some(&b'\r') {
                nl - 1
            } else {
                nl
            }
        } else {
            // Last line without trailing '\n' runs to EOF.
            self.len
        };

        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &str) -> Vec<&str> {
        let idx = NewlineIndex::build(text.as_bytes());
        (1..=idx.line_count())
            .map(|l| {
                let (s, e) = idx.span_of_line(l, text.as_bytes()).unwrap();
                &text[s..e]
            })
            .collect()
    }

    #[test]
    fn lf_lines() {
        assert_eq!(spans("a\nbb\nccc"), vec!["a", "bb", "ccc"]);
    }

    #[test]
    fn crlf_lines_exclude_carriage_return() {
        assert_eq!(spans("a\r\nbb\r\n"), vec!["a", "bb", ""]);
    }

    #[test]
    fn empty_and_out_of_range() {
        let idx = NewlineIndex::build(b"");
        assert_eq!(idx.line_count(), 0);
        assert_eq!(idx.span_of_line(1, b""), None);

        let idx = NewlineIndex::build(b"x");
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.span_of_line(0, b"x"), None);
        assert_eq!(idx.span_of_line(2, b"x"), None);
    }
}
