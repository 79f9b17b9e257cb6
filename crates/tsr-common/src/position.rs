//! Line/column mapping for diagnostics display.

use crate::span::Span;

/// A zero-based line/column pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets to line/column positions.
///
/// Built once per source text; lookup is a binary search over line-start
/// offsets.
#[derive(Clone, Debug)]
pub struct LineMap {
    line_starts: Vec<u32>,
}

impl LineMap {
    /// Build a line map from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        LineMap { line_starts }
    }

    /// Convert a byte offset to a line/column position.
    pub fn line_col(&self, offset: u32) -> LineCol {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        LineCol {
            line: line as u32,
            column: offset - self.line_starts[line],
        }
    }

    /// Convert the start of a span to a line/column position.
    pub fn span_start(&self, span: Span) -> LineCol {
        self.line_col(span.start)
    }

    /// Number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_offsets_across_lines() {
        let map = LineMap::new("ab\ncd\n\nef");
        assert_eq!(map.line_col(0), LineCol { line: 0, column: 0 });
        assert_eq!(map.line_col(1), LineCol { line: 0, column: 1 });
        assert_eq!(map.line_col(3), LineCol { line: 1, column: 0 });
        assert_eq!(map.line_col(6), LineCol { line: 2, column: 0 });
        assert_eq!(map.line_col(8), LineCol { line: 3, column: 1 });
        assert_eq!(map.line_count(), 4);
    }
}
