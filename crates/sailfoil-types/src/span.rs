use serde::{Deserialize, Serialize};
use std::fmt;

/// A region of IR source text.
///
/// Lines and columns are 1-based. `end_column` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// A zero-width span at one position.
    pub fn point(line: u32, column: u32) -> Self {
        Self::new(line, column, line, column)
    }

    /// The smallest span starting at `self` and ending at `other`.
    ///
    /// Both spans are ordered by (line, column); the result covers whichever
    /// start is earlier and whichever end is later.
    pub fn to(self, other: Span) -> Span {
        let (line, column) = (self.line, self.column).min((other.line, other.column));
        let (end_line, end_column) =
            (self.end_line, self.end_column).max((other.end_line, other.end_column));
        Span::new(line, column, end_line, end_column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// IR source text plus a line index for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    /// Byte offset of the first character of each line.
    line_offsets: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut line_offsets = vec![0];
        line_offsets.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            name: name.into(),
            source,
            line_offsets,
        }
    }

    /// The text of a 1-based line, without its terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = (line_number as usize).checked_sub(1)?;
        let start = *self.line_offsets.get(idx)?;
        let end = match self.line_offsets.get(idx + 1) {
            Some(&next) => next - 1,
            None => self.source.len(),
        };
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_orders_positions() {
        let a = Span::new(3, 9, 3, 14);
        let b = Span::new(1, 2, 1, 4);
        let joined = a.to(b);
        assert_eq!(joined, Span::new(1, 2, 3, 14));
    }

    #[test]
    fn test_span_to_same_line() {
        let a = Span::new(2, 5, 2, 10);
        let b = Span::new(2, 3, 2, 8);
        assert_eq!(a.to(b), Span::new(2, 3, 2, 10));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(Span::new(12, 4, 12, 9).to_string(), "12:4");
    }

    #[test]
    fn test_span_serializes_with_column_names() {
        let json = serde_json::to_string(&Span::point(1, 2)).unwrap();
        assert_eq!(json, r#"{"line":1,"column":2,"end_line":1,"end_column":2}"#);
    }

    #[test]
    fn test_source_file_lines() {
        let src = SourceFile::new("t.ir", "enum zjump {\r\n  zJDONT\n}");
        assert_eq!(src.line_count(), 3);
        assert_eq!(src.line(1), Some("enum zjump {"));
        assert_eq!(src.line(2), Some("  zJDONT"));
        assert_eq!(src.line(3), Some("}"));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
    }

    #[test]
    fn test_source_file_trailing_newline() {
        let src = SourceFile::new("t.ir", "end;\n");
        assert_eq!(src.line_count(), 2);
        assert_eq!(src.line(2), Some(""));
    }
}
