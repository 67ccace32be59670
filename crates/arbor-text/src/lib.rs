//! Position and buffer utilities shared across the tree layers.

use text_size::{TextRange, TextSize};

/// A single edit correlating an old text with a new one: the replaced span
/// in the old text and the length of the replacement.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChangeRange {
    pub span: TextRange,
    pub new_length: TextSize,
}

impl ChangeRange {
    pub fn new(span: TextRange, new_length: TextSize) -> Self {
        Self { span, new_length }
    }

    /// The replacing span inside the new text.
    pub fn new_span(&self) -> TextRange {
        TextRange::at(self.span.start(), self.new_length)
    }

    /// Collapses a sequence of ranges over the same pair of texts into one
    /// range covering all of them.
    ///
    /// Returns `None` for an empty sequence.
    pub fn collapse(ranges: &[Self]) -> Option<Self> {
        let (first, rest) = ranges.split_first()?;
        let mut span = first.span;
        let mut new_end = first.new_span().end();
        for range in rest {
            span = span.cover(range.span);
            new_end = new_end.max(range.new_span().end());
        }
        Some(Self::new(span, new_end - span.start()))
    }
}

/// Computes the minimal single [`ChangeRange`] turning `old` into `new` by
/// trimming the common prefix and suffix.
///
/// Returns `None` when the texts are identical.
pub fn change_range(old: &str, new: &str) -> Option<ChangeRange> {
    if old == new {
        return None;
    }

    let prefix = old
        .bytes()
        .zip(new.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .bytes()
        .rev()
        .zip(new.bytes().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    // Back off to char boundaries so the span can be sliced.
    let mut start = prefix;
    while !old.is_char_boundary(start) {
        start -= 1;
    }
    let mut old_end = old.len() - suffix;
    while !old.is_char_boundary(old_end) {
        old_end += 1;
    }
    let new_len = new.len() - start - (old.len() - old_end);

    let span = TextRange::new(
        TextSize::new(start as u32),
        TextSize::new(old_end as u32),
    );
    Some(ChangeRange::new(span, TextSize::new(new_len as u32)))
}

/// Mapping from offsets to line/column positions for one text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineIndex {
    /// Start offset of every line; always begins with 0.
    line_starts: Box<[TextSize]>,
    len: TextSize,
}

/// Zero-based line and UTF-8 column.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::new(0)];
        for (pos, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(TextSize::new(pos as u32 + 1));
            }
        }
        Self {
            line_starts: line_starts.into_boxed_slice(),
            len: TextSize::of(text),
        }
    }

    pub fn len(&self) -> TextSize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == TextSize::new(0)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Start offset of the given zero-based line, if it exists.
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        self.line_starts.get(line as usize).copied()
    }

    /// Converts an offset within the indexed text to a line/column pair.
    #[track_caller]
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        assert!(offset <= self.len, "offset {offset:?} is past the end of the text");
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let col = offset - self.line_starts[line];
        LineCol { line: line as u32, col: col.into() }
    }

    /// Converts a line/column pair back to an offset.
    pub fn offset(&self, line_col: LineCol) -> Option<TextSize> {
        let start = self.line_start(line_col.line)?;
        let offset = start + TextSize::new(line_col.col);
        (offset <= self.len).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(TextSize::new(start), TextSize::new(end))
    }

    #[test]
    fn change_range_replaces_middle() {
        let change = change_range("fun main() {}", "fun other() {}").unwrap();
        assert_eq!(change.span, range(4, 8));
        assert_eq!(change.new_length, TextSize::new(5));
    }

    #[test]
    fn change_range_identical_texts() {
        assert_eq!(change_range("same", "same"), None);
    }

    #[test]
    fn change_range_pure_insertion() {
        let change = change_range("ab", "axyb").unwrap();
        assert_eq!(change.span, range(1, 1));
        assert_eq!(change.new_length, TextSize::new(2));
    }

    #[test]
    fn change_range_pure_deletion() {
        let change = change_range("axyb", "ab").unwrap();
        assert_eq!(change.span, range(1, 3));
        assert_eq!(change.new_length, TextSize::new(0));
    }

    #[test]
    fn line_index_round_trip() {
        let index = LineIndex::new("one\ntwo\n\nfour");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.line_col(TextSize::new(5)), LineCol { line: 1, col: 1 });
        assert_eq!(index.line_col(TextSize::new(8)), LineCol { line: 2, col: 0 });
        assert_eq!(
            index.offset(LineCol { line: 3, col: 2 }),
            Some(TextSize::new(11))
        );
        assert_eq!(index.offset(LineCol { line: 9, col: 0 }), None);
    }

    #[test]
    fn collapse_merges_ranges() {
        let collapsed = ChangeRange::collapse(&[
            ChangeRange::new(range(2, 4), TextSize::new(1)),
            ChangeRange::new(range(8, 10), TextSize::new(6)),
        ])
        .unwrap();
        assert_eq!(collapsed.span, range(2, 10));
        assert_eq!(collapsed.new_length, TextSize::new(12));
    }
}
