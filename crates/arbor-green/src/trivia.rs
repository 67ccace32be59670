//! Trivia attached to the leading and trailing edges of tokens.

use std::fmt;

use text_size::TextSize;
use triomphe::ThinArc;

use crate::green::{GreenNode, NodeFlags};

/// Kinds of non-semantic fragments carried by tokens.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TriviaKind {
    Whitespace,
    Newline,
    LineComment,
    DocComment,
    Directive,
    DisabledText,
}

impl TriviaKind {
    pub fn is_whitespace(self) -> bool {
        matches!(self, Self::Whitespace | Self::Newline)
    }

    pub fn is_comment(self) -> bool {
        matches!(self, Self::LineComment | Self::DocComment)
    }

    pub fn is_directive(self) -> bool {
        matches!(self, Self::Directive)
    }
}

/// One trivia fragment: raw text plus, for directives, the directive's own
/// syntax as a nested canonical node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TriviaItem {
    kind: TriviaKind,
    text: Box<str>,
    structure: Option<GreenNode>,
}

impl TriviaItem {
    /// Creates a plain trivia fragment.
    ///
    /// Directive trivia must go through [`TriviaItem::directive`] so the raw
    /// text and the nested syntax cannot drift apart.
    pub fn new(kind: TriviaKind, text: impl Into<Box<str>>) -> Self {
        assert!(
            !kind.is_directive(),
            "directive trivia carries structure; use TriviaItem::directive"
        );
        Self { kind, text: text.into(), structure: None }
    }

    /// Creates a directive trivia fragment owning the directive's syntax.
    /// The raw text is derived from the structure.
    pub fn directive(structure: GreenNode) -> Self {
        assert!(structure.kind().is_directive(), "expected a directive node");
        let text = structure.to_string().into_boxed_str();
        Self { kind: TriviaKind::Directive, text, structure: Some(structure) }
    }

    pub fn kind(&self) -> TriviaKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> TextSize {
        TextSize::of(&*self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The nested directive syntax, if this item is a directive.
    pub fn structure(&self) -> Option<&GreenNode> {
        self.structure.as_ref()
    }

    pub(crate) fn flags(&self) -> NodeFlags {
        match &self.structure {
            Some(structure) => structure.flags() | NodeFlags::DIRECTIVES,
            None => NodeFlags::empty(),
        }
    }
}

/// Immutable, shared list of trivia items with a precomputed total width.
#[derive(Clone, Eq, PartialEq)]
pub struct GreenTrivia {
    ptr: Option<ThinArc<TextSize, TriviaItem>>,
}

impl GreenTrivia {
    pub const fn empty() -> Self {
        Self { ptr: None }
    }

    pub fn new(items: Vec<TriviaItem>) -> Self {
        if items.is_empty() {
            return Self::empty();
        }
        let total_len = items.iter().map(TriviaItem::len).sum();
        Self { ptr: Some(ThinArc::from_header_and_iter(total_len, items.into_iter())) }
    }

    pub fn single(item: TriviaItem) -> Self {
        Self::new(vec![item])
    }

    pub fn len(&self) -> TextSize {
        match &self.ptr {
            None => TextSize::new(0),
            Some(ptr) => ptr.header.header,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn items(&self) -> &[TriviaItem] {
        match &self.ptr {
            None => &[],
            Some(ptr) => &ptr.slice,
        }
    }

    pub(crate) fn flags(&self) -> NodeFlags {
        self.items()
            .iter()
            .fold(NodeFlags::empty(), |flags, item| flags | item.flags())
    }
}

impl fmt::Debug for GreenTrivia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenTrivia")
            .field("items", &self.items())
            .field("total_len", &self.len())
            .finish()
    }
}

impl fmt::Display for GreenTrivia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in self.items() {
            f.write_str(item.text())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitespace(text: &str) -> TriviaItem {
        TriviaItem::new(TriviaKind::Whitespace, text)
    }

    #[test]
    fn total_width_sums_items() {
        let trivia = GreenTrivia::new(vec![
            whitespace("  "),
            TriviaItem::new(TriviaKind::LineComment, "// note"),
            TriviaItem::new(TriviaKind::Newline, "\n"),
        ]);
        assert_eq!(trivia.len(), TextSize::new(10));
        assert_eq!(trivia.items().len(), 3);
        assert_eq!(trivia.to_string(), "  // note\n");
    }

    #[test]
    fn empty_trivia_has_no_items() {
        let trivia = GreenTrivia::empty();
        assert!(trivia.is_empty());
        assert_eq!(trivia.len(), TextSize::new(0));
        assert!(trivia.items().is_empty());
    }
}
