//! Canonical nodes and tokens: immutable, position-free, freely shared.
//!
//! A canonical element never knows its position or parent. Edits allocate new
//! nodes along the rewritten path and share every untouched subtree by
//! reference, so one element may belong to arbitrarily many trees at once.

use std::fmt;
use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use text_size::TextSize;
use triomphe::{Arc, ThinArc};

use crate::trivia::GreenTrivia;
use crate::SyntaxKind;

bitflags! {
    /// Facts about a subtree, unioned bottom-up at construction.
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct NodeFlags: u8 {
        /// The subtree carries at least one diagnostic.
        const DIAGNOSTICS = 1 << 0;
        /// The subtree carries structural annotations.
        const ANNOTATIONS = 1 << 1;
        /// The subtree contains directive trivia.
        const DIRECTIVES = 1 << 2;
    }
}

/// A parse-time diagnostic attached to the element that produced it.
///
/// Inert data from this layer's point of view; enumeration walks only
/// flagged subtrees.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Diagnostic {
    message: Box<str>,
}

impl Diagnostic {
    pub fn new(message: impl Into<Box<str>>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The interpreted value of a token, as opposed to its raw text.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum TokenValue {
    #[default]
    None,
    Int(i64),
    Bool(bool),
    Str(Box<str>),
}

#[derive(Debug)]
struct GreenTokenData {
    kind: SyntaxKind,
    text: Box<str>,
    value: TokenValue,
    leading: GreenTrivia,
    trailing: GreenTrivia,
    flags: NodeFlags,
    diagnostics: Box<[Diagnostic]>,
}

/// Canonical leaf: kind, raw text, interpreted value, and attached trivia.
#[derive(Clone)]
pub struct GreenToken {
    data: Arc<GreenTokenData>,
}

impl GreenToken {
    pub fn new(
        leading: GreenTrivia,
        kind: SyntaxKind,
        text: impl Into<Box<str>>,
        value: TokenValue,
        trailing: GreenTrivia,
    ) -> Self {
        let flags = leading.flags() | trailing.flags();
        Self {
            data: Arc::new(GreenTokenData {
                kind,
                text: text.into(),
                value,
                leading,
                trailing,
                flags,
                diagnostics: Box::default(),
            }),
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.data.kind
    }

    /// Raw token text, excluding trivia.
    pub fn text(&self) -> &str {
        &self.data.text
    }

    pub fn value(&self) -> &TokenValue {
        &self.data.value
    }

    pub fn leading(&self) -> &GreenTrivia {
        &self.data.leading
    }

    pub fn trailing(&self) -> &GreenTrivia {
        &self.data.trailing
    }

    pub fn flags(&self) -> NodeFlags {
        self.data.flags
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.data.diagnostics
    }

    /// Token width excluding trivia.
    pub fn width(&self) -> TextSize {
        TextSize::of(&*self.data.text)
    }

    /// Token width including leading and trailing trivia.
    pub fn full_width(&self) -> TextSize {
        self.data.leading.len() + self.width() + self.data.trailing.len()
    }

    /// Returns the same token with different attached trivia.
    pub fn with_trivia(&self, leading: GreenTrivia, trailing: GreenTrivia) -> Self {
        let mut token = Self::new(
            leading,
            self.data.kind,
            self.data.text.clone(),
            self.data.value.clone(),
            trailing,
        );
        if !self.data.diagnostics.is_empty() {
            token = token.with_diagnostics(self.data.diagnostics.to_vec());
        }
        token
    }

    /// Returns the same token carrying the given diagnostics.
    pub fn with_diagnostics(&self, diagnostics: Vec<Diagnostic>) -> Self {
        let mut flags = self.data.leading.flags() | self.data.trailing.flags();
        if !diagnostics.is_empty() {
            flags |= NodeFlags::DIAGNOSTICS;
        }
        Self {
            data: Arc::new(GreenTokenData {
                kind: self.data.kind,
                text: self.data.text.clone(),
                value: self.data.value.clone(),
                leading: self.data.leading.clone(),
                trailing: self.data.trailing.clone(),
                flags,
                diagnostics: diagnostics.into_boxed_slice(),
            }),
        }
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }

    pub(crate) fn ptr(&self) -> *const () {
        Arc::as_ptr(&self.data).cast()
    }
}

impl PartialEq for GreenToken {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for GreenToken {}

impl Hash for GreenToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr().hash(state);
    }
}

impl fmt::Debug for GreenToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenToken")
            .field("kind", &self.kind())
            .field("text", &self.text())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for GreenToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.data.leading, self.data.text, self.data.trailing)
    }
}

/// One child slot of a canonical node.
///
/// `Absent` is a first-class marker: an optional grammar slot that is not
/// filled still occupies its position among the siblings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GreenChild {
    Node(GreenNode),
    Token(GreenToken),
    Absent,
}

impl GreenChild {
    pub fn full_width(&self) -> TextSize {
        match self {
            Self::Node(node) => node.full_width(),
            Self::Token(token) => token.full_width(),
            Self::Absent => TextSize::new(0),
        }
    }

    pub fn kind(&self) -> Option<SyntaxKind> {
        match self {
            Self::Node(node) => Some(node.kind()),
            Self::Token(token) => Some(token.kind()),
            Self::Absent => None,
        }
    }

    pub fn flags(&self) -> NodeFlags {
        match self {
            Self::Node(node) => node.flags(),
            Self::Token(token) => token.flags(),
            Self::Absent => NodeFlags::empty(),
        }
    }

    pub fn as_node(&self) -> Option<&GreenNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&GreenToken> {
        match self {
            Self::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for GreenChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => fmt::Display::fmt(node, f),
            Self::Token(token) => fmt::Display::fmt(token, f),
            Self::Absent => Ok(()),
        }
    }
}

#[derive(Debug, Eq, Hash, PartialEq)]
struct GreenNodeHead {
    kind: SyntaxKind,
    full_width: TextSize,
    flags: NodeFlags,
    diagnostics: Box<[Diagnostic]>,
}

/// Canonical interior node: kind tag plus ordered child slots.
#[derive(Clone)]
pub struct GreenNode {
    data: ThinArc<GreenNodeHead, GreenChild>,
}

impl GreenNode {
    pub fn new(kind: SyntaxKind, children: Vec<GreenChild>) -> Self {
        Self::with_diagnostics_impl(kind, children, Box::default())
    }

    fn with_diagnostics_impl(
        kind: SyntaxKind,
        children: Vec<GreenChild>,
        diagnostics: Box<[Diagnostic]>,
    ) -> Self {
        let full_width = children.iter().map(GreenChild::full_width).sum();
        let mut flags = children
            .iter()
            .fold(NodeFlags::empty(), |flags, child| flags | child.flags());
        if !diagnostics.is_empty() {
            flags |= NodeFlags::DIAGNOSTICS;
        }
        let head = GreenNodeHead { kind, full_width, flags, diagnostics };
        Self { data: ThinArc::from_header_and_iter(head, children.into_iter()) }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.data.header.header.kind
    }

    /// Width of the whole subtree, trivia included. Always equals the sum of
    /// the children's full widths.
    pub fn full_width(&self) -> TextSize {
        self.data.header.header.full_width
    }

    pub fn flags(&self) -> NodeFlags {
        self.data.header.header.flags
    }

    pub fn contains_diagnostics(&self) -> bool {
        self.flags().contains(NodeFlags::DIAGNOSTICS)
    }

    pub fn contains_directives(&self) -> bool {
        self.flags().contains(NodeFlags::DIRECTIVES)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.data.header.header.diagnostics
    }

    pub fn children(&self) -> &[GreenChild] {
        &self.data.slice
    }

    /// Returns the same node carrying the given diagnostics.
    pub fn with_diagnostics(&self, diagnostics: Vec<Diagnostic>) -> Self {
        Self::with_diagnostics_impl(
            self.kind(),
            self.children().to_vec(),
            diagnostics.into_boxed_slice(),
        )
    }

    /// First token of the subtree in source order, if any.
    pub fn first_token(&self) -> Option<&GreenToken> {
        self.children().iter().find_map(|child| match child {
            GreenChild::Token(token) => Some(token),
            GreenChild::Node(node) => node.first_token(),
            GreenChild::Absent => None,
        })
    }

    /// Last token of the subtree in source order, if any.
    pub fn last_token(&self) -> Option<&GreenToken> {
        self.children().iter().rev().find_map(|child| match child {
            GreenChild::Token(token) => Some(token),
            GreenChild::Node(node) => node.last_token(),
            GreenChild::Absent => None,
        })
    }

    /// Width of the leading trivia of the subtree's first token.
    pub fn leading_trivia_width(&self) -> TextSize {
        self.first_token().map_or_else(|| TextSize::new(0), |token| token.leading().len())
    }

    /// Width of the trailing trivia of the subtree's last token.
    pub fn trailing_trivia_width(&self) -> TextSize {
        self.last_token().map_or_else(|| TextSize::new(0), |token| token.trailing().len())
    }

    /// Subtree width with the outermost leading/trailing trivia trimmed away.
    pub fn width(&self) -> TextSize {
        self.full_width() - self.leading_trivia_width() - self.trailing_trivia_width()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        std::ptr::eq(a.ptr(), b.ptr())
    }

    pub(crate) fn ptr(&self) -> *const () {
        std::ptr::from_ref(&self.data.header.header).cast()
    }
}

impl PartialEq for GreenNode {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for GreenNode {}

impl Hash for GreenNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr().hash(state);
    }
}

impl fmt::Debug for GreenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenNode")
            .field("kind", &self.kind())
            .field("full_width", &self.full_width())
            .field("children", &self.children().len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for GreenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for child in self.children() {
            fmt::Display::fmt(child, f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::trivia::{TriviaItem, TriviaKind};

    use super::*;

    fn token(kind: SyntaxKind, text: &str) -> GreenToken {
        GreenToken::new(GreenTrivia::empty(), kind, text, TokenValue::None, GreenTrivia::empty())
    }

    #[test]
    fn full_width_sums_children() {
        let space = GreenTrivia::single(TriviaItem::new(TriviaKind::Whitespace, " "));
        let let_kw = GreenToken::new(
            GreenTrivia::empty(),
            SyntaxKind::LET_KW,
            "let",
            TokenValue::None,
            space,
        );
        let name = token(SyntaxKind::NAME, "x");
        let node = GreenNode::new(
            SyntaxKind::LET_STMT,
            vec![
                GreenChild::Token(let_kw),
                GreenChild::Token(name),
                GreenChild::Absent,
            ],
        );
        assert_eq!(node.full_width(), TextSize::new(5));
        assert_eq!(node.to_string(), "let x");
        assert_eq!(node.width(), TextSize::new(5));
    }

    #[test]
    fn trimmed_width_excludes_edge_trivia() {
        let leading = GreenTrivia::single(TriviaItem::new(TriviaKind::Whitespace, "  "));
        let trailing = GreenTrivia::single(TriviaItem::new(TriviaKind::Newline, "\n"));
        let name = GreenToken::new(leading, SyntaxKind::NAME, "main", TokenValue::None, trailing);
        let node = GreenNode::new(SyntaxKind::NAME_EXPR, vec![GreenChild::Token(name)]);
        assert_eq!(node.full_width(), TextSize::new(7));
        assert_eq!(node.width(), TextSize::new(4));
        assert_eq!(node.leading_trivia_width(), TextSize::new(2));
        assert_eq!(node.trailing_trivia_width(), TextSize::new(1));
    }

    #[test]
    fn diagnostics_flag_propagates_upward() {
        let bad = token(SyntaxKind::UNKNOWN, "?").with_diagnostics(vec![Diagnostic::new(
            "unexpected character",
        )]);
        let clean = token(SyntaxKind::NAME, "x");
        let node = GreenNode::new(
            SyntaxKind::ERROR,
            vec![GreenChild::Token(bad), GreenChild::Token(clean.clone())],
        );
        let module = GreenNode::new(
            SyntaxKind::MODULE,
            vec![GreenChild::Node(node), GreenChild::Token(clean)],
        );
        assert!(module.contains_diagnostics());
        assert!(!module.contains_directives());
    }

    #[test]
    fn sharing_is_by_reference() {
        let name = token(SyntaxKind::NAME, "shared");
        let a = GreenNode::new(SyntaxKind::NAME_EXPR, vec![GreenChild::Token(name.clone())]);
        let b = GreenNode::new(SyntaxKind::NAME_EXPR, vec![GreenChild::Token(name)]);
        assert!(!GreenNode::ptr_eq(&a, &b));
        assert!(GreenToken::ptr_eq(
            a.children()[0].as_token().unwrap(),
            b.children()[0].as_token().unwrap(),
        ));
    }
}
