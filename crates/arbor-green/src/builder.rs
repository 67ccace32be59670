//! Event-driven construction of canonical trees.

use crate::green::{GreenChild, GreenNode, GreenToken, TokenValue};
use crate::trivia::GreenTrivia;
use crate::SyntaxKind;

/// Builds a [`GreenNode`] from start/finish events, parser style.
pub struct GreenBuilder {
    stack: Vec<(SyntaxKind, Vec<GreenChild>)>,
    root: Option<GreenNode>,
}

impl Default for GreenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GreenBuilder {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.stack.is_empty() {
            panic!("you should call `GreenBuilder::finish()`");
        }
    }
}

impl GreenBuilder {
    pub fn new() -> Self {
        Self { stack: Vec::with_capacity(16), root: None }
    }

    /// Starts a new node of the given kind.
    #[track_caller]
    pub fn start_node(&mut self, kind: SyntaxKind) {
        assert!(self.root.is_none(), "the root node is already finished");
        self.stack.push((kind, Vec::new()));
    }

    /// Finishes the most recently started node.
    #[track_caller]
    pub fn finish_node(&mut self) {
        let (kind, children) = self.stack.pop().expect("no started node to finish");
        let node = GreenNode::new(kind, children);
        self.push_child(GreenChild::Node(node));
    }

    /// Starts a child list under the current node.
    #[track_caller]
    pub fn start_list(&mut self) {
        assert!(!self.stack.is_empty(), "a list needs an enclosing node");
        self.start_node(SyntaxKind::LIST);
    }

    /// Finishes the most recently started list.
    #[track_caller]
    pub fn finish_list(&mut self) {
        assert!(
            self.stack.last().is_some_and(|(kind, _)| *kind == SyntaxKind::LIST),
            "expected an open list"
        );
        self.finish_node();
    }

    /// Records an unfilled optional slot.
    #[track_caller]
    pub fn absent(&mut self) {
        self.push_child(GreenChild::Absent);
    }

    /// Adds a token with its leading and trailing trivia. The interpreted
    /// value is derived from the kind and text.
    #[track_caller]
    pub fn token(
        &mut self,
        leading: GreenTrivia,
        kind: SyntaxKind,
        text: &str,
        trailing: GreenTrivia,
    ) {
        let value = default_value(kind, text);
        self.token_with_value(leading, kind, text, value, trailing);
    }

    /// Adds a token with an explicit interpreted value.
    #[track_caller]
    pub fn token_with_value(
        &mut self,
        leading: GreenTrivia,
        kind: SyntaxKind,
        text: &str,
        value: TokenValue,
        trailing: GreenTrivia,
    ) {
        let token = GreenToken::new(leading, kind, text, value, trailing);
        self.push_child(GreenChild::Token(token));
    }

    /// Adds an already built subtree, shared by reference.
    #[track_caller]
    pub fn node(&mut self, node: GreenNode) {
        self.push_child(GreenChild::Node(node));
    }

    /// Adds an already built token, shared by reference.
    #[track_caller]
    pub fn green_token(&mut self, token: GreenToken) {
        self.push_child(GreenChild::Token(token));
    }

    #[track_caller]
    fn push_child(&mut self, child: GreenChild) {
        match self.stack.last_mut() {
            Some((_, children)) => children.push(child),
            None => match child {
                GreenChild::Node(node) => {
                    assert!(self.root.is_none(), "the root node is already finished");
                    self.root = Some(node);
                }
                _ => panic!("only a node can finish at the top level"),
            },
        }
    }

    /// Finishes building and returns the canonical root.
    #[track_caller]
    pub fn finish(mut self) -> GreenNode {
        assert!(self.stack.is_empty(), "unfinished nodes remain");
        self.root.take().expect("no root node was built")
    }
}

fn default_value(kind: SyntaxKind, text: &str) -> TokenValue {
    match kind {
        SyntaxKind::NAME | SyntaxKind::STRING => TokenValue::Str(text.into()),
        SyntaxKind::NUMBER => text.parse().map_or(TokenValue::None, TokenValue::Int),
        SyntaxKind::TRUE_KW => TokenValue::Bool(true),
        SyntaxKind::FALSE_KW => TokenValue::Bool(false),
        _ => TokenValue::None,
    }
}

#[cfg(test)]
mod tests {
    use text_size::TextSize;

    use super::*;

    #[test]
    fn builds_nested_nodes() {
        let mut builder = GreenBuilder::new();
        builder.start_node(SyntaxKind::MODULE);
        builder.start_node(SyntaxKind::LET_STMT);
        builder.token(GreenTrivia::empty(), SyntaxKind::LET_KW, "let", GreenTrivia::empty());
        builder.token(GreenTrivia::empty(), SyntaxKind::NAME, "x", GreenTrivia::empty());
        builder.absent();
        builder.finish_node();
        builder.finish_node();

        let root = builder.finish();
        assert_eq!(root.kind(), SyntaxKind::MODULE);
        assert_eq!(root.full_width(), TextSize::new(4));
        let stmt = root.children()[0].as_node().unwrap();
        assert_eq!(stmt.children().len(), 3);
        assert!(stmt.children()[2].is_absent());
    }

    #[test]
    fn derives_token_values() {
        assert_eq!(default_value(SyntaxKind::NUMBER, "42"), TokenValue::Int(42));
        assert_eq!(default_value(SyntaxKind::TRUE_KW, "true"), TokenValue::Bool(true));
        assert_eq!(default_value(SyntaxKind::NAME, "x"), TokenValue::Str("x".into()));
        assert_eq!(default_value(SyntaxKind::COMMA, ","), TokenValue::None);
    }

    #[test]
    #[should_panic(expected = "unfinished nodes remain")]
    fn unbalanced_builder_panics() {
        let mut builder = GreenBuilder::new();
        builder.start_node(SyntaxKind::MODULE);
        let _ = builder.finish();
    }
}
