//! Whitespace-insensitive structural comparison of canonical subtrees.
//!
//! Equivalence never looks at positions, parents, or tree identity, so it is
//! valid across unrelated trees. Tokens compare by kind and interpreted
//! value, never by raw text or trivia.

use crate::green::{GreenChild, GreenNode, GreenToken};
use crate::trivia::GreenTrivia;
use crate::{SyntaxKind, SyntaxSet};

/// The closed classification of body-introducing constructs whose contents
/// "top-level" comparison skips.
pub const EXECUTABLE_BODIES: SyntaxSet =
    SyntaxSet::new([SyntaxKind::BLOCK, SyntaxKind::INITIALIZER]);

/// Compares two subtrees; in top-level mode the contents of executable
/// bodies and initializers are ignored.
pub fn nodes_equivalent(a: &GreenNode, b: &GreenNode, top_level: bool) -> bool {
    nodes_equivalent_with(a, b, top_level, None)
}

/// Like [`nodes_equivalent`], with a predicate that additionally prunes
/// child nodes of specific kinds from the comparison on both sides.
pub fn nodes_equivalent_with(
    a: &GreenNode,
    b: &GreenNode,
    top_level: bool,
    ignore_child: Option<&dyn Fn(SyntaxKind) -> bool>,
) -> bool {
    if GreenNode::ptr_eq(a, b) {
        return true;
    }
    if a.kind() != b.kind() {
        return false;
    }
    if top_level && EXECUTABLE_BODIES.contains(a.kind()) {
        // Same body kind on both sides; what is inside does not matter.
        return true;
    }

    let keep = |child: &&GreenChild| match (ignore_child, child) {
        (Some(ignore), GreenChild::Node(node)) => !ignore(node.kind()),
        _ => true,
    };
    let mut left = a.children().iter().filter(keep);
    let mut right = b.children().iter().filter(keep);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) => match (x, y) {
                (GreenChild::Absent, GreenChild::Absent) => {}
                (GreenChild::Node(x), GreenChild::Node(y)) => {
                    if !nodes_equivalent_with(x, y, top_level, ignore_child) {
                        return false;
                    }
                }
                (GreenChild::Token(x), GreenChild::Token(y)) => {
                    if !tokens_equivalent(x, y) {
                        return false;
                    }
                }
                _ => return false,
            },
            _ => return false,
        }
    }
}

/// Compares two tokens by kind and interpreted value.
pub fn tokens_equivalent(a: &GreenToken, b: &GreenToken) -> bool {
    a.kind() == b.kind() && a.value() == b.value()
}

/// Compares two token sequences pairwise.
pub fn token_lists_equivalent(a: &[GreenToken], b: &[GreenToken]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| tokens_equivalent(x, y))
}

/// Compares two trivia lists: items match by kind, and directive items also
/// by the full equivalence of their nested syntax.
pub fn trivia_equivalent(a: &GreenTrivia, b: &GreenTrivia) -> bool {
    let (a, b) = (a.items(), b.items());
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.kind() == y.kind()
                && match (x.structure(), y.structure()) {
                    (None, None) => true,
                    (Some(x), Some(y)) => nodes_equivalent(x, y, false),
                    _ => false,
                }
        })
}

#[cfg(test)]
mod tests {
    use crate::green::TokenValue;
    use crate::GreenBuilder;

    use super::*;

    fn let_stmt(name: &str, value: &str) -> GreenNode {
        let mut builder = GreenBuilder::new();
        builder.start_node(SyntaxKind::LET_STMT);
        builder.token(GreenTrivia::empty(), SyntaxKind::LET_KW, "let", GreenTrivia::empty());
        builder.token(GreenTrivia::empty(), SyntaxKind::NAME, name, GreenTrivia::empty());
        builder.start_node(SyntaxKind::INITIALIZER);
        builder.token(GreenTrivia::empty(), SyntaxKind::EQ, "=", GreenTrivia::empty());
        builder.start_node(SyntaxKind::LITERAL);
        builder.token(GreenTrivia::empty(), SyntaxKind::NUMBER, value, GreenTrivia::empty());
        builder.finish_node();
        builder.finish_node();
        builder.finish_node();
        builder.finish()
    }

    #[test]
    fn reflexive_in_both_modes() {
        let node = let_stmt("x", "1");
        assert!(nodes_equivalent(&node, &node, false));
        assert!(nodes_equivalent(&node, &node, true));
    }

    #[test]
    fn value_mismatch_breaks_full_mode_only() {
        let a = let_stmt("x", "1");
        let b = let_stmt("x", "2");
        assert!(!nodes_equivalent(&a, &b, false));
        // The differing literal sits inside the initializer.
        assert!(nodes_equivalent(&a, &b, true));
        assert_eq!(nodes_equivalent(&a, &b, true), nodes_equivalent(&b, &a, true));
        assert_eq!(nodes_equivalent(&a, &b, false), nodes_equivalent(&b, &a, false));
    }

    #[test]
    fn name_mismatch_breaks_both_modes() {
        let a = let_stmt("x", "1");
        let b = let_stmt("y", "1");
        assert!(!nodes_equivalent(&a, &b, false));
        assert!(!nodes_equivalent(&a, &b, true));
    }

    #[test]
    fn interpreted_value_beats_raw_text() {
        let a = GreenToken::new(
            GreenTrivia::empty(),
            SyntaxKind::NUMBER,
            "0x10",
            TokenValue::Int(16),
            GreenTrivia::empty(),
        );
        let b = GreenToken::new(
            GreenTrivia::empty(),
            SyntaxKind::NUMBER,
            "16",
            TokenValue::Int(16),
            GreenTrivia::empty(),
        );
        assert!(tokens_equivalent(&a, &b));
    }

    #[test]
    fn ignore_predicate_prunes_children() {
        let mut builder = GreenBuilder::new();
        builder.start_node(SyntaxKind::MODULE);
        builder.node(let_stmt("x", "1"));
        builder.finish_node();
        let a = builder.finish();

        let mut builder = GreenBuilder::new();
        builder.start_node(SyntaxKind::MODULE);
        builder.finish_node();
        let b = builder.finish();

        assert!(!nodes_equivalent(&a, &b, false));
        let ignore = |kind: SyntaxKind| kind == SyntaxKind::LET_STMT;
        assert!(nodes_equivalent_with(&a, &b, false, Some(&ignore)));
    }

    #[test]
    fn absent_slots_must_match() {
        let mut builder = GreenBuilder::new();
        builder.start_node(SyntaxKind::PARAM);
        builder.token(GreenTrivia::empty(), SyntaxKind::NAME, "p", GreenTrivia::empty());
        builder.absent();
        builder.finish_node();
        let a = builder.finish();

        let mut builder = GreenBuilder::new();
        builder.start_node(SyntaxKind::PARAM);
        builder.token(GreenTrivia::empty(), SyntaxKind::NAME, "p", GreenTrivia::empty());
        builder.token(GreenTrivia::empty(), SyntaxKind::COLON, ":", GreenTrivia::empty());
        builder.finish_node();
        let b = builder.finish();

        assert!(!nodes_equivalent(&a, &b, false));
    }
}
