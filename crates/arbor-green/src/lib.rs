//! Canonical node store: the context-free half of the syntax tree.
//!
//! Elements here are immutable, never know their position or parent, and are
//! shared by reference across arbitrarily many trees. The positioned overlay
//! built on top lives in `arbor-syntax`.

mod builder;
/// Structural equivalence over canonical subtrees.
pub mod equivalence;
mod green;
mod syntax_kind;
mod syntax_set;
mod trivia;

/// Event-driven construction of canonical trees.
pub use builder::GreenBuilder;
/// Canonical elements and per-subtree facts.
pub use green::{Diagnostic, GreenChild, GreenNode, GreenToken, NodeFlags, TokenValue};
/// Token and node kinds used throughout the tree.
pub use syntax_kind::SyntaxKind;
/// Compact set for grouping `SyntaxKind` values.
pub use syntax_set::SyntaxSet;
/// Trivia attached to token edges.
pub use trivia::{GreenTrivia, TriviaItem, TriviaKind};
