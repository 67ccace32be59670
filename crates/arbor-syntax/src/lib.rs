//! Positioned overlay over the canonical node store.
//!
//! Overlay nodes are materialized lazily, one per visited canonical node,
//! and bound to their owning tree at most once through a race-safe
//! first-write-wins protocol. Edits go through the replacement engine and
//! come back as new canonical roots sharing every untouched subtree.

/// Typed views over directive syntax.
pub mod ast;

mod arena;
mod directives;
mod edit;
mod node;
mod tree;

/// State answers of the directive/pragma index.
pub use directives::{DefineState, PragmaState};
/// The replacement engine's recoverable errors.
pub use edit::EditError;
/// Overlay handles and navigation.
pub use node::{
    ChildrenWithTokens, NodeOrToken, Preorder, SyntaxElement, SyntaxNode, SyntaxNodePtr,
    SyntaxToken, SyntaxTrivia, TokenAtOffset, TriviaIter, WalkEvent,
};
/// Tree records and the parse seam.
pub use tree::{ParseFn, ParseOptions, Reparse, SyntaxTree};

/// The canonical layer, re-exported for convenience.
pub use arbor_green::{
    Diagnostic, GreenBuilder, GreenChild, GreenNode, GreenToken, GreenTrivia, NodeFlags,
    SyntaxKind, SyntaxSet, TokenValue, TriviaItem, TriviaKind, equivalence,
};
/// Position utilities shared with clients.
pub use arbor_text::{ChangeRange, LineCol, LineIndex};
