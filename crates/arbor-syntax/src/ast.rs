//! Typed views over directive syntax.

use arbor_green::SyntaxKind::{self, *};

use crate::node::{SyntaxElement, SyntaxNode, SyntaxToken};

/// A typed wrapper over a directive node.
pub trait DirectiveNode {
    fn cast(syntax: SyntaxNode) -> Option<Self>
    where
        Self: Sized;

    fn syntax(&self) -> &SyntaxNode;
}

fn first_token_of(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxToken> {
    node.children_with_tokens().find_map(|element| match element {
        SyntaxElement::Token(token) if token.kind() == kind => Some(token),
        _ => None,
    })
}

macro_rules! directive_node {
    ($name:ident, $kind:ident) => {
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub struct $name(SyntaxNode);

        impl DirectiveNode for $name {
            fn cast(syntax: SyntaxNode) -> Option<Self> {
                (syntax.kind() == $kind).then_some(Self(syntax))
            }

            fn syntax(&self) -> &SyntaxNode {
                &self.0
            }
        }
    };
}

directive_node!(IfDirective, IF_DIRECTIVE);
directive_node!(ElifDirective, ELIF_DIRECTIVE);
directive_node!(ElseDirective, ELSE_DIRECTIVE);
directive_node!(EndifDirective, ENDIF_DIRECTIVE);
directive_node!(DefineDirective, DEFINE_DIRECTIVE);
directive_node!(UndefDirective, UNDEF_DIRECTIVE);
directive_node!(PragmaDirective, PRAGMA_DIRECTIVE);

impl IfDirective {
    /// The condition symbol.
    pub fn condition(&self) -> Option<SyntaxToken> {
        first_token_of(&self.0, NAME)
    }
}

impl ElifDirective {
    pub fn condition(&self) -> Option<SyntaxToken> {
        first_token_of(&self.0, NAME)
    }
}

impl DefineDirective {
    pub fn name(&self) -> Option<SyntaxToken> {
        first_token_of(&self.0, NAME)
    }
}

impl UndefDirective {
    pub fn name(&self) -> Option<SyntaxToken> {
        first_token_of(&self.0, NAME)
    }
}

impl PragmaDirective {
    /// The `disable`/`restore` keyword.
    pub fn action(&self) -> Option<SyntaxToken> {
        self.0.children_with_tokens().find_map(|element| match element {
            SyntaxElement::Token(token)
                if matches!(token.kind(), DISABLE_KW | RESTORE_KW) =>
            {
                Some(token)
            }
            _ => None,
        })
    }

    /// The warning ids named by the pragma, in source order.
    pub fn ids(&self) -> impl Iterator<Item = SyntaxToken> + use<> {
        self.0.children_with_tokens().filter_map(|element| match element {
            SyntaxElement::Token(token) if matches!(token.kind(), NAME | NUMBER) => Some(token),
            _ => None,
        })
    }
}
