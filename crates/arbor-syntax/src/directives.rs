//! Position-indexed directive state.
//!
//! Both maps walk directive trivia once, in source order, threading a
//! cumulative state forward and recording a `(position, state)` breakpoint
//! at every state-changing directive. Queries binary-search the breakpoint
//! positions. The walk descends only into subtrees flagged as containing
//! directives, so the build is linear in the number of directives rather
//! than the size of the tree.

use std::sync::Arc;

use arbor_green::{GreenChild, GreenNode, GreenToken, GreenTrivia, SyntaxKind};
use rustc_hash::FxHashMap;
use text_size::TextSize;

/// Whether a directive explicitly defined or undefined a symbol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefineState {
    Defined,
    Undefined,
}

impl DefineState {
    pub fn is_defined(self) -> bool {
        matches!(self, Self::Defined)
    }
}

/// Warning-suppression state of one warning id at one position.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PragmaState {
    /// No pragma decided the id; the compilation default applies.
    #[default]
    Default,
    Disable,
    Restore,
}

type SymbolState = FxHashMap<Box<str>, DefineState>;

/// Sorted `(position, cumulative symbol state)` breakpoints.
pub(crate) struct DirectiveSymbolMap {
    breakpoints: Vec<(TextSize, Arc<SymbolState>)>,
}

impl DirectiveSymbolMap {
    pub(crate) fn build(root: &GreenNode) -> Self {
        let mut breakpoints: Vec<(TextSize, Arc<SymbolState>)> = Vec::new();
        let mut state = Arc::new(SymbolState::default());

        for_each_directive(root, &mut |offset, directive| {
            match directive.kind() {
                SyntaxKind::DEFINE_DIRECTIVE | SyntaxKind::UNDEF_DIRECTIVE => {
                    let Some(name) = directive_name(directive) else { return };
                    let define_state = if directive.kind() == SyntaxKind::DEFINE_DIRECTIVE {
                        DefineState::Defined
                    } else {
                        DefineState::Undefined
                    };
                    let mut next = (*state).clone();
                    next.insert(name.into(), define_state);
                    state = Arc::new(next);
                    push_breakpoint(&mut breakpoints, offset, state.clone());
                }
                // These close or re-open conditional regions: the cumulative
                // state is unchanged but the position becomes a breakpoint.
                SyntaxKind::ELIF_DIRECTIVE
                | SyntaxKind::ELSE_DIRECTIVE
                | SyntaxKind::ENDIF_DIRECTIVE => {
                    push_breakpoint(&mut breakpoints, offset, state.clone());
                }
                // An `if` alone contributes no symbol-state breakpoint.
                SyntaxKind::IF_DIRECTIVE | SyntaxKind::PRAGMA_DIRECTIVE => {}
                _ => {}
            }
        });

        Self { breakpoints }
    }

    /// The recorded state for `name` at `position`, or `None` when no
    /// directive before (or exactly at) `position` decided it.
    pub(crate) fn define_state(&self, name: &str, position: TextSize) -> Option<DefineState> {
        let state = state_at(&self.breakpoints, position)?;
        state.get(name).copied()
    }
}

#[derive(Clone, Debug, Default)]
struct WarningState {
    /// Catch-all set by an id-less `pragma warning`.
    general: PragmaState,
    by_id: FxHashMap<Box<str>, PragmaState>,
}

/// Sorted `(position, cumulative warning state)` breakpoints.
pub(crate) struct PragmaWarningMap {
    breakpoints: Vec<(TextSize, Arc<WarningState>)>,
}

impl PragmaWarningMap {
    pub(crate) fn build(root: &GreenNode) -> Self {
        let mut breakpoints: Vec<(TextSize, Arc<WarningState>)> = Vec::new();
        let mut state = Arc::new(WarningState::default());

        for_each_directive(root, &mut |offset, directive| {
            if directive.kind() != SyntaxKind::PRAGMA_DIRECTIVE {
                return;
            }
            let Some(action) = pragma_action(directive) else { return };
            let ids = pragma_ids(directive);
            let next = if ids.is_empty() {
                // An id-less pragma resets every individually tracked id.
                WarningState { general: action, by_id: FxHashMap::default() }
            } else {
                let mut next = (*state).clone();
                for id in ids {
                    next.by_id.insert(id, action);
                }
                next
            };
            state = Arc::new(next);
            push_breakpoint(&mut breakpoints, offset, state.clone());
        });

        Self { breakpoints }
    }

    pub(crate) fn state(&self, id: &str, position: TextSize) -> PragmaState {
        let Some(state) = state_at(&self.breakpoints, position) else {
            return PragmaState::Default;
        };
        state.by_id.get(id).copied().unwrap_or(state.general)
    }
}

fn push_breakpoint<S>(breakpoints: &mut Vec<(TextSize, Arc<S>)>, offset: TextSize, state: Arc<S>) {
    if let Some((last, _)) = breakpoints.last() {
        assert!(*last < offset, "directive breakpoints must be strictly increasing");
    }
    breakpoints.push((offset, state));
}

/// The breakpoint state governing `position`: an exact match wins, else the
/// nearest breakpoint at a smaller position, else nothing.
fn state_at<S>(breakpoints: &[(TextSize, Arc<S>)], position: TextSize) -> Option<&S> {
    let index = breakpoints.partition_point(|(offset, _)| *offset <= position);
    index.checked_sub(1).map(|index| &*breakpoints[index].1)
}

/// Calls `f` with the absolute start offset and syntax of every directive
/// trivia item, in source order, skipping directive-free subtrees.
fn for_each_directive(green: &GreenNode, f: &mut impl FnMut(TextSize, &GreenNode)) {
    fn walk(green: &GreenNode, offset: TextSize, f: &mut impl FnMut(TextSize, &GreenNode)) {
        if !green.contains_directives() {
            return;
        }
        let mut offset = offset;
        for child in green.children() {
            match child {
                GreenChild::Node(node) => walk(node, offset, f),
                GreenChild::Token(token) => {
                    let mut cursor = offset;
                    scan_trivia(token.leading(), &mut cursor, f);
                    cursor += token.width();
                    scan_trivia(token.trailing(), &mut cursor, f);
                }
                GreenChild::Absent => {}
            }
            offset += child.full_width();
        }
    }

    fn scan_trivia(
        trivia: &GreenTrivia,
        cursor: &mut TextSize,
        f: &mut impl FnMut(TextSize, &GreenNode),
    ) {
        for item in trivia.items() {
            if let Some(structure) = item.structure() {
                f(*cursor, structure);
            }
            *cursor += item.len();
        }
    }

    walk(green, TextSize::new(0), f);
}

fn tokens_of(green: &GreenNode) -> Vec<GreenToken> {
    fn walk(green: &GreenNode, out: &mut Vec<GreenToken>) {
        for child in green.children() {
            match child {
                GreenChild::Node(node) => walk(node, out),
                GreenChild::Token(token) => out.push(token.clone()),
                GreenChild::Absent => {}
            }
        }
    }
    let mut out = Vec::new();
    walk(green, &mut out);
    out
}

/// The symbol a `define`/`undef` (or `if`/`elif` condition) names.
pub(crate) fn directive_name(directive: &GreenNode) -> Option<Box<str>> {
    tokens_of(directive)
        .into_iter()
        .find(|token| token.kind() == SyntaxKind::NAME)
        .map(|token| token.text().into())
}

pub(crate) fn pragma_action(directive: &GreenNode) -> Option<PragmaState> {
    tokens_of(directive).into_iter().find_map(|token| match token.kind() {
        SyntaxKind::DISABLE_KW => Some(PragmaState::Disable),
        SyntaxKind::RESTORE_KW => Some(PragmaState::Restore),
        _ => None,
    })
}

pub(crate) fn pragma_ids(directive: &GreenNode) -> Vec<Box<str>> {
    tokens_of(directive)
        .into_iter()
        .filter(|token| matches!(token.kind(), SyntaxKind::NAME | SyntaxKind::NUMBER))
        .map(|token| token.text().into())
        .collect()
}
