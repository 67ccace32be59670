//! Tree records: source identity, parse options, and derived caches.
//!
//! A tree never mutates in place. Every cache is a set-once slot recomputed
//! from immutable canonical data, so racing writers are harmless; a new tree
//! always starts with cold caches.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use arbor_green::{Diagnostic, GreenChild, GreenNode, GreenTrivia};
use arbor_text::{ChangeRange, LineIndex};
use camino::{Utf8Path, Utf8PathBuf};
use text_size::{TextRange, TextSize};

use crate::arena::Arena;
use crate::directives::{DirectiveSymbolMap, PragmaState, PragmaWarningMap};
use crate::node::SyntaxNode;

/// Compilation-level options the tree was parsed under.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParseOptions {
    /// Preprocessor symbols defined for the whole compilation; the fallback
    /// when no directive in the tree decides a symbol.
    pub preprocessor_symbols: Vec<String>,
}

impl ParseOptions {
    pub fn with_symbols<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        Self { preprocessor_symbols: symbols.into_iter().map(Into::into).collect() }
    }
}

/// Previous-tree input for an incremental re-parse.
#[derive(Clone, Copy)]
pub struct Reparse<'a> {
    pub old_root: &'a GreenNode,
    pub changes: &'a [ChangeRange],
}

/// The opaque parser collaborator: text and options in, canonical root out.
/// With a [`Reparse`] it may reuse canonical subtrees outside the changed
/// ranges.
pub type ParseFn = Arc<dyn Fn(&str, &ParseOptions, Option<Reparse<'_>>) -> GreenNode + Send + Sync>;

struct TreeData {
    text: Option<Box<str>>,
    options: ParseOptions,
    path: Utf8PathBuf,
    green_root: GreenNode,
    parse: Option<ParseFn>,
    /// Weakly cached overlay root. Overlay nodes are reclaimable
    /// independently of canonical data; when all handles are gone the root
    /// is materialized afresh on the next request.
    root: Mutex<Weak<Arena>>,
    directive_map: OnceLock<DirectiveSymbolMap>,
    pragma_map: OnceLock<PragmaWarningMap>,
    line_index: OnceLock<LineIndex>,
}

/// A parsed source tree: shared, immutable, cheap to clone.
pub struct SyntaxTree {
    data: Arc<TreeData>,
}

impl Clone for SyntaxTree {
    fn clone(&self) -> Self {
        Self { data: Arc::clone(&self.data) }
    }
}

impl PartialEq for SyntaxTree {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for SyntaxTree {}

impl Hash for SyntaxTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.data).hash(state);
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("path", &self.data.path)
            .field("full_width", &self.data.green_root.full_width())
            .finish_non_exhaustive()
    }
}

impl SyntaxTree {
    /// Parses `text` through the supplied parser and retains both.
    pub fn parse(
        text: &str,
        options: ParseOptions,
        path: Utf8PathBuf,
        parse: ParseFn,
    ) -> Self {
        let green_root = parse(text, &options, None);
        tracing::debug!(path = %path, len = text.len(), "parsed syntax tree");
        Self::build(Some(text.into()), options, path, green_root, Some(parse))
    }

    /// Wraps an externally produced canonical root. The tree retains no
    /// text and cannot re-parse.
    pub fn from_root(green_root: GreenNode, options: ParseOptions, path: Utf8PathBuf) -> Self {
        Self::build(None, options, path, green_root, None)
    }

    /// Installs a tree over a detached overlay root discovered by the
    /// ownership walk.
    pub(crate) fn new_detached(root: &SyntaxNode) -> Self {
        tracing::trace!(kind = ?root.kind(), "installing tree for a detached root");
        let tree = Self::build(
            None,
            ParseOptions::default(),
            Utf8PathBuf::new(),
            root.green().clone(),
            None,
        );
        *tree.data.root.lock().unwrap_or_else(PoisonError::into_inner) =
            Arc::downgrade(root.arena());
        tree
    }

    fn build(
        text: Option<Box<str>>,
        options: ParseOptions,
        path: Utf8PathBuf,
        green_root: GreenNode,
        parse: Option<ParseFn>,
    ) -> Self {
        Self {
            data: Arc::new(TreeData {
                text,
                options,
                path,
                green_root,
                parse,
                root: Mutex::new(Weak::new()),
                directive_map: OnceLock::new(),
                pragma_map: OnceLock::new(),
                line_index: OnceLock::new(),
            }),
        }
    }

    /// The overlay root, materialized from the canonical root on first call.
    /// Blocks a racing caller for the duration of the materialization.
    pub fn root(&self) -> SyntaxNode {
        let mut cache = self.data.root.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(arena) = cache.upgrade() {
            return SyntaxNode::from_arena_root(arena);
        }
        let root = SyntaxNode::new_root_with_tree(self.data.green_root.clone(), self.clone());
        *cache = Arc::downgrade(root.arena());
        root
    }

    /// Non-blocking twin of [`SyntaxTree::root`]: returns the overlay root
    /// only if it is already materialized and uncontended.
    pub fn try_root(&self) -> Option<SyntaxNode> {
        let cache = self.data.root.try_lock().ok()?;
        cache.upgrade().map(SyntaxNode::from_arena_root)
    }

    /// The canonical root, always available without materialization.
    pub fn green_root(&self) -> &GreenNode {
        &self.data.green_root
    }

    /// The retained source text, if the tree was parsed from text.
    pub fn text(&self) -> Option<&str> {
        self.data.text.as_deref()
    }

    pub fn options(&self) -> &ParseOptions {
        &self.data.options
    }

    pub fn path(&self) -> &Utf8Path {
        &self.data.path
    }

    /// Re-parses with `new_text`, diffing against the retained text so the
    /// parser may reuse subtrees outside the changed range.
    ///
    /// Panics when the tree was built without a parser.
    #[track_caller]
    pub fn with_changed_text(&self, new_text: &str) -> Self {
        let parse = self
            .data
            .parse
            .as_ref()
            .expect("tree was built without a parse function")
            .clone();
        let green_root = match self.data.text.as_deref() {
            Some(old_text) => match arbor_text::change_range(old_text, new_text) {
                None => return self.clone(),
                Some(change) => {
                    tracing::debug!(path = %self.data.path, span = ?change.span, "incremental re-parse");
                    parse(
                        new_text,
                        &self.data.options,
                        Some(Reparse { old_root: &self.data.green_root, changes: &[change] }),
                    )
                }
            },
            // Nothing to diff against; the whole text counts as changed.
            None => parse(new_text, &self.data.options, None),
        };
        Self::build(
            Some(new_text.into()),
            self.data.options.clone(),
            self.data.path.clone(),
            green_root,
            Some(parse),
        )
    }

    /// Wraps an edited canonical root in a new tree with cold caches. The
    /// retained text is dropped; the edit engine works on canonical shape.
    pub fn with_root(&self, green_root: GreenNode) -> Self {
        Self::build(
            None,
            self.data.options.clone(),
            self.data.path.clone(),
            green_root,
            self.data.parse.clone(),
        )
    }

    /// Pessimistic canonical diff against an older tree: at most one change,
    /// covering everything between the shared prefix and suffix.
    pub fn changes(&self, old: &Self) -> Vec<ChangeRange> {
        green_diff(&old.data.green_root, &self.data.green_root)
            .into_iter()
            .collect()
    }

    /// The changed spans within this (newer) tree relative to `old`.
    pub fn changed_spans(&self, old: &Self) -> Vec<TextRange> {
        self.changes(old).iter().map(ChangeRange::new_span).collect()
    }

    fn directive_map(&self) -> &DirectiveSymbolMap {
        if let Some(map) = self.data.directive_map.get() {
            return map;
        }
        tracing::debug!(path = %self.data.path, "building directive symbol map");
        let map = DirectiveSymbolMap::build(&self.data.green_root);
        let _ = self.data.directive_map.set(map);
        self.data.directive_map.get().expect("directive map was just set")
    }

    fn pragma_map(&self) -> &PragmaWarningMap {
        if let Some(map) = self.data.pragma_map.get() {
            return map;
        }
        tracing::debug!(path = %self.data.path, "building pragma warning map");
        let map = PragmaWarningMap::build(&self.data.green_root);
        let _ = self.data.pragma_map.set(map);
        self.data.pragma_map.get().expect("pragma map was just set")
    }

    /// Whether the conditional-compilation symbol is defined at `position`,
    /// falling back to the compilation-level defaults when no directive in
    /// the tree decides it.
    #[track_caller]
    pub fn is_symbol_defined(&self, name: &str, position: TextSize) -> bool {
        self.assert_position(position);
        match self.directive_map().define_state(name, position) {
            Some(state) => state.is_defined(),
            None => self
                .data
                .options
                .preprocessor_symbols
                .iter()
                .any(|symbol| symbol == name),
        }
    }

    /// The warning-suppression state for `id` at `position`.
    #[track_caller]
    pub fn pragma_state(&self, id: &str, position: TextSize) -> PragmaState {
        self.assert_position(position);
        self.pragma_map().state(id, position)
    }

    #[track_caller]
    fn assert_position(&self, position: TextSize) {
        let width = self.data.green_root.full_width();
        assert!(
            position <= width,
            "position {position:?} is past the end of the tree ({width:?})"
        );
    }

    /// Offset/line mapping for the retained text.
    pub fn line_index(&self) -> Option<&LineIndex> {
        let text = self.data.text.as_deref()?;
        if let Some(index) = self.data.line_index.get() {
            return Some(index);
        }
        tracing::trace!(path = %self.data.path, "building line index");
        let _ = self.data.line_index.set(LineIndex::new(text));
        self.data.line_index.get()
    }

    /// All diagnostics in the tree with their absolute ranges. Walks only
    /// flagged subtrees; clean regions cost nothing.
    pub fn diagnostics(&self) -> Vec<(TextRange, Diagnostic)> {
        let mut out = Vec::new();
        collect_diagnostics(&self.data.green_root, TextSize::new(0), &mut out);
        out
    }
}

fn collect_diagnostics(
    green: &GreenNode,
    offset: TextSize,
    out: &mut Vec<(TextRange, Diagnostic)>,
) {
    if !green.contains_diagnostics() {
        return;
    }
    let range = TextRange::at(offset, green.full_width());
    out.extend(green.diagnostics().iter().map(|d| (range, d.clone())));

    let mut offset = offset;
    for child in green.children() {
        match child {
            GreenChild::Node(node) => collect_diagnostics(node, offset, out),
            GreenChild::Token(token) => {
                if token.flags().contains(arbor_green::NodeFlags::DIAGNOSTICS) {
                    let mut cursor = offset;
                    collect_trivia_diagnostics(token.leading(), &mut cursor, out);
                    if !token.diagnostics().is_empty() {
                        let token_range = TextRange::at(cursor, token.width());
                        out.extend(
                            token.diagnostics().iter().map(|d| (token_range, d.clone())),
                        );
                    }
                    cursor += token.width();
                    collect_trivia_diagnostics(token.trailing(), &mut cursor, out);
                }
            }
            GreenChild::Absent => {}
        }
        offset += child.full_width();
    }
}

fn collect_trivia_diagnostics(
    trivia: &GreenTrivia,
    cursor: &mut TextSize,
    out: &mut Vec<(TextRange, Diagnostic)>,
) {
    for item in trivia.items() {
        if let Some(structure) = item.structure() {
            collect_diagnostics(structure, *cursor, out);
        }
        *cursor += item.len();
    }
}

/// Pessimistic canonical diff: shared prefix and suffix are measured by
/// reference identity, everything in between counts as changed.
fn green_diff(old: &GreenNode, new: &GreenNode) -> Option<ChangeRange> {
    if GreenNode::ptr_eq(old, new) {
        return None;
    }
    let old_width = old.full_width();
    let new_width = new.full_width();
    let prefix = common_prefix(old, new).min(old_width).min(new_width);
    let max_suffix = (old_width - prefix).min(new_width - prefix);
    let suffix = common_suffix(old, new).min(max_suffix);
    let span = TextRange::new(prefix, old_width - suffix);
    Some(ChangeRange::new(span, new_width - prefix - suffix))
}

fn children_identical(a: &GreenChild, b: &GreenChild) -> bool {
    match (a, b) {
        (GreenChild::Node(a), GreenChild::Node(b)) => GreenNode::ptr_eq(a, b),
        (GreenChild::Token(a), GreenChild::Token(b)) => arbor_green::GreenToken::ptr_eq(a, b),
        (GreenChild::Absent, GreenChild::Absent) => true,
        _ => false,
    }
}

fn common_prefix(old: &GreenNode, new: &GreenNode) -> TextSize {
    if old.kind() != new.kind() {
        return TextSize::new(0);
    }
    let mut width = TextSize::new(0);
    for (a, b) in old.children().iter().zip(new.children()) {
        if children_identical(a, b) {
            width += a.full_width();
        } else {
            if let (GreenChild::Node(a), GreenChild::Node(b)) = (a, b) {
                width += common_prefix(a, b);
            }
            break;
        }
    }
    width
}

fn common_suffix(old: &GreenNode, new: &GreenNode) -> TextSize {
    if old.kind() != new.kind() {
        return TextSize::new(0);
    }
    let mut width = TextSize::new(0);
    for (a, b) in old.children().iter().rev().zip(new.children().iter().rev()) {
        if children_identical(a, b) {
            width += a.full_width();
        } else {
            if let (GreenChild::Node(a), GreenChild::Node(b)) = (a, b) {
                width += common_suffix(a, b);
            }
            break;
        }
    }
    width
}
