//! Positioned, parent-linked handles over canonical nodes.
//!
//! Overlay entries are materialized on first navigation, one per visited
//! canonical node, and record absolute position plus a non-owning parent
//! index. Tokens and trivia are ephemeral positioned values and never get
//! entries of their own. Everything an overlay node knows beyond position
//! and parent is delegated to its canonical node.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use arbor_green::equivalence;
use arbor_green::{GreenChild, GreenNode, GreenToken, SyntaxKind, TokenValue, TriviaItem, TriviaKind};
use text_size::{TextRange, TextSize};

use crate::arena::{Arena, NO_NODE};
use crate::tree::SyntaxTree;

pub(crate) struct NodeData {
    pub(crate) green: GreenNode,
    pub(crate) offset: TextSize,
    /// Arena index of the parent; `NO_NODE` for a root. Non-owning: the
    /// arena owns all entries collectively.
    pub(crate) parent: u32,
    /// Lazily bound owning tree; set at most once.
    pub(crate) tree: OnceLock<SyntaxTree>,
    /// Materialized child entries, one per canonical child slot; `NO_NODE`
    /// for token and absent slots. Set at most once.
    children: OnceLock<Box<[u32]>>,
}

/// Node or token element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeOrToken<N, T> {
    Node(N),
    Token(T),
}

impl<N, T> NodeOrToken<N, T> {
    pub fn into_node(self) -> Option<N> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    pub fn into_token(self) -> Option<T> {
        match self {
            Self::Node(_) => None,
            Self::Token(token) => Some(token),
        }
    }

    pub fn as_node(&self) -> Option<&N> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&T> {
        match self {
            Self::Node(_) => None,
            Self::Token(token) => Some(token),
        }
    }
}

/// Node or token handle inside one overlay.
pub type SyntaxElement = NodeOrToken<SyntaxNode, SyntaxToken>;

impl SyntaxElement {
    pub fn kind(&self) -> SyntaxKind {
        match self {
            Self::Node(node) => node.kind(),
            Self::Token(token) => token.kind(),
        }
    }

    pub fn full_range(&self) -> TextRange {
        match self {
            Self::Node(node) => node.full_range(),
            Self::Token(token) => token.full_range(),
        }
    }
}

/// Positioned handle over a canonical node.
pub struct SyntaxNode {
    arena: Arc<Arena>,
    index: u32,
}

impl Clone for SyntaxNode {
    fn clone(&self) -> Self {
        Self { arena: Arc::clone(&self.arena), index: self.index }
    }
}

impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && Arc::ptr_eq(&self.arena, &other.arena)
    }
}

impl Eq for SyntaxNode {}

impl Hash for SyntaxNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.arena).hash(state);
        self.index.hash(state);
    }
}

impl SyntaxNode {
    /// Materializes a fresh parentless overlay root over `green`.
    pub(crate) fn new_root(green: GreenNode, offset: TextSize) -> Self {
        let arena = Arc::new(Arena::new());
        let index = arena.alloc(NodeData {
            green,
            offset,
            parent: NO_NODE,
            tree: OnceLock::new(),
            children: OnceLock::new(),
        });
        debug_assert_eq!(index, 0);
        Self { arena, index }
    }

    /// Materializes a root eagerly bound to a caller-supplied tree,
    /// short-circuiting the ownership walk.
    pub(crate) fn new_root_with_tree(green: GreenNode, tree: SyntaxTree) -> Self {
        let root = Self::new_root(green, TextSize::new(0));
        root.data()
            .tree
            .set(tree)
            .unwrap_or_else(|_| unreachable!("freshly allocated root already owned"));
        root
    }

    pub(crate) fn from_arena_root(arena: Arc<Arena>) -> Self {
        Self { arena, index: 0 }
    }

    pub(crate) fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub(crate) fn same_arena(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.arena, &b.arena)
    }

    fn data(&self) -> &NodeData {
        self.arena.get(self.index)
    }

    /// The canonical node this handle wraps.
    pub fn green(&self) -> &GreenNode {
        &self.data().green
    }

    pub fn kind(&self) -> SyntaxKind {
        self.data().green.kind()
    }

    /// Absolute start position, leading trivia included.
    pub fn offset(&self) -> TextSize {
        self.data().offset
    }

    /// Covered range, trivia included.
    pub fn full_range(&self) -> TextRange {
        TextRange::at(self.data().offset, self.data().green.full_width())
    }

    /// Covered range with leading/trailing trivia trimmed away.
    pub fn range(&self) -> TextRange {
        let green = &self.data().green;
        let full = self.full_range();
        TextRange::new(
            full.start() + green.leading_trivia_width(),
            full.end() - green.trailing_trivia_width(),
        )
    }

    pub fn parent(&self) -> Option<Self> {
        let parent = self.data().parent;
        (parent != NO_NODE).then(|| Self { arena: Arc::clone(&self.arena), index: parent })
    }

    /// Ancestors starting from this node itself.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> + use<> {
        std::iter::successors(Some(self.clone()), Self::parent)
    }

    /// Materialized child entry table; computed once, racing losers adopt
    /// the winner's entries.
    fn child_entries(&self) -> &[u32] {
        if let Some(entries) = self.data().children.get() {
            return entries;
        }
        let computed = self.compute_children();
        let _ = self.data().children.set(computed);
        self.data().children.get().expect("child table was just set")
    }

    fn compute_children(&self) -> Box<[u32]> {
        let data = self.data();
        let mut offset = data.offset;
        data.green
            .children()
            .iter()
            .map(|child| {
                let entry = match child {
                    GreenChild::Node(green) => self.arena.alloc(NodeData {
                        green: green.clone(),
                        offset,
                        parent: self.index,
                        tree: OnceLock::new(),
                        children: OnceLock::new(),
                    }),
                    GreenChild::Token(_) | GreenChild::Absent => NO_NODE,
                };
                offset += child.full_width();
                entry
            })
            .collect()
    }

    /// The overlay node for the canonical child in `slot`, if it is a node.
    pub(crate) fn child_node_at(&self, slot: usize) -> Option<Self> {
        let index = self.child_entries()[slot];
        (index != NO_NODE).then(|| Self { arena: Arc::clone(&self.arena), index })
    }

    /// An ephemeral handle for the token in `slot`, whose absolute start the
    /// caller has already computed.
    pub(crate) fn token_handle(&self, slot: usize, offset: TextSize) -> SyntaxToken {
        debug_assert!(self.green().children()[slot].as_token().is_some());
        SyntaxToken { parent: self.clone(), slot: slot as u32, offset }
    }

    /// Child nodes and tokens in source order; absent slots are skipped.
    pub fn children_with_tokens(&self) -> ChildrenWithTokens {
        ChildrenWithTokens { parent: self.clone(), slot: 0, offset: self.offset() }
    }

    /// Child nodes in source order.
    pub fn children(&self) -> impl Iterator<Item = Self> + use<> {
        self.children_with_tokens().filter_map(SyntaxElement::into_node)
    }

    /// First token of the subtree, if any.
    pub fn first_token(&self) -> Option<SyntaxToken> {
        self.children_with_tokens().find_map(|element| match element {
            SyntaxElement::Token(token) => Some(token),
            SyntaxElement::Node(node) => node.first_token(),
        })
    }

    /// Last token of the subtree, if any.
    pub fn last_token(&self) -> Option<SyntaxToken> {
        let green = &self.data().green;
        let mut offset = self.full_range().end();
        for (slot, child) in green.children().iter().enumerate().rev() {
            offset -= child.full_width();
            match child {
                GreenChild::Token(_) => {
                    return Some(SyntaxToken { parent: self.clone(), slot: slot as u32, offset });
                }
                GreenChild::Node(_) => {
                    let node = self.child_node_at(slot).expect("node slot has an entry");
                    if let Some(token) = node.last_token() {
                        return Some(token);
                    }
                }
                GreenChild::Absent => {}
            }
        }
        None
    }

    fn token_containing(&self, offset: TextSize) -> Option<SyntaxToken> {
        let mut node = self.clone();
        'descend: loop {
            for element in node.children_with_tokens() {
                if element.full_range().contains(offset) {
                    match element {
                        SyntaxElement::Token(token) => return Some(token),
                        SyntaxElement::Node(child) => {
                            node = child;
                            continue 'descend;
                        }
                    }
                }
            }
            return None;
        }
    }

    /// Returns the token(s) at `offset`; two when the offset is exactly the
    /// boundary between adjacent tokens.
    #[track_caller]
    pub fn token_at_offset(&self, offset: TextSize) -> TokenAtOffset<SyntaxToken> {
        let range = self.full_range();
        assert!(
            range.start() <= offset && offset <= range.end(),
            "offset {offset:?} is outside of {range:?}"
        );
        let right = if offset < range.end() { self.token_containing(offset) } else { None };
        let left = if offset > range.start() {
            self.token_containing(offset - TextSize::new(1))
        } else {
            None
        };
        match (left, right) {
            (None, None) => TokenAtOffset::None,
            (Some(token), None) | (None, Some(token)) => TokenAtOffset::Single(token),
            (Some(left), Some(right)) if left == right => TokenAtOffset::Single(right),
            (Some(left), Some(right)) => TokenAtOffset::Between(left, right),
        }
    }

    /// Returns the smallest element that fully covers `range`.
    #[track_caller]
    pub fn covering_element(&self, range: TextRange) -> SyntaxElement {
        assert!(
            self.full_range().contains_range(range),
            "range {range:?} is outside of {:?}",
            self.full_range()
        );
        let mut node = self.clone();
        'descend: loop {
            for element in node.children_with_tokens() {
                if element.full_range().contains_range(range) {
                    match element {
                        SyntaxElement::Token(token) => return SyntaxElement::Token(token),
                        SyntaxElement::Node(child) => {
                            node = child;
                            continue 'descend;
                        }
                    }
                }
            }
            return SyntaxElement::Node(node);
        }
    }

    /// Returns a preorder iterator over nodes.
    pub fn preorder(&self) -> Preorder {
        Preorder::new(self.clone())
    }

    /// Structural equivalence with another node, across any pair of trees.
    pub fn is_equivalent_to(&self, other: &Self, top_level: bool) -> bool {
        equivalence::nodes_equivalent(self.green(), other.green(), top_level)
    }

    /// Produces a structurally identical, parentless, position-zero root
    /// over this node's canonical subtree.
    pub fn clone_as_root(&self) -> Self {
        Self::new_root(self.green().clone(), TextSize::new(0))
    }

    /// Resolves the tree owning this node, installing one for an unowned
    /// root first. Exactly one tree ever wins; racing installers adopt the
    /// winner's value.
    pub fn syntax_tree(&self) -> SyntaxTree {
        if let Some(tree) = self.data().tree.get() {
            return tree.clone();
        }

        // Walk up, collecting unowned nodes until an owned ancestor or the
        // root is reached.
        let mut chain = Vec::new();
        let mut cursor = self.index;
        let tree = loop {
            let data = self.arena.get(cursor);
            if let Some(tree) = data.tree.get() {
                break tree.clone();
            }
            if data.parent == NO_NODE {
                debug_assert_eq!(cursor, 0, "a parentless node is its arena's root");
                let root = Self { arena: Arc::clone(&self.arena), index: cursor };
                let _ = data.tree.set(SyntaxTree::new_detached(&root));
                break data.tree.get().expect("a winning tree is installed").clone();
            }
            chain.push(cursor);
            cursor = data.parent;
        };

        // Propagate the winner down the collected chain; a racing thread
        // attaching the same tree loses harmlessly.
        for index in chain {
            let slot = &self.arena.get(index).tree;
            let _ = slot.set(tree.clone());
            debug_assert!(
                slot.get().is_some_and(|owner| *owner == tree),
                "two trees claim ownership of one overlay node"
            );
        }
        tree
    }

    /// Reconstructs the covered source text from the canonical subtree.
    pub fn text(&self) -> String {
        self.green().to_string()
    }

    /// Renders the subtree structure for debugging and tests.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        use std::fmt::Write as _;

        let _ = writeln!(out, "{:depth$}{:?}@{:?}", "", self.kind(), self.full_range(), depth = depth * 2);
        for element in self.children_with_tokens() {
            match element {
                SyntaxElement::Node(node) => node.dump_into(out, depth + 1),
                SyntaxElement::Token(token) => {
                    let _ = writeln!(
                        out,
                        "{:depth$}{:?}@{:?} {:?}",
                        "",
                        token.kind(),
                        token.full_range(),
                        token.text(),
                        depth = (depth + 1) * 2,
                    );
                }
            }
        }
    }
}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxNode")
            .field("kind", &self.kind())
            .field("full_range", &self.full_range())
            .finish()
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.green(), f)
    }
}

/// Iterator over child nodes and tokens.
#[derive(Clone)]
pub struct ChildrenWithTokens {
    parent: SyntaxNode,
    slot: usize,
    offset: TextSize,
}

impl Iterator for ChildrenWithTokens {
    type Item = SyntaxElement;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let child = self.parent.green().children().get(self.slot)?.clone();
            let slot = self.slot;
            let offset = self.offset;
            self.slot += 1;
            self.offset += child.full_width();
            match child {
                GreenChild::Node(_) => {
                    let node = self.parent.child_node_at(slot).expect("node slot has an entry");
                    return Some(SyntaxElement::Node(node));
                }
                GreenChild::Token(_) => {
                    return Some(SyntaxElement::Token(SyntaxToken {
                        parent: self.parent.clone(),
                        slot: slot as u32,
                        offset,
                    }));
                }
                GreenChild::Absent => {}
            }
        }
    }
}

/// Positioned handle over a canonical token.
#[derive(Clone)]
pub struct SyntaxToken {
    parent: SyntaxNode,
    slot: u32,
    offset: TextSize,
}

impl PartialEq for SyntaxToken {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.parent == other.parent
    }
}

impl Eq for SyntaxToken {}

impl Hash for SyntaxToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parent.hash(state);
        self.slot.hash(state);
    }
}

impl SyntaxToken {
    /// The canonical token this handle wraps.
    pub fn green(&self) -> &GreenToken {
        self.parent.green().children()[self.slot as usize]
            .as_token()
            .expect("token slot holds a token")
    }

    pub fn kind(&self) -> SyntaxKind {
        self.green().kind()
    }

    /// Raw token text, excluding trivia.
    pub fn text(&self) -> &str {
        self.green().text()
    }

    pub fn value(&self) -> &TokenValue {
        self.green().value()
    }

    /// Absolute start position, leading trivia included.
    pub fn offset(&self) -> TextSize {
        self.offset
    }

    /// Covered range, trivia included.
    pub fn full_range(&self) -> TextRange {
        TextRange::at(self.offset, self.green().full_width())
    }

    /// Covered range of the token text alone.
    pub fn range(&self) -> TextRange {
        let green = self.green();
        TextRange::at(self.offset + green.leading().len(), green.width())
    }

    pub fn parent(&self) -> SyntaxNode {
        self.parent.clone()
    }

    pub(crate) fn parent_ref(&self) -> &SyntaxNode {
        &self.parent
    }

    pub fn leading_trivia(&self) -> TriviaIter {
        TriviaIter { token: self.clone(), leading: true, index: 0, offset: self.offset }
    }

    pub fn trailing_trivia(&self) -> TriviaIter {
        let green = self.green();
        let offset = self.offset + green.leading().len() + green.width();
        TriviaIter { token: self.clone(), leading: false, index: 0, offset }
    }

    /// Structural equivalence with another token: kind and interpreted
    /// value, never raw text or trivia.
    pub fn is_equivalent_to(&self, other: &Self) -> bool {
        equivalence::tokens_equivalent(self.green(), other.green())
    }
}

impl fmt::Debug for SyntaxToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxToken")
            .field("kind", &self.kind())
            .field("full_range", &self.full_range())
            .field("text", &self.text())
            .finish()
    }
}

impl fmt::Display for SyntaxToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.green(), f)
    }
}

/// Positioned handle over one trivia item of a token.
#[derive(Clone, PartialEq, Eq)]
pub struct SyntaxTrivia {
    token: SyntaxToken,
    leading: bool,
    index: u32,
    offset: TextSize,
}

impl SyntaxTrivia {
    pub(crate) fn new(token: SyntaxToken, leading: bool, index: u32, offset: TextSize) -> Self {
        Self { token, leading, index, offset }
    }

    /// The canonical trivia item this handle wraps.
    pub fn item(&self) -> &TriviaItem {
        let green = self.token.green();
        let list = if self.leading { green.leading() } else { green.trailing() };
        &list.items()[self.index as usize]
    }

    pub fn kind(&self) -> TriviaKind {
        self.item().kind()
    }

    pub fn text(&self) -> &str {
        self.item().text()
    }

    pub fn range(&self) -> TextRange {
        TextRange::at(self.offset, self.item().len())
    }

    pub fn offset(&self) -> TextSize {
        self.offset
    }

    /// The token carrying this trivia.
    pub fn token(&self) -> &SyntaxToken {
        &self.token
    }

    pub fn is_leading(&self) -> bool {
        self.leading
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    /// Materializes the directive syntax nested in this trivia as a fresh
    /// detached root positioned at the trivia's own offset.
    ///
    /// Each call produces an independent root; a tree is installed on it
    /// lazily when first asked for.
    pub fn structure(&self) -> Option<SyntaxNode> {
        let structure = self.item().structure()?.clone();
        Some(SyntaxNode::new_root(structure, self.offset))
    }
}

impl fmt::Debug for SyntaxTrivia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTrivia")
            .field("kind", &self.kind())
            .field("range", &self.range())
            .finish()
    }
}

/// Iterator over the trivia items on one edge of a token.
#[derive(Clone)]
pub struct TriviaIter {
    token: SyntaxToken,
    leading: bool,
    index: usize,
    offset: TextSize,
}

impl Iterator for TriviaIter {
    type Item = SyntaxTrivia;

    fn next(&mut self) -> Option<Self::Item> {
        let green = self.token.green();
        let list = if self.leading { green.leading() } else { green.trailing() };
        let item = list.items().get(self.index)?;
        let trivia = SyntaxTrivia::new(
            self.token.clone(),
            self.leading,
            self.index as u32,
            self.offset,
        );
        self.index += 1;
        self.offset += item.len();
        Some(trivia)
    }
}

/// Preorder walk event.
#[derive(Clone, Debug)]
pub enum WalkEvent {
    Enter(SyntaxNode),
    Leave(SyntaxNode),
}

/// Preorder traversal over nodes.
pub struct Preorder {
    stack: Vec<(SyntaxNode, std::vec::IntoIter<SyntaxNode>)>,
    root: Option<SyntaxNode>,
}

impl Preorder {
    fn new(start: SyntaxNode) -> Self {
        Self { stack: Vec::with_capacity(16), root: Some(start) }
    }

    /// Skips the rest of the subtree the walk most recently entered.
    #[track_caller]
    pub fn skip_subtree(&mut self) {
        assert!(self.stack.pop().is_some(), "must have a subtree to skip");
    }
}

impl Iterator for Preorder {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let Some((_, children)) = self.stack.last_mut() else {
            let root = self.root.take()?;
            let children = root.children().collect::<Vec<_>>().into_iter();
            self.stack.push((root.clone(), children));
            return Some(WalkEvent::Enter(root));
        };
        match children.next() {
            Some(child) => {
                let grandchildren = child.children().collect::<Vec<_>>().into_iter();
                self.stack.push((child.clone(), grandchildren));
                Some(WalkEvent::Enter(child))
            }
            None => {
                let (left, _) = self.stack.pop().expect("should have a node to leave");
                Some(WalkEvent::Leave(left))
            }
        }
    }
}

/// Stable identifier for a node by kind and trimmed range.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SyntaxNodePtr {
    pub kind: SyntaxKind,
    pub range: TextRange,
}

impl SyntaxNodePtr {
    pub fn new(node: &SyntaxNode) -> Self {
        Self { kind: node.kind(), range: node.range() }
    }

    /// Attempts to resolve this pointer within `root`.
    pub fn try_to_node(&self, root: &SyntaxNode) -> Option<SyntaxNode> {
        if root.parent().is_some() {
            return None;
        }
        let start = match root.covering_element(self.range) {
            SyntaxElement::Node(node) => node,
            SyntaxElement::Token(token) => token.parent(),
        };
        start
            .ancestors()
            .find(|node| node.kind() == self.kind && node.range() == self.range)
    }

    #[track_caller]
    pub fn to_node(&self, root: &SyntaxNode) -> SyntaxNode {
        self.try_to_node(root).expect("pointer resolves in the given root")
    }
}

/// There might be zero, one or two tokens at a given offset.
#[derive(Clone, Debug)]
pub enum TokenAtOffset<T> {
    /// No tokens at offset.
    None,
    /// Only a single token at offset.
    Single(T),
    /// Offset is exactly between two tokens.
    Between(T, T),
}

impl<T> TokenAtOffset<T> {
    /// Convert to option, preferring the right token in case of a tie.
    pub fn right_biased(self) -> Option<T> {
        match self {
            Self::None => None,
            Self::Single(token) => Some(token),
            Self::Between(_, right) => Some(right),
        }
    }

    /// Convert to option, preferring the left token in case of a tie.
    pub fn left_biased(self) -> Option<T> {
        match self {
            Self::None => None,
            Self::Single(token) => Some(token),
            Self::Between(left, _) => Some(left),
        }
    }
}
