//! Minimal-disturbance replacement and insertion.
//!
//! One recursive visitor serves every edit flavor. It precomputes the union
//! of the target spans and returns any subtree whose span misses it
//! unchanged by reference, so the cost of an edit is proportional to the
//! rewritten path, not the tree. Trivia (and the syntax nested in directive
//! trivia) is only descended into when a target actually lies there.

use arbor_green::{GreenChild, GreenNode, GreenToken, GreenTrivia, SyntaxKind, TriviaItem};
use rustc_hash::FxHashSet;
use text_size::{TextRange, TextSize};

use crate::node::{SyntaxNode, SyntaxToken, SyntaxTrivia};

/// Recoverable caller-contract violations of the edit engine.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum EditError {
    /// An insertion anchor is not an element of any list in the visited
    /// subtree.
    #[error("item not found in its list")]
    ItemNotFoundInList,
    /// A replacement target is not part of the visited subtree.
    #[error("replacement target not found in the subtree")]
    TargetNotFound,
}

/// Targets are identified by absolute position plus canonical identity,
/// which works uniformly for targets in the main tree and for targets
/// inside directive-trivia structures.
type NodeKey = (TextSize, GreenNode);
type TokenKey = (TextSize, GreenToken);

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
struct TriviaKey {
    token_offset: TextSize,
    leading: bool,
    index: u32,
}

fn node_key(node: &SyntaxNode) -> NodeKey {
    (node.offset(), node.green().clone())
}

fn token_key(token: &SyntaxToken) -> TokenKey {
    (token.offset(), token.green().clone())
}

fn trivia_key(trivia: &SyntaxTrivia) -> TriviaKey {
    TriviaKey {
        token_offset: trivia.token().offset(),
        leading: trivia.is_leading(),
        index: trivia.index(),
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum EditKind {
    InsertBefore,
    InsertAfter,
}

enum Anchor {
    Node(NodeKey),
    Token(TokenKey),
}

enum ListEdit {
    Syntax { anchor: Anchor, kind: EditKind, items: Vec<GreenChild> },
    Trivia { anchor: TriviaKey, kind: EditKind, items: Vec<TriviaItem> },
}

struct Replacer<'a> {
    /// Individual target spans; checked in addition to the union for the
    /// precise pruning decision.
    spans: Vec<TextRange>,
    union: TextRange,
    node_targets: FxHashSet<NodeKey>,
    token_targets: FxHashSet<TokenKey>,
    trivia_targets: FxHashSet<TriviaKey>,
    compute_node: Option<&'a mut dyn FnMut(&SyntaxNode, GreenNode) -> GreenNode>,
    compute_token: Option<&'a mut dyn FnMut(&SyntaxToken, GreenToken) -> GreenToken>,
    compute_trivia: Option<&'a mut dyn FnMut(&SyntaxTrivia, TriviaItem) -> TriviaItem>,
    list_edit: Option<ListEdit>,
    visit_trivia: bool,
    replaced: usize,
    edit_applied: bool,
}

fn union_of(spans: &[TextRange]) -> TextRange {
    let mut spans = spans.iter();
    let first = *spans.next().expect("at least one target span");
    spans.fold(first, |union, span| union.cover(*span))
}

impl Replacer<'_> {
    fn new(spans: Vec<TextRange>) -> Self {
        let union = union_of(&spans);
        Self {
            spans,
            union,
            node_targets: FxHashSet::default(),
            token_targets: FxHashSet::default(),
            trivia_targets: FxHashSet::default(),
            compute_node: None,
            compute_token: None,
            compute_trivia: None,
            list_edit: None,
            visit_trivia: false,
            replaced: 0,
            edit_applied: false,
        }
    }

    /// Inclusive intersection: a zero-width touch at either end counts, so
    /// anchors at list boundaries are never pruned away.
    fn intersects(&self, range: TextRange) -> bool {
        self.union.intersect(range).is_some()
            && self.spans.iter().any(|span| span.intersect(range).is_some())
    }

    fn syntax_insert_items(
        &mut self,
        kind: EditKind,
        node_anchor: Option<&NodeKey>,
        token_anchor: Option<&TokenKey>,
    ) -> Option<Vec<GreenChild>> {
        match &self.list_edit {
            Some(ListEdit::Syntax { anchor, kind: edit_kind, items }) if *edit_kind == kind => {
                let matched = match anchor {
                    Anchor::Node(key) => node_anchor == Some(key),
                    Anchor::Token(key) => token_anchor == Some(key),
                };
                if matched {
                    let items = items.clone();
                    self.edit_applied = true;
                    Some(items)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn trivia_insert_items(&mut self, kind: EditKind, key: TriviaKey) -> Option<Vec<TriviaItem>> {
        match &self.list_edit {
            Some(ListEdit::Trivia { anchor, kind: edit_kind, items })
                if *edit_kind == kind && *anchor == key =>
            {
                let items = items.clone();
                self.edit_applied = true;
                Some(items)
            }
            _ => None,
        }
    }

    fn visit_node(&mut self, node: &SyntaxNode) -> GreenNode {
        let targeted = self.node_targets.contains(&node_key(node));
        if !targeted && !self.intersects(node.full_range()) {
            return node.green().clone();
        }

        let green = node.green().clone();
        let in_list = green.kind() == SyntaxKind::LIST;
        let mut children = Vec::with_capacity(green.children().len());
        let mut changed = false;
        let mut offset = node.offset();

        for (slot, child) in green.children().iter().enumerate() {
            let child_range = TextRange::at(offset, child.full_width());
            match child {
                GreenChild::Absent => children.push(GreenChild::Absent),
                GreenChild::Node(child_green) => {
                    let key = (offset, child_green.clone());
                    if in_list {
                        if let Some(items) =
                            self.syntax_insert_items(EditKind::InsertBefore, Some(&key), None)
                        {
                            children.extend(items);
                            changed = true;
                        }
                    }
                    let new_green = if self.node_targets.contains(&key)
                        || self.intersects(child_range)
                    {
                        let child_node =
                            node.child_node_at(slot).expect("node slot has an entry");
                        self.visit_node(&child_node)
                    } else {
                        child_green.clone()
                    };
                    changed |= !GreenNode::ptr_eq(&new_green, child_green);
                    children.push(GreenChild::Node(new_green));
                    if in_list {
                        if let Some(items) =
                            self.syntax_insert_items(EditKind::InsertAfter, Some(&key), None)
                        {
                            children.extend(items);
                            changed = true;
                        }
                    }
                }
                GreenChild::Token(child_green) => {
                    let key = (offset, child_green.clone());
                    if in_list {
                        if let Some(items) =
                            self.syntax_insert_items(EditKind::InsertBefore, None, Some(&key))
                        {
                            children.extend(items);
                            changed = true;
                        }
                    }
                    let new_green = if self.token_targets.contains(&key)
                        || (self.visit_trivia && self.intersects(child_range))
                    {
                        let token = node.token_handle(slot, offset);
                        self.visit_token(&token)
                    } else {
                        child_green.clone()
                    };
                    changed |= !GreenToken::ptr_eq(&new_green, child_green);
                    children.push(GreenChild::Token(new_green));
                    if in_list {
                        if let Some(items) =
                            self.syntax_insert_items(EditKind::InsertAfter, None, Some(&key))
                        {
                            children.extend(items);
                            changed = true;
                        }
                    }
                }
            }
            offset += child.full_width();
        }

        let mut result = if changed { GreenNode::new(green.kind(), children) } else { green };
        if targeted {
            if let Some(compute) = self.compute_node.as_mut() {
                result = compute(node, result);
            }
            self.replaced += 1;
        }
        result
    }

    fn visit_token(&mut self, token: &SyntaxToken) -> GreenToken {
        let mut green = token.green().clone();
        if self.visit_trivia {
            let (leading, leading_changed) = self.visit_trivia_side(token, true);
            let (trailing, trailing_changed) = self.visit_trivia_side(token, false);
            if leading_changed || trailing_changed {
                green = green.with_trivia(leading, trailing);
            }
        }
        if self.token_targets.contains(&token_key(token)) {
            if let Some(compute) = self.compute_token.as_mut() {
                green = compute(token, green);
            }
            self.replaced += 1;
        }
        green
    }

    fn visit_trivia_side(&mut self, token: &SyntaxToken, leading: bool) -> (GreenTrivia, bool) {
        let token_green = token.green().clone();
        let original = if leading { token_green.leading() } else { token_green.trailing() };
        let token_offset = token.offset();
        let mut offset = if leading {
            token_offset
        } else {
            token_offset + token_green.leading().len() + token_green.width()
        };
        let mut out = Vec::with_capacity(original.items().len());
        let mut changed = false;

        for (index, item) in original.items().iter().enumerate() {
            let key = TriviaKey { token_offset, leading, index: index as u32 };
            let item_range = TextRange::at(offset, item.len());

            if let Some(items) = self.trivia_insert_items(EditKind::InsertBefore, key) {
                out.extend(items);
                changed = true;
            }

            let mut new_item = item.clone();
            if let Some(structure) = item.structure() {
                if self.intersects(item_range) {
                    let trivia = SyntaxTrivia::new(token.clone(), leading, index as u32, offset);
                    let root = trivia.structure().expect("directive item has structure");
                    let new_structure = self.visit_node(&root);
                    if !GreenNode::ptr_eq(&new_structure, structure) {
                        new_item = TriviaItem::directive(new_structure);
                    }
                }
            }
            if self.trivia_targets.contains(&key) {
                let trivia = SyntaxTrivia::new(token.clone(), leading, index as u32, offset);
                if let Some(compute) = self.compute_trivia.as_mut() {
                    new_item = compute(&trivia, new_item);
                }
                self.replaced += 1;
            }
            changed |= new_item != *item;
            out.push(new_item);

            if let Some(items) = self.trivia_insert_items(EditKind::InsertAfter, key) {
                out.extend(items);
                changed = true;
            }
            offset += item.len();
        }

        if changed { (GreenTrivia::new(out), true) } else { (original.clone(), false) }
    }
}

fn run(root: &SyntaxNode, mut replacer: Replacer<'_>) -> Result<SyntaxNode, EditError> {
    let expected = replacer.node_targets.len()
        + replacer.token_targets.len()
        + replacer.trivia_targets.len();
    let green = replacer.visit_node(root);
    if replacer.list_edit.is_some() && !replacer.edit_applied {
        return Err(EditError::ItemNotFoundInList);
    }
    if replacer.replaced != expected {
        return Err(EditError::TargetNotFound);
    }
    Ok(SyntaxNode::new_root(green, TextSize::new(0)))
}

/// A target living in another overlay (always a directive-trivia structure
/// or a foreign tree) forces the visitor into trivia.
fn outside_arena<'a>(root: &SyntaxNode, mut nodes: impl Iterator<Item = &'a SyntaxNode>) -> bool {
    nodes.any(|node| !SyntaxNode::same_arena(node, root))
}

impl SyntaxNode {
    /// Replaces every target node; the callback receives the original
    /// (positioned) node together with its already-rewritten form, so
    /// nested targets compose.
    ///
    /// An empty target set is a no-op returning this very handle.
    pub fn replace_nodes(
        &self,
        targets: &[Self],
        mut compute: impl FnMut(&Self, GreenNode) -> GreenNode,
    ) -> Result<Self, EditError> {
        if targets.is_empty() {
            return Ok(self.clone());
        }
        let mut replacer = Replacer::new(targets.iter().map(Self::full_range).collect());
        replacer.node_targets = targets.iter().map(node_key).collect();
        replacer.visit_trivia = outside_arena(self, targets.iter());
        replacer.compute_node = Some(&mut compute);
        run(self, replacer)
    }

    /// Replaces a single node with a prebuilt canonical subtree.
    pub fn replace_node_with(
        &self,
        target: &Self,
        replacement: GreenNode,
    ) -> Result<Self, EditError> {
        let mut replacement = Some(replacement);
        self.replace_nodes(std::slice::from_ref(target), move |_, _| {
            replacement.take().expect("single target is replaced once")
        })
    }

    /// Replaces every target token; see [`SyntaxNode::replace_nodes`].
    pub fn replace_tokens(
        &self,
        targets: &[SyntaxToken],
        mut compute: impl FnMut(&SyntaxToken, GreenToken) -> GreenToken,
    ) -> Result<Self, EditError> {
        if targets.is_empty() {
            return Ok(self.clone());
        }
        let mut replacer = Replacer::new(targets.iter().map(SyntaxToken::full_range).collect());
        replacer.token_targets = targets.iter().map(token_key).collect();
        replacer.visit_trivia =
            outside_arena(self, targets.iter().map(|token| token.parent_ref()));
        replacer.compute_token = Some(&mut compute);
        run(self, replacer)
    }

    /// Replaces every target trivia item; see [`SyntaxNode::replace_nodes`].
    pub fn replace_trivia(
        &self,
        targets: &[SyntaxTrivia],
        mut compute: impl FnMut(&SyntaxTrivia, TriviaItem) -> TriviaItem,
    ) -> Result<Self, EditError> {
        if targets.is_empty() {
            return Ok(self.clone());
        }
        let mut replacer = Replacer::new(targets.iter().map(SyntaxTrivia::range).collect());
        replacer.trivia_targets = targets.iter().map(trivia_key).collect();
        replacer.visit_trivia = true;
        replacer.compute_trivia = Some(&mut compute);
        run(self, replacer)
    }

    /// Inserts new children into the list directly containing `anchor`,
    /// immediately before it.
    pub fn insert_nodes_before(
        &self,
        anchor: &Self,
        items: Vec<GreenChild>,
    ) -> Result<Self, EditError> {
        self.insert_syntax(Anchor::Node(node_key(anchor)), anchor.full_range(), EditKind::InsertBefore, items, outside_arena(self, std::iter::once(anchor)))
    }

    /// Inserts new children into the list directly containing `anchor`,
    /// immediately after it.
    pub fn insert_nodes_after(
        &self,
        anchor: &Self,
        items: Vec<GreenChild>,
    ) -> Result<Self, EditError> {
        self.insert_syntax(Anchor::Node(node_key(anchor)), anchor.full_range(), EditKind::InsertAfter, items, outside_arena(self, std::iter::once(anchor)))
    }

    /// Inserts new children before a token anchor inside its list.
    pub fn insert_tokens_before(
        &self,
        anchor: &SyntaxToken,
        items: Vec<GreenChild>,
    ) -> Result<Self, EditError> {
        self.insert_syntax(Anchor::Token(token_key(anchor)), anchor.full_range(), EditKind::InsertBefore, items, outside_arena(self, std::iter::once(anchor.parent_ref())))
    }

    /// Inserts new children after a token anchor inside its list.
    pub fn insert_tokens_after(
        &self,
        anchor: &SyntaxToken,
        items: Vec<GreenChild>,
    ) -> Result<Self, EditError> {
        self.insert_syntax(Anchor::Token(token_key(anchor)), anchor.full_range(), EditKind::InsertAfter, items, outside_arena(self, std::iter::once(anchor.parent_ref())))
    }

    /// Inserts new trivia items before `anchor` in its trivia list.
    pub fn insert_trivia_before(
        &self,
        anchor: &SyntaxTrivia,
        items: Vec<TriviaItem>,
    ) -> Result<Self, EditError> {
        self.insert_trivia(anchor, EditKind::InsertBefore, items)
    }

    /// Inserts new trivia items after `anchor` in its trivia list.
    pub fn insert_trivia_after(
        &self,
        anchor: &SyntaxTrivia,
        items: Vec<TriviaItem>,
    ) -> Result<Self, EditError> {
        self.insert_trivia(anchor, EditKind::InsertAfter, items)
    }

    fn insert_syntax(
        &self,
        anchor: Anchor,
        anchor_span: TextRange,
        kind: EditKind,
        items: Vec<GreenChild>,
        visit_trivia: bool,
    ) -> Result<Self, EditError> {
        if items.is_empty() {
            return Ok(self.clone());
        }
        let mut replacer = Replacer::new(vec![anchor_span]);
        replacer.list_edit = Some(ListEdit::Syntax { anchor, kind, items });
        replacer.visit_trivia = visit_trivia;
        run(self, replacer)
    }

    fn insert_trivia(
        &self,
        anchor: &SyntaxTrivia,
        kind: EditKind,
        items: Vec<TriviaItem>,
    ) -> Result<Self, EditError> {
        if items.is_empty() {
            return Ok(self.clone());
        }
        let mut replacer = Replacer::new(vec![anchor.range()]);
        replacer.list_edit =
            Some(ListEdit::Trivia { anchor: trivia_key(anchor), kind, items });
        replacer.visit_trivia = true;
        run(self, replacer)
    }
}
