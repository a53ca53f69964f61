//! Arena-backed canonical document
//!
//! Nodes live in a flat arena and are addressed by [`NodeId`]. Parent and
//! child links are plain indices, so splicing, unnesting and reparenting are
//! index reassignments. Text follows the lxml convention: `text` is the
//! leading text inside a node and `tail` is the text that follows the node
//! inside its parent.
//!
//! Detached nodes stay in the arena; only nodes reachable from the root are
//! part of the document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tag::Tag;

/// Stable index of a node in a [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// A canonical element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub tag: Tag,
    pub attrs: BTreeMap<String, String>,
    /// Text before the first child
    pub text: String,
    /// Text after this node, inside the parent
    pub tail: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            attrs: BTreeMap::new(),
            text: String::new(),
            tail: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    /// Parent node, if attached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered children
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A canonical document tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty `document > body` tree
    pub fn new() -> Self {
        let mut doc = Self::with_root(Tag::Document);
        let body = doc.create(Tag::Body);
        doc.append(doc.root, body);
        doc
    }

    /// Create a tree holding only a root of the given kind
    pub fn with_root(tag: Tag) -> Self {
        Self {
            nodes: vec![Node::new(tag)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// First `body` child of the root
    pub fn body(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.tag(c) == &Tag::Body)
    }

    /// Number of nodes in the arena, attached or not
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Node access
    // ========================================================================

    /// Allocate a detached node
    pub fn create(&mut self, tag: Tag) -> NodeId {
        self.nodes.push(Node::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    /// Allocate a detached node with attributes
    pub fn create_with<K, V>(&mut self, tag: Tag, attrs: impl IntoIterator<Item = (K, V)>) -> NodeId
    where
        K: Into<String>,
        V: Into<String>,
    {
        let id = self.create(tag);
        for (k, v) in attrs {
            self.nodes[id.0].attrs.insert(k.into(), v.into());
        }
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn tag(&self, id: NodeId) -> &Tag {
        &self.nodes[id.0].tag
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0].attr(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        self.nodes[id.0].attrs.insert(name.into(), value.into());
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.nodes[id.0].attrs.remove(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Position of a node among its parent's children
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_of(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_of(id)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    // ========================================================================
    // Structural edits
    // ========================================================================

    /// Append `child` as the last child of `parent`, detaching it first
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` at `index` among the children of `parent`
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `node` immediately before `sibling`
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(sibling), self.index_of(sibling)) {
            self.insert(parent, index, node);
        }
    }

    /// Insert `node` immediately after `sibling`
    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(sibling), self.index_of(sibling)) {
            self.insert(parent, index + 1, node);
        }
    }

    /// Unlink a node from its parent; its tail travels with it
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Unlink a node, optionally leaving its tail text in place
    pub fn remove(&mut self, id: NodeId, leave_tail: bool) {
        if leave_tail {
            let tail = std::mem::take(&mut self.nodes[id.0].tail);
            if !tail.is_empty() {
                self.push_text_before(id, &tail);
            }
        }
        self.detach(id);
    }

    /// Append text at the text position just before `id`
    fn push_text_before(&mut self, id: NodeId, text: &str) {
        if let Some(prev) = self.prev_sibling(id) {
            self.nodes[prev.0].tail.push_str(text);
        } else if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].text.push_str(text);
        }
    }

    /// Append text after the last child of `parent` (or as its text)
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.nodes[parent.0].children.last().copied() {
            Some(last) => self.nodes[last.0].tail.push_str(text),
            None => self.nodes[parent.0].text.push_str(text),
        }
    }

    /// Replace a node with its text, children and tail
    pub fn replace_with_contents(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let text = std::mem::take(&mut self.nodes[id.0].text);
        let tail = std::mem::take(&mut self.nodes[id.0].tail);
        self.push_text_before(id, &text);

        let children = std::mem::take(&mut self.nodes[id.0].children);
        let mut index = self.index_of(id).unwrap_or(0);
        self.detach(id);
        for child in &children {
            self.nodes[child.0].parent = Some(parent);
            self.nodes[parent.0].children.insert(index, *child);
            index += 1;
        }

        match children.last() {
            Some(last) => self.nodes[last.0].tail.push_str(&tail),
            None if index > 0 => {
                let prev = self.nodes[parent.0].children[index - 1];
                self.nodes[prev.0].tail.push_str(&tail);
            }
            None => self.nodes[parent.0].text.push_str(&tail),
        }
    }

    /// Shallow copy: same tag and attributes, no text or children
    pub fn clone_shallow(&mut self, id: NodeId) -> NodeId {
        let tag = self.nodes[id.0].tag.clone();
        let attrs = self.nodes[id.0].attrs.clone();
        let copy = self.create(tag);
        self.nodes[copy.0].attrs = attrs;
        copy
    }

    /// Move `elem` up one level, splitting its parent around it
    ///
    /// Content of the parent before `elem` stays in a copy of the parent,
    /// content after it stays in the parent itself; either half is dropped
    /// when empty. Returns `false` if `elem` has no grandparent.
    pub fn unnest(&mut self, elem: NodeId) -> bool {
        let Some(parent) = self.parent(elem) else {
            return false;
        };
        if self.parent(parent).is_none() {
            return false;
        }
        let index = self.index_of(elem).unwrap_or(0);

        let pre = self.clone_shallow(parent);
        self.nodes[pre.0].text = std::mem::take(&mut self.nodes[parent.0].text);
        let before: Vec<NodeId> = self.children(parent)[..index].to_vec();
        for child in before {
            self.append(pre, child);
        }
        self.insert_before(parent, pre);
        if self.is_empty(pre, false) {
            self.remove(pre, true);
        }

        self.remove(elem, true);
        self.insert_before(parent, elem);

        if self.is_empty(parent, false) {
            self.remove(parent, true);
        }
        true
    }

    /// Push a copy of `elem` inside each matching child, then unwrap `elem`
    ///
    /// Used when an inline wrapper spans block children: each block ends up
    /// holding its own fragment of the wrapper.
    pub fn interior_nesting(&mut self, elem: NodeId, matches: impl Fn(&Tag) -> bool) {
        let targets: Vec<NodeId> = self
            .children(elem)
            .iter()
            .copied()
            .filter(|&c| matches(self.tag(c)))
            .collect();
        for target in targets {
            let inner = self.clone_shallow(elem);
            self.nodes[inner.0].text = std::mem::take(&mut self.nodes[target.0].text);
            let moved: Vec<NodeId> = self.children(target).to_vec();
            for child in moved {
                self.append(inner, child);
            }
            self.append(target, inner);
        }
        self.replace_with_contents(elem);
    }

    /// Split `elem` around each matching child so the child ends up a
    /// sibling of the fragments, with its own content wrapped in a copy of
    /// `elem`. Empty fragments are dropped.
    pub fn fragment_nesting(&mut self, elem: NodeId, matches: impl Fn(&Tag) -> bool) {
        let mut current = elem;
        loop {
            let Some(target) = self
                .children(current)
                .iter()
                .copied()
                .find(|&c| matches(self.tag(c)))
            else {
                break;
            };
            if self.parent(current).is_none() {
                break;
            }
            let index = self.index_of(target).unwrap_or(0);

            let inner = self.clone_shallow(current);
            self.nodes[inner.0].text = std::mem::take(&mut self.nodes[target.0].text);
            let moved: Vec<NodeId> = self.children(target).to_vec();
            for child in moved {
                self.append(inner, child);
            }
            if !self.is_empty(inner, false) {
                self.append(target, inner);
            }

            let rest = self.clone_shallow(current);
            self.nodes[rest.0].text = std::mem::take(&mut self.nodes[target.0].tail);
            let after: Vec<NodeId> = self.children(current)[index + 1..].to_vec();
            for child in after {
                self.append(rest, child);
            }

            self.insert_after(current, target);
            self.insert_after(target, rest);
            self.nodes[rest.0].tail = std::mem::take(&mut self.nodes[current.0].tail);

            if self.is_empty(current, false) {
                self.remove(current, true);
            }
            current = rest;
        }
        if current != elem && self.is_empty(current, false) {
            self.remove(current, true);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// No children and no text (optionally ignoring whitespace)
    pub fn is_empty(&self, id: NodeId, ignore_whitespace: bool) -> bool {
        let node = &self.nodes[id.0];
        node.children.is_empty()
            && if ignore_whitespace {
                node.text.trim().is_empty()
            } else {
                node.text.is_empty()
            }
    }

    /// Concatenated text of a node and its descendants, excluding its tail
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        out.push_str(&node.text);
        for &child in &node.children {
            self.collect_text(child, out);
            out.push_str(&self.nodes[child.0].tail);
        }
    }

    /// Descendants of `id` in document order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Every attached node in document order, root first
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root));
        out
    }

    /// Attached nodes matching a predicate, in document order
    pub fn select(&self, pred: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| pred(&self.nodes[id.0]))
            .collect()
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            out.push(p);
            cursor = self.parent(p);
        }
        out
    }

    /// Nearest ancestor matching a predicate
    pub fn find_ancestor(&self, id: NodeId, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .find(|&a| pred(&self.nodes[a.0]))
    }

    /// Outermost ancestor matching a predicate
    pub fn find_outermost_ancestor(
        &self,
        id: NodeId,
        pred: impl Fn(&Node) -> bool,
    ) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .rev()
            .find(|&a| pred(&self.nodes[a.0]))
    }

    pub fn has_ancestor(&self, id: NodeId, pred: impl Fn(&Node) -> bool) -> bool {
        self.find_ancestor(id, pred).is_some()
    }

    /// First node after `id` in document order, outside its subtree
    pub fn following(&self, id: NodeId, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        let order = self.preorder();
        let pos = order.iter().position(|&n| n == id)?;
        let skip = self.descendants(id).len();
        order[pos + 1 + skip..]
            .iter()
            .copied()
            .find(|&n| pred(&self.nodes[n.0]))
    }

    /// Nearest node before `id` in document order that is not an ancestor
    pub fn preceding(&self, id: NodeId, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        let order = self.preorder();
        let pos = order.iter().position(|&n| n == id)?;
        let ancestors = self.ancestors(id);
        order[..pos]
            .iter()
            .rev()
            .copied()
            .find(|n| !ancestors.contains(n) && pred(&self.nodes[n.0]))
    }

    /// Whether the node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).last() == Some(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `<p>a<span>b</span>c<p_break/>d<span>e</span>f</p>` inside body
    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let p = doc.create(Tag::P);
        doc.append(body, p);
        doc.node_mut(p).text = "a".into();
        let s1 = doc.create(Tag::Span);
        doc.node_mut(s1).text = "b".into();
        doc.node_mut(s1).tail = "c".into();
        doc.append(p, s1);
        let br = doc.create(Tag::PBreak);
        doc.node_mut(br).tail = "d".into();
        doc.append(p, br);
        let s2 = doc.create(Tag::Span);
        doc.node_mut(s2).text = "e".into();
        doc.node_mut(s2).tail = "f".into();
        doc.append(p, s2);
        (doc, p, br)
    }

    #[test]
    fn test_new_has_body() {
        let doc = Document::new();
        assert!(doc.body().is_some());
        assert_eq!(doc.tag(doc.root()), &Tag::Document);
    }

    #[test]
    fn test_unnest_splits_parent() {
        let (mut doc, p, br) = sample();
        assert!(doc.unnest(br));
        let body = doc.body().unwrap();
        let kids = doc.children(body).to_vec();
        assert_eq!(kids.len(), 3);
        assert_eq!(doc.text_content(kids[0]), "abc");
        assert_eq!(kids[1], br);
        assert!(doc.node(br).tail.is_empty());
        assert_eq!(kids[2], p);
        assert_eq!(doc.text_content(p), "def");
    }

    #[test]
    fn test_unnest_drops_empty_halves() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let p = doc.create(Tag::P);
        doc.append(body, p);
        let br = doc.create(Tag::PBreak);
        doc.append(p, br);
        doc.unnest(br);
        assert_eq!(doc.children(body), &[br]);
    }

    #[test]
    fn test_remove_leave_tail() {
        let (mut doc, p, br) = sample();
        doc.remove(br, true);
        assert_eq!(doc.text_content(p), "abcdef");
        assert_eq!(doc.children(p).len(), 2);
    }

    #[test]
    fn test_replace_with_contents() {
        let (mut doc, p, _) = sample();
        let s1 = doc.children(p)[0];
        doc.replace_with_contents(s1);
        assert_eq!(doc.node(p).text, "abc");
        assert_eq!(doc.text_content(p), "abcdef");
    }

    #[test]
    fn test_replace_with_contents_moves_children() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let outer = doc.create(Tag::Span);
        doc.append(body, outer);
        doc.node_mut(outer).text = "x".into();
        doc.node_mut(outer).tail = "z".into();
        let inner = doc.create(Tag::Tab);
        doc.node_mut(inner).tail = "y".into();
        doc.append(outer, inner);
        doc.replace_with_contents(outer);
        assert_eq!(doc.node(body).text, "x");
        assert_eq!(doc.children(body), &[inner]);
        assert_eq!(doc.node(inner).tail, "yz");
    }

    #[test]
    fn test_fragment_nesting() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let p = doc.create(Tag::P);
        doc.append(body, p);
        let span = doc.create_with(Tag::Span, [("class", "Em")]);
        doc.append(p, span);
        doc.node_mut(span).text = "one ".into();
        let link = doc.create(Tag::Hyperlink);
        doc.node_mut(link).text = "two".into();
        doc.node_mut(link).tail = " three".into();
        doc.append(span, link);

        doc.fragment_nesting(span, |t| t == &Tag::Hyperlink);

        let kids = doc.children(p).to_vec();
        assert_eq!(kids.len(), 3);
        assert_eq!(doc.tag(kids[0]), &Tag::Span);
        assert_eq!(doc.tag(kids[1]), &Tag::Hyperlink);
        assert_eq!(doc.tag(kids[2]), &Tag::Span);
        let inner = doc.children(kids[1])[0];
        assert_eq!(doc.attr(inner, "class"), Some("Em"));
        assert_eq!(doc.text_content(p), "one two three");
    }

    #[test]
    fn test_interior_nesting() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let link = doc.create_with(Tag::Hyperlink, [("href", "#x")]);
        doc.append(body, link);
        for text in ["first", "second"] {
            let p = doc.create(Tag::P);
            doc.node_mut(p).text = text.into();
            doc.append(link, p);
        }
        doc.interior_nesting(link, |t| t == &Tag::P);
        let paras = doc.children(body).to_vec();
        assert_eq!(paras.len(), 2);
        for p in paras {
            assert_eq!(doc.tag(p), &Tag::P);
            let inner = doc.children(p)[0];
            assert_eq!(doc.tag(inner), &Tag::Hyperlink);
            assert_eq!(doc.attr(inner, "href"), Some("#x"));
        }
    }

    #[test]
    fn test_following_and_preceding() {
        let (doc, p, br) = sample();
        let s2 = doc.following(br, |n| n.tag == Tag::Span).unwrap();
        assert_eq!(doc.node(s2).text, "e");
        let s1 = doc.preceding(br, |n| n.tag == Tag::Span).unwrap();
        assert_eq!(doc.node(s1).text, "b");
        assert!(doc.preceding(br, |n| n.tag == Tag::P).is_none());
        assert!(doc.has_ancestor(br, |n| n.tag == Tag::P));
        assert!(doc.is_attached(p));
    }
}
