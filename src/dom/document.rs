use crate::dom::element::ElementNode;
use crate::error::{BridgeError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    tag_name: String,
    attributes: IndexMap<String, String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
}

/// A live element tree with stable node handles
///
/// Nodes are stored in an arena; removing a node detaches it (and its
/// subtree) but keeps the handle resolvable so stale references fail softly.
/// Detached slots are never freed, so content that comes and goes should be
/// put back with [`Document::reattach`] rather than rebuilt.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty `html > (head, body)` document
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };
        doc.root = doc.alloc(&ElementNode::new("html"), None);
        doc.head = doc.alloc(&ElementNode::new("head"), Some(doc.root));
        doc.body = doc.alloc(&ElementNode::new("body"), Some(doc.root));
        doc
    }

    /// Build a document whose body mirrors `body`
    ///
    /// If the given tree is not itself a `body` element it is appended under one.
    pub fn from_body(body: ElementNode) -> Self {
        let mut doc = Self::new();
        let target = doc.body;
        if body.is_tag("body") {
            for (key, value) in &body.attributes {
                doc.nodes[target.0].attributes.insert(key.clone(), value.clone());
            }
            doc.nodes[target.0].text = body.text_content.clone();
            for child in &body.children {
                doc.insert_tree(target, child);
            }
        } else {
            doc.insert_tree(target, &body);
        }
        doc
    }

    fn alloc(&mut self, node: &ElementNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let attached = parent.is_none_or(|p| self.nodes[p.0].attached);
        self.nodes.push(NodeData {
            tag_name: node.tag_name.to_ascii_lowercase(),
            attributes: node.attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            text: node.text_content.clone(),
            parent,
            children: Vec::new(),
            attached,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    fn insert_tree(&mut self, parent: NodeId, node: &ElementNode) -> NodeId {
        let id = self.alloc(node, Some(parent));
        for child in &node.children {
            self.insert_tree(id, child);
        }
        id
    }

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(id.0).ok_or(BridgeError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes.get_mut(id.0).ok_or(BridgeError::NodeNotFound(id))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Insert a subtree as the last child of `parent`, returning the new subtree root
    pub fn append(&mut self, parent: NodeId, node: &ElementNode) -> Result<NodeId> {
        self.node(parent)?;
        Ok(self.insert_tree(parent, node))
    }

    /// Detach a node and its subtree from the document
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
        self.node_mut(id)?.parent = None;

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let data = &mut self.nodes[current.0];
            data.attached = false;
            stack.extend(data.children.iter().copied());
        }
        Ok(())
    }

    /// Put a previously removed node (and its subtree) back as the last child of `parent`
    pub fn reattach(&mut self, parent: NodeId, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if node.attached || node.parent.is_some() {
            return Err(BridgeError::NodeAttached(id));
        }
        let parent_attached = self.node(parent)?.attached;
        if !parent_attached {
            return Err(BridgeError::NodeNotFound(parent));
        }

        self.nodes[parent.0].children.push(id);
        self.nodes[id.0].parent = Some(parent);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let data = &mut self.nodes[current.0];
            data.attached = true;
            stack.extend(data.children.iter().copied());
        }
        Ok(())
    }

    /// Whether the node is still part of the document
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok_and(|n| n.attached)
    }

    /// Lower-case tag name
    pub fn tag_name(&self, id: NodeId) -> Result<&str> {
        Ok(self.node(id)?.tag_name.as_str())
    }

    pub fn get_attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id).ok()?.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, id: NodeId, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.attributes.insert(key.into(), value.into());
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Result<()> {
        self.node_mut(id)?.attributes.shift_remove(key);
        Ok(())
    }

    /// The id attribute, empty when absent
    pub fn element_id(&self, id: NodeId) -> &str {
        self.get_attribute(id, "id").unwrap_or_default()
    }

    /// The raw class attribute, empty when absent
    pub fn class_name(&self, id: NodeId) -> &str {
        self.get_attribute(id, "class").unwrap_or_default()
    }

    /// Class tokens in attribute order
    pub fn class_list(&self, id: NodeId) -> Vec<&str> {
        self.class_name(id).split_whitespace().collect()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_list(id).contains(&class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let current = self.class_name(id);
        let updated = if current.trim().is_empty() {
            class.to_string()
        } else {
            format!("{} {}", current.trim_end(), class)
        };
        self.set_attribute(id, "class", updated)
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        if !self.has_class(id, class) {
            return Ok(());
        }
        let updated = self
            .class_list(id)
            .into_iter()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(id, "class", updated)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok()?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    /// Concatenated text of the node and its descendants in document order
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else { return };
        if let Some(text) = &node.text {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    /// Attached nodes under `from` (inclusive) in document order
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            let Ok(node) = self.node(current) else { continue };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Every attached node carrying `class`
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.has_class(*id, class))
            .collect()
    }

    /// `href` values of anchors whose href starts with `prefix`, in document order
    pub fn link_hrefs_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.tag_name(*id).is_ok_and(|tag| tag == "a"))
            .filter_map(|id| self.get_attribute(id, "href"))
            .filter(|href| href.starts_with(prefix))
            .map(str::to_string)
            .collect()
    }

    /// First attached node whose id attribute equals `element_id`
    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        if element_id.is_empty() {
            return None;
        }
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.element_id(*id) == element_id)
    }

    /// First attached node matching a simple selector
    ///
    /// Understands the forms produced by [`generate_selector`](crate::dom::generate_selector):
    /// `#id`, `.a.b`, `tag` and `tag:nth-child(k)` (k counted among same-tag siblings).
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.matches(*id, selector))
    }

    fn matches(&self, id: NodeId, selector: &str) -> bool {
        let selector = selector.trim();
        if let Some(element_id) = selector.strip_prefix('#') {
            return !element_id.is_empty() && self.element_id(id) == element_id;
        }
        if let Some(classes) = selector.strip_prefix('.') {
            return classes.split('.').all(|c| self.has_class(id, c));
        }

        let Ok(tag) = self.tag_name(id) else { return false };
        match selector.split_once(":nth-child(") {
            Some((want_tag, rest)) => {
                let position = rest.trim_end_matches(')').parse::<usize>().ok();
                tag == want_tag && position.is_some() && self.same_tag_position(id) == position
            }
            None => tag == selector,
        }
    }

    /// 1-based position of a node among siblings sharing its tag
    pub fn same_tag_position(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        let tag = self.tag_name(id).ok()?;
        self.children(parent)
            .iter()
            .filter(|sibling| self.tag_name(**sibling).is_ok_and(|t| t == tag))
            .position(|sibling| *sibling == id)
            .map(|index| index + 1)
    }

    /// Number of attached nodes
    pub fn count_elements(&self) -> usize {
        self.descendants(self.root).len()
    }
}
