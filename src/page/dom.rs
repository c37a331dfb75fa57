//! Page document model.
//!
//! An arena-backed element tree with open shadow roots and a mutation log.
//! The style injector only needs elements, attributes, text content and shadow
//! roots, so that is all this models. `NodeId`s index the arena and are only
//! meaningful for the document that created them.

use std::collections::{BTreeMap, VecDeque};

pub type NodeId = usize;

/// What a mutation observer watching the whole subtree would report.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    ChildList { target: NodeId },
    Attributes { target: NodeId, name: String },
    CharacterData { target: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Element,
    ShadowRoot,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    shadow_root: Option<NodeId>,
    host: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, tag: &str) -> Self {
        Self {
            kind,
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            shadow_root: None,
            host: None,
        }
    }
}

/// One loaded page.
#[derive(Debug, Clone)]
pub struct Document {
    url: String,
    nodes: Vec<Node>,
    document_element: NodeId,
    head: NodeId,
    body: NodeId,
    mutations: Vec<MutationRecord>,
}

impl Document {
    /// Creates `<html><head></head><body></body></html>` for `url`.
    pub fn new(url: &str) -> Self {
        let mut doc = Self {
            url: url.to_string(),
            nodes: vec![Node::new(NodeKind::Element, "html")],
            document_element: 0,
            head: 0,
            body: 0,
            mutations: Vec::new(),
        };
        doc.head = doc.create_element("head");
        doc.body = doc.create_element("body");
        doc.link(0, doc.head);
        doc.link(0, doc.body);
        doc
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document_element(&self) -> NodeId {
        self.document_element
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// True when `node` was created by this document.
    pub fn contains(&self, node: NodeId) -> bool {
        node < self.nodes.len()
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Node::new(NodeKind::Element, tag));
        self.nodes.len() - 1
    }

    /// Creates an element and appends it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        self.append_child(parent, id);
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node].parent.take()?;
        self.nodes[parent].children.retain(|&c| c != node);
        Some(parent)
    }

    /// Moves `child` under `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.unlink(child) {
            self.mutations.push(MutationRecord::ChildList { target: old });
        }
        self.link(parent, child);
        self.mutations.push(MutationRecord::ChildList { target: parent });
    }

    /// Detaches `node` from the tree. Returns false if it was already detached.
    pub fn remove(&mut self, node: NodeId) -> bool {
        match self.unlink(node) {
            Some(parent) => {
                self.mutations.push(MutationRecord::ChildList { target: parent });
                true
            }
            None => false,
        }
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node].tag
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node].attributes.get(name).map(String::as_str)
    }

    /// Sets an attribute, recording a mutation only when the value changes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let attrs = &mut self.nodes[node].attributes;
        if attrs.get(name).map(String::as_str) == Some(value) {
            return;
        }
        attrs.insert(name.to_string(), value.to_string());
        self.mutations.push(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
        });
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if self.nodes[node].attributes.remove(name).is_some() {
            self.mutations.push(MutationRecord::Attributes {
                target: node,
                name: name.to_string(),
            });
        }
    }

    pub fn text(&self, node: NodeId) -> &str {
        &self.nodes[node].text
    }

    /// Replaces the text content of `node` when it differs.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if self.nodes[node].text == text {
            return;
        }
        self.nodes[node].text = text.to_string();
        self.mutations.push(MutationRecord::CharacterData { target: node });
    }

    /// Attaches an open shadow root to `host`, or returns the existing one.
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(root) = self.nodes[host].shadow_root {
            return root;
        }
        let mut root = Node::new(NodeKind::ShadowRoot, "#shadow-root");
        root.host = Some(host);
        self.nodes.push(root);
        let id = self.nodes.len() - 1;
        self.nodes[host].shadow_root = Some(id);
        self.mutations.push(MutationRecord::ChildList { target: host });
        id
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.nodes[host].shadow_root
    }

    pub fn is_shadow_root(&self, node: NodeId) -> bool {
        self.nodes[node].kind == NodeKind::ShadowRoot
    }

    /// The element a shadow root is attached to.
    pub fn host_of(&self, root: NodeId) -> Option<NodeId> {
        self.nodes[root].host
    }

    /// True when `node` is reachable from the document element, crossing
    /// shadow boundaries through their hosts.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.document_element {
                return true;
            }
            let n = &self.nodes[current];
            match (n.parent, n.host) {
                (Some(p), _) => current = p,
                (None, Some(h)) => current = h,
                (None, None) => return false,
            }
        }
    }

    /// Depth-first walk of `scope`'s light tree. Does not enter shadow roots.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[scope].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node].children.iter().rev().copied());
        }
        out
    }

    /// Finds the first element with `id` inside `scope` (document element or shadow root).
    pub fn find_by_id(&self, scope: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&n| self.get_attribute(n, "id") == Some(id))
    }

    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.descendants(scope)
            .into_iter()
            .filter(|&n| self.nodes[n].tag == tag)
            .collect()
    }

    /// Every shadow root reachable from the document, breadth-first, including
    /// roots nested inside other shadow roots.
    pub fn shadow_roots(&self) -> Vec<NodeId> {
        let mut roots = Vec::new();
        let mut queue = VecDeque::from([self.document_element]);
        while let Some(node) = queue.pop_front() {
            if let Some(root) = self.nodes[node].shadow_root {
                roots.push(root);
                queue.push_back(root);
            }
            queue.extend(self.nodes[node].children.iter().copied());
        }
        roots
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }

    /// Drains the mutation log.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Serializes the tree, with shadow roots as declarative templates.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(self.document_element, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let n = &self.nodes[node];
        if n.kind == NodeKind::ShadowRoot {
            out.push_str("<template shadowrootmode=\"open\">");
            for &child in &n.children {
                self.write_html(child, out);
            }
            out.push_str("</template>");
            return;
        }
        out.push('<');
        out.push_str(&n.tag);
        for (name, value) in &n.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, value.replace('"', "&quot;")));
        }
        out.push('>');
        if let Some(root) = n.shadow_root {
            self.write_html(root, out);
        }
        out.push_str(&n.text);
        for &child in &n.children {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(&n.tag);
        out.push('>');
    }
}
