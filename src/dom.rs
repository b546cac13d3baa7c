//! Live document backing the components.
//!
//! The tree is an html5ever `RcDom`; handles are shared `Rc<Node>` values so a
//! component, its parent element and the caller can all hold the same node.
//! Every mutation goes through the helpers below, which keep the parent
//! back-references consistent.

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::{ElementFlags, TreeSink};
use html5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tendril::StrTendril;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const EMPTY_DOCUMENT: &str = "<!DOCTYPE html><html><head></head><body></body></html>";

/// An html document that components can be mounted into.
pub struct Document {
    root: Handle,
}

impl Document {
    pub fn new() -> Self {
        Self::parse(EMPTY_DOCUMENT)
    }

    /// Parse a complete html document. html5ever recovers from any input, so
    /// this never fails.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        Document { root: dom.document }
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    pub fn body(&self) -> Option<Handle> {
        find_first(&self.root, &|node| tag_name(node).as_deref() == Some("body"))
    }

    /// First element in document order matching `selector`.
    ///
    /// Supported forms: `#id`, `.class` and a bare tag name.
    pub fn query_selector(&self, selector: &str) -> Option<Handle> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        if let Some(id) = selector.strip_prefix('#') {
            find_first(&self.root, &|node| get_attribute(node, "id").as_deref() == Some(id))
        } else if let Some(class) = selector.strip_prefix('.') {
            find_first(&self.root, &|node| {
                get_attribute(node, "class")
                    .map(|classes| classes.split_whitespace().any(|c| c == class))
                    .unwrap_or(false)
            })
        } else {
            let wanted = selector.to_lowercase();
            find_first(&self.root, &|node| tag_name(node).as_deref() == Some(wanted.as_str()))
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn find_first(node: &Handle, matches: &dyn Fn(&Handle) -> bool) -> Option<Handle> {
    for child in node.children.borrow().iter() {
        if is_element(child) && matches(child) {
            return Some(child.clone());
        }
        if let Some(found) = find_first(child, matches) {
            return Some(found);
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE CONSTRUCTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Create a detached html element.
pub fn create_element<'a>(tag: &str, attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Handle {
    let attrs = attrs
        .into_iter()
        .map(|(name, value)| Attribute {
            name: attribute_name(name),
            value: StrTendril::from_slice(value),
        })
        .collect();
    let name = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag));
    let mut sink = RcDom::default();
    sink.create_element(name, attrs, ElementFlags::default())
}

/// Create a detached text node.
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

fn attribute_name(name: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(name))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE MUTATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

/// Remove `node` from its parent, if any.
pub fn detach(node: &Handle) {
    if let Some(parent) = parent_of(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

pub fn append_child(parent: &Handle, child: Handle) {
    detach(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Drop every child of `node` (the `innerHTML = ''` of the browser).
pub fn clear_children(node: &Handle) {
    let children = std::mem::take(&mut *node.children.borrow_mut());
    for child in children {
        child.parent.set(None);
    }
}

/// Keep the first `len` children of `node` and drop the rest.
pub fn truncate_children(node: &Handle, len: usize) {
    let removed: Vec<Handle> = {
        let mut children = node.children.borrow_mut();
        if children.len() <= len {
            return;
        }
        children.split_off(len)
    };
    for child in removed {
        child.parent.set(None);
    }
}

/// Put `new` where `old` is. Returns false when `old` has no parent.
pub fn replace_node(old: &Handle, new: Handle) -> bool {
    let Some(parent) = parent_of(old) else {
        return false;
    };
    detach(&new);
    let mut children = parent.children.borrow_mut();
    let Some(position) = children.iter().position(|child| Rc::ptr_eq(child, old)) else {
        return false;
    };
    new.parent.set(Some(Rc::downgrade(&parent)));
    children[position] = new;
    old.parent.set(None);
    true
}

/// Index of `node` among its parent's element children, or -1 when detached.
pub fn element_index(node: &Handle) -> isize {
    let Some(parent) = parent_of(node) else {
        return -1;
    };
    let children = parent.children.borrow();
    children
        .iter()
        .filter(|child| is_element(child))
        .position(|child| Rc::ptr_eq(child, node))
        .map(|index| index as isize)
        .unwrap_or(-1)
}

pub fn child_at(node: &Handle, index: usize) -> Option<Handle> {
    node.children.borrow().get(index).cloned()
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSPECTION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn get_attribute(node: &Handle, attr: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn set_attribute(node: &Handle, attr: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr) {
            Some(existing) => existing.value = StrTendril::from_slice(value),
            None => attrs.push(Attribute {
                name: attribute_name(attr),
                value: StrTendril::from_slice(value),
            }),
        }
    }
}

pub fn remove_attribute(node: &Handle, attr: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        attrs.borrow_mut().retain(|a| a.name.local.as_ref() != attr);
    }
}

/// Replace the data of a text node. Returns false for non-text nodes.
pub fn set_text(node: &Handle, text: &str) -> bool {
    match &node.data {
        NodeData::Text { contents } => {
            *contents.borrow_mut() = StrTendril::from_slice(text);
            true
        }
        _ => false,
    }
}

/// Concatenated text of `node` and all of its descendants.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

/// Serialized html of an element including the element itself.
pub fn outer_html(node: &Handle) -> String {
    let mut bytes = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    if let Err(e) = serialize(&mut bytes, &handle, opts) {
        tracing::warn!("failed to serialize node: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
