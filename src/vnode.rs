//! Virtual tree nodes and the node constructor handed to render functions.

use crate::dom;
use markup5ever_rcdom::Handle;
use std::collections::BTreeMap;

pub type Attrs = BTreeMap<String, String>;

/// Node constructor signature. Render functions receive this as `h`.
pub type H = fn(&str, Attrs, Vec<VNode>) -> VNode;

#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    Element {
        tag: String,
        attrs: Attrs,
        children: Vec<VNode>,
    },
    Text(String),
    /// Renders nothing. Produced by a false conditional.
    Empty,
}

/// Build an element node. `Empty` children are dropped so child positions
/// line up one-to-one with the materialized DOM children.
pub fn h(tag: &str, attrs: Attrs, children: Vec<VNode>) -> VNode {
    VNode::Element {
        tag: tag.to_string(),
        attrs,
        children: children
            .into_iter()
            .filter(|child| !matches!(child, VNode::Empty))
            .collect(),
    }
}

impl VNode {
    pub fn text(value: impl Into<String>) -> Self {
        VNode::Text(value.into())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Materialize this tree as detached DOM nodes.
    pub fn create_element(&self) -> Handle {
        match self {
            VNode::Element {
                tag,
                attrs,
                children,
            } => {
                let el = dom::create_element(
                    tag,
                    attrs.iter().map(|(name, value)| (name.as_str(), value.as_str())),
                );
                for child in children {
                    dom::append_child(&el, child.create_element());
                }
                el
            }
            VNode::Text(text) => dom::create_text(text),
            VNode::Empty => dom::create_text(""),
        }
    }
}

/// Shorthand for building attribute maps in render functions.
#[macro_export]
macro_rules! attrs {
    () => { $crate::Attrs::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::Attrs::new();
        $( attrs.insert($name.to_string(), $value.to_string()); )+
        attrs
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_h_drops_empty_children() {
        let node = h("div", Attrs::new(), vec![VNode::Empty, VNode::text("a")]);
        assert_eq!(node.children(), &[VNode::text("a")]);
    }

    #[test]
    fn test_create_element_structure() {
        let node = h(
            "ul",
            crate::attrs! { "class" => "list" },
            vec![
                h("li", Attrs::new(), vec![VNode::text("one")]),
                h("li", Attrs::new(), vec![VNode::text("two")]),
            ],
        );
        let el = node.create_element();
        assert_eq!(dom::tag_name(&el), Some("ul".to_string()));
        assert_eq!(dom::get_attribute(&el, "class"), Some("list".to_string()));
        assert_eq!(el.children.borrow().len(), 2);
        assert_eq!(dom::text_content(&el), "onetwo");
    }
}
