//! Position-based tree diff and the patcher that applies it to live nodes.
//!
//! Children are compared index by index; there are no keys and no move
//! detection. Operations are emitted in pre-order so that applying them in
//! sequence never invalidates a later path.

use crate::dom;
use crate::error::{Error, Result};
use crate::vnode::VNode;
use markup5ever_rcdom::Handle;

#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Swap the node at `path` for a freshly materialized `node`. `index` is
    /// the node's position among its element siblings, `-1` when unknown.
    Replace {
        path: Vec<usize>,
        index: isize,
        node: VNode,
    },
    SetText {
        path: Vec<usize>,
        text: String,
    },
    SetAttr {
        path: Vec<usize>,
        name: String,
        value: String,
    },
    RemoveAttr {
        path: Vec<usize>,
        name: String,
    },
    Append {
        path: Vec<usize>,
        node: VNode,
    },
    Truncate {
        path: Vec<usize>,
        len: usize,
    },
}

/// Ordered operations turning `old` into `new`.
///
/// Without an old tree the whole root is replaced; `index` is recorded on that
/// root replacement.
pub fn diff(old: Option<&VNode>, new: &VNode, index: isize) -> Vec<Patch> {
    let mut patches = Vec::new();
    match old {
        None => patches.push(Patch::Replace {
            path: Vec::new(),
            index,
            node: new.clone(),
        }),
        Some(old) => diff_node(old, new, &mut Vec::new(), index, &mut patches),
    }
    patches
}

fn diff_node(old: &VNode, new: &VNode, path: &mut Vec<usize>, index: isize, out: &mut Vec<Patch>) {
    match (old, new) {
        (
            VNode::Element {
                tag: old_tag,
                attrs: old_attrs,
                children: old_children,
            },
            VNode::Element {
                tag: new_tag,
                attrs: new_attrs,
                children: new_children,
            },
        ) if old_tag == new_tag => {
            for name in old_attrs.keys() {
                if !new_attrs.contains_key(name) {
                    out.push(Patch::RemoveAttr {
                        path: path.clone(),
                        name: name.clone(),
                    });
                }
            }
            for (name, value) in new_attrs {
                if old_attrs.get(name) != Some(value) {
                    out.push(Patch::SetAttr {
                        path: path.clone(),
                        name: name.clone(),
                        value: value.clone(),
                    });
                }
            }

            let common = old_children.len().min(new_children.len());
            for i in 0..common {
                path.push(i);
                diff_node(&old_children[i], &new_children[i], path, i as isize, out);
                path.pop();
            }
            if new_children.len() > common {
                for child in &new_children[common..] {
                    out.push(Patch::Append {
                        path: path.clone(),
                        node: child.clone(),
                    });
                }
            } else if old_children.len() > common {
                out.push(Patch::Truncate {
                    path: path.clone(),
                    len: common,
                });
            }
        }
        (VNode::Text(old_text), VNode::Text(new_text)) => {
            if old_text != new_text {
                out.push(Patch::SetText {
                    path: path.clone(),
                    text: new_text.clone(),
                });
            }
        }
        (VNode::Empty, VNode::Empty) => {}
        _ => out.push(Patch::Replace {
            path: path.clone(),
            index,
            node: new.clone(),
        }),
    }
}

/// Apply `patches` to the live tree rooted at `root`.
///
/// Returns the root afterwards, which differs from `root` only when the root
/// itself was replaced.
pub fn patch(root: &Handle, patches: &[Patch]) -> Result<Handle> {
    let mut root = root.clone();
    for op in patches {
        match op {
            Patch::Replace { path, index, node } if path.is_empty() => {
                let replacement = node.create_element();
                if !dom::replace_node(&root, replacement.clone()) {
                    tracing::debug!(index, "replaced a detached root");
                }
                root = replacement;
            }
            Patch::Replace { path, node, .. } => {
                let target = resolve(&root, path)?;
                dom::replace_node(&target, node.create_element());
            }
            Patch::SetText { path, text } => {
                let target = resolve(&root, path)?;
                if !dom::set_text(&target, text) {
                    return Err(Error::Patch(format!("node at {:?} is not text", path)));
                }
            }
            Patch::SetAttr { path, name, value } => {
                dom::set_attribute(&resolve(&root, path)?, name, value);
            }
            Patch::RemoveAttr { path, name } => {
                dom::remove_attribute(&resolve(&root, path)?, name);
            }
            Patch::Append { path, node } => {
                dom::append_child(&resolve(&root, path)?, node.create_element());
            }
            Patch::Truncate { path, len } => {
                dom::truncate_children(&resolve(&root, path)?, *len);
            }
        }
    }
    Ok(root)
}

fn resolve(root: &Handle, path: &[usize]) -> Result<Handle> {
    let mut node = root.clone();
    for &i in path {
        node = dom::child_at(&node, i)
            .ok_or_else(|| Error::Patch(format!("no node at {:?}", path)))?;
    }
    Ok(node)
}
