//! Template parsing.
//!
//! Templates are html with `{{ expression }}` interpolations in text. They are
//! parsed with html5ever into a small IR: elements with raw attributes, and
//! text split into literal and expression parts.

use crate::error::{Error, Result};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

lazy_static! {
    /// Placeholder substituted for interpolations before html parsing.
    static ref EXPR_PLACEHOLDER_RE: Regex = Regex::new(r"__Y_EXPR_(\d+)__").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE IR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeIR {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<AttributeIR>,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TextPart {
    Literal(String),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateNode {
    Element(ElementNode),
    Text { parts: Vec<TextPart> },
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

struct Interpolation {
    /// Original matched text, restored where interpolation is not supported.
    raw: String,
    expression: String,
}

/// Replace every interpolation with a placeholder so html5ever sees plain
/// text even when the expression contains `<` or `>`.
fn normalize_interpolations(
    html: &str,
    interpolation: &Regex,
) -> (String, HashMap<String, Interpolation>) {
    let mut found = HashMap::new();
    let mut counter = 0;
    let normalized = interpolation.replace_all(html, |caps: &regex::Captures| {
        let raw = caps[0].to_string();
        let expression = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or(raw.as_str())
            .trim()
            .to_string();
        let placeholder = format!("__Y_EXPR_{}__", counter);
        counter += 1;
        found.insert(placeholder.clone(), Interpolation { raw, expression });
        placeholder
    });
    (normalized.into_owned(), found)
}

/// Put the original interpolation text back into `value`.
fn restore_raw(value: &str, found: &HashMap<String, Interpolation>) -> String {
    EXPR_PLACEHOLDER_RE
        .replace_all(value, |caps: &regex::Captures| {
            found
                .get(&caps[0])
                .map(|i| i.raw.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Split text on placeholders into literal and expression parts.
fn split_text(text: &str, found: &HashMap<String, Interpolation>) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut last_end = 0;

    for m in EXPR_PLACEHOLDER_RE.find_iter(text) {
        let Some(interpolation) = found.get(m.as_str()) else {
            continue;
        };
        if m.start() > last_end {
            parts.push(TextPart::Literal(text[last_end..m.start()].to_string()));
        }
        parts.push(TextPart::Expression(interpolation.expression.clone()));
        last_end = m.end();
    }

    if last_end < text.len() {
        parts.push(TextPart::Literal(text[last_end..].to_string()));
    }

    parts
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE PARSING
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_dom_node(handle: &Handle, found: &HashMap<String, Interpolation>) -> Option<TemplateNode> {
    match &handle.data {
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if text.trim().is_empty() {
                return None;
            }
            Some(TemplateNode::Text {
                parts: split_text(&text, found),
            })
        }

        NodeData::Element { name, attrs, .. } => {
            let attributes = attrs
                .borrow()
                .iter()
                .map(|attr| AttributeIR {
                    name: attr.name.local.to_string(),
                    value: restore_raw(&attr.value, found),
                })
                .collect();

            let children = handle
                .children
                .borrow()
                .iter()
                .filter_map(|child| parse_dom_node(child, found))
                .collect();

            Some(TemplateNode::Element(ElementNode {
                tag: name.local.to_string(),
                attributes,
                children,
            }))
        }

        _ => None,
    }
}

/// Collect the nodes the author wrote, skipping the html/head/body wrappers
/// html5ever always adds.
fn collect_body_content(
    handle: &Handle,
    nodes: &mut Vec<TemplateNode>,
    found: &HashMap<String, Interpolation>,
) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Element { name, .. } => {
                let tag = name.local.to_string();
                if tag == "html" || tag == "head" || tag == "body" {
                    collect_body_content(child, nodes, found);
                } else if let Some(node) = parse_dom_node(child, found) {
                    nodes.push(node);
                }
            }
            NodeData::Text { .. } => {
                if let Some(node) = parse_dom_node(child, found) {
                    nodes.push(node);
                }
            }
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a template into its single root element.
pub fn parse_template(html: &str, interpolation: &Regex) -> Result<ElementNode> {
    let (normalized, found) = normalize_interpolations(html, interpolation);

    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut normalized.as_bytes())
        .map_err(|e| Error::Template(format!("failed to parse html: {}", e)))?;

    let mut nodes = Vec::new();
    collect_body_content(&dom.document, &mut nodes, &found);

    let mut nodes = nodes.into_iter();
    match (nodes.next(), nodes.next()) {
        (Some(TemplateNode::Element(root)), None) => Ok(root),
        (None, _) => Err(Error::Template(
            "template has no root element".to_string(),
        )),
        _ => Err(Error::Template(
            "template must have exactly one root element".to_string(),
        )),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
