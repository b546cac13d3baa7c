//! Render-source generation.
//!
//! Lowers the template IR to a single expression in a small JavaScript
//! subset: elements become `h("tag", {attrs}, [children])` calls, bound
//! attributes and interpolations are inlined as parenthesized expressions, and
//! directive attributes hand the element's code to their transform.

use crate::directive::DirectiveRegistry;
use crate::error::Result;
use crate::parse::{ElementNode, TemplateNode, TextPart};
use regex::Regex;

/// What code generation needs from the compiler configuration.
pub struct CodegenContext<'a> {
    pub h_name: &'a str,
    pub directives: &'a DirectiveRegistry,
    pub data_binding: &'a Regex,
}

pub fn generate(root: &ElementNode, ctx: &CodegenContext<'_>) -> Result<String> {
    generate_element(root, ctx)
}

fn generate_node(node: &TemplateNode, ctx: &CodegenContext<'_>) -> Result<String> {
    match node {
        TemplateNode::Element(el) => generate_element(el, ctx),
        TemplateNode::Text { parts } => Ok(generate_text(parts)),
    }
}

fn generate_element(el: &ElementNode, ctx: &CodegenContext<'_>) -> Result<String> {
    let mut directives = Vec::new();
    let mut props = Vec::new();

    for attr in &el.attributes {
        if let Some(transform) = ctx.directives.get(&attr.name) {
            directives.push((transform, attr.value.as_str()));
            continue;
        }
        let entry = match ctx.data_binding.captures(&attr.name) {
            Some(caps) => {
                let target = caps.get(1).map(|m| m.as_str()).unwrap_or(attr.name.as_str());
                format!("\"{}\": ({})", escape_js_string(target), attr.value)
            }
            None => format!(
                "\"{}\": \"{}\"",
                escape_js_string(&attr.name),
                escape_js_string(&attr.value)
            ),
        };
        props.push(entry);
    }

    let children = el
        .children
        .iter()
        .map(|child| generate_node(child, ctx))
        .collect::<Result<Vec<_>>>()?;

    let mut code = format!(
        "{}(\"{}\", {{{}}}, [{}])",
        ctx.h_name,
        escape_js_string(&el.tag),
        props.join(", "),
        children.join(", ")
    );

    // The first directive written on the element ends up outermost.
    for (transform, value) in directives.into_iter().rev() {
        let body = code;
        code = transform(value, &|| body.clone())?;
    }

    Ok(code)
}

fn generate_text(parts: &[TextPart]) -> String {
    // A lone interpolation keeps its value as is, so it may yield nodes.
    if let [TextPart::Expression(expr)] = parts {
        return format!("({})", expr);
    }
    parts
        .iter()
        .map(|part| match part {
            TextPart::Literal(text) => format!("\"{}\"", escape_js_string(text)),
            TextPart::Expression(expr) => format!("({})", expr),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
