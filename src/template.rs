//! Template compilation entry points.
//!
//! `template` merges caller options over the defaults and compiles html into
//! a `Template`, which holds the generated render source and evaluates it
//! against a props mapping on every render.

use crate::bindings;
use crate::codegen::{generate, CodegenContext};
use crate::component::RenderFn;
use crate::directive::DirectiveRegistry;
use crate::error::{Error, Result};
use crate::eval::{check_syntax, Interpreter, Value};
use crate::parse::{parse_template, ElementNode};
use crate::reactive::Props;
use crate::vnode::{h, VNode, H};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    static ref DEFAULT_INTERPOLATION: Regex = Regex::new(r"\{\{(.+?)\}\}").unwrap();
    static ref DEFAULT_DATA_BINDING: Regex = Regex::new(r"^:(\S+)$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Caller overrides for `template`. Unset fields fall back to the defaults.
///
/// The string fields deserialize from camelCase JSON; the node constructor
/// and directive registry can only be set in code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateOptions {
    /// Name the render source uses to call the node constructor.
    pub h_name: Option<String>,
    pub interpolation: Option<String>,
    pub data_binding: Option<String>,
    #[serde(skip)]
    pub h: Option<H>,
    #[serde(skip)]
    pub directives: Option<DirectiveRegistry>,
}

/// Fully resolved compiler configuration.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub h: H,
    pub h_name: String,
    pub directives: DirectiveRegistry,
    /// Capture group 1 is the interpolated expression.
    pub interpolation: Regex,
    /// Capture group 1 is the bound attribute's name.
    pub data_binding: Regex,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            h,
            h_name: "h".to_string(),
            directives: DirectiveRegistry::default(),
            interpolation: DEFAULT_INTERPOLATION.clone(),
            data_binding: DEFAULT_DATA_BINDING.clone(),
        }
    }
}

impl CompilerConfig {
    /// Apply `options` over this configuration; set options win.
    pub fn merge(mut self, options: TemplateOptions) -> Result<Self> {
        if let Some(h) = options.h {
            self.h = h;
        }
        if let Some(h_name) = options.h_name {
            self.h_name = h_name;
        }
        if let Some(directives) = options.directives {
            self.directives = directives;
        }
        if let Some(pattern) = options.interpolation {
            self.interpolation = Regex::new(&pattern)?;
        }
        if let Some(pattern) = options.data_binding {
            self.data_binding = Regex::new(&pattern)?;
        }
        Ok(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile `source` with the defaults overridden by `options`.
pub fn template(source: &str, options: TemplateOptions) -> Result<Template> {
    let config = CompilerConfig::default().merge(options)?;
    compile(source, &config)
}

pub fn compile(source: &str, config: &CompilerConfig) -> Result<Template> {
    let root = parse_template(source, &config.interpolation)?;
    let ctx = CodegenContext {
        h_name: &config.h_name,
        directives: &config.directives,
        data_binding: &config.data_binding,
    };
    let render_source = generate(&root, &ctx)?;
    // Directive output is arbitrary text; reject it here rather than at render.
    check_syntax(&render_source)?;
    tracing::debug!(
        root = %root.tag,
        len = render_source.len(),
        "compiled template"
    );

    Ok(Template {
        source: render_source,
        h_name: config.h_name.clone(),
        h: config.h,
        root,
    })
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    h_name: String,
    h: H,
    root: ElementNode,
}

impl Template {
    /// The generated render expression.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed template structure the source was generated from.
    pub fn root(&self) -> &ElementNode {
        &self.root
    }

    pub fn h_name(&self) -> &str {
        &self.h_name
    }

    /// Props the render reads, sorted. Loop variables are excluded.
    pub fn referenced_names(&self) -> Result<Vec<String>> {
        bindings::referenced_names(&self.source, &self.h_name)
    }

    /// Render with the configured node constructor.
    pub fn render(&self, props: &Props) -> Result<VNode> {
        self.render_with(self.h, props, &[])
    }

    /// Render with `h` and extra `locals`, which shadow props of the same name.
    pub fn render_with(&self, h: H, props: &Props, locals: &[(&str, Value)]) -> Result<VNode> {
        let snapshot = props.snapshot();
        let mut interpreter = Interpreter::new(&self.h_name, h, &snapshot);
        for (name, value) in locals {
            interpreter = interpreter.with_local(*name, value.clone());
        }
        match interpreter.evaluate(&self.source)? {
            Value::Node(node) => Ok(node),
            Value::Undefined | Value::Null | Value::Bool(false) => Ok(VNode::Empty),
            other => Err(Error::Eval(format!(
                "render must produce a single node, got {}",
                other.to_display()
            ))),
        }
    }

    /// A render function over live `props`, with `children` readable as the
    /// `children` local. Hand the result to `define_component`.
    pub fn render_fn(&self, props: Props, children: Vec<VNode>) -> RenderFn {
        let template = self.clone();
        let children = Value::Array(children.into_iter().map(Value::Node).collect());
        Box::new(move |h| template.render_with(h, &props, &[("children", children.clone())]))
    }
}
