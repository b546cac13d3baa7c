//! # y-components
//!
//! Minimal view components over a virtual DOM.
//!
//! ## Pieces
//!
//! 1. **Components** (`component`): a `Component` owns a reactive `Props`
//!    mapping, a child list and one re-render `Job`. Mounting attaches it to a
//!    live element; every props mutation re-schedules the job, and each run
//!    renders a fresh `VNode` tree, diffs it against the previous one and
//!    patches the live element in place.
//!
//! 2. **Rendering**: a component renders through a `View` implementation, a
//!    closure returned by a `define_component` factory, or the built-in
//!    `<p>{name} works!</p>` placeholder.
//!
//! 3. **Templates** (`template`): html with `{{ expression }}` interpolations,
//!    `:attr="expression"` bindings and directive attributes compiles to a
//!    render expression. `Template::render_fn` turns it into a component
//!    render function.
//!
//! 4. **Directives** (`directive`): source-to-source transforms keyed by
//!    attribute name. `y-for="item, i in list"` repeats an element and
//!    `y-if="cond"` renders it conditionally.
//!
//! ## Scheduling
//!
//! Jobs run when the store's scheduler says so. The default `BatchScheduler`
//! runs each scheduled job once per `Store::flush`, however many mutations
//! queued it.

mod bindings;
mod cache;
mod codegen;
mod component;
mod diff;
mod directive;
mod dom;
mod error;
mod eval;
mod parse;
mod reactive;
mod template;
mod vnode;

#[cfg(test)]
mod component_tests;

pub use cache::TemplateCache;
pub use component::{
    define_component, Component, ComponentClass, MountTarget, RenderFn, Renderer, View,
};
pub use diff::{diff, patch, Patch};
pub use directive::{define_directive, y_for, y_if, DirectiveRegistry, Transform};
pub use dom::Document;
pub use error::{Error, Result};
pub use eval::{check_syntax, Value};
pub use parse::{AttributeIR, ElementNode, TemplateNode, TextPart};
pub use reactive::{BatchScheduler, Job, PropMap, Props, Scheduler, Store, SyncScheduler};
pub use template::{compile, template, CompilerConfig, Template, TemplateOptions};
pub use vnode::{h, Attrs, VNode, H};

/// Live-document helpers over `markup5ever_rcdom` handles.
pub mod html {
    pub use crate::dom::{
        append_child, clear_children, create_element, create_text, element_index,
        get_attribute, outer_html, parent_of, remove_attribute, replace_node, set_attribute,
        tag_name, text_content,
    };
    pub use markup5ever_rcdom::Handle;
}
