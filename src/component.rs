//! Components: one reactive props mapping, one re-render job and the live
//! element the rendered tree is attached to.
//!
//! Rendering is pluggable. A component renders either through a `View`
//! implementation (the class-style path), through a closure produced by a
//! `ComponentClass` factory, or through the built-in placeholder. All three
//! answer the same question: given `h`, produce one `VNode`.

use crate::diff::{diff, patch};
use crate::dom::{self, Document};
use crate::error::{Error, Result};
use crate::reactive::{Job, PropMap, Props, Store};
use crate::vnode::{h, Attrs, VNode, H};
use markup5ever_rcdom::Handle;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A render function bound to a component instance.
pub type RenderFn = Box<dyn Fn(H) -> Result<VNode>>;

/// Class-style rendering: implement this and hand it to `Component::with_view`.
pub trait View {
    fn render(&self, h: H, props: &Props, children: &[VNode]) -> Result<VNode>;
}

pub enum Renderer {
    /// Renders `<p>{name} works!</p>`.
    Placeholder,
    View(Box<dyn View>),
    Closure(RenderFn),
}

/// Where to mount: a live element, or a selector resolved against a document.
pub enum MountTarget<'a> {
    Element(Handle),
    Selector {
        document: &'a Document,
        selector: &'a str,
    },
}

impl From<Handle> for MountTarget<'_> {
    fn from(el: Handle) -> Self {
        MountTarget::Element(el)
    }
}

impl From<&Handle> for MountTarget<'_> {
    fn from(el: &Handle) -> Self {
        MountTarget::Element(el.clone())
    }
}

impl<'a> From<(&'a Document, &'a str)> for MountTarget<'a> {
    fn from((document, selector): (&'a Document, &'a str)) -> Self {
        MountTarget::Selector { document, selector }
    }
}

struct ComponentState {
    name: String,
    mountpoint: Option<Handle>,
    vroot: Option<VNode>,
    /// Element the current `vroot` was last materialized into or patched onto.
    vroot_el: Option<Handle>,
    /// Element last handed to `mount`. The rendered root replaces it in the
    /// document, so a later mount onto it means the live root.
    mounted_on: Option<Handle>,
    props: Props,
    children: Vec<VNode>,
    jobs: Vec<Job>,
    renderer: Renderer,
    /// Failure of the most recent job run, picked up by `mount`.
    job_error: Option<Error>,
}

impl ComponentState {
    fn render(&self, h: H) -> Result<VNode> {
        match &self.renderer {
            Renderer::Placeholder => Ok(h(
                "p",
                Attrs::new(),
                vec![VNode::text(format!("{} works!", self.name))],
            )),
            Renderer::View(view) => view.render(h, &self.props, &self.children),
            Renderer::Closure(render) => render(h),
        }
    }

    fn update(&mut self) -> Result<()> {
        let new = self.render(h)?;
        let old = self.vroot.take();
        let Some(mountpoint) = self.mountpoint.clone() else {
            self.vroot = Some(new);
            return Ok(());
        };

        let index = dom::element_index(&mountpoint);
        let patches = diff(old.as_ref(), &new, index);
        tracing::debug!(
            component = %self.name,
            index,
            patches = patches.len(),
            "update"
        );
        if !patches.is_empty() {
            let root = match patch(&mountpoint, &patches) {
                Ok(root) => root,
                Err(e) => {
                    // Part of the patch may have landed; the next update
                    // starts over with a root replace.
                    self.vroot = None;
                    return Err(e);
                }
            };
            self.mountpoint = Some(root.clone());
            self.vroot_el = Some(root);
        }
        self.vroot = Some(new);
        Ok(())
    }
}

/// Handle to a component instance. Clones refer to the same instance.
#[derive(Clone)]
pub struct Component {
    state: Rc<RefCell<ComponentState>>,
}

impl Component {
    /// A component rendering the placeholder paragraph.
    pub fn new(store: &Store, props: Option<PropMap>, children: Option<Vec<VNode>>) -> Self {
        Self::build(store, "Component", Renderer::Placeholder, props, children)
    }

    pub fn with_view(
        store: &Store,
        view: impl View + 'static,
        props: Option<PropMap>,
        children: Option<Vec<VNode>>,
    ) -> Self {
        Self::build(store, "Component", Renderer::View(Box::new(view)), props, children)
    }

    fn build(
        store: &Store,
        name: &str,
        renderer: Renderer,
        props: Option<PropMap>,
        children: Option<Vec<VNode>>,
    ) -> Self {
        let reactive = store.make_reactive(PropMap::new());
        if let Some(props) = props {
            reactive.merge(props);
        }

        let state = Rc::new(RefCell::new(ComponentState {
            name: name.to_string(),
            mountpoint: None,
            vroot: None,
            vroot_el: None,
            mounted_on: None,
            props: reactive.clone(),
            children: children.unwrap_or_default(),
            jobs: Vec::new(),
            renderer,
            job_error: None,
        }));

        let weak = Rc::downgrade(&state);
        let job = Job::new(move || run_update_job(&weak));
        reactive.subscribe(&job);
        state.borrow_mut().jobs.push(job);

        Component { state }
    }

    /// Rename the instance. Only the placeholder render and logs use the name.
    pub fn named(self, name: impl Into<String>) -> Self {
        self.state.borrow_mut().name = name.into();
        self
    }

    /// Attach this component to `target` and render it once.
    ///
    /// The target is emptied unless the current tree is already rendered into
    /// it, then replaced in place by the rendered root element. Afterwards
    /// `mountpoint()` is that root element. Mounting again onto the same
    /// target keeps rendering into that root.
    pub fn mount<'a>(&self, target: impl Into<MountTarget<'a>>) -> Result<()> {
        let target = match target.into() {
            MountTarget::Element(el) => el,
            MountTarget::Selector { document, selector } => document
                .query_selector(selector)
                .ok_or_else(|| Error::MountpointNotFound {
                    selector: selector.to_string(),
                })?,
        };

        let job = {
            let mut state = self.state.borrow_mut();
            let same_target = state.mountpoint.is_some() && is_same(&state.mounted_on, &target);
            let already_rendered_here = same_target || is_same(&state.vroot_el, &target);
            if !already_rendered_here {
                dom::clear_children(&target);
                // The previous tree lives elsewhere; render from scratch.
                state.vroot = None;
                state.vroot_el = Some(target.clone());
            }
            tracing::debug!(component = %state.name, remount = already_rendered_here, "mount");
            if !same_target {
                state.mountpoint = Some(target.clone());
            }
            state.mounted_on = Some(target);
            state.job_error = None;
            state.jobs[0].clone()
        };

        job.run();
        self.take_job_error()
    }

    /// Render and materialize a detached element without attaching it.
    pub fn create_element(&self) -> Result<Handle> {
        let mut state = self.state.borrow_mut();
        let vroot = state.render(h)?;
        let el = vroot.create_element();
        state.vroot = Some(vroot);
        state.vroot_el = Some(el.clone());
        Ok(el)
    }

    /// Like `create_element`, but the element also becomes the mountpoint.
    pub fn create_mountpoint(&self) -> Result<Handle> {
        let el = self.create_element()?;
        let job = {
            let mut state = self.state.borrow_mut();
            state.mountpoint = Some(el.clone());
            state.mounted_on = None;
            state.job_error = None;
            state.jobs[0].clone()
        };
        job.run();
        self.take_job_error()?;
        Ok(self.mountpoint().unwrap_or(el))
    }

    /// Re-render and patch the mounted element with the difference.
    pub fn update(&self) -> Result<()> {
        self.state.borrow_mut().update()
    }

    pub fn render(&self, h: H) -> Result<VNode> {
        self.state.borrow().render(h)
    }

    pub fn props(&self) -> Props {
        self.state.borrow().props.clone()
    }

    pub fn children(&self) -> Vec<VNode> {
        self.state.borrow().children.clone()
    }

    pub fn vroot(&self) -> Option<VNode> {
        self.state.borrow().vroot.clone()
    }

    pub fn mountpoint(&self) -> Option<Handle> {
        self.state.borrow().mountpoint.clone()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.state.borrow().jobs.clone()
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    fn set_renderer(&self, renderer: Renderer) {
        self.state.borrow_mut().renderer = renderer;
    }

    fn take_job_error(&self) -> Result<()> {
        match self.state.borrow_mut().job_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn is_same(el: &Option<Handle>, target: &Handle) -> bool {
    el.as_ref().map(|el| Rc::ptr_eq(el, target)).unwrap_or(false)
}

fn run_update_job(state: &Weak<RefCell<ComponentState>>) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let Ok(mut state) = state.try_borrow_mut() else {
        tracing::warn!("skipping re-render of a component that is already rendering");
        return;
    };
    if let Err(e) = state.update() {
        tracing::error!(component = %state.name, "re-render failed: {}", e);
        state.job_error = Some(e);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FUNCTIONAL COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

type Factory = Rc<dyn Fn(Props, Vec<VNode>) -> RenderFn>;

/// A component type defined by a render-function factory.
#[derive(Clone)]
pub struct ComponentClass {
    name: String,
    factory: Factory,
}

/// Define a component from `factory(props, children) -> render`.
///
/// The factory runs once per instance, after the instance's props and children
/// are in place, so the returned render function can hold on to the live
/// props and see later mutations.
pub fn define_component<F, R>(factory: F) -> ComponentClass
where
    F: Fn(Props, Vec<VNode>) -> R + 'static,
    R: Fn(H) -> Result<VNode> + 'static,
{
    ComponentClass {
        name: "Component".to_string(),
        factory: Rc::new(move |props, children| Box::new(factory(props, children)) as RenderFn),
    }
}

impl ComponentClass {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instantiate(
        &self,
        store: &Store,
        props: Option<PropMap>,
        children: Option<Vec<VNode>>,
    ) -> Component {
        let component = Component::build(store, &self.name, Renderer::Placeholder, props, children);
        let render = (self.factory)(component.props(), component.children());
        component.set_renderer(Renderer::Closure(render));
        component
    }
}
