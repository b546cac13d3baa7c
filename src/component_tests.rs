//! Component lifecycle tests: mounting, element creation, reactive updates and
//! factory-defined components.

#[cfg(test)]
mod tests {
    use crate::attrs;
    use crate::component::{define_component, Component, View};
    use crate::dom::{self, Document};
    use crate::error::{Error, Result};
    use crate::reactive::{PropMap, Props, Store, SyncScheduler};
    use crate::vnode::{Attrs, VNode, H};
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn props(value: serde_json::Value) -> PropMap {
        value.as_object().cloned().unwrap()
    }

    fn app_document() -> Document {
        Document::parse(r#"<html><body><div id="app"><span>stale</span></div></body></html>"#)
    }

    struct Counter;

    impl View for Counter {
        fn render(&self, h: H, props: &Props, children: &[VNode]) -> Result<VNode> {
            let count = props.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
            let mut kids = vec![h(
                "span",
                attrs! { "class" => "count" },
                vec![VNode::text(count.to_string())],
            )];
            kids.extend(children.iter().cloned());
            Ok(h("div", attrs! { "data-count" => count }, kids))
        }
    }

    #[test]
    fn test_constructor_defaults() {
        let store = Store::default();
        let component = Component::new(&store, None, None);
        assert!(component.props().is_empty());
        assert!(component.children().is_empty());
        assert!(component.mountpoint().is_none());
        assert!(component.vroot().is_none());
        assert_eq!(component.jobs().len(), 1);
    }

    #[test]
    fn test_constructor_copies_props_into_fresh_mapping() {
        let store = Store::default();
        let initial = props(json!({ "a": 1 }));
        let component = Component::new(&store, Some(initial.clone()), Some(vec![VNode::text("x")]));
        assert_eq!(component.props().snapshot(), initial);
        assert_eq!(component.children(), vec![VNode::text("x")]);

        let other = Component::new(&store, Some(initial), None);
        assert!(!component.props().ptr_eq(&other.props()));
    }

    #[test]
    fn test_placeholder_render() {
        let store = Store::default();
        let component = Component::new(&store, None, None);
        let node = component.render(crate::vnode::h).unwrap();
        assert_eq!(
            node,
            crate::vnode::h("p", Attrs::new(), vec![VNode::text("Component works!")])
        );

        let named = Component::new(&store, None, None).named("Greeting");
        let node = named.render(crate::vnode::h).unwrap();
        assert_eq!(node.children(), &[VNode::text("Greeting works!")]);
    }

    #[test]
    fn test_update_without_mountpoint_only_renders() {
        let store = Store::default();
        let component = Component::new(&store, None, None);
        component.update().unwrap();
        assert!(component.vroot().is_some());
        assert!(component.mountpoint().is_none());
    }

    #[test]
    fn test_mount_by_selector_replaces_target() {
        let document = app_document();
        let store = Store::default();
        let component = Component::new(&store, None, None);
        component.mount((&document, "#app")).unwrap();

        let body = document.body().unwrap();
        assert_eq!(dom::outer_html(&body), "<body><p>Component works!</p></body>");
        let mountpoint = component.mountpoint().unwrap();
        assert_eq!(dom::tag_name(&mountpoint).as_deref(), Some("p"));
        assert!(Rc::ptr_eq(&dom::parent_of(&mountpoint).unwrap(), &body));
    }

    #[test]
    fn test_mount_selector_not_found() {
        let document = app_document();
        let store = Store::default();
        let component = Component::new(&store, None, None);
        match component.mount((&document, "#missing")) {
            Err(Error::MountpointNotFound { selector }) => assert_eq!(selector, "#missing"),
            other => panic!("expected MountpointNotFound, got {:?}", other.err()),
        }
        assert!(component.mountpoint().is_none());
        assert!(dom::text_content(&document.body().unwrap()).contains("stale"));
    }

    #[test]
    fn test_mount_clears_foreign_target() {
        let document = app_document();
        let target = document.query_selector("#app").unwrap();
        let store = Store::default();
        let component = Component::with_view(&store, Counter, Some(props(json!({ "count": 2 }))), None);
        component.mount(&target).unwrap();

        let body = document.body().unwrap();
        assert!(!dom::text_content(&body).contains("stale"));
        let root = component.mountpoint().unwrap();
        assert_eq!(dom::get_attribute(&root, "data-count").as_deref(), Some("2"));
    }

    #[test]
    fn test_remount_on_own_element_keeps_content() {
        let document = Document::new();
        let store = Store::default();
        let component = Component::with_view(&store, Counter, Some(props(json!({ "count": 1 }))), None);
        let el = component.create_mountpoint().unwrap();
        dom::append_child(&document.body().unwrap(), el.clone());

        let span = dom::child_at(&el, 0).unwrap();
        component.mount(&el).unwrap();

        // Same element: nothing cleared, nothing re-created.
        let root = component.mountpoint().unwrap();
        assert!(Rc::ptr_eq(&root, &el));
        assert!(Rc::ptr_eq(&dom::child_at(&root, 0).unwrap(), &span));
        assert_eq!(dom::text_content(&root), "1");
    }

    #[test]
    fn test_mount_twice_on_same_target_keeps_live_root() {
        let document = app_document();
        let target = document.query_selector("#app").unwrap();
        let store = Store::default();
        let component = Component::with_view(&store, Counter, Some(props(json!({ "count": 1 }))), None);
        component.mount(&target).unwrap();
        let root = component.mountpoint().unwrap();

        component.mount(&target).unwrap();
        assert!(Rc::ptr_eq(&root, &component.mountpoint().unwrap()));

        component.props().set("count", 2);
        store.flush();
        let body = document.body().unwrap();
        assert_eq!(
            dom::outer_html(&body),
            r#"<body><div data-count="2"><span class="count">2</span></div></body>"#
        );
        assert!(Rc::ptr_eq(&dom::parent_of(&root).unwrap(), &body));
    }

    #[test]
    fn test_failed_patch_rebuilds_root_on_next_update() {
        let document = app_document();
        let store = Store::default();
        let component = Component::with_view(&store, Counter, Some(props(json!({ "count": 1 }))), None);
        component.mount((&document, "#app")).unwrap();
        let root = component.mountpoint().unwrap();

        // Something outside the component removed the rendered children.
        dom::clear_children(&root);
        component.props().set("count", 2);
        store.flush();
        assert!(component.vroot().is_none());

        component.update().unwrap();
        let fresh = component.mountpoint().unwrap();
        assert!(!Rc::ptr_eq(&fresh, &root));
        assert_eq!(
            dom::outer_html(&document.body().unwrap()),
            r#"<body><div data-count="2"><span class="count">2</span></div></body>"#
        );
    }

    #[test]
    fn test_create_element_is_detached() {
        let store = Store::default();
        let component = Component::new(&store, None, None);
        let el = component.create_element().unwrap();
        assert!(dom::parent_of(&el).is_none());
        assert_eq!(dom::outer_html(&el), "<p>Component works!</p>");
        assert!(component.vroot().is_some());
        assert!(component.mountpoint().is_none());
    }

    #[test]
    fn test_create_mountpoint_tracks_element() {
        let store = Store::default();
        let component = Component::with_view(&store, Counter, None, Some(vec![VNode::text("tail")]));
        let el = component.create_mountpoint().unwrap();
        assert!(Rc::ptr_eq(&el, &component.mountpoint().unwrap()));
        assert_eq!(
            dom::outer_html(&el),
            r#"<div data-count="0"><span class="count">0</span>tail</div>"#
        );
    }

    #[test]
    fn test_props_mutation_patches_live_dom_once_per_flush() {
        let document = app_document();
        let store = Store::default();
        let component = Component::with_view(&store, Counter, Some(props(json!({ "count": 0 }))), None);
        component.mount((&document, "#app")).unwrap();
        let root = component.mountpoint().unwrap();
        let job = component.jobs()[0].clone();
        let runs = job.run_count();

        let p = component.props();
        p.set("count", 1);
        p.set("count", 2);
        p.set("count", 3);
        assert_eq!(store.pending(), 1);
        store.flush();

        assert_eq!(job.run_count(), runs + 1);
        // Root tag unchanged, so the element is patched rather than replaced.
        assert!(Rc::ptr_eq(&root, &component.mountpoint().unwrap()));
        assert_eq!(dom::get_attribute(&root, "data-count").as_deref(), Some("3"));
        assert_eq!(dom::text_content(&root), "3");
    }

    #[test]
    fn test_unchanged_value_does_not_schedule() {
        let store = Store::default();
        let component = Component::new(&store, Some(props(json!({ "a": 1 }))), None);
        component.props().set("a", 1);
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_sync_scheduler_runs_on_every_mutation() {
        let store = Store::new(SyncScheduler);
        let component = Component::with_view(&store, Counter, None, None);
        component.create_mountpoint().unwrap();
        let job = component.jobs()[0].clone();
        let runs = job.run_count();
        component.props().set("count", 5);
        component.props().set("count", 6);
        assert_eq!(job.run_count(), runs + 2);
        assert_eq!(dom::text_content(&component.mountpoint().unwrap()), "6");
    }

    #[test]
    fn test_define_component_calls_factory_once() {
        let calls = Rc::new(Cell::new(0));
        let seen: Rc<RefCell<Option<(PropMap, Vec<VNode>)>>> = Rc::new(RefCell::new(None));
        let class = {
            let calls = calls.clone();
            let seen = seen.clone();
            define_component(move |props: Props, children: Vec<VNode>| {
                calls.set(calls.get() + 1);
                *seen.borrow_mut() = Some((props.snapshot(), children.clone()));
                move |h: H| -> Result<VNode> {
                    let a = props.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
                    Ok(h("b", Attrs::new(), vec![VNode::text(a.to_string())]))
                }
            })
        };

        let store = Store::default();
        let instance = class.instantiate(&store, Some(props(json!({ "a": 1 }))), Some(vec![VNode::text("kid")]));
        assert_eq!(calls.get(), 1);
        assert_eq!(
            seen.borrow().clone(),
            Some((props(json!({ "a": 1 })), vec![VNode::text("kid")]))
        );

        let el = instance.create_mountpoint().unwrap();
        assert_eq!(dom::outer_html(&el), "<b>1</b>");
        instance.props().set("a", 7);
        store.flush();
        assert_eq!(dom::outer_html(&instance.mountpoint().unwrap()), "<b>7</b>");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_render_error_is_returned_from_mount() {
        let class = define_component(|_props, _children| {
            |_h: H| -> Result<VNode> { Err(Error::Eval("boom".to_string())) }
        });
        let store = Store::default();
        let document = app_document();
        let instance = class.instantiate(&store, None, None);
        assert!(matches!(
            instance.mount((&document, "#app")),
            Err(Error::Eval(_))
        ));
    }

    #[test]
    fn test_dropped_component_job_is_inert() {
        let store = Store::default();
        let component = Component::new(&store, None, None);
        let p = component.props();
        drop(component);
        p.set("x", 1);
        store.flush();
        assert_eq!(store.pending(), 0);
    }
}
