//! Compile-time directives.
//!
//! A directive rewrites the generated code of the element carrying it. The
//! compiler calls the transform with the attribute's raw value and a callback
//! producing the element's own compiled expression, and splices whatever the
//! transform returns into the render source in place of the element.

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// `(value, compiled_body) -> source expression`
pub type Transform = Rc<dyn Fn(&str, &dyn Fn() -> String) -> Result<String>>;

static DEFINE_COUNTER: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    /// `item[, index] in expression`
    static ref FOR_PATTERN: Regex = Regex::new(r"(\w+),?\s+(\w*)\s*in\s*(\S+)").unwrap();
}

/// Directive name to transform mapping handed to the template compiler.
///
/// `DirectiveRegistry::default()` carries the built-in `y-for` and `y-if`;
/// `DirectiveRegistry::new()` is empty.
#[derive(Clone)]
pub struct DirectiveRegistry {
    entries: BTreeMap<String, Entry>,
}

#[derive(Clone)]
struct Entry {
    /// Unique per `define` call, shared by clones of the registry.
    id: u64,
    transform: Transform,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        DirectiveRegistry {
            entries: BTreeMap::new(),
        }
    }

    /// Registry with the built-in directives installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.define("y-for", y_for).define("y-if", y_if);
        registry
    }

    /// Install `transform` under `name`. An earlier entry under the same name
    /// is replaced.
    pub fn define<F>(&mut self, name: &str, transform: F) -> &mut Self
    where
        F: Fn(&str, &dyn Fn() -> String) -> Result<String> + 'static,
    {
        let id = DEFINE_COUNTER.fetch_add(1, Ordering::SeqCst);
        if self.entries.contains_key(name) {
            tracing::debug!(name, "redefining directive");
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                id,
                transform: Rc::new(transform),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<Transform> {
        self.entries.get(name).map(|entry| entry.transform.clone())
    }

    /// Identity of the definition installed under `name`. Changes whenever the
    /// name is defined again.
    pub fn definition_id(&self, name: &str) -> Option<u64> {
        self.entries.get(name).map(|entry| entry.id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Register `transform` as `name` on `registry`.
pub fn define_directive<F>(registry: &mut DirectiveRegistry, name: &str, transform: F)
where
    F: Fn(&str, &dyn Fn() -> String) -> Result<String> + 'static,
{
    registry.define(name, transform);
}

/// `y-for="item, index in list"` becomes `list.map((item, index) => body)`.
/// The index name may be left out, leaving the second parameter empty.
pub fn y_for(value: &str, compiled: &dyn Fn() -> String) -> Result<String> {
    let caps = FOR_PATTERN
        .captures(value)
        .ok_or_else(|| Error::InvalidDirective {
            directive: "y-for".to_string(),
            value: value.to_string(),
        })?;
    let item = &caps[1];
    let index = &caps[2];
    let list = &caps[3];
    tracing::debug!(list, item, index, "y-for");
    Ok(format!("{}.map(({}, {}) => {})", list, item, index, compiled()))
}

/// `y-if="cond"` becomes `(cond ? body : void 0)`.
pub fn y_if(value: &str, compiled: &dyn Fn() -> String) -> Result<String> {
    Ok(format!("({} ? {} : void 0)", value, compiled()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> String {
        "BODY".to_string()
    }

    #[test]
    fn test_y_for_with_index() {
        assert_eq!(
            y_for("item, idx in list", &body).unwrap(),
            "list.map((item, idx) => BODY)"
        );
    }

    #[test]
    fn test_y_for_without_index() {
        assert_eq!(
            y_for("item in list", &body).unwrap(),
            "list.map((item, ) => BODY)"
        );
    }

    #[test]
    fn test_y_for_member_expression_source() {
        assert_eq!(
            y_for("row in table.rows", &body).unwrap(),
            "table.rows.map((row, ) => BODY)"
        );
    }

    #[test]
    fn test_y_for_rejects_missing_in_clause() {
        for value in ["item", "item of list", ""] {
            match y_for(value, &body) {
                Err(Error::InvalidDirective { directive, value: v }) => {
                    assert_eq!(directive, "y-for");
                    assert_eq!(v, value);
                }
                other => panic!("expected invalid directive for {:?}, got {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_y_for_error_message() {
        let err = y_for("nope", &body).unwrap_err();
        assert_eq!(err.to_string(), "Invalid y-for: nope");
    }

    #[test]
    fn test_y_if() {
        assert_eq!(y_if("x > 0", &|| "B".to_string()).unwrap(), "(x > 0 ? B : void 0)");
    }

    #[test]
    fn test_registry_defaults_and_define() {
        let mut registry = DirectiveRegistry::with_builtins();
        assert!(registry.contains("y-for"));
        assert!(registry.contains("y-if"));
        assert!(DirectiveRegistry::new().is_empty());

        define_directive(&mut registry, "y-show", |value, compiled| {
            Ok(format!("({} ? {} : \"\")", value, compiled()))
        });
        let transform = registry.get("y-show").unwrap();
        assert_eq!(transform("ok", &body).unwrap(), "(ok ? BODY : \"\")");
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["y-for", "y-if", "y-show"]
        );
    }

    #[test]
    fn test_registries_are_independent() {
        let base = DirectiveRegistry::with_builtins();
        let mut extended = base.clone();
        extended.define("y-text", |value, _| Ok(value.to_string()));
        assert!(extended.contains("y-text"));
        assert!(!base.contains("y-text"));
        assert_eq!(base.definition_id("y-for"), extended.definition_id("y-for"));
    }

    #[test]
    fn test_redefinition_replaces_transform() {
        let mut registry = DirectiveRegistry::with_builtins();
        let before = registry.definition_id("y-if");
        registry.define("y-if", |value, compiled| {
            Ok(format!("({} && {})", value, compiled()))
        });
        assert_ne!(registry.definition_id("y-if"), before);
        assert_eq!(registry.len(), 2);
        let transform = registry.get("y-if").unwrap();
        assert_eq!(transform("ok", &body).unwrap(), "(ok && BODY)");
    }
}
