//! Free-name analysis for render source.

use crate::error::Result;
use crate::eval::with_expression;
use oxc_ast::ast::{ArrowFunctionExpression, BindingPattern, IdentifierReference};
use oxc_ast_visit::Visit;
use std::collections::{BTreeSet, HashSet};

/// Names the evaluator resolves without consulting props.
const BUILTIN_NAMES: &[&str] = &["undefined", "NaN", "Infinity", "String"];

/// Collects identifier references that are not bound by an enclosing arrow
/// function. Those are the names a render reads from its props.
struct NameCollector<'n> {
    h_name: &'n str,
    scopes: Vec<HashSet<String>>,
    names: BTreeSet<String>,
}

impl<'a> Visit<'a> for NameCollector<'_> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        let name = ident.name.as_str();
        if name == self.h_name || BUILTIN_NAMES.contains(&name) {
            return;
        }
        if self.scopes.iter().any(|scope| scope.contains(name)) {
            return;
        }
        self.names.insert(name.to_string());
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        let mut scope = HashSet::new();
        for param in &func.params.items {
            if let BindingPattern::BindingIdentifier(id) = &param.pattern {
                scope.insert(id.name.to_string());
            }
        }
        self.scopes.push(scope);
        self.visit_function_body(&func.body);
        self.scopes.pop();
    }
}

/// Free identifiers of `source`, sorted, excluding the node constructor name
/// and evaluator built-ins.
pub fn referenced_names(source: &str, h_name: &str) -> Result<Vec<String>> {
    with_expression(source, |expr| {
        let mut collector = NameCollector {
            h_name,
            scopes: Vec::new(),
            names: BTreeSet::new(),
        };
        collector.visit_expression(expr);
        Ok(collector.names.into_iter().collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_params_are_not_free() {
        let names =
            referenced_names(r#"h("ul", {}, [items.map((item, i) => h("li", {}, [(item.label), (i)]))])"#, "h")
                .unwrap();
        assert_eq!(names, vec!["items".to_string()]);
    }

    #[test]
    fn test_name_used_outside_its_loop_is_free() {
        let names = referenced_names("[rows.map((row, ) => row), row]", "h").unwrap();
        assert_eq!(names, vec!["row".to_string(), "rows".to_string()]);
    }

    #[test]
    fn test_builtins_and_constructor_are_skipped() {
        let names = referenced_names(r#"node("p", {"title": String(t)}, [undefined])"#, "node").unwrap();
        assert_eq!(names, vec!["t".to_string()]);
    }

    #[test]
    fn test_member_properties_are_not_names() {
        let names = referenced_names("user.name + other[key]", "h").unwrap();
        assert_eq!(names, vec!["key".to_string(), "other".to_string(), "user".to_string()]);
    }
}
