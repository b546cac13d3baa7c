//! Interpreter for generated render source.
//!
//! Render source is parsed with oxc and walked directly. Only the subset the
//! code generator and the built-in directives emit is supported, plus the
//! operators template authors commonly write inside interpolations.

use crate::error::{Error, Result};
use crate::reactive::PropMap;
use crate::vnode::{Attrs, VNode, H};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, BindingPattern, Expression, ObjectPropertyKind, PropertyKey,
    Statement,
};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Node(VNode),
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<VNode> for Value {
    fn from(node: VNode) -> Self {
        Value::Node(node)
    }
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Node(_) => true,
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// String conversion with JavaScript's `String(value)` rules.
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Node(_) => "[object Object]".to_string(),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Node(_) => f64::NAN,
        }
    }

    fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Node(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n == 0.0 {
        // Covers -0.
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// Flatten a child-list value into nodes. Arrays nest, nullish and boolean
/// values render nothing, scalars become text.
pub fn collect_children(value: Value, out: &mut Vec<VNode>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_children(item, out);
            }
        }
        Value::Node(VNode::Empty) => {}
        Value::Node(node) => out.push(node),
        Value::Undefined | Value::Null | Value::Bool(_) => {}
        other => out.push(VNode::Text(other.to_display())),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse `source` as one expression and hand it to `f`.
pub(crate) fn with_expression<R>(
    source: &str,
    f: impl FnOnce(&Expression<'_>) -> Result<R>,
) -> Result<R> {
    let allocator = Allocator::default();
    let wrapped = format!("({}\n);", source);
    let ret = Parser::new(&allocator, &wrapped, SourceType::default()).parse();
    if !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(Error::Syntax(messages.join("; ")));
    }
    let body = &ret.program.body;
    match body.first() {
        Some(Statement::ExpressionStatement(stmt)) if body.len() == 1 => f(&stmt.expression),
        _ => Err(Error::Syntax(format!(
            "expected a single expression: {}",
            source
        ))),
    }
}

/// Check that `source` parses as a single expression.
pub fn check_syntax(source: &str) -> Result<()> {
    with_expression(source, |_| Ok(()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Names visible to render source: loop locals shadow extra locals, which
/// shadow props.
pub struct Interpreter<'s> {
    h_name: &'s str,
    h: H,
    props: &'s PropMap,
    locals: Vec<(String, Value)>,
}

impl<'s> Interpreter<'s> {
    pub fn new(h_name: &'s str, h: H, props: &'s PropMap) -> Self {
        Interpreter {
            h_name,
            h,
            props,
            locals: Vec::new(),
        }
    }

    pub fn with_local(mut self, name: impl Into<String>, value: Value) -> Self {
        self.locals.push((name.into(), value));
        self
    }

    pub fn evaluate(&mut self, source: &str) -> Result<Value> {
        with_expression(source, |expr| self.eval(expr))
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.props.get(name) {
            return Ok(Value::from(value));
        }
        match name {
            "undefined" => Ok(Value::Undefined),
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            _ => Err(Error::Eval(format!("{} is not defined", name))),
        }
    }

    fn eval(&mut self, expr: &Expression<'_>) -> Result<Value> {
        match expr {
            Expression::BooleanLiteral(lit) => Ok(Value::Bool(lit.value)),
            Expression::NullLiteral(_) => Ok(Value::Null),
            Expression::NumericLiteral(lit) => Ok(Value::Number(lit.value)),
            Expression::StringLiteral(lit) => Ok(Value::String(lit.value.to_string())),
            Expression::TemplateLiteral(tpl) => {
                let mut out = String::new();
                for (i, quasi) in tpl.quasis.iter().enumerate() {
                    match &quasi.value.cooked {
                        Some(cooked) => out.push_str(cooked.as_str()),
                        None => out.push_str(quasi.value.raw.as_str()),
                    }
                    if let Some(e) = tpl.expressions.get(i) {
                        out.push_str(&self.eval(e)?.to_display());
                    }
                }
                Ok(Value::String(out))
            }
            Expression::Identifier(ident) => self.lookup(ident.name.as_str()),
            Expression::ParenthesizedExpression(paren) => self.eval(&paren.expression),
            Expression::ArrayExpression(arr) => {
                let mut items = Vec::with_capacity(arr.elements.len());
                for elem in &arr.elements {
                    let Some(e) = elem.as_expression() else {
                        return Err(Error::Eval(
                            "spread and holes are not supported in arrays".to_string(),
                        ));
                    };
                    items.push(self.eval(e)?);
                }
                Ok(Value::Array(items))
            }
            Expression::ObjectExpression(obj) => {
                let mut map = BTreeMap::new();
                for prop in &obj.properties {
                    match prop {
                        ObjectPropertyKind::ObjectProperty(p) => {
                            let key = self.property_key(&p.key, p.computed)?;
                            let value = self.eval(&p.value)?;
                            map.insert(key, value);
                        }
                        ObjectPropertyKind::SpreadProperty(_) => {
                            return Err(Error::Eval(
                                "object spread is not supported".to_string(),
                            ));
                        }
                    }
                }
                Ok(Value::Object(map))
            }
            Expression::StaticMemberExpression(st) => {
                let object = self.eval(&st.object)?;
                member(&object, st.property.name.as_str())
            }
            Expression::ComputedMemberExpression(comp) => {
                let object = self.eval(&comp.object)?;
                let key = self.eval(&comp.expression)?;
                member(&object, &key.to_display())
            }
            Expression::CallExpression(call) => self.eval_call(call),
            Expression::ConditionalExpression(cond) => {
                if self.eval(&cond.test)?.is_truthy() {
                    self.eval(&cond.consequent)
                } else {
                    self.eval(&cond.alternate)
                }
            }
            Expression::LogicalExpression(logical) => {
                let left = self.eval(&logical.left)?;
                match logical.operator {
                    LogicalOperator::And if !left.is_truthy() => Ok(left),
                    LogicalOperator::Or if left.is_truthy() => Ok(left),
                    LogicalOperator::Coalesce if !left.is_nullish() => Ok(left),
                    _ => self.eval(&logical.right),
                }
            }
            Expression::BinaryExpression(bin) => {
                let left = self.eval(&bin.left)?;
                let right = self.eval(&bin.right)?;
                binary(bin.operator, left, right)
            }
            Expression::UnaryExpression(unary) => {
                let value = self.eval(&unary.argument)?;
                match unary.operator {
                    UnaryOperator::LogicalNot => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOperator::UnaryNegation => Ok(Value::Number(-value.to_number())),
                    UnaryOperator::UnaryPlus => Ok(Value::Number(value.to_number())),
                    UnaryOperator::Void => Ok(Value::Undefined),
                    UnaryOperator::Typeof => Ok(Value::String(value.type_of().to_string())),
                    _ => Err(Error::Eval("unsupported unary operator".to_string())),
                }
            }
            Expression::ArrowFunctionExpression(_) => Err(Error::Eval(
                "functions may only appear as callbacks of map".to_string(),
            )),
            _ => Err(Error::Eval("unsupported expression".to_string())),
        }
    }

    fn property_key(&mut self, key: &PropertyKey<'_>, computed: bool) -> Result<String> {
        if computed {
            if let Some(e) = key.as_expression() {
                return Ok(self.eval(e)?.to_display());
            }
        }
        match key {
            PropertyKey::StaticIdentifier(id) => Ok(id.name.to_string()),
            PropertyKey::StringLiteral(s) => Ok(s.value.to_string()),
            PropertyKey::NumericLiteral(n) => Ok(format_number(n.value)),
            _ => Err(Error::Eval("unsupported object key".to_string())),
        }
    }

    fn eval_call(&mut self, call: &oxc_ast::ast::CallExpression<'_>) -> Result<Value> {
        let mut args = call.arguments.iter().map(|arg| arg.as_expression());

        match &call.callee {
            Expression::Identifier(ident) if ident.name.as_str() == self.h_name => {
                let tag = self.eval_arg(args.next())?.to_display();
                let attrs = attrs_from(self.eval_arg(args.next())?)?;
                let mut children = Vec::new();
                collect_children(self.eval_arg(args.next())?, &mut children);
                Ok(Value::Node((self.h)(&tag, attrs, children)))
            }
            Expression::Identifier(ident) if ident.name.as_str() == "String" => {
                Ok(Value::String(self.eval_arg(args.next())?.to_display()))
            }
            Expression::StaticMemberExpression(st) if st.property.name.as_str() == "map" => {
                let receiver = self.eval(&st.object)?;
                let Value::Array(items) = receiver else {
                    return Err(Error::Eval(format!(
                        "{}.map is not a function",
                        receiver.to_display()
                    )));
                };
                let Some(Some(Expression::ArrowFunctionExpression(arrow))) = args.next() else {
                    return Err(Error::Eval(
                        "map expects an arrow function callback".to_string(),
                    ));
                };
                let mut mapped = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    mapped.push(self.call_arrow(arrow, vec![item, Value::Number(index as f64)])?);
                }
                Ok(Value::Array(mapped))
            }
            Expression::StaticMemberExpression(st) if st.property.name.as_str() == "join" => {
                let receiver = self.eval(&st.object)?;
                let separator = match args.next() {
                    Some(arg) => self.eval_arg(Some(arg))?.to_display(),
                    None => ",".to_string(),
                };
                match receiver {
                    Value::Array(items) => Ok(Value::String(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Undefined | Value::Null => String::new(),
                                other => other.to_display(),
                            })
                            .collect::<Vec<_>>()
                            .join(&separator),
                    )),
                    other => Err(Error::Eval(format!(
                        "{}.join is not a function",
                        other.to_display()
                    ))),
                }
            }
            _ => Err(Error::Eval("call target is not a function".to_string())),
        }
    }

    fn eval_arg(&mut self, arg: Option<Option<&Expression<'_>>>) -> Result<Value> {
        match arg {
            None => Ok(Value::Undefined),
            Some(Some(e)) => self.eval(e),
            Some(None) => Err(Error::Eval("spread arguments are not supported".to_string())),
        }
    }

    fn call_arrow(&mut self, arrow: &ArrowFunctionExpression<'_>, args: Vec<Value>) -> Result<Value> {
        let depth = self.locals.len();
        for (param, value) in arrow.params.items.iter().zip(args) {
            match &param.pattern {
                BindingPattern::BindingIdentifier(id) => {
                    self.locals.push((id.name.to_string(), value));
                }
                _ => {
                    self.locals.truncate(depth);
                    return Err(Error::Eval(
                        "destructuring parameters are not supported".to_string(),
                    ));
                }
            }
        }
        let result = self.eval_arrow_body(arrow);
        self.locals.truncate(depth);
        result
    }

    fn eval_arrow_body(&mut self, arrow: &ArrowFunctionExpression<'_>) -> Result<Value> {
        for stmt in &arrow.body.statements {
            match stmt {
                Statement::ExpressionStatement(s) if arrow.expression => {
                    return self.eval(&s.expression);
                }
                Statement::ExpressionStatement(s) => {
                    self.eval(&s.expression)?;
                }
                Statement::ReturnStatement(ret) => {
                    return match &ret.argument {
                        Some(arg) => self.eval(arg),
                        None => Ok(Value::Undefined),
                    };
                }
                _ => {
                    return Err(Error::Eval(
                        "only expressions and return are supported in callbacks".to_string(),
                    ))
                }
            }
        }
        Ok(Value::Undefined)
    }
}

fn member(object: &Value, key: &str) -> Result<Value> {
    match object {
        Value::Undefined | Value::Null => Err(Error::Eval(format!(
            "cannot read properties of {} (reading '{}')",
            object.to_display(),
            key
        ))),
        Value::Array(items) => {
            if key == "length" {
                return Ok(Value::Number(items.len() as f64));
            }
            Ok(key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Undefined))
        }
        Value::String(s) => {
            if key == "length" {
                return Ok(Value::Number(s.chars().count() as f64));
            }
            Ok(key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined))
        }
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or(Value::Undefined)),
        _ => Ok(Value::Undefined),
    }
}

fn attrs_from(value: Value) -> Result<Attrs> {
    match value {
        Value::Undefined | Value::Null => Ok(Attrs::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Undefined | Value::Null | Value::Bool(false) => None,
                Value::Bool(true) => Some((name, String::new())),
                other => Some((name, other.to_display())),
            })
            .collect()),
        other => Err(Error::Eval(format!(
            "attributes must be an object, got {}",
            other.type_of()
        ))),
    }
}

fn binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
    let value = match op {
        BinaryOperator::Addition => match (&left, &right) {
            (Value::Number(_) | Value::Bool(_) | Value::Null | Value::Undefined,
             Value::Number(_) | Value::Bool(_) | Value::Null | Value::Undefined) => {
                Value::Number(left.to_number() + right.to_number())
            }
            _ => Value::String(left.to_display() + &right.to_display()),
        },
        BinaryOperator::Subtraction => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiplication => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Division => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Exponential => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOperator::StrictEquality => Value::Bool(strict_equals(&left, &right)),
        BinaryOperator::StrictInequality => Value::Bool(!strict_equals(&left, &right)),
        BinaryOperator::Equality => Value::Bool(loose_equals(&left, &right)),
        BinaryOperator::Inequality => Value::Bool(!loose_equals(&left, &right)),
        BinaryOperator::LessThan => Value::Bool(compare(&left, &right, |o| o.is_lt())),
        BinaryOperator::LessEqualThan => Value::Bool(compare(&left, &right, |o| o.is_le())),
        BinaryOperator::GreaterThan => Value::Bool(compare(&left, &right, |o| o.is_gt())),
        BinaryOperator::GreaterEqualThan => Value::Bool(compare(&left, &right, |o| o.is_ge())),
        _ => return Err(Error::Eval("unsupported binary operator".to_string())),
    };
    Ok(value)
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        _ => left == right,
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() && b.is_nullish() => true,
        (a, b) if a.is_nullish() || b.is_nullish() => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(_) | Value::String(_) | Value::Bool(_),
         Value::Number(_) | Value::String(_) | Value::Bool(_)) => {
            left.to_number() == right.to_number()
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return test(a.cmp(b));
    }
    left.to_number()
        .partial_cmp(&right.to_number())
        .map(test)
        .unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
