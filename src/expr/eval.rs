//! Expression evaluator
//!
//! Evaluates a parsed [`Expr`] against a context object. Variables and
//! functions the evaluator does not know about are delegated to an
//! [`Environment`] supplied by the host.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use serde_json::Value;

use super::ast::{BinaryOp, Expr};
use super::value::{from_number, to_bool, to_number, to_string};
use crate::error::ExpressionError;

/// Host hooks for variable and function resolution
pub trait Environment {
    /// Resolve `$name`. `Ok(None)` means the variable is not defined
    fn variable(&self, name: &str) -> Result<Option<Value>, ExpressionError>;

    /// Invoke a host function. Returns `None` if the function is unknown
    fn call(
        &self,
        _prefix: Option<&str>,
        _name: &str,
        _args: &[Value],
    ) -> Option<Result<Value, ExpressionError>> {
        None
    }
}

/// Evaluates expressions against a context object
pub struct Evaluator<'e> {
    env: &'e dyn Environment,
}

impl<'e> Evaluator<'e> {
    pub fn new(env: &'e dyn Environment) -> Self {
        Self { env }
    }

    /// Evaluate `expr` with `context` as the current node
    pub fn evaluate(&self, expr: &Expr, context: &Value) -> Result<Value, ExpressionError> {
        match expr {
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Number(n) => Ok(from_number(*n)),
            Expr::Variable(name) => self
                .env
                .variable(name)?
                .ok_or_else(|| ExpressionError::UndefinedVariable(name.clone())),
            Expr::Path(steps) => Ok(select(context, steps)),
            Expr::Negate(inner) => {
                let value = self.evaluate(inner, context)?;
                Ok(from_number(-to_number(&value)))
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, context),
            Expr::Call { prefix, name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(prefix.as_deref(), name, &args, context)
            }
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        context: &Value,
    ) -> Result<Value, ExpressionError> {
        // short-circuit
        match op {
            BinaryOp::Or => {
                let result = to_bool(&self.evaluate(left, context)?)
                    || to_bool(&self.evaluate(right, context)?);
                return Ok(Value::Bool(result));
            }
            BinaryOp::And => {
                let result = to_bool(&self.evaluate(left, context)?)
                    && to_bool(&self.evaluate(right, context)?);
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let l = self.evaluate(left, context)?;
        let r = self.evaluate(right, context)?;
        let result = match op {
            BinaryOp::Eq => Value::Bool(equals(&l, &r)),
            BinaryOp::Ne => Value::Bool(!equals(&l, &r)),
            BinaryOp::Lt => Value::Bool(to_number(&l) < to_number(&r)),
            BinaryOp::Le => Value::Bool(to_number(&l) <= to_number(&r)),
            BinaryOp::Gt => Value::Bool(to_number(&l) > to_number(&r)),
            BinaryOp::Ge => Value::Bool(to_number(&l) >= to_number(&r)),
            BinaryOp::Add => from_number(to_number(&l) + to_number(&r)),
            BinaryOp::Sub => from_number(to_number(&l) - to_number(&r)),
            BinaryOp::Mul => from_number(to_number(&l) * to_number(&r)),
            BinaryOp::Div => from_number(to_number(&l) / to_number(&r)),
            BinaryOp::Mod => from_number(to_number(&l) % to_number(&r)),
            BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
        };
        Ok(result)
    }

    fn call(
        &self,
        prefix: Option<&str>,
        name: &str,
        args: &[Value],
        context: &Value,
    ) -> Result<Value, ExpressionError> {
        match prefix {
            None => {
                if let Some(result) = core_function(name, args, context) {
                    return result;
                }
            }
            Some("openvpms") if name == "get" => return openvpms_get(args),
            Some("date") => {
                if let Some(result) = date_function(name, args) {
                    return result;
                }
            }
            Some(_) => {}
        }

        self.env.call(prefix, name, args).unwrap_or_else(|| {
            Err(ExpressionError::UnknownFunction(qualified(prefix, name)))
        })
    }
}

/// Walk `steps` from `context`. Missing steps yield null, arrays are mapped
fn select(context: &Value, steps: &[String]) -> Value {
    steps.iter().fold(context.clone(), |node, step| child(&node, step))
}

fn child(node: &Value, step: &str) -> Value {
    match node {
        Value::Object(map) => map.get(step).cloned().unwrap_or(Value::Null),
        Value::Array(items) => {
            let mut selected = Vec::new();
            for item in items {
                match child(item, step) {
                    Value::Null => {}
                    Value::Array(nested) => selected.extend(nested),
                    other => selected.push(other),
                }
            }
            Value::Array(selected)
        }
        _ => Value::Null,
    }
}

/// XPath equality: booleans win, then numbers, then strings
fn equals(l: &Value, r: &Value) -> bool {
    if l.is_boolean() || r.is_boolean() {
        to_bool(l) == to_bool(r)
    } else if l.is_number() || r.is_number() {
        to_number(l) == to_number(r)
    } else {
        to_string(l) == to_string(r)
    }
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    }
}

fn arity(
    function: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), ExpressionError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("expected {} argument(s)", min)
        } else {
            format!("expected {} to {} arguments", min, max)
        };
        return Err(ExpressionError::InvalidArguments {
            function: function.to_string(),
            message: format!("{}, got {}", expected, args.len()),
        });
    }
    Ok(())
}

/// String argument `index`, or the string value of the context node if absent
fn string_arg(args: &[Value], index: usize, context: &Value) -> String {
    args.get(index)
        .map(to_string)
        .unwrap_or_else(|| to_string(context))
}

// ============================================================================
// Core functions
// ============================================================================

fn core_function(
    name: &str,
    args: &[Value],
    context: &Value,
) -> Option<Result<Value, ExpressionError>> {
    let result = match name {
        "concat" => Ok(Value::String(args.iter().map(to_string).collect())),
        "string" => arity(name, args, 0, 1).map(|_| Value::String(string_arg(args, 0, context))),
        "number" => arity(name, args, 0, 1).map(|_| {
            from_number(to_number(args.first().unwrap_or(context)))
        }),
        "boolean" => arity(name, args, 1, 1).map(|_| Value::Bool(to_bool(&args[0]))),
        "not" => arity(name, args, 1, 1).map(|_| Value::Bool(!to_bool(&args[0]))),
        "true" => arity(name, args, 0, 0).map(|_| Value::Bool(true)),
        "false" => arity(name, args, 0, 0).map(|_| Value::Bool(false)),
        "string-length" => arity(name, args, 0, 1).map(|_| {
            from_number(string_arg(args, 0, context).chars().count() as f64)
        }),
        "contains" => arity(name, args, 2, 2)
            .map(|_| Value::Bool(to_string(&args[0]).contains(&to_string(&args[1])))),
        "starts-with" => arity(name, args, 2, 2)
            .map(|_| Value::Bool(to_string(&args[0]).starts_with(&to_string(&args[1])))),
        "ends-with" => arity(name, args, 2, 2)
            .map(|_| Value::Bool(to_string(&args[0]).ends_with(&to_string(&args[1])))),
        "substring" => arity(name, args, 2, 3).map(|_| {
            let length = args.get(2).map(to_number);
            Value::String(substring(&to_string(&args[0]), to_number(&args[1]), length))
        }),
        "substring-before" => arity(name, args, 2, 2).map(|_| {
            let s = to_string(&args[0]);
            let pattern = to_string(&args[1]);
            let before = s.find(&pattern).map(|i| &s[..i]).unwrap_or("");
            Value::String(before.to_string())
        }),
        "substring-after" => arity(name, args, 2, 2).map(|_| {
            let s = to_string(&args[0]);
            let pattern = to_string(&args[1]);
            let after = s
                .find(&pattern)
                .map(|i| &s[i + pattern.len()..])
                .unwrap_or("");
            Value::String(after.to_string())
        }),
        "normalize-space" => arity(name, args, 0, 1).map(|_| {
            let s = string_arg(args, 0, context);
            Value::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
        }),
        "upper-case" => {
            arity(name, args, 1, 1).map(|_| Value::String(to_string(&args[0]).to_uppercase()))
        }
        "lower-case" => {
            arity(name, args, 1, 1).map(|_| Value::String(to_string(&args[0]).to_lowercase()))
        }
        "round" => arity(name, args, 1, 1).map(|_| {
            // XPath rounds halves towards positive infinity
            from_number((to_number(&args[0]) + 0.5).floor())
        }),
        "floor" => arity(name, args, 1, 1).map(|_| from_number(to_number(&args[0]).floor())),
        "ceiling" => arity(name, args, 1, 1).map(|_| from_number(to_number(&args[0]).ceil())),
        "count" => arity(name, args, 1, 1).map(|_| {
            let count = match &args[0] {
                Value::Null => 0,
                Value::Array(items) => items.len(),
                _ => 1,
            };
            from_number(count as f64)
        }),
        _ => return None,
    };
    Some(result)
}

/// XPath `substring`: 1-based, positions rounded, NaN selects nothing
fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let start = (start + 0.5).floor();
    let end = match length {
        Some(length) => start + (length + 0.5).floor(),
        None => f64::INFINITY,
    };
    if start.is_nan() || end.is_nan() {
        return String::new();
    }
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, c)| c)
        .collect()
}

// ============================================================================
// openvpms: functions
// ============================================================================

/// `openvpms:get(object, node[, default])`
///
/// `node` may be a dotted path. A missing node is an error unless a default
/// is supplied.
fn openvpms_get(args: &[Value]) -> Result<Value, ExpressionError> {
    arity("openvpms:get", args, 2, 3)?;
    let node = to_string(&args[1]);
    let mut current = &args[0];
    for step in node.split('.') {
        match current.get(step) {
            Some(next) => current = next,
            None => {
                return match args.get(2) {
                    Some(default) => Ok(default.clone()),
                    None => Err(ExpressionError::NoSuchNode(node)),
                };
            }
        }
    }
    Ok(current.clone())
}

// ============================================================================
// date: functions
// ============================================================================

fn date_function(name: &str, args: &[Value]) -> Option<Result<Value, ExpressionError>> {
    let result = match name {
        "today" => arity("date:today", args, 0, 0)
            .map(|_| Value::String(Local::now().format("%Y-%m-%d").to_string())),
        "now" => arity("date:now", args, 0, 0).map(|_| Value::String(Local::now().to_rfc3339())),
        "format" => arity("date:format", args, 2, 2).and_then(|_| {
            let date = parse_date(&to_string(&args[0]))?;
            let pattern = to_string(&args[1]);
            if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
                return Err(ExpressionError::InvalidArguments {
                    function: "date:format".to_string(),
                    message: format!("invalid pattern '{}'", pattern),
                });
            }
            Ok(Value::String(date.format(&pattern).to_string()))
        }),
        _ => return None,
    };
    Some(result)
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates
fn parse_date(text: &str) -> Result<DateTime<FixedOffset>, ExpressionError> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Ok(date_time);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| ExpressionError::Type(format!("'{}' is not a date", text)))
}
