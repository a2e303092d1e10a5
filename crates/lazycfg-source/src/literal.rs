//! Literal parsing for override values
//!
//! Accepts constants, lists, tuples and string-keyed mappings written in the
//! source language. Names, calls and operators other than a sign on a number
//! are not literals.

use lazycfg_tree::{ConfigMap, Value};

use crate::parser::{self, ast::Expr, ast::ExprKind, ast::UnaryOp};

/// Parse `text` as a literal value
///
/// Returns `None` when the text is not a literal.
///
/// ```
/// use lazycfg_source::parse_literal;
/// use lazycfg_tree::Value;
///
/// assert_eq!(parse_literal("[1, 'a']"), Some(Value::List(vec![Value::Int(1), Value::from("a")])));
/// assert_eq!(parse_literal("-0.5"), Some(Value::Float(-0.5)));
/// assert_eq!(parse_literal("resnet50"), None);
/// ```
#[must_use]
pub fn parse_literal(text: &str) -> Option<Value> {
    let expr = parser::parse_expression(text).ok()?;
    literal(&expr)
}

fn literal(expr: &Expr) -> Option<Value> {
    let value = match &expr.kind {
        ExprKind::None => Value::Null,
        ExprKind::Bool(b) => Value::Bool(*b),
        ExprKind::Int(i) => Value::Int(*i),
        ExprKind::Float(f) => Value::Float(*f),
        ExprKind::Str(s) => Value::Str(s.clone()),
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            Value::List(items.iter().map(literal).collect::<Option<_>>()?)
        }
        ExprKind::Dict(entries) => {
            let mut map = ConfigMap::new();
            for (key, value) in entries {
                let Value::Str(key) = literal(key)? else {
                    return None;
                };
                map.insert(key, literal(value)?);
            }
            Value::Map(map)
        }
        ExprKind::Unary {
            op: op @ (UnaryOp::Neg | UnaryOp::Pos),
            operand,
        } => match (literal(operand)?, op) {
            (Value::Int(i), UnaryOp::Neg) => Value::Int(i.checked_neg()?),
            (Value::Float(f), UnaryOp::Neg) => Value::Float(-f),
            (number @ (Value::Int(_) | Value::Float(_)), _) => number,
            _ => return None,
        },
        _ => return None,
    };
    Some(value)
}
