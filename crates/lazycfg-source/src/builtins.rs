//! Builtin functions and operator semantics
//!
//! Operators follow Python semantics on config values: integer arithmetic is
//! checked, `/` always yields a float, `//` and `%` round toward negative
//! infinity, and `bool` takes part in arithmetic as 0/1.

use std::cmp::Ordering;

use indexmap::IndexMap;
use lazycfg_tree::{ConfigMap, Value};

use crate::emit;
use crate::parser::ast::{BinOp, CmpOp};

type OpResult<T> = Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Int,
    Float,
    Str,
    Bool,
    Len,
    List,
    Dict,
    Tuple,
    Min,
    Max,
    Abs,
    Round,
    Getenv,
}

impl Builtin {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "int" => Self::Int,
            "float" => Self::Float,
            "str" => Self::Str,
            "bool" => Self::Bool,
            "len" => Self::Len,
            "list" => Self::List,
            "dict" => Self::Dict,
            "tuple" => Self::Tuple,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "round" => Self::Round,
            _ => return None,
        };
        Some(builtin)
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Len => "len",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Tuple => "tuple",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Getenv => "getenv",
        }
    }

    /// Qualified name used when the builtin is a `LazyCall` target
    pub(crate) fn qualified_name(self) -> String {
        match self {
            Self::Getenv => "os.getenv".to_string(),
            other => format!("builtins.{}", other.name()),
        }
    }

    /// Apply the builtin to evaluated arguments
    pub(crate) fn call(self, mut args: Vec<Value>, mut kwargs: IndexMap<String, Value>) -> OpResult<Value> {
        match self {
            Self::Dict => return dict(args, kwargs),
            Self::Round => {
                if let Some(digits) = kwargs.shift_remove("ndigits") {
                    args.push(digits);
                }
            }
            Self::Getenv => {
                if let Some(default) = kwargs.shift_remove("default") {
                    args.push(default);
                }
            }
            _ => {}
        }
        if let Some(name) = kwargs.keys().next() {
            return Err(format!("{}() got an unexpected keyword argument '{name}'", self.name()));
        }

        match self {
            Self::Int => int(&one_or(self, args, Value::Int(0))?),
            Self::Float => float(&one_or(self, args, Value::Float(0.0))?),
            Self::Str => Ok(Value::Str(to_str(&one_or(self, args, Value::Str(String::new()))?))),
            Self::Bool => Ok(Value::Bool(truthy(&one_or(self, args, Value::Bool(false))?))),
            Self::Len => len(&exactly_one(self, args)?),
            Self::List | Self::Tuple => to_list(one_or(self, args, Value::List(Vec::new()))?).map(Value::List),
            Self::Min => extreme(self, args, Ordering::Less),
            Self::Max => extreme(self, args, Ordering::Greater),
            Self::Abs => abs(&exactly_one(self, args)?),
            Self::Round => round(self, args),
            Self::Getenv => getenv(args),
            Self::Dict => dict(args, IndexMap::new()),
        }
    }
}

fn dict(mut args: Vec<Value>, kwargs: IndexMap<String, Value>) -> OpResult<Value> {
    let mut map = match args.len() {
        0 => ConfigMap::new(),
        1 => match args.remove(0) {
            Value::Map(map) => map,
            other => return Err(format!("dict() argument must be a mapping, not {}", other.kind())),
        },
        n => return Err(format!("dict expected at most 1 argument, got {n}")),
    };
    map.extend(kwargs);
    Ok(Value::Map(map))
}

fn exactly_one(builtin: Builtin, mut args: Vec<Value>) -> OpResult<Value> {
    if args.len() == 1 {
        Ok(args.remove(0))
    } else {
        Err(format!("{}() takes exactly one argument ({} given)", builtin.name(), args.len()))
    }
}

fn one_or(builtin: Builtin, args: Vec<Value>, default: Value) -> OpResult<Value> {
    if args.is_empty() {
        Ok(default)
    } else {
        exactly_one(builtin, args)
    }
}

/// Python truthiness
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Map(map) => !map.is_empty(),
        Value::Call(_) | Value::Opaque(_) => true,
    }
}

/// `str(value)`
pub(crate) fn to_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => emit::render_flat(other),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            Value::Float(f) => Some(Self::Float(*f)),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

fn overflow(op: BinOp) -> String {
    format!("integer overflow in '{}'", op.symbol())
}

/// Binary arithmetic
pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> OpResult<Value> {
    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return numeric(op, a, b);
    }
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
        (BinOp::Mul, Value::Str(s), count) | (BinOp::Mul, count, Value::Str(s))
            if matches!(count, Value::Int(_) | Value::Bool(_)) =>
        {
            let n = repeat_count(count);
            repeated_len(s.len(), n)?;
            Ok(Value::Str(s.repeat(n)))
        }
        (BinOp::Mul, Value::List(items), count) | (BinOp::Mul, count, Value::List(items))
            if matches!(count, Value::Int(_) | Value::Bool(_)) =>
        {
            let len = repeated_len(items.len(), repeat_count(count))?;
            Ok(Value::List(items.iter().cloned().cycle().take(len).collect()))
        }
        _ => Err(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op.symbol(),
            left.kind(),
            right.kind()
        )),
    }
}

/// Largest sequence a repetition may build, in elements or bytes
const MAX_REPEAT_LEN: usize = 1 << 24;

fn repeated_len(len: usize, count: usize) -> OpResult<usize> {
    len.checked_mul(count)
        .filter(|total| *total <= MAX_REPEAT_LEN)
        .ok_or_else(|| "repetition too large".to_string())
}

fn repeat_count(count: &Value) -> usize {
    match count {
        Value::Int(i) => usize::try_from(*i).unwrap_or(0),
        Value::Bool(b) => usize::from(*b),
        _ => 0,
    }
}

fn numeric(op: BinOp, a: Num, b: Num) -> OpResult<Value> {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        return integer(op, x, y);
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    let value = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if y == 0.0 => {
            return Err("float division by zero".to_string());
        }
        BinOp::Div => x / y,
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Mod => x - y * (x / y).floor(),
        BinOp::Pow => x.powf(y),
    };
    Ok(Value::Float(value))
}

fn integer(op: BinOp, x: i64, y: i64) -> OpResult<Value> {
    let value = match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Sub => x.checked_sub(y),
        BinOp::Mul => x.checked_mul(y),
        BinOp::Div => {
            if y == 0 {
                return Err("division by zero".to_string());
            }
            return numeric(op, Num::Float(Num::Int(x).as_f64()), Num::Int(y));
        }
        BinOp::FloorDiv | BinOp::Mod if y == 0 => {
            return Err("integer division or modulo by zero".to_string());
        }
        BinOp::FloorDiv => x.checked_div(y).map(|q| {
            if (x % y != 0) && ((x < 0) != (y < 0)) {
                q - 1
            } else {
                q
            }
        }),
        BinOp::Mod => x.checked_rem(y).map(|r| if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }),
        BinOp::Pow => {
            if y < 0 {
                return numeric(op, Num::Float(Num::Int(x).as_f64()), Num::Int(y));
            }
            u32::try_from(y).ok().and_then(|e| x.checked_pow(e))
        }
    };
    value.map(Value::Int).ok_or_else(|| overflow(op))
}

/// Unary minus / plus
pub(crate) fn negate(value: &Value, negative: bool) -> OpResult<Value> {
    match Num::of(value) {
        Some(Num::Int(i)) if negative => i.checked_neg().map(Value::Int).ok_or_else(|| "integer overflow in '-'".to_string()),
        Some(Num::Int(i)) => Ok(Value::Int(i)),
        Some(Num::Float(f)) => Ok(Value::Float(if negative { -f } else { f })),
        None => Err(format!(
            "bad operand type for unary {}: '{}'",
            if negative { "-" } else { "+" },
            value.kind()
        )),
    }
}

/// Equality with numeric cross-type comparison (`1 == 1.0`)
pub(crate) fn equals(left: &Value, right: &Value) -> bool {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => match (left, right) {
            (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y)),
            _ => left == right,
        },
    }
}

fn order(left: &Value, right: &Value) -> OpResult<Ordering> {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
        (Some(a), Some(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or_else(|| "comparison with NaN".to_string()),
        _ => match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match order(x, y)? {
                        Ordering::Equal => {}
                        other => return Ok(other),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(format!(
                "'<' not supported between '{}' and '{}'",
                left.kind(),
                right.kind()
            )),
        },
    }
}

/// One comparison of a (possibly chained) comparison expression
pub(crate) fn compare(op: CmpOp, left: &Value, right: &Value) -> OpResult<bool> {
    Ok(match op {
        CmpOp::Eq => equals(left, right),
        CmpOp::NotEq => !equals(left, right),
        CmpOp::Lt => order(left, right)? == Ordering::Less,
        CmpOp::LtE => order(left, right)? != Ordering::Greater,
        CmpOp::Gt => order(left, right)? == Ordering::Greater,
        CmpOp::GtE => order(left, right)? != Ordering::Less,
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
        CmpOp::Is => identical(left, right),
        CmpOp::IsNot => !identical(left, right),
    })
}

/// `is` only has a meaning for singletons in a value model
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => false,
    }
}

fn contains(container: &Value, item: &Value) -> OpResult<bool> {
    match (container, item) {
        (Value::List(items), _) => Ok(items.iter().any(|x| equals(x, item))),
        (Value::Map(map), Value::Str(key)) => Ok(map.contains_key(key)),
        (Value::Map(_), _) => Ok(false),
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        _ => Err(format!(
            "argument of type '{}' is not a container",
            container.kind()
        )),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(f: f64) -> OpResult<Value> {
    if !f.is_finite() {
        return Err(format!("cannot convert float {} to integer", emit::format_float(f)));
    }
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(format!("integer {truncated} out of range"));
    }
    Ok(Value::Int(truncated as i64))
}

fn int(value: &Value) -> OpResult<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(*f),
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse()
            .map(Value::Int)
            .map_err(|_| format!("invalid literal for int(): '{s}'")),
        other => Err(format!("int() argument must be a string or a number, not '{}'", other.kind())),
    }
}

fn float(value: &Value) -> OpResult<Value> {
    match Num::of(value) {
        Some(n) => Ok(Value::Float(n.as_f64())),
        None => match value {
            Value::Str(s) => parse_float(s).map(Value::Float),
            other => Err(format!("float() argument must be a string or a number, not '{}'", other.kind())),
        },
    }
}

fn parse_float(text: &str) -> OpResult<f64> {
    let trimmed = text.trim();
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let magnitude = match body.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => f64::INFINITY,
        "nan" => f64::NAN,
        _ => body
            .replace('_', "")
            .parse::<f64>()
            .map_err(|_| format!("could not convert string to float: '{text}'"))?,
    };
    Ok(sign * magnitude)
}

fn len(value: &Value) -> OpResult<Value> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::Call(call) => call.args().len(),
        other => return Err(format!("object of type '{}' has no len()", other.kind())),
    };
    i64::try_from(n).map(Value::Int).map_err(|e| e.to_string())
}

fn to_list(value: Value) -> OpResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        Value::Map(map) => Ok(map.into_keys().map(Value::Str).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(format!("'{}' object is not iterable", other.kind())),
    }
}

fn extreme(builtin: Builtin, mut args: Vec<Value>, wanted: Ordering) -> OpResult<Value> {
    let candidates = if args.len() == 1 { to_list(args.remove(0))? } else { args };
    let mut iter = candidates.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(format!("{}() arg is an empty sequence", builtin.name()));
    };
    for candidate in iter {
        if order(&candidate, &best)? == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

fn abs(value: &Value) -> OpResult<Value> {
    match Num::of(value) {
        Some(Num::Int(i)) => i.checked_abs().map(Value::Int).ok_or_else(|| "integer overflow in abs()".to_string()),
        Some(Num::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(format!("bad operand type for abs(): '{}'", value.kind())),
    }
}

/// Round half to even, like Python's `round`
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

fn round(builtin: Builtin, args: Vec<Value>) -> OpResult<Value> {
    let mut args = args.into_iter();
    let (Some(number), digits) = (args.next(), args.next()) else {
        return Err(format!("{}() missing required argument 'number'", builtin.name()));
    };
    if args.next().is_some() {
        return Err(format!("{}() takes at most 2 arguments", builtin.name()));
    }
    let digits = match digits {
        None | Some(Value::Null) => None,
        Some(Value::Int(d)) => Some(d),
        Some(other) => return Err(format!("'{}' object cannot be interpreted as an integer", other.kind())),
    };
    match (Num::of(&number), digits) {
        (Some(Num::Int(i)), _) => Ok(Value::Int(i)),
        (Some(Num::Float(f)), None) => float_to_int(round_half_even(f)),
        (Some(Num::Float(f)), Some(d)) => {
            let exponent = i32::try_from(d).map_err(|e| e.to_string())?;
            let scale = 10f64.powi(exponent);
            Ok(Value::Float(round_half_even(f * scale) / scale))
        }
        (None, _) => Err(format!("type '{}' doesn't define __round__", number.kind())),
    }
}

fn getenv(args: Vec<Value>) -> OpResult<Value> {
    let mut args = args.into_iter();
    let Some(Value::Str(name)) = args.next() else {
        return Err("os.getenv() requires a string name".to_string());
    };
    let default = args.next().unwrap_or(Value::Null);
    Ok(std::env::var(&name).map_or(default, Value::Str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repetition_is_bounded() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            binary(BinOp::Mul, &list, &Value::Int(2)),
            Ok(Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(binary(BinOp::Mul, &Value::Int(-1), &list), Ok(Value::List(Vec::new())));
        let huge = Value::Int(1 << 62);
        assert_eq!(binary(BinOp::Mul, &list, &huge), Err("repetition too large".to_string()));
        assert_eq!(binary(BinOp::Mul, &Value::from("ab"), &huge), Err("repetition too large".to_string()));
        assert_eq!(binary(BinOp::Mul, &Value::List(Vec::new()), &huge), Ok(Value::List(Vec::new())));
    }

    fn call(builtin: Builtin, args: Vec<Value>) -> OpResult<Value> {
        builtin.call(args, IndexMap::new())
    }

    #[test]
    fn division_floors_toward_negative_infinity() {
        assert_eq!(binary(BinOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(binary(BinOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(binary(BinOp::Mod, &Value::Int(-7), &Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(binary(BinOp::Pow, &Value::Int(2), &Value::Int(10)).unwrap(), Value::Int(1024));
        assert_eq!(binary(BinOp::Pow, &Value::Int(2), &Value::Int(-1)).unwrap(), Value::Float(0.5));
        assert!(binary(BinOp::Div, &Value::Int(1), &Value::Int(0)).is_err());
        assert!(binary(BinOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).is_err());
    }

    #[test]
    fn string_and_list_operators() {
        assert_eq!(
            binary(BinOp::Add, &Value::from("base_a_1"), &Value::from("_from_b")).unwrap(),
            Value::from("base_a_1_from_b")
        );
        assert_eq!(
            binary(BinOp::Mul, &Value::List(vec![Value::Int(0)]), &Value::Int(3)).unwrap(),
            Value::List(vec![Value::Int(0); 3])
        );
        assert!(binary(BinOp::Sub, &Value::from("a"), &Value::Int(1)).is_err());
    }

    #[test]
    fn mixed_comparisons() {
        assert!(compare(CmpOp::Eq, &Value::Int(1), &Value::Float(1.0)).unwrap());
        assert!(compare(CmpOp::Lt, &Value::from("a"), &Value::from("b")).unwrap());
        assert!(compare(CmpOp::In, &Value::Int(2), &Value::List(vec![Value::Int(1), Value::Int(2)])).unwrap());
        assert!(compare(CmpOp::Is, &Value::Null, &Value::Null).unwrap());
        assert!(compare(CmpOp::Lt, &Value::from("a"), &Value::Int(1)).is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call(Builtin::Int, vec![Value::from(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call(Builtin::Int, vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(call(Builtin::Float, vec![Value::from("1e-3")]).unwrap(), Value::Float(1e-3));
        assert_eq!(call(Builtin::Str, vec![Value::Int(5)]).unwrap(), Value::from("5"));
        assert_eq!(call(Builtin::Bool, vec![Value::List(Vec::new())]).unwrap(), Value::Bool(false));
        assert!(matches!(call(Builtin::Float, vec![Value::from("inf")]).unwrap(), Value::Float(f) if f.is_infinite()));
    }

    #[test]
    fn aggregates() {
        let items = Value::List(vec![Value::Int(3), Value::Float(1.5), Value::Int(2)]);
        assert_eq!(call(Builtin::Min, vec![items.clone()]).unwrap(), Value::Float(1.5));
        assert_eq!(call(Builtin::Max, vec![Value::Int(1), Value::Int(9)]).unwrap(), Value::Int(9));
        assert_eq!(call(Builtin::Len, vec![items]).unwrap(), Value::Int(3));
        assert!(call(Builtin::Max, vec![Value::List(Vec::new())]).is_err());
    }

    #[test]
    fn round_is_bankers() {
        assert_eq!(call(Builtin::Round, vec![Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(call(Builtin::Round, vec![Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            call(Builtin::Round, vec![Value::Float(0.125), Value::Int(2)]).unwrap(),
            Value::Float(0.12)
        );
    }

    #[test]
    fn dict_merges_keywords() {
        let base: Value = [("a", 1)].into_iter().collect();
        let mut kwargs = IndexMap::new();
        kwargs.insert("b".to_string(), Value::Int(2));
        let merged = Builtin::Dict.call(vec![base], kwargs).unwrap();
        assert_eq!(merged.as_map().map(ConfigMap::len), Some(2));
    }

    #[test]
    fn getenv_default() {
        let value = Builtin::Getenv
            .call(
                vec![Value::from("LAZYCFG_SURELY_UNSET_VARIABLE"), Value::from("fallback")],
                IndexMap::new(),
            )
            .unwrap();
        assert_eq!(value, Value::from("fallback"));
    }

    #[test]
    fn unexpected_keyword_rejected() {
        let mut kwargs = IndexMap::new();
        kwargs.insert("base".to_string(), Value::Int(2));
        assert!(Builtin::Int.call(vec![Value::from("7")], kwargs).is_err());
    }
}
