//! Tree values
//!
//! [`Value`] is the tagged variant every config tree is built from.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use crate::call::CallNode;
use crate::opaque::Opaque;

/// Ordered mapping used for tree nodes and call arguments
///
/// Iteration order is declaration order.
pub type ConfigMap = IndexMap<String, Value>;

/// A node of a config tree
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value (`None`)
    #[default]
    Null,
    /// `True` or `False`
    Bool(bool),
    /// Signed 64-bit integer
    Int(i64),
    /// 64-bit float, possibly non-finite
    Float(f64),
    /// Text
    Str(String),
    /// List or tuple
    List(Vec<Value>),
    /// Ordered mapping with string keys
    Map(ConfigMap),
    /// Deferred object construction
    Call(CallNode),
    /// Leaf only representable through the sidecar archive
    Opaque(Opaque),
}

/// Discriminant of a [`Value`], used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Call,
    Opaque,
}

impl ValueKind {
    /// Lowercase name as shown in error messages
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Map => "mapping",
            Self::Call => "call",
            Self::Opaque => "opaque",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Discriminant of this value
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::Call(_) => ValueKind::Call,
            Self::Opaque(_) => ValueKind::Opaque,
        }
    }

    /// Whether this is `Null`
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Scalars are everything but lists, mappings, calls and opaque leaves
    #[inline]
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_)
        )
    }

    /// String contents
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value
    #[inline]
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Boolean value
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// List items
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Mapping entries
    #[inline]
    #[must_use]
    pub const fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable mapping entries
    #[inline]
    #[must_use]
    pub fn as_map_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Call node
    #[inline]
    #[must_use]
    pub const fn as_call(&self) -> Option<&CallNode> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Mutable call node
    #[inline]
    #[must_use]
    pub fn as_call_mut(&mut self) -> Option<&mut CallNode> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Opaque leaf
    #[inline]
    #[must_use]
    pub const fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Self::Opaque(opaque) => Some(opaque),
            _ => None,
        }
    }

    /// Look up one path segment below this value
    ///
    /// Mappings are keyed, call nodes expose their arguments, lists accept
    /// numeric segments.
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(segment),
            Self::Call(call) => call.arg(segment),
            Self::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Mutable variant of [`Value::child`]
    pub fn child_mut(&mut self, segment: &str) -> Option<&mut Value> {
        match self {
            Self::Map(map) => map.get_mut(segment),
            Self::Call(call) => call.arg_mut(segment),
            Self::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        }
    }

    /// Whether a path can continue below this value
    #[inline]
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Call(_) | Self::List(_))
    }

    /// Count call nodes at or below this value
    #[must_use]
    pub fn call_count(&self) -> usize {
        match self {
            Self::Call(call) => 1 + call.args().values().map(Value::call_count).sum::<usize>(),
            Self::Map(map) => map.values().map(Value::call_count).sum(),
            Self::List(items) => items.iter().map(Value::call_count).sum(),
            _ => 0,
        }
    }

    /// Visit every opaque leaf at or below this value, in declaration order
    pub fn for_each_opaque<F: FnMut(&Opaque)>(&self, f: &mut F) {
        match self {
            Self::Opaque(opaque) => f(opaque),
            Self::Call(call) => call.args().values().for_each(|v| v.for_each_opaque(f)),
            Self::Map(map) => map.values().for_each(|v| v.for_each_opaque(f)),
            Self::List(items) => items.iter().for_each(|v| v.for_each_opaque(f)),
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<ConfigMap> for Value {
    fn from(value: ConfigMap) -> Self {
        Self::Map(value)
    }
}

impl From<CallNode> for Value {
    fn from(value: CallNode) -> Self {
        Self::Call(value)
    }
}

impl From<Opaque> for Value {
    fn from(value: Opaque) -> Self {
        Self::Opaque(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Value::Int(1).kind().to_string(), "int");
        assert_eq!(Value::from("x").kind(), ValueKind::Str);
        assert_eq!(Value::Map(ConfigMap::new()).kind().name(), "mapping");
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(3.5).as_i64(), None);
    }

    #[test]
    fn child_lookup_by_container() {
        let map: Value = [("a", Value::Int(1))].into_iter().collect();
        assert_eq!(map.child("a"), Some(&Value::Int(1)));
        assert_eq!(map.child("b"), None);

        let list = Value::List(vec![Value::from("x"), Value::from("y")]);
        assert_eq!(list.child("1"), Some(&Value::from("y")));
        assert_eq!(list.child("2"), None);
        assert_eq!(list.child("first"), None);

        let call = Value::Call(CallNode::new("f").with_arg("k", true));
        assert_eq!(call.child("k"), Some(&Value::Bool(true)));

        assert_eq!(Value::Int(1).child("a"), None);
    }

    #[test]
    fn call_count_nested() {
        let inner = CallNode::new("inner");
        let outer = CallNode::new("outer").with_arg("items", vec![Value::Call(inner.clone()), Value::Call(inner)]);
        assert_eq!(Value::Call(outer).call_count(), 3);
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::from("a"));
    }
}
