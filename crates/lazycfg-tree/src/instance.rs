//! Live values produced by instantiation
//!
//! [`Instance`] mirrors [`Value`](crate::Value) with call nodes replaced by
//! constructed [`Object`]s. Constructors receive their resolved arguments as
//! [`Kwargs`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::opaque::Opaque;

/// Error type returned by constructors
pub type ConstructError = Box<dyn std::error::Error + Send + Sync>;

/// A constructor: resolved keyword arguments in, live value out
pub type Constructor = Arc<dyn Fn(Kwargs) -> Result<Instance, ConstructError> + Send + Sync>;

/// A live value
#[derive(Debug, Clone)]
pub enum Instance {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Instance>),
    Map(IndexMap<String, Instance>),
    /// Object built by a constructor
    Object(Object),
    /// Opaque leaves pass through instantiation untouched
    Opaque(Opaque),
}

impl Instance {
    /// Wrap any value as an object instance
    #[must_use]
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Object::new(value))
    }

    /// Name of the variant (or object type) for diagnostics
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
            Self::Object(object) => object.type_name(),
            Self::Opaque(opaque) => opaque.type_name(),
        }
    }

    /// Integer value
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float value; integers widen
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean value
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// List items
    #[must_use]
    pub fn as_list(&self) -> Option<&[Instance]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Mapping entries
    #[must_use]
    pub const fn as_map(&self) -> Option<&IndexMap<String, Instance>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the constructed object as `T`
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => object.downcast_ref(),
            _ => None,
        }
    }
}

impl From<bool> for Instance {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Instance {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Instance {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Instance {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Instance {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Type-erased constructed object
#[derive(Clone)]
pub struct Object {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Object {
    /// Wrap a constructed value
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Rust type name of the wrapped value
    #[inline]
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether two handles point at the same allocation
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.type_name).finish()
    }
}

/// Conversion out of an [`Instance`] for typed argument access
pub trait FromInstance: Sized {
    /// Expected type, as shown in binding errors
    const EXPECTED: &'static str;

    /// Convert, handing the instance back on mismatch
    ///
    /// # Errors
    /// Returns the original instance if it has the wrong shape
    fn from_instance(instance: Instance) -> Result<Self, Instance>;
}

impl FromInstance for Instance {
    const EXPECTED: &'static str = "any";

    fn from_instance(instance: Instance) -> Result<Self, Instance> {
        Ok(instance)
    }
}

impl FromInstance for i64 {
    const EXPECTED: &'static str = "int";

    fn from_instance(instance: Instance) -> Result<Self, Instance> {
        match instance {
            Instance::Int(i) => Ok(i),
            other => Err(other),
        }
    }
}

impl FromInstance for f64 {
    const EXPECTED: &'static str = "float";

    #[allow(clippy::cast_precision_loss)]
    fn from_instance(instance: Instance) -> Result<Self, Instance> {
        match instance {
            Instance::Float(f) => Ok(f),
            Instance::Int(i) => Ok(i as f64),
            other => Err(other),
        }
    }
}

impl FromInstance for bool {
    const EXPECTED: &'static str = "bool";

    fn from_instance(instance: Instance) -> Result<Self, Instance> {
        match instance {
            Instance::Bool(b) => Ok(b),
            other => Err(other),
        }
    }
}

impl FromInstance for String {
    const EXPECTED: &'static str = "str";

    fn from_instance(instance: Instance) -> Result<Self, Instance> {
        match instance {
            Instance::Str(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FromInstance for Vec<Instance> {
    const EXPECTED: &'static str = "list";

    fn from_instance(instance: Instance) -> Result<Self, Instance> {
        match instance {
            Instance::List(items) => Ok(items),
            other => Err(other),
        }
    }
}

impl FromInstance for Object {
    const EXPECTED: &'static str = "object";

    fn from_instance(instance: Instance) -> Result<Self, Instance> {
        match instance {
            Instance::Object(object) => Ok(object),
            other => Err(other),
        }
    }
}

/// Resolved keyword arguments handed to a constructor
#[derive(Debug, Clone)]
pub struct Kwargs {
    target: String,
    args: IndexMap<String, Instance>,
}

impl Kwargs {
    /// Arguments bound for `target`
    #[must_use]
    pub fn new(target: impl Into<String>, args: IndexMap<String, Instance>) -> Self {
        Self {
            target: target.into(),
            args,
        }
    }

    /// Qualified name of the target being constructed
    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Number of arguments not yet taken
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether every argument was taken
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Whether `name` is still present
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    /// Peek at `name` without taking it
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.args.get(name)
    }

    /// Remove an argument if present
    pub fn take(&mut self, name: &str) -> Option<Instance> {
        self.args.shift_remove(name)
    }

    /// Remove a required argument
    ///
    /// # Errors
    /// [`BindError::Missing`] if the argument was not supplied
    pub fn require(&mut self, name: &str) -> Result<Instance, BindError> {
        self.take(name).ok_or_else(|| BindError::Missing {
            target: self.target.clone(),
            name: name.to_string(),
        })
    }

    /// Remove a required argument of type `T`
    ///
    /// # Errors
    /// [`BindError::Missing`] or [`BindError::WrongType`]
    pub fn require_as<T: FromInstance>(&mut self, name: &str) -> Result<T, BindError> {
        let instance = self.require(name)?;
        self.convert(name, instance)
    }

    /// Remove an optional argument of type `T`
    ///
    /// # Errors
    /// [`BindError::WrongType`] if present with the wrong type
    pub fn optional_as<T: FromInstance>(&mut self, name: &str) -> Result<Option<T>, BindError> {
        match self.take(name) {
            None | Some(Instance::Null) => Ok(None),
            Some(instance) => self.convert(name, instance).map(Some),
        }
    }

    /// Finish binding; leftover arguments are unexpected
    ///
    /// # Errors
    /// [`BindError::Unexpected`] listing every unconsumed argument
    pub fn finish(self) -> Result<(), BindError> {
        if self.args.is_empty() {
            Ok(())
        } else {
            Err(BindError::Unexpected {
                target: self.target,
                names: self.args.into_keys().collect(),
            })
        }
    }

    /// Remaining arguments as an ordered map
    #[must_use]
    pub fn into_map(self) -> IndexMap<String, Instance> {
        self.args
    }

    fn convert<T: FromInstance>(&self, name: &str, instance: Instance) -> Result<T, BindError> {
        T::from_instance(instance).map_err(|actual| BindError::WrongType {
            target: self.target.clone(),
            name: name.to_string(),
            expected: T::EXPECTED,
            actual: actual.type_name().to_string(),
        })
    }
}

/// Argument binding failures raised by constructors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    /// Required argument not supplied
    #[error("{target}() missing required argument '{name}'")]
    Missing { target: String, name: String },

    /// Arguments the constructor does not accept
    #[error("{target}() got unexpected arguments: {}", .names.join(", "))]
    Unexpected { target: String, names: Vec<String> },

    /// Argument supplied with the wrong type
    #[error("{target}() argument '{name}' expected {expected}, got {actual}")]
    WrongType {
        target: String,
        name: String,
        expected: &'static str,
        actual: String,
    },
}
