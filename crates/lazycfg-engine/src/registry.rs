//! Target registry
//!
//! Maps qualified names (`models.ResNet`) to constructors. The registry is
//! populated explicitly at startup; nothing is discovered at runtime.

use std::collections::HashMap;
use std::fmt;

use lazycfg_tree::{ConstructError, Constructor, Instance, Kwargs, TargetHandle};

use crate::error::{InstantiateError, InstantiateResult};

/// What a registered name resolves to
#[derive(Clone)]
pub enum Entry {
    /// Called with the resolved keyword arguments
    Constructor(Constructor),
    /// A fixed value; referencing it as a call target is an error
    Constant(Instance),
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructor(_) => f.write_str("Constructor"),
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

/// Name to constructor map
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `builtins.dict`, `builtins.list`,
    /// `builtins.tuple` and `itertools.count`
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_fn("builtins.dict", |args: Kwargs| Ok(Instance::Map(args.into_map())))
            .register_fn("builtins.list", sequence)
            .register_fn("builtins.tuple", sequence)
            .register_fn("itertools.count", |mut args: Kwargs| {
                let start = args.optional_as::<i64>("start")?.unwrap_or(0);
                let step = args.optional_as::<i64>("step")?.unwrap_or(1);
                args.finish()?;
                Ok(Instance::object(Count::new(start, step)))
            });
        registry
    }

    /// Register a target handle under its own name
    pub fn register(&mut self, handle: TargetHandle) -> &mut Self {
        self.entries
            .insert(handle.name().to_string(), Entry::Constructor(handle.constructor().clone()));
        self
    }

    /// Register a constructor function
    pub fn register_fn<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Kwargs) -> Result<Instance, ConstructError> + Send + Sync + 'static,
    {
        self.register(TargetHandle::new(name, constructor))
    }

    /// Register a constant value
    pub fn register_constant(&mut self, name: impl Into<String>, value: impl Into<Instance>) -> &mut Self {
        self.entries.insert(name.into(), Entry::Constant(value.into()));
        self
    }

    /// Whether `name` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered names
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry registered under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Constructor registered under `name`
    ///
    /// # Errors
    ///
    /// [`InstantiateError::TargetResolution`] when nothing is registered,
    /// [`InstantiateError::NotInstantiable`] when `name` is a constant.
    pub fn resolve(&self, name: &str) -> InstantiateResult<&Constructor> {
        match self.entries.get(name) {
            Some(Entry::Constructor(constructor)) => Ok(constructor),
            Some(Entry::Constant(_)) => Err(InstantiateError::NotInstantiable { name: name.to_string() }),
            None => Err(InstantiateError::TargetResolution { name: name.to_string() }),
        }
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn sequence(mut args: Kwargs) -> Result<Instance, ConstructError> {
    let items = args.optional_as::<Vec<Instance>>("items")?.unwrap_or_default();
    args.finish()?;
    Ok(Instance::List(items))
}

/// Counter built by `itertools.count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    next: i64,
    step: i64,
}

impl Count {
    /// Counter starting at `start`
    #[must_use]
    pub const fn new(start: i64, step: i64) -> Self {
        Self { next: start, step }
    }
}

impl Iterator for Count {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = self.next;
        self.next = current.checked_add(self.step)?;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(target: &str, pairs: Vec<(&str, Instance)>) -> Kwargs {
        Kwargs::new(target, pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn builtin_dict_and_list() {
        let registry = Registry::with_builtins();
        let dict = registry.resolve("builtins.dict").unwrap();
        let built = dict(kwargs("builtins.dict", vec![("a", Instance::Int(1))])).unwrap();
        assert_eq!(built.as_map().and_then(|m| m.get("a")).and_then(Instance::as_i64), Some(1));

        let list = registry.resolve("builtins.list").unwrap();
        let built = list(kwargs("builtins.list", vec![("items", Instance::List(vec![Instance::Int(2)]))])).unwrap();
        assert_eq!(built.as_list().map(<[Instance]>::len), Some(1));
    }

    #[test]
    fn count_iterates() {
        let registry = Registry::with_builtins();
        let count = registry.resolve("itertools.count").unwrap();
        let built = count(kwargs("itertools.count", vec![("start", Instance::Int(5)), ("step", Instance::Int(2))])).unwrap();
        let counter = *built.downcast_ref::<Count>().unwrap();
        assert_eq!(counter.take(3).collect::<Vec<_>>(), vec![5, 7, 9]);

        let err = count(kwargs("itertools.count", vec![("x", Instance::from("a"))])).unwrap_err();
        assert!(err.to_string().contains("unexpected arguments: x"));
    }

    #[test]
    fn resolve_errors() {
        let mut registry = Registry::new();
        registry.register_constant("defaults.scale", 3.5_f64);
        assert!(matches!(registry.resolve("defaults.scale"), Err(InstantiateError::NotInstantiable { .. })));
        assert!(matches!(registry.resolve("nope.X"), Err(InstantiateError::TargetResolution { .. })));
        assert_eq!(registry.names(), vec!["defaults.scale"]);
    }

    #[test]
    fn register_handle() {
        let mut registry = Registry::new();
        registry.register(TargetHandle::new("pkg.Unit", |_| Ok(Instance::Null)));
        assert!(registry.contains("pkg.Unit"));
        assert_eq!(registry.len(), 1);
    }
}
