//! Deferred call nodes
//!
//! A [`CallNode`] records "construct this target with these keyword
//! arguments" without constructing anything.

use std::fmt;
use std::sync::Arc;

use crate::instance::{ConstructError, Constructor, Instance, Kwargs};
use crate::value::{ConfigMap, Value};

/// Reserved key naming the target of a call node in saved trees and paths
pub const TARGET_KEY: &str = "_target_";

/// What a call node constructs
#[derive(Clone)]
pub enum Target {
    /// Fully qualified dotted name resolved through a registry
    Name(String),
    /// Direct constructor handle carrying its qualified name
    Handle(TargetHandle),
}

impl Target {
    /// Qualified name of the target
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Handle(handle) => handle.name(),
        }
    }

    /// Direct handle, if this target carries one
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Option<&TargetHandle> {
        match self {
            Self::Name(_) => None,
            Self::Handle(handle) => Some(handle),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Handle(handle) => f.debug_tuple("Handle").field(&handle.name).finish(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<TargetHandle> for Target {
    fn from(handle: TargetHandle) -> Self {
        Self::Handle(handle)
    }
}

/// A qualified name bound directly to its constructor
#[derive(Clone)]
pub struct TargetHandle {
    name: String,
    constructor: Constructor,
}

impl TargetHandle {
    /// Bind `name` to a constructor function
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(Kwargs) -> Result<Instance, ConstructError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(constructor),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constructor called at instantiation
    #[inline]
    #[must_use]
    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }
}

/// A call-to-be-made: target plus ordered keyword arguments
#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    target: Target,
    args: ConfigMap,
}

impl CallNode {
    /// New call with no arguments
    #[must_use]
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            target: target.into(),
            args: ConfigMap::new(),
        }
    }

    /// New call with the given arguments
    #[must_use]
    pub fn with_args(target: impl Into<Target>, args: ConfigMap) -> Self {
        Self {
            target: target.into(),
            args,
        }
    }

    /// Builder-style argument append
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// What this call constructs
    #[inline]
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Qualified name of the target
    #[inline]
    #[must_use]
    pub fn target_name(&self) -> &str {
        self.target.name()
    }

    /// Replace the target, returning the previous one
    pub fn set_target(&mut self, target: impl Into<Target>) -> Target {
        std::mem::replace(&mut self.target, target.into())
    }

    /// Keyword arguments in declaration order
    #[inline]
    #[must_use]
    pub const fn args(&self) -> &ConfigMap {
        &self.args
    }

    /// Mutable keyword arguments
    #[inline]
    pub fn args_mut(&mut self) -> &mut ConfigMap {
        &mut self.args
    }

    /// Argument `name`
    #[inline]
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Mutable argument `name`
    #[inline]
    pub fn arg_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.args.get_mut(name)
    }

    /// Set an argument; existing arguments keep their position
    pub fn set_arg(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.args.insert(name.into(), value.into())
    }

    /// Remove an argument, preserving the order of the others
    pub fn remove_arg(&mut self, name: &str) -> Option<Value> {
        self.args.shift_remove(name)
    }

    /// Split into target and arguments
    #[must_use]
    pub fn into_parts(self) -> (Target, ConfigMap) {
        (self.target, self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_compare_by_name() {
        let handle = TargetHandle::new("itertools.count", |_| Ok(Instance::Null));
        assert_eq!(Target::from(handle), Target::from("itertools.count"));
        assert_ne!(Target::from("a.b"), Target::from("a.c"));
    }

    #[test]
    fn set_arg_keeps_declaration_order() {
        let mut call = CallNode::new("f").with_arg("x", 1).with_arg("y", 2);
        call.set_arg("x", "new");
        let keys: Vec<_> = call.args().keys().cloned().collect();
        assert_eq!(keys, vec!["x", "y"]);
        assert_eq!(call.arg("x"), Some(&Value::from("new")));
    }

    #[test]
    fn remove_arg_shifts() {
        let mut call = CallNode::new("f").with_arg("a", 1).with_arg("b", 2).with_arg("c", 3);
        assert_eq!(call.remove_arg("b"), Some(Value::Int(2)));
        let keys: Vec<_> = call.args().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn set_target_replaces() {
        let mut call = CallNode::new("old.Name");
        let previous = call.set_target("new.Name");
        assert_eq!(previous.name(), "old.Name");
        assert_eq!(call.target_name(), "new.Name");
    }

    #[test]
    fn debug_hides_constructor() {
        let target = Target::from(TargetHandle::new("pkg.Model", |_| Ok(Instance::Null)));
        assert_eq!(format!("{target:?}"), "Handle(\"pkg.Model\")");
    }
}
