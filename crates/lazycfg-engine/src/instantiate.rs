//! Instantiation of call nodes
//!
//! Walks a value depth-first, building every nested call node before the
//! call that receives it, so constructors only ever see live arguments.

use indexmap::IndexMap;
use lazycfg_tree::{CallNode, ConfigMap, ConfigTree, Instance, Kwargs, Value};
use tracing::trace;

use crate::error::{InstantiateError, InstantiateResult};
use crate::registry::Registry;

/// Caller-supplied keyword arguments; they win over the node's own
pub type Overrides = IndexMap<String, Instance>;

/// Anything that can be instantiated
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Value(&'a Value),
    Call(&'a CallNode),
    Tree(&'a ConfigTree),
}

impl<'a> From<&'a Value> for Node<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Value(value)
    }
}

impl<'a> From<&'a CallNode> for Node<'a> {
    fn from(call: &'a CallNode) -> Self {
        Self::Call(call)
    }
}

impl<'a> From<&'a ConfigTree> for Node<'a> {
    fn from(tree: &'a ConfigTree) -> Self {
        Self::Tree(tree)
    }
}

/// Builds live objects with the constructors of a [`Registry`]
#[derive(Debug, Clone, Copy)]
pub struct Instantiator<'r> {
    registry: &'r Registry,
}

impl<'r> Instantiator<'r> {
    /// Instantiator resolving names through `registry`
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Instantiate a node, merging `overrides` into its top-level arguments
    ///
    /// Mappings and trees take overrides as extra or replacement keys; any
    /// other non-call value rejects them.
    ///
    /// # Errors
    ///
    /// The first resolution or construction failure, depth-first.
    pub fn instantiate<'a>(&self, node: impl Into<Node<'a>>, overrides: Overrides) -> InstantiateResult<Instance> {
        match node.into() {
            Node::Call(call) | Node::Value(Value::Call(call)) => self.call(call, overrides),
            Node::Tree(tree) => self.map(tree.root(), overrides),
            Node::Value(Value::Map(map)) => self.map(map, overrides),
            Node::Value(value) if overrides.is_empty() => self.value(value),
            Node::Value(value) => Err(InstantiateError::UnexpectedOverrides {
                kind: value.kind().to_string(),
            }),
        }
    }

    /// Instantiate a value with no overrides
    ///
    /// # Errors
    ///
    /// See [`Instantiator::instantiate`].
    pub fn value(&self, value: &Value) -> InstantiateResult<Instance> {
        Ok(match value {
            Value::Null => Instance::Null,
            Value::Bool(b) => Instance::Bool(*b),
            Value::Int(i) => Instance::Int(*i),
            Value::Float(f) => Instance::Float(*f),
            Value::Str(s) => Instance::Str(s.clone()),
            Value::List(items) => Instance::List(items.iter().map(|item| self.value(item)).collect::<InstantiateResult<_>>()?),
            Value::Map(map) => self.map(map, Overrides::new())?,
            Value::Call(call) => self.call(call, Overrides::new())?,
            Value::Opaque(opaque) => Instance::Opaque(opaque.clone()),
        })
    }

    fn map(&self, map: &ConfigMap, overrides: Overrides) -> InstantiateResult<Instance> {
        let mut built = map
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.value(value)?)))
            .collect::<InstantiateResult<IndexMap<_, _>>>()?;
        built.extend(overrides);
        Ok(Instance::Map(built))
    }

    fn call(&self, call: &CallNode, overrides: Overrides) -> InstantiateResult<Instance> {
        let name = call.target_name();
        let mut args = call
            .args()
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.value(value)?)))
            .collect::<InstantiateResult<IndexMap<_, _>>>()?;
        args.extend(overrides);

        let constructor = match call.target().handle() {
            Some(handle) => handle.constructor(),
            None => self.registry.resolve(name)?,
        };
        trace!(callee = name, args = args.len(), "instantiating");
        constructor(Kwargs::new(name, args)).map_err(|source| InstantiateError::ArgumentBinding {
            target: name.to_string(),
            source,
        })
    }
}

/// Instantiate `node` with the constructors in `registry`
///
/// # Errors
///
/// See [`Instantiator::instantiate`].
pub fn instantiate<'a>(registry: &Registry, node: impl Into<Node<'a>>, overrides: Overrides) -> InstantiateResult<Instance> {
    Instantiator::new(registry).instantiate(node, overrides)
}
