//! Module namespaces
//!
//! A [`Namespace`] holds every top-level binding a config file creates while
//! it is evaluated. Only data bindings can end up in a config tree; symbols,
//! helpers and builtins exist for the duration of evaluation.

use std::collections::HashSet;

use indexmap::IndexMap;
use lazycfg_tree::{ConfigMap, Target, Value};

use crate::builtins::Builtin;

/// Helper entry points available in every config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Helper {
    /// `LazyCall(target)` / `L(target)`
    LazyCall,
    /// The `LazyConfig` namespace itself
    LazyConfig,
    /// `LazyConfig.load(path, keys=None)`
    Load,
    /// `LazyConfig.load_rel(path, keys=None)`
    LoadRel,
}

impl Helper {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::LazyCall => "LazyCall",
            Self::LazyConfig => "LazyConfig",
            Self::Load => "LazyConfig.load",
            Self::LoadRel => "LazyConfig.load_rel",
        }
    }
}

/// What a name is bound to during evaluation
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Binding {
    /// Config data; the only kind that survives into a tree
    Data(Value),
    /// Qualified name of something outside the config (`itertools.count`)
    Symbol(String),
    Helper(Helper),
    Builtin(Builtin),
    /// `LazyCall(target)` waiting for its keyword arguments
    Deferred(Target),
    /// The `cfg` handle on the module namespace
    Root,
}

impl Binding {
    /// Short description used in error messages
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Data(value) => format!("value of type '{}'", value.kind()),
            Self::Symbol(name) => format!("symbol '{name}'"),
            Self::Helper(helper) => format!("helper '{}'", helper.name()),
            Self::Builtin(builtin) => format!("builtin '{}'", builtin.name()),
            Self::Deferred(target) => format!("LazyCall({target}) without arguments"),
            Self::Root => "'cfg'".to_string(),
        }
    }
}

/// Names resolvable in every file without being bound
pub(crate) fn prelude(name: &str) -> Option<Binding> {
    let binding = match name {
        "cfg" => Binding::Root,
        "LazyCall" | "L" => Binding::Helper(Helper::LazyCall),
        "LazyConfig" => Binding::Helper(Helper::LazyConfig),
        "os" => Binding::Symbol("os".to_string()),
        other => Binding::Builtin(Builtin::from_name(other)?),
    };
    Some(binding)
}

/// Bindings of one evaluated file, in definition order
#[derive(Debug, Clone, Default)]
pub(crate) struct Namespace {
    bindings: IndexMap<String, Binding>,
    exported: HashSet<String>,
}

impl Namespace {
    pub(crate) fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub(crate) fn set(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    /// Mark a name as assigned through `cfg`; it is kept even when scalar
    pub(crate) fn export(&mut self, name: &str) {
        self.exported.insert(name.to_string());
    }

    /// The config tree this namespace contributes
    ///
    /// Keeps mappings, lists and call nodes whose names are public, plus
    /// anything assigned through `cfg`.
    pub(crate) fn filtered(&self) -> ConfigMap {
        self.bindings
            .iter()
            .filter_map(|(name, binding)| match binding {
                Binding::Data(value) if self.keeps(name, value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    fn keeps(&self, name: &str, value: &Value) -> bool {
        self.exported.contains(name)
            || (!name.starts_with('_')
                && matches!(value, Value::Map(_) | Value::List(_) | Value::Call(_)))
    }
}
