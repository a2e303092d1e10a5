//! The config tree root
//!
//! [`ConfigTree`] is an ordered mapping with dotted-path addressing. Paths
//! walk through mappings, call-node arguments and list indices; nothing is
//! created implicitly except a new final key in an existing mapping or call.

use std::borrow::Cow;

use crate::call::TARGET_KEY;
use crate::path::{ConfigPath, PathError};
use crate::value::{ConfigMap, Value, ValueKind};

/// Ordered root mapping of a configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigTree {
    root: ConfigMap,
}

impl ConfigTree {
    /// Create an empty tree
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing mapping
    #[inline]
    #[must_use]
    pub fn from_map(root: ConfigMap) -> Self {
        Self { root }
    }

    /// Top-level mapping
    #[inline]
    #[must_use]
    pub const fn root(&self) -> &ConfigMap {
        &self.root
    }

    /// Mutable top-level mapping
    #[inline]
    pub fn root_mut(&mut self) -> &mut ConfigMap {
        &mut self.root
    }

    /// Unwrap into the top-level mapping
    #[inline]
    #[must_use]
    pub fn into_map(self) -> ConfigMap {
        self.root
    }

    /// Number of top-level keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Whether the tree has no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Top-level keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    /// Top-level entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.root.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert or replace a top-level entry
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.root.insert(key.into(), value.into())
    }

    /// Remove a top-level entry, preserving the order of the others
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.root.shift_remove(key)
    }

    /// Value at a dotted path, `None` when absent or malformed
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let path: ConfigPath = path.parse().ok()?;
        self.get_path(&path).ok()
    }

    /// Mutable value at a dotted path
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        let path: ConfigPath = path.parse().ok()?;
        self.get_path_mut(&path).ok()
    }

    /// Whether a dotted path resolves
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Resolve a path, reporting the first segment that fails
    ///
    /// # Errors
    /// [`PathError::Missing`], [`PathError::NotAContainer`] or
    /// [`PathError::IndexOutOfRange`] naming the failing segment
    pub fn get_path(&self, path: &ConfigPath) -> Result<&Value, PathError> {
        let (first, rest) = split_first(path)?;
        let mut current = self.root.get(first).ok_or_else(|| PathError::Missing {
            path: path.to_string(),
            segment: first.to_string(),
        })?;
        for segment in rest {
            current = match current.child(segment) {
                Some(next) => next,
                None => return Err(lookup_error(path, current, segment)),
            };
        }
        Ok(current)
    }

    /// Read a path, including the `_target_` pseudo-argument of call nodes
    ///
    /// `model._target_` yields the target name of the call at `model` as a
    /// string; every other path reads like [`ConfigTree::get_path`].
    ///
    /// # Errors
    /// Same as [`ConfigTree::get_path`]
    pub fn read_path(&self, path: &ConfigPath) -> Result<Cow<'_, Value>, PathError> {
        if path.last() == Some(TARGET_KEY) && path.len() > 1 {
            if let Value::Call(call) = self.get_path(&path.prefix(path.len() - 1))? {
                return Ok(Cow::Owned(Value::Str(call.target_name().to_string())));
            }
        }
        self.get_path(path).map(Cow::Borrowed)
    }

    /// Mutable variant of [`ConfigTree::get_path`]
    ///
    /// # Errors
    /// Same as [`ConfigTree::get_path`]
    pub fn get_path_mut(&mut self, path: &ConfigPath) -> Result<&mut Value, PathError> {
        // Resolve immutably first so the error can inspect the failing parent
        self.get_path(path)?;
        let (first, rest) = split_first(path)?;
        let mut current = self.root.get_mut(first).ok_or_else(|| PathError::Missing {
            path: path.to_string(),
            segment: first.to_string(),
        })?;
        for segment in rest {
            current = current.child_mut(segment).ok_or_else(|| PathError::Missing {
                path: path.to_string(),
                segment: segment.clone(),
            })?;
        }
        Ok(current)
    }

    /// Assign at a dotted path
    ///
    /// The parent must exist. A new final key may be created in a mapping or
    /// call node; list indices must already exist.
    ///
    /// # Errors
    /// Any lookup error for the parent, or for the final segment of a list or
    /// scalar parent
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<Option<Value>, PathError> {
        let path: ConfigPath = path.parse()?;
        self.set_path(&path, value.into())
    }

    /// Assign at a parsed path, returning the replaced value
    ///
    /// # Errors
    /// See [`ConfigTree::set`]
    pub fn set_path(&mut self, path: &ConfigPath, value: Value) -> Result<Option<Value>, PathError> {
        let Some(last) = path.last() else {
            return Err(PathError::Empty);
        };
        let parent_path = path.prefix(path.len() - 1);
        if parent_path.is_empty() {
            return Ok(self.root.insert(last.to_string(), value));
        }

        let parent = self.get_path_mut(&parent_path)?;
        match parent {
            Value::Map(map) => Ok(map.insert(last.to_string(), value)),
            Value::Call(call) => Ok(call.set_arg(last, value)),
            Value::List(items) => {
                let len = items.len();
                match last.parse::<usize>() {
                    Ok(index) if index < len => Ok(Some(std::mem::replace(&mut items[index], value))),
                    Ok(index) => Err(PathError::IndexOutOfRange {
                        path: path.to_string(),
                        index,
                        len,
                    }),
                    Err(_) => Err(PathError::NotAContainer {
                        path: path.to_string(),
                        segment: last.to_string(),
                        kind: ValueKind::List,
                    }),
                }
            }
            other => Err(PathError::NotAContainer {
                path: path.to_string(),
                segment: last.to_string(),
                kind: other.kind(),
            }),
        }
    }

    /// Number of call nodes anywhere in the tree
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.root.values().map(Value::call_count).sum()
    }
}

impl From<ConfigMap> for ConfigTree {
    fn from(root: ConfigMap) -> Self {
        Self::from_map(root)
    }
}

impl From<ConfigTree> for Value {
    fn from(tree: ConfigTree) -> Self {
        Self::Map(tree.root)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn split_first(path: &ConfigPath) -> Result<(&str, &[String]), PathError> {
    path.segments()
        .split_first()
        .map(|(first, rest)| (first.as_str(), rest))
        .ok_or(PathError::Empty)
}

fn lookup_error(path: &ConfigPath, parent: &Value, segment: &str) -> PathError {
    match parent {
        Value::Map(_) | Value::Call(_) => PathError::Missing {
            path: path.to_string(),
            segment: segment.to_string(),
        },
        Value::List(items) => match segment.parse::<usize>() {
            Ok(index) => PathError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len: items.len(),
            },
            Err(_) => PathError::NotAContainer {
                path: path.to_string(),
                segment: segment.to_string(),
                kind: parent.kind(),
            },
        },
        other => PathError::NotAContainer {
            path: path.to_string(),
            segment: segment.to_string(),
            kind: other.kind(),
        },
    }
}
