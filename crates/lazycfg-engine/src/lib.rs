//! lazycfg Engine
//!
//! Everything that happens to a config tree after it is loaded: command-line
//! overrides, the saved YAML form with its sidecar archive, and instantiation
//! of call nodes through a [`Registry`].
//!
//! # Core Concepts
//!
//! - [`LazyConfig`]: Facade bundling [`EngineOptions`] and a [`Registry`]
//! - [`apply_overrides`]: `dotted.key=value` edits with type coercion
//! - [`Persister`]: YAML primary file plus tar sidecar for opaque leaves
//! - [`Instantiator`]: Depth-first construction of live objects
//!
//! # Example
//!
//! ```rust,no_run
//! use lazycfg_engine::LazyConfig;
//!
//! let engine = LazyConfig::default();
//! let mut tree = engine.load("configs/train.py")?;
//! LazyConfig::apply_overrides(&mut tree, &["train.lr=0.05"])?;
//! engine.save(&tree, "out/config.yaml")?;
//! println!("{}", engine.to_source(&tree));
//! # Ok::<(), lazycfg_engine::EngineError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod instantiate;
mod options;
mod overrides;
mod persist;
mod registry;

use std::path::Path;

pub use error::{
    EngineError, EngineResult, InstantiateError, InstantiateResult, OverrideError, OverrideErrorKind, PersistError,
    PersistResult,
};
pub use instantiate::{instantiate, Instantiator, Node, Overrides};
pub use options::{EngineOptions, DEFAULT_SIDECAR_SUFFIX};
pub use overrides::{apply_override, apply_overrides};
pub use persist::{
    load_saved, save, to_yaml_value, Persister, SaveReport, SerializationFallbackNotice, OPAQUE_KEY, RESERVED_KEYS,
    TYPE_KEY,
};
pub use registry::{Count, Entry, Registry};

pub use lazycfg_source::{LoadError, Loader};
pub use lazycfg_tree::{CallNode, ConfigPath, ConfigTree, Instance, Kwargs, Opaque, Value};

use lazycfg_source::to_source_with;
use tracing::debug;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extensions [`LazyConfig::load`] reads as the saved form
pub const SAVED_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Entry point for loading, editing, saving and instantiating configs
#[derive(Debug, Clone)]
pub struct LazyConfig {
    options: EngineOptions,
    registry: Registry,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl LazyConfig {
    /// Engine with the builtin targets registered
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            registry: Registry::with_builtins(),
        }
    }

    /// Replace the registry, builtins included
    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Engine settings
    #[inline]
    #[must_use]
    pub const fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Targets available to [`LazyConfig::instantiate`]
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register more targets in place
    #[inline]
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Load a config source file, or a saved `.yaml`/`.yml` file
    ///
    /// # Errors
    ///
    /// [`EngineError::Load`] for source files, [`EngineError::Persist`] for
    /// saved files.
    pub fn load(&self, path: impl AsRef<Path>) -> EngineResult<ConfigTree> {
        let path = path.as_ref();
        let saved = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SAVED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)));
        if saved {
            debug!(path = %path.display(), "loading saved form");
            return self.load_saved(path);
        }
        Ok(Loader::new(self.options.loader_options()).load(path)?)
    }

    /// Load a file written by [`LazyConfig::save`]
    ///
    /// # Errors
    ///
    /// See [`Persister::load_saved`].
    pub fn load_saved(&self, path: impl AsRef<Path>) -> EngineResult<ConfigTree> {
        Ok(self.persister().load_saved(path.as_ref())?)
    }

    /// Save `tree` as YAML, with a sidecar for opaque leaves
    ///
    /// # Errors
    ///
    /// See [`Persister::save`].
    pub fn save(&self, tree: &ConfigTree, dest: impl AsRef<Path>) -> EngineResult<SaveReport> {
        Ok(self.persister().save(tree, dest.as_ref())?)
    }

    /// Apply `key=value` overrides in order
    ///
    /// # Errors
    ///
    /// The first failing override.
    pub fn apply_overrides<'t, S: AsRef<str>>(
        tree: &'t mut ConfigTree,
        overrides: &[S],
    ) -> EngineResult<&'t mut ConfigTree> {
        Ok(apply_overrides(tree, overrides)?)
    }

    /// Re-emit `tree` as loadable source
    #[must_use]
    pub fn to_source(&self, tree: &ConfigTree) -> String {
        to_source_with(tree, &self.options.emit_options())
    }

    /// Instantiate a node with the engine's registry
    ///
    /// # Errors
    ///
    /// See [`Instantiator::instantiate`].
    pub fn instantiate<'a>(&self, node: impl Into<Node<'a>>) -> EngineResult<Instance> {
        self.instantiate_with(node, Overrides::new())
    }

    /// Instantiate a node, with caller keyword arguments overriding its own
    ///
    /// # Errors
    ///
    /// See [`Instantiator::instantiate`].
    pub fn instantiate_with<'a>(&self, node: impl Into<Node<'a>>, overrides: Overrides) -> EngineResult<Instance> {
        Ok(Instantiator::new(&self.registry).instantiate(node, overrides)?)
    }

    fn persister(&self) -> Persister {
        Persister::new(self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazycfg_test_utils::{model_tree, Fixture};

    #[test]
    fn load_dispatches_on_extension() {
        let fixture = Fixture::new();
        let engine = LazyConfig::default();
        let tree = engine.load(fixture.root()).unwrap();

        let dest = fixture.path("saved.YML");
        engine.save(&tree, &dest).unwrap();
        assert_eq!(engine.load(&dest).unwrap(), tree);

        let err = engine.load(fixture.path("missing.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Load(LoadError::UnsupportedExtension { .. })));
    }

    #[test]
    fn builtins_are_registered() {
        let engine = LazyConfig::default();
        assert!(engine.registry().contains("builtins.dict"));
        assert!(engine.registry().contains("itertools.count"));
        assert!(LazyConfig::default().with_registry(Registry::new()).registry().is_empty());
    }

    #[test]
    fn facade_override_errors_convert() {
        let mut tree = model_tree();
        let err = LazyConfig::apply_overrides(&mut tree, &["train.epochs=many"]).unwrap_err();
        assert!(matches!(err, EngineError::Override(OverrideError { index: 0, .. })));
    }

    #[test]
    fn emit_options_are_honoured() {
        let mut tree = ConfigTree::new();
        tree.insert("layer", CallNode::new("nn.Linear").with_arg("inputs", 1024).with_arg("outputs", 2048));
        let narrow = LazyConfig::new(EngineOptions::new().with_line_width(30).with_indent(2));
        assert_eq!(
            narrow.to_source(&tree),
            "cfg.layer = nn.Linear(\n  inputs=1024, outputs=2048\n)\n"
        );
    }
}
