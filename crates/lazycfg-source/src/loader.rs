//! File loader
//!
//! A [`Loader`] turns a config source file into a [`ConfigTree`]. Each call
//! to [`Loader::load`] opens a fresh session: imported files are evaluated at
//! most once per session and every importer receives its own copy of the
//! imported namespace, so mutating an imported value never leaks back into
//! the file it came from or into other importers.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use lazycfg_tree::{ConfigTree, Value};
use tracing::{debug, instrument};

use crate::error::{LoadError, LoadResult, Span};
use crate::eval::Evaluator;
use crate::namespace::{Binding, Namespace};
use crate::parser;

/// Default extension of config source files
pub const DEFAULT_SOURCE_EXTENSION: &str = "py";

/// Default limit on nested imports
pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 64;

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Extension (without the dot) a config source must carry
    pub source_extension: String,
    /// Maximum nesting of imports before loading fails
    pub max_import_depth: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
        }
    }
}

impl LoaderOptions {
    /// Set the required source extension
    #[must_use]
    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Set the import depth limit
    #[must_use]
    pub const fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }
}

/// Loads config source files into trees
#[derive(Debug, Clone, Default)]
pub struct Loader {
    options: LoaderOptions,
}

impl Loader {
    /// Create a loader with the given options
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Loader settings
    #[inline]
    #[must_use]
    pub const fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Load a file and return the config tree it defines
    ///
    /// The tree holds the file's public mappings, lists and call nodes plus
    /// every key assigned through `cfg`.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing, does not parse, fails to evaluate or
    /// takes part in an import cycle.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn load(&self, path: impl AsRef<Path>) -> LoadResult<ConfigTree> {
        let mut session = Session::new(self.options.clone());
        let ns = session.namespace(path.as_ref())?;
        let tree = ConfigTree::from_map(ns.filtered());
        debug!(keys = tree.len(), calls = tree.call_count(), "loaded config");
        Ok(tree)
    }

    /// Load a file and select top-level names from its full namespace
    ///
    /// Unlike [`Loader::load`], scalar and private bindings can be selected.
    ///
    /// # Errors
    ///
    /// Fails like [`Loader::load`], or when a key is not bound to config data.
    pub fn load_keys(&self, path: impl AsRef<Path>, keys: &[&str]) -> LoadResult<Vec<Value>> {
        let path = path.as_ref();
        let mut session = Session::new(self.options.clone());
        let ns = session.namespace(path)?;
        keys.iter()
            .map(|key| match ns.get(key) {
                Some(Binding::Data(value)) => Ok(value.clone()),
                Some(other) => Err(LoadError::evaluation(
                    path,
                    Span::new(1, 1),
                    format!("'{key}' is bound to {}, not config data", other.describe()),
                )),
                None => Err(LoadError::evaluation(
                    path,
                    Span::new(1, 1),
                    format!("'{key}' is not defined in {}", path.display()),
                )),
            })
            .collect()
    }

    /// Evaluate source text as if it were the file at `origin`
    ///
    /// Relative imports resolve against the directory of `origin`, which
    /// does not need to exist itself.
    ///
    /// # Errors
    ///
    /// Fails when the text does not parse or fails to evaluate.
    pub fn load_source(&self, source: &str, origin: impl AsRef<Path>) -> LoadResult<ConfigTree> {
        let mut session = Session::new(self.options.clone());
        let ns = session.evaluate(origin.as_ref(), source)?;
        Ok(ConfigTree::from_map(ns.filtered()))
    }
}

/// Load a file with default options
///
/// # Errors
///
/// See [`Loader::load`].
pub fn load(path: impl AsRef<Path>) -> LoadResult<ConfigTree> {
    Loader::default().load(path)
}

/// What a relative import names on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ModuleTarget {
    File(PathBuf),
    Package { dir: PathBuf, init: Option<PathBuf> },
}

/// State shared by all files evaluated during one load
pub(crate) struct Session {
    options: LoaderOptions,
    cache: HashMap<PathBuf, Namespace>,
    stack: Vec<PathBuf>,
}

impl Session {
    pub(crate) fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            cache: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Namespace of the file at `path`, evaluated on first use
    ///
    /// The caller owns the returned copy.
    pub(crate) fn namespace(&mut self, path: &Path) -> LoadResult<Namespace> {
        if path.extension().and_then(|e| e.to_str()) != Some(self.options.source_extension.as_str()) {
            return Err(LoadError::UnsupportedExtension {
                path: path.to_path_buf(),
                expected: self.options.source_extension.clone(),
            });
        }

        let path = fs::canonicalize(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::SourceNotFound {
                path: path.to_path_buf(),
            },
            _ => LoadError::io_error(path, e),
        })?;

        if let Some(pos) = self.stack.iter().position(|p| *p == path) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(path);
            return Err(LoadError::CircularImport { chain });
        }
        if self.stack.len() >= self.options.max_import_depth {
            return Err(LoadError::ImportDepth {
                path,
                depth: self.options.max_import_depth,
            });
        }

        if let Some(ns) = self.cache.get(&path) {
            debug!(path = %path.display(), "import served from session cache");
            return Ok(ns.clone());
        }

        let source = fs::read_to_string(&path).map_err(|e| LoadError::io_error(&path, e))?;
        let ns = self.evaluate(&path, &source)?;
        self.cache.insert(path, ns.clone());
        Ok(ns)
    }

    /// Parse and evaluate `source` as the file at `path`
    pub(crate) fn evaluate(&mut self, path: &Path, source: &str) -> LoadResult<Namespace> {
        let module = parser::parse_module(source)
            .map_err(|e| LoadError::syntax(path, e.span, e.message))?;

        debug!(path = %path.display(), statements = module.body.len(), "evaluating config source");
        self.stack.push(path.to_path_buf());
        let result = Evaluator::new(self, path.to_path_buf()).run(&module);
        self.stack.pop();
        result
    }

    /// Locate the module named by a relative import
    ///
    /// `level` counts leading dots: one dot is the importing file's
    /// directory, each further dot climbs one directory.
    pub(crate) fn resolve_module(&self, dir: &Path, level: usize, parts: &[String]) -> Result<ModuleTarget, String> {
        let mut base = dir.to_path_buf();
        for _ in 1..level {
            if !base.pop() {
                return Err(format!("relative import climbs above '{}'", dir.display()));
            }
        }
        let Some((last, parents)) = parts.split_last() else {
            return Ok(package(base, &self.options.source_extension));
        };
        for part in parents {
            base.push(part);
        }

        let file = base.join(format!("{last}.{}", self.options.source_extension));
        if file.is_file() {
            return Ok(ModuleTarget::File(file));
        }
        let dir_path = base.join(last);
        if dir_path.is_dir() {
            return Ok(package(dir_path, &self.options.source_extension));
        }
        Err(format!("no module named '{}' in '{}'", parts.join("."), base.display()))
    }

    /// Files evaluated so far in this session
    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.cache.len()
    }
}

fn package(dir: PathBuf, extension: &str) -> ModuleTarget {
    let init = dir.join(format!("__init__.{extension}"));
    let init = init.is_file().then_some(init);
    ModuleTarget::Package { dir, init }
}
