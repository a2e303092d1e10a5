//! Engine configuration

use std::path::{Path, PathBuf};

use lazycfg_source::{EmitOptions, LoaderOptions};

/// Default suffix appended to a saved file's path to name its sidecar
pub const DEFAULT_SIDECAR_SUFFIX: &str = ".sidecar";

/// Tunables for loading, saving and re-emitting configs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Appended to the saved file's path to name the sidecar archive
    pub sidecar_suffix: String,
    /// Maximum line width of re-emitted source
    pub line_width: usize,
    /// Indentation step of re-emitted source
    pub indent: usize,
    /// Extension of config source files
    pub source_extension: String,
    /// Maximum nesting of imports
    pub max_import_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let emit = EmitOptions::default();
        let loader = LoaderOptions::default();
        Self {
            sidecar_suffix: DEFAULT_SIDECAR_SUFFIX.to_string(),
            line_width: emit.line_width,
            indent: emit.indent,
            source_extension: loader.source_extension,
            max_import_depth: loader.max_import_depth,
        }
    }
}

impl EngineOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suffix appended to a saved file name to name its sidecar
    #[must_use]
    pub fn with_sidecar_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.sidecar_suffix = suffix.into();
        self
    }

    /// Line width of emitted source
    #[must_use]
    pub const fn with_line_width(mut self, width: usize) -> Self {
        self.line_width = width;
        self
    }

    /// Indent step of emitted source
    #[must_use]
    pub const fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Extension of config source files
    #[must_use]
    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Deepest allowed chain of relative imports
    #[must_use]
    pub const fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }

    /// Loader settings derived from these options
    #[must_use]
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions::default()
            .with_source_extension(self.source_extension.clone())
            .with_max_import_depth(self.max_import_depth)
    }

    /// Re-emitter settings derived from these options
    #[must_use]
    pub const fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            line_width: self.line_width,
            indent: self.indent,
        }
    }

    /// Sidecar archive path for a saved file at `dest`
    #[must_use]
    pub fn sidecar_path(&self, dest: &Path) -> PathBuf {
        let mut name = dest.as_os_str().to_os_string();
        name.push(&self.sidecar_suffix);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.sidecar_suffix, ".sidecar");
        assert_eq!(options.line_width, 88);
        assert_eq!(options.indent, 4);
        assert_eq!(options.source_extension, "py");
        assert_eq!(options.max_import_depth, 64);
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        let options = EngineOptions::new().with_sidecar_suffix(".pkl.tar");
        assert_eq!(
            options.sidecar_path(Path::new("out/config.yaml")),
            PathBuf::from("out/config.yaml.pkl.tar")
        );
    }

    #[test]
    fn derived_options() {
        let options = EngineOptions::new().with_line_width(100).with_max_import_depth(3);
        assert_eq!(options.emit_options().line_width, 100);
        assert_eq!(options.loader_options().max_import_depth, 3);
    }
}
