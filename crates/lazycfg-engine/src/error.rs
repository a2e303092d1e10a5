//! Error types for the engine
//!
//! Each stage has its own error enum; [`EngineError`] unifies them for the
//! facade.

use std::path::{Path, PathBuf};

use lazycfg_source::LoadError;
use lazycfg_tree::{ConstructError, PathError};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Loading a config source failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// An override could not be applied
    #[error(transparent)]
    Override(#[from] OverrideError),

    /// Saving or reading the saved form failed
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Building live objects failed
    #[error(transparent)]
    Instantiate(#[from] InstantiateError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// A failed override, with its position in the batch
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("override #{index} '{text}': {kind}")]
pub struct OverrideError {
    /// Zero-based position in the batch
    pub index: usize,
    /// The override as given
    pub text: String,
    /// Why it was rejected
    #[source]
    pub kind: OverrideErrorKind,
}

/// Why an override failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverrideErrorKind {
    /// Not of the form `KEY=VALUE`
    #[error("expected KEY=VALUE")]
    MalformedOverride,

    /// The key is not a valid dotted path
    #[error("invalid key: {0}")]
    InvalidPath(#[source] PathError),

    /// The key does not resolve in the tree
    #[error("key '{path}' not found: no '{segment}'")]
    PathNotFound { path: String, segment: String },

    /// The value cannot be converted to the type of the slot it replaces
    #[error("cannot set '{path}' to '{given}': expected {expected}")]
    TypeCoercion {
        path: String,
        expected: String,
        given: String,
    },
}

/// Errors raised while saving or reading the saved form
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml error in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The sidecar archive is unreadable or inconsistent
    #[error("sidecar {}: {message}", .path.display())]
    Sidecar { path: PathBuf, message: String },

    /// A user mapping uses a key reserved by the saved form
    #[error("'{path}' uses reserved key '{key}'")]
    ReservedKey { path: String, key: String },

    /// An opaque reference has no object in the sidecar
    #[error("'{path}' references object {hash} missing from {}", .sidecar.display())]
    MissingSidecarEntry {
        path: String,
        hash: String,
        sidecar: PathBuf,
    },

    /// A reserved-key mapping is malformed
    #[error("invalid reference at '{path}': {message}")]
    InvalidReference { path: String, message: String },

    /// The document is not a saved config tree
    #[error("invalid saved config {}: {message}", .path.display())]
    InvalidDocument { path: PathBuf, message: String },
}

impl PersistError {
    /// Create an IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Sidecar archive problem at `path`
    pub fn sidecar(path: &Path, message: impl Into<String>) -> Self {
        Self::Sidecar {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Result type alias for persistence
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors raised while instantiating
#[derive(Debug, thiserror::Error)]
pub enum InstantiateError {
    /// No registry entry for the target name
    #[error("cannot resolve target '{name}'")]
    TargetResolution { name: String },

    /// The target is registered as a constant, not a constructor
    #[error("target '{name}' is not instantiable")]
    NotInstantiable { name: String },

    /// The constructor rejected its arguments
    #[error("error constructing '{target}': {source}")]
    ArgumentBinding {
        target: String,
        #[source]
        source: ConstructError,
    },

    /// Caller overrides were given for something that is not a call or mapping
    #[error("keyword overrides cannot be applied to a {kind}")]
    UnexpectedOverrides { kind: String },
}

/// Result type alias for instantiation
pub type InstantiateResult<T> = Result<T, InstantiateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_error_display() {
        let err = OverrideError {
            index: 1,
            text: "a.b.c=1".into(),
            kind: OverrideErrorKind::PathNotFound {
                path: "a.b.c".into(),
                segment: "c".into(),
            },
        };
        assert_eq!(err.to_string(), "override #1 'a.b.c=1': key 'a.b.c' not found: no 'c'");
    }

    #[test]
    fn engine_error_is_transparent() {
        let err = EngineError::from(InstantiateError::TargetResolution { name: "pkg.X".into() });
        assert_eq!(err.to_string(), "cannot resolve target 'pkg.X'");
    }
}
