//! Error types for loading config sources
//!
//! Every failure that happens while reading a file carries the file path;
//! syntax and evaluation failures also carry the line and column of the
//! offending construct.

use std::fmt;
use std::path::{Path, PathBuf};

/// 1-based source position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// 1-based line
    pub line: u32,
    /// 1-based column, counted in characters
    pub column: u32,
}

impl Span {
    /// Position at `line`, `column`
    #[inline]
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised while loading a config source
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The requested file (or an imported module) does not exist
    #[error("config source not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    /// The file is not a config source
    #[error("unsupported config source {}: expected a .{expected} file", .path.display())]
    UnsupportedExtension { path: PathBuf, expected: String },

    /// A file imports itself, directly or through other files
    #[error("circular import: {}", format_chain(.chain))]
    CircularImport { chain: Vec<PathBuf> },

    /// Import nesting exceeded the configured limit
    #[error("import depth {depth} exceeded while loading {}", .path.display())]
    ImportDepth { path: PathBuf, depth: usize },

    /// The source does not parse
    #[error("syntax error in {}:{span}: {message}", .path.display())]
    Syntax {
        path: PathBuf,
        span: Span,
        message: String,
    },

    /// A statement failed while being evaluated
    #[error("error evaluating {}:{}:{}: {message}", .path.display(), .line, .column)]
    Evaluation {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },

    /// Reading the file failed
    #[error("io error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Create a syntax error at `span`
    pub fn syntax(path: impl Into<PathBuf>, span: Span, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            span,
            message: message.into(),
        }
    }

    /// Create an evaluation error at `span`
    pub fn evaluation(path: impl Into<PathBuf>, span: Span, message: impl Into<String>) -> Self {
        Self::Evaluation {
            path: path.into(),
            line: span.line,
            column: span.column,
            message: message.into(),
        }
    }

    /// Create an IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// File the error was raised in, when known
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceNotFound { path }
            | Self::UnsupportedExtension { path, .. }
            | Self::ImportDepth { path, .. }
            | Self::Syntax { path, .. }
            | Self::Evaluation { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::CircularImport { chain } => chain.last().map(PathBuf::as_path),
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type alias for loading operations
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_error_display() {
        let err = LoadError::evaluation("cfg/root.py", Span::new(3, 7), "name 'x' is not defined");
        assert_eq!(
            err.to_string(),
            "error evaluating cfg/root.py:3:7: name 'x' is not defined"
        );
    }

    #[test]
    fn circular_import_shows_chain() {
        let err = LoadError::CircularImport {
            chain: vec!["a.py".into(), "b.py".into(), "a.py".into()],
        };
        assert_eq!(err.to_string(), "circular import: a.py -> b.py -> a.py");
        assert_eq!(err.path(), Some(Path::new("a.py")));
    }

    #[test]
    fn syntax_error_display() {
        let err = LoadError::syntax("x.py", Span::new(1, 5), "unexpected ')'");
        assert_eq!(err.to_string(), "syntax error in x.py:1:5: unexpected ')'");
    }
}
