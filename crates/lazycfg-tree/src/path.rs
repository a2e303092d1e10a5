//! Dotted paths for addressing within config trees
//!
//! Provides [`ConfigPath`] for hierarchical addressing of values inside a
//! [`ConfigTree`](crate::ConfigTree).

use std::fmt;
use std::str::FromStr;

use crate::value::ValueKind;

/// Parsed dotted path, e.g. `model.cfg.depth` or `dataloader.test.0.dataset`
///
/// A segment names a mapping key or call argument; on a list it must be a
/// decimal index. Segments never contain whitespace, `=`, `[` or `]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ConfigPath(Vec<String>);

impl ConfigPath {
    /// Path segments, in order
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no segments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Final segment
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The first `len` segments; the whole path when `len` exceeds it
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0.iter().take(len).cloned().collect())
    }

    /// Path extended by one segment
    #[must_use]
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for ConfigPath {
    type Err = PathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for segment in text.split('.') {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(text.to_string()));
            }
            let forbidden = |c: char| c.is_whitespace() || matches!(c, '=' | '[' | ']');
            if segment.contains(forbidden) {
                return Err(PathError::InvalidSegment(segment.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }
}

impl<S: Into<String>> FromIterator<S> for ConfigPath {
    fn from_iter<I: IntoIterator<Item = S>>(segments: I) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}

/// Errors related to config paths
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    /// Empty path string
    #[error("path is empty")]
    Empty,

    /// Empty segment in path
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Invalid segment characters
    #[error("invalid path segment: '{0}'")]
    InvalidSegment(String),

    /// A segment does not exist in its parent container
    #[error("path '{path}' not found: no key '{segment}'")]
    Missing { path: String, segment: String },

    /// The parent of a segment is a scalar and cannot be walked into
    #[error("path '{path}' not found: cannot look up '{segment}' inside a {kind}")]
    NotAContainer {
        path: String,
        segment: String,
        kind: ValueKind,
    },

    /// List index outside the list
    #[error("path '{path}' not found: index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
}

impl PathError {
    /// Segment that could not be resolved, if the error is a lookup failure
    #[must_use]
    pub fn missing_segment(&self) -> Option<String> {
        match self {
            Self::Missing { segment, .. } | Self::NotAContainer { segment, .. } => {
                Some(segment.clone())
            }
            Self::IndexOutOfRange { index, .. } => Some(index.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numeric_segments_stay_text() {
        let path: ConfigPath = "dataloader.test.0.dataset".parse().unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.segments()[2], "0");
        assert_eq!(path.last(), Some("dataset"));
        assert_eq!(path.prefix(2).to_string(), "dataloader.test");
        assert_eq!(path.prefix(9), path);
    }

    #[test]
    fn join_and_collect() {
        let base: ConfigPath = ["optim"].into_iter().collect();
        let path = base.join("params").join("lr");
        assert_eq!(path.to_string(), "optim.params.lr");
        assert!(ConfigPath::default().is_empty());
    }

    #[test]
    fn path_from_str_errors() {
        assert_eq!("".parse::<ConfigPath>(), Err(PathError::Empty));
        assert!(matches!("a..b".parse::<ConfigPath>(), Err(PathError::EmptySegment(_))));
        assert!(matches!("a.b c".parse::<ConfigPath>(), Err(PathError::InvalidSegment(_))));
        assert!(matches!("a[0]".parse::<ConfigPath>(), Err(PathError::InvalidSegment(_))));
    }

    #[test]
    fn missing_segment_reported() {
        let err = PathError::Missing {
            path: "a.b".into(),
            segment: "b".into(),
        };
        assert_eq!(err.missing_segment().as_deref(), Some("b"));
        assert!(err.to_string().contains("no key 'b'"));
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(segments in proptest::collection::vec("[a-z_][a-z0-9_]{0,8}", 1..6)) {
            let path: ConfigPath = segments.iter().cloned().collect();
            let parsed: ConfigPath = path.to_string().parse().unwrap();
            prop_assert_eq!(parsed.segments(), segments.as_slice());
        }
    }
}
