//! Addressing of nodes inside a configuration tree.
//!
//! A [`ConfigPath`] is a sequence of segments resolved from the root. The
//! meaning of a segment depends on the node it is resolved against: inside a
//! block it names a child (`"system interface"`, `"status"`), inside a table
//! it names an entry key (`"port1"`, `"3"`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A path from the root of a [`ConfigTree`](super::ConfigTree) to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigPath {
    segments: Vec<String>,
}

impl ConfigPath {
    /// The empty path, addressing the root block.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns `other` resolved relative to `self`.
    pub fn concat(&self, other: &ConfigPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// `self` with the leading `prefix` removed, if `prefix` is an ancestor.
    pub fn strip_prefix(&self, prefix: &ConfigPath) -> Option<ConfigPath> {
        self.segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| ConfigPath {
                segments: rest.to_vec(),
            })
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Removes and returns the last segment.
    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// The parent path and the last segment, or `None` for the root.
    pub fn split_last(&self) -> Option<(ConfigPath, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            ConfigPath {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path's segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &ConfigPath) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, " > ")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for ConfigPath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl From<&[&str]> for ConfigPath {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for ConfigPath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}
