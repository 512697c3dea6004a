//! Prefix-matching route store with wildcard segments.
//!
//! One node per path segment, one value per terminal. Lookup walks exact
//! children first and falls back to the `*` wildcard child only when no
//! exact child matches, giving O(depth) lookup with unambiguous
//! exact-over-wildcard precedence.

use std::collections::HashMap;

use thiserror::Error;

/// Path segment that matches any single segment during lookup.
pub const WILDCARD_SEGMENT: &str = "*";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrieError {
    #[error("path {path} already registered")]
    Duplicate { path: String },

    #[error("no value registered for path {path}")]
    NotFound { path: String },
}

/// A trie keyed by path segments with a value of type `T` per terminal node.
#[derive(Debug)]
pub struct PathTrie<T> {
    children: HashMap<String, PathTrie<T>>,
    value: Option<T>,
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self {
        Self { children: HashMap::new(), value: None }
    }
}

impl<T> PathTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value at the exact segment path, creating intermediate nodes
    /// as needed. Fails if the path already holds a value.
    pub fn insert(&mut self, segments: &[&str], value: T) -> Result<(), TrieError> {
        let mut node = self;
        for segment in segments {
            node = node.children.entry((*segment).to_string()).or_default();
        }

        if node.value.is_some() {
            return Err(TrieError::Duplicate { path: segments.join("/") });
        }
        node.value = Some(value);
        Ok(())
    }

    /// Looks up the value for a segment path, preferring exact children and
    /// falling back to the wildcard segment. Fails when the walk runs out of
    /// children or ends on a non-terminal node.
    pub fn search(&self, segments: &[&str]) -> Result<&T, TrieError> {
        let mut node = self;
        for segment in segments {
            node = match node.children.get(*segment) {
                Some(child) => child,
                None => node
                    .children
                    .get(WILDCARD_SEGMENT)
                    .ok_or_else(|| TrieError::NotFound { path: segments.join("/") })?,
            };
        }

        node.value.as_ref().ok_or_else(|| TrieError::NotFound { path: segments.join("/") })
    }

    /// Mutable access to the value at the exact segment path, wildcard
    /// fallback excluded. Used to extend an existing registration.
    pub fn value_mut(&mut self, segments: &[&str]) -> Option<&mut T> {
        let mut node = self;
        for segment in segments {
            node = node.children.get_mut(*segment)?;
        }
        node.value.as_mut()
    }
}
