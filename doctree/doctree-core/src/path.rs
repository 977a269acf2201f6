//! Slash-separated paths alternating collection and document segments.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a path names a collection or a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Collection,
    Document,
}

/// Location of a node, e.g. `users/alice/notes/n1`.
///
/// An odd number of segments names a collection, an even number a document.
/// The empty path is the database root, which holds the top-level
/// collections the same way a document holds its sub-collections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(Error::validation(format!("empty segment in path '{raw}'")));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Path of a top-level collection.
    pub fn collection(name: &str) -> Result<Self> {
        Self::root().join(name)
    }

    /// Appends a single segment, rejecting empty names and embedded slashes.
    pub fn join(&self, segment: &str) -> Result<Self> {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(Error::validation("name must not be empty"));
        }
        if segment.contains('/') {
            return Err(Error::validation(format!(
                "name '{segment}' must not contain '/'"
            )));
        }
        Ok(self.child(segment))
    }

    /// Appends a segment taken from the store; no validation.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment; empty for the root.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn kind(&self) -> NodeKind {
        if self.segments.len() % 2 == 1 {
            NodeKind::Collection
        } else {
            NodeKind::Document
        }
    }

    pub fn is_collection(&self) -> bool {
        self.kind() == NodeKind::Collection
    }

    pub fn is_document(&self) -> bool {
        self.kind() == NodeKind::Document
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of collection segments on the path.
    pub fn collection_depth(&self) -> usize {
        (self.segments.len() + 1) / 2
    }

    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl TryFrom<String> for NodePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_decides_kind() {
        let coll = NodePath::parse("C1").unwrap();
        assert_eq!(coll.kind(), NodeKind::Collection);
        let doc = NodePath::parse("/C1/D1/").unwrap();
        assert_eq!(doc.kind(), NodeKind::Document);
        assert_eq!(doc.to_string(), "C1/D1");
        let nested = NodePath::parse("C1/D1/C2").unwrap();
        assert!(nested.is_collection());
        assert_eq!(nested.collection_depth(), 2);
        assert!(NodePath::root().is_document());
        assert!(NodePath::root().is_root());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(NodePath::parse("a//b").unwrap_err().is_validation());
        assert!(NodePath::parse("").unwrap().is_root());
        assert!(NodePath::root().join("").is_err());
        assert!(NodePath::root().join("a/b").is_err());
    }

    #[test]
    fn navigation() {
        let path = NodePath::parse("users/alice/notes").unwrap();
        assert_eq!(path.id(), "notes");
        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "users/alice");
        assert!(path.starts_with(&parent));
        assert!(!parent.starts_with(&path));
        assert_eq!(path.child("n1").to_string(), "users/alice/notes/n1");
        assert_eq!(NodePath::root().parent(), None);
        assert_eq!(NodePath::root().id(), "");
    }

    #[test]
    fn serializes_as_string() {
        let path = NodePath::parse("a/b").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"a/b\"");
        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
