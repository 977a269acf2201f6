//! In-process store with the same visibility rules as the hosted database.

use super::{Document, DocumentStore, Fields};
use crate::error::{Error, Result};
use crate::path::NodePath;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// Documents keyed by full path.
///
/// Only documents are stored; collections exist while some document lives
/// under them. Removing a document does not touch its sub-collections.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<NodePath, Fields>>,
    users: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the identity list returned by `list_user_identities`.
    pub fn with_users<I, S>(self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.users.write() = users.into_iter().map(Into::into).collect();
        self
    }

    /// Synchronous insert for fixtures.
    pub fn insert(&self, path: &str, fields: serde_json::Value) -> Result<()> {
        let path = NodePath::parse(path)?;
        if !path.is_document() || path.is_root() {
            return Err(Error::validation(format!("'{path}' is not a document path")));
        }
        let fields = match fields {
            serde_json::Value::Object(map) => map,
            other => return Err(Error::validation(format!("fields must be an object, got {other}"))),
        };
        self.docs.write().insert(path, fields);
        Ok(())
    }

    /// Number of stored documents anywhere in the tree.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// All stored paths beneath `prefix`, the prefix itself included.
    pub fn paths_under(&self, prefix: &NodePath) -> Vec<NodePath> {
        self.docs
            .read()
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Fields of every document beneath `prefix`, keyed by the path relative
    /// to it. Used to compare copied subtrees.
    pub fn snapshot_under(&self, prefix: &NodePath) -> BTreeMap<Vec<String>, Fields> {
        let docs = self.docs.read();
        docs.range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, fields)| (path.segments()[prefix.len()..].to_vec(), fields.clone()))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, path: &NodePath) -> Result<Option<Document>> {
        Ok(self
            .docs
            .read()
            .get(path)
            .map(|fields| Document::new(path.clone(), fields.clone())))
    }

    async fn set_document(&self, path: &NodePath, fields: Fields, merge: bool) -> Result<()> {
        if !path.is_document() || path.is_root() {
            return Err(Error::validation(format!("'{path}' is not a document path")));
        }
        let mut docs = self.docs.write();
        match docs.get_mut(path) {
            Some(existing) if merge => existing.extend(fields),
            _ => {
                docs.insert(path.clone(), fields);
            }
        }
        Ok(())
    }

    async fn delete_document(&self, path: &NodePath) -> Result<()> {
        self.docs.write().remove(path);
        Ok(())
    }

    async fn delete_field(&self, path: &NodePath, field: &str) -> Result<()> {
        let mut docs = self.docs.write();
        let fields = docs.get_mut(path).ok_or_else(|| Error::not_found(path))?;
        fields.remove(field);
        Ok(())
    }

    async fn list_documents(
        &self,
        collection: &NodePath,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        if !collection.is_collection() {
            return Err(Error::validation(format!(
                "'{collection}' is not a collection path"
            )));
        }
        let docs = self.docs.read();
        let depth = collection.len() + 1;
        Ok(docs
            .range(collection.clone()..)
            .take_while(|(path, _)| path.starts_with(collection))
            .filter(|(path, _)| path.len() == depth)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(path, fields)| Document::new(path.clone(), fields.clone()))
            .collect())
    }

    async fn list_subcollections(&self, document: &NodePath) -> Result<Vec<NodePath>> {
        if !document.is_document() {
            return Err(Error::validation(format!("'{document}' is not a document path")));
        }
        let docs = self.docs.read();
        let names: BTreeSet<&str> = docs
            .range(document.clone()..)
            .take_while(|(path, _)| path.starts_with(document))
            .filter(|(path, _)| path.len() > document.len() + 1)
            .map(|(path, _)| path.segments()[document.len()].as_str())
            .collect();
        Ok(names.into_iter().map(|name| document.child(name)).collect())
    }

    async fn list_user_identities(&self) -> Result<Vec<String>> {
        Ok(self.users.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> NodePath {
        NodePath::parse(raw).unwrap()
    }

    fn obj(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn set_get_and_merge() {
        let store = MemoryStore::new();
        let doc = path("C/D");
        store.set_document(&doc, obj(json!({"a": 1, "b": 2})), false).await.unwrap();
        store.set_document(&doc, obj(json!({"b": 3, "c": 4})), true).await.unwrap();
        let fetched = store.get_document(&doc).await.unwrap().unwrap();
        assert_eq!(fetched.fields, obj(json!({"a": 1, "b": 3, "c": 4})));

        store.set_document(&doc, obj(json!({"z": true})), false).await.unwrap();
        let fetched = store.get_document(&doc).await.unwrap().unwrap();
        assert_eq!(fetched.fields, obj(json!({"z": true})));
        assert_eq!(fetched.id(), "D");
    }

    #[tokio::test]
    async fn delete_leaves_subcollections() {
        let store = MemoryStore::new();
        store.insert("C/D", json!({"n": 1})).unwrap();
        store.insert("C/D/S/E", json!({"y": 7})).unwrap();
        store.delete_document(&path("C/D")).await.unwrap();

        assert!(store.get_document(&path("C/D")).await.unwrap().is_none());
        assert!(store.get_document(&path("C/D/S/E")).await.unwrap().is_some());
        // the parent no longer lists, but its orphaned sub-collection does
        assert!(store.list_documents(&path("C"), None).await.unwrap().is_empty());
        let subs = store.list_subcollections(&path("C/D")).await.unwrap();
        assert_eq!(subs, vec![path("C/D/S")]);
        // deleting again is a no-op
        store.delete_document(&path("C/D")).await.unwrap();
    }

    #[tokio::test]
    async fn listings_are_ordered_and_limited() {
        let store = MemoryStore::new();
        for id in ["b", "a", "c"] {
            store.insert(&format!("C/{id}"), json!({})).unwrap();
        }
        store.insert("C/a/S/x", json!({})).unwrap();
        store.insert("Other/z", json!({})).unwrap();

        let ids: Vec<String> = store
            .list_documents(&path("C"), Some(2))
            .await
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let roots = store.list_subcollections(&NodePath::root()).await.unwrap();
        assert_eq!(roots, vec![path("C"), path("Other")]);
    }

    #[tokio::test]
    async fn delete_field_requires_document() {
        let store = MemoryStore::new();
        let err = store.delete_field(&path("C/missing"), "x").await.unwrap_err();
        assert!(err.is_not_found());

        store.insert("C/D", json!({"x": 1, "y": 2})).unwrap();
        store.delete_field(&path("C/D"), "x").await.unwrap();
        let doc = store.get_document(&path("C/D")).await.unwrap().unwrap();
        assert_eq!(doc.fields, obj(json!({"y": 2})));
    }

    #[tokio::test]
    async fn rejects_wrong_path_kinds() {
        let store = MemoryStore::new();
        assert!(store.set_document(&path("C"), Fields::new(), false).await.is_err());
        assert!(store.list_documents(&path("C/D"), None).await.is_err());
        assert!(store.list_subcollections(&path("C")).await.is_err());
    }
}
