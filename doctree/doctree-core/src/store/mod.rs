//! Capability interface over the external document database.

pub mod memory;
pub mod rest;
mod wire;

use crate::error::Result;
use crate::path::NodePath;
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Field name to value mapping of a single document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

const AUTO_ID_LEN: usize = 20;

/// A fetched document: its location and its fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Document {
    pub path: NodePath,
    pub fields: Fields,
}

impl Document {
    pub fn new(path: NodePath, fields: Fields) -> Self {
        Self { path, fields }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }
}

/// Operations the browser and the tree engine need from the database.
///
/// Every call goes to the backing store; nothing is cached. Deleting a
/// document leaves its sub-collections in place, which is why subtree
/// removal lives in [`crate::tree`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` if it does not exist.
    async fn get_document(&self, path: &NodePath) -> Result<Option<Document>>;

    /// Create or overwrite a document. With `merge`, only the given
    /// top-level fields are replaced and the rest are kept.
    async fn set_document(&self, path: &NodePath, fields: Fields, merge: bool) -> Result<()>;

    /// Remove a document. Missing documents are not an error.
    async fn delete_document(&self, path: &NodePath) -> Result<()>;

    /// Remove one top-level field of an existing document.
    async fn delete_field(&self, path: &NodePath, field: &str) -> Result<()>;

    /// Documents of a collection ordered by ID, at most `limit` of them.
    async fn list_documents(&self, collection: &NodePath, limit: Option<usize>)
        -> Result<Vec<Document>>;

    /// Collections directly beneath a document, or the top-level
    /// collections when `document` is the root.
    async fn list_subcollections(&self, document: &NodePath) -> Result<Vec<NodePath>>;

    /// User IDs known to the identity provider.
    async fn list_user_identities(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn get_document(&self, path: &NodePath) -> Result<Option<Document>> {
        (**self).get_document(path).await
    }

    async fn set_document(&self, path: &NodePath, fields: Fields, merge: bool) -> Result<()> {
        (**self).set_document(path, fields, merge).await
    }

    async fn delete_document(&self, path: &NodePath) -> Result<()> {
        (**self).delete_document(path).await
    }

    async fn delete_field(&self, path: &NodePath, field: &str) -> Result<()> {
        (**self).delete_field(path, field).await
    }

    async fn list_documents(
        &self,
        collection: &NodePath,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        (**self).list_documents(collection, limit).await
    }

    async fn list_subcollections(&self, document: &NodePath) -> Result<Vec<NodePath>> {
        (**self).list_subcollections(document).await
    }

    async fn list_user_identities(&self) -> Result<Vec<String>> {
        (**self).list_user_identities().await
    }
}

/// Random alphanumeric ID in the style of store-assigned document IDs.
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}
