//! Subtree deletion and copying over a [`DocumentStore`].
//!
//! The store removes one document per call and leaves sub-collections
//! behind, so removing or moving a subtree means walking it. Walks use an
//! explicit worklist and run one store call at a time. They are best-effort:
//! a node that fails is recorded in the returned report and the walk moves on
//! to its siblings. Nothing is retried and nothing is rolled back.

use crate::error::{Error, Result};
use crate::path::{NodeKind, NodePath};
use crate::store::{DocumentStore, Fields};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Page size used when a caller has no preference.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Deepest collection nesting the walks will descend into.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// A node whose operation failed, with the reason.
#[derive(Debug)]
pub struct NodeFailure {
    pub path: NodePath,
    pub error: Error,
}

impl Serialize for NodeFailure {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("NodeFailure", 2)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

/// Outcome of a subtree deletion.
#[derive(Debug, Default, Serialize)]
pub struct DeleteReport {
    /// Documents reached by the walk.
    pub visited: usize,
    /// Documents whose delete call succeeded.
    pub deleted: usize,
    pub failures: Vec<NodeFailure>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether `path` itself failed.
    pub fn failed_at(&self, path: &NodePath) -> bool {
        self.failures.iter().any(|f| &f.path == path)
    }

    fn fail(&mut self, path: NodePath, error: Error) {
        warn!(%path, %error, "delete failed");
        self.failures.push(NodeFailure { path, error });
    }

    fn absorb(&mut self, other: DeleteReport) {
        self.visited += other.visited;
        self.deleted += other.deleted;
        self.failures.extend(other.failures);
    }
}

/// Outcome of a paged collection deletion.
#[derive(Debug, Default, Serialize)]
pub struct BatchDeleteReport {
    /// Top-level documents of the collection that were removed.
    pub deleted: usize,
    /// Non-empty pages fetched.
    pub pages: usize,
    /// Totals over every subtree, nested documents included.
    pub subtree: DeleteReport,
}

impl BatchDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.subtree.is_complete()
    }
}

/// Outcome of a subtree copy.
#[derive(Debug, Default, Serialize)]
pub struct CopyReport {
    /// Documents written at the destination.
    pub copied: usize,
    pub failures: Vec<NodeFailure>,
}

impl CopyReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: NodePath, error: Error) {
        warn!(%path, %error, "copy failed");
        self.failures.push(NodeFailure { path, error });
    }

    fn absorb(&mut self, other: CopyReport) {
        self.copied += other.copied;
        self.failures.extend(other.failures);
    }
}

/// Outcome of a collection rename.
#[derive(Debug, Serialize)]
pub struct RenameReport {
    pub target: NodePath,
    pub copy: CopyReport,
    /// Present when the source was removed; skipped after an incomplete copy.
    pub removed: Option<DeleteReport>,
}

enum Step {
    Visit(NodePath),
    Remove(NodePath),
}

struct CopyTask {
    source: NodePath,
    target: NodePath,
    fields: Fields,
}

/// Subtree operations bound to one store.
pub struct TreeOps<'a> {
    store: &'a dyn DocumentStore,
    max_depth: usize,
}

impl<'a> TreeOps<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn check_depth(&self, path: &NodePath) -> Result<()> {
        if path.collection_depth() > self.max_depth {
            return Err(Error::DepthExceeded {
                path: path.to_string(),
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    /// Delete the node at `path` and everything beneath it.
    ///
    /// Documents are removed after their descendants. A document whose
    /// sub-collections cannot be listed is left in place; a descendant that
    /// fails does not keep its ancestors from being removed. A collection
    /// has no delete of its own and disappears with its last document.
    pub async fn delete_subtree(&self, path: &NodePath) -> Result<DeleteReport> {
        if path.is_root() {
            return Err(Error::validation("refusing to delete the database root"));
        }
        self.check_depth(path)?;

        let mut report = DeleteReport::default();
        let mut stack = Vec::new();
        match path.kind() {
            NodeKind::Document => stack.push(Step::Visit(path.clone())),
            NodeKind::Collection => {
                debug!(%path, "deleting collection");
                match self.store.list_documents(path, None).await {
                    Ok(docs) => stack.extend(docs.into_iter().rev().map(|d| Step::Visit(d.path))),
                    Err(err) => report.fail(path.clone(), err),
                }
            }
        }

        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(doc) => {
                    report.visited += 1;
                    match self.child_documents(&doc).await {
                        Ok(children) => {
                            stack.push(Step::Remove(doc));
                            stack.extend(children.into_iter().rev().map(Step::Visit));
                        }
                        Err(err) => report.fail(doc, err),
                    }
                }
                Step::Remove(doc) => match self.store.delete_document(&doc).await {
                    Ok(()) => {
                        debug!(path = %doc, "deleted document");
                        report.deleted += 1;
                    }
                    Err(err) => report.fail(doc, err),
                },
            }
        }

        info!(
            %path,
            deleted = report.deleted,
            failed = report.failures.len(),
            "subtree delete finished"
        );
        Ok(report)
    }

    /// Documents one level below `doc`, across all of its sub-collections.
    async fn child_documents(&self, doc: &NodePath) -> Result<Vec<NodePath>> {
        let mut children = Vec::new();
        for sub in self.store.list_subcollections(doc).await? {
            self.check_depth(&sub)?;
            let docs = self.store.list_documents(&sub, None).await?;
            children.extend(docs.into_iter().map(|d| d.path));
        }
        Ok(children)
    }

    /// Delete every document of `collection` in pages of `batch_size`,
    /// each with its subtree.
    ///
    /// Top-level documents that failed stay listed, so each page asks for
    /// `batch_size` more documents than have failed so far and drops the
    /// failed ones. Pages are fetched until the remainder comes back short.
    /// Every page either deletes or fails at least one new document, so the
    /// loop always ends.
    pub async fn delete_collection_batched(
        &self,
        collection: &NodePath,
        batch_size: usize,
    ) -> Result<BatchDeleteReport> {
        if !collection.is_collection() {
            return Err(Error::validation(format!(
                "'{collection}' is not a collection path"
            )));
        }
        if batch_size == 0 {
            return Err(Error::validation("batch size must be at least 1"));
        }
        self.check_depth(collection)?;

        let mut report = BatchDeleteReport::default();
        let mut failed: HashSet<NodePath> = HashSet::new();
        loop {
            let limit = batch_size + failed.len();
            let page = match self.store.list_documents(collection, Some(limit)).await {
                Ok(page) => page,
                Err(err) => {
                    report.subtree.fail(collection.clone(), err);
                    break;
                }
            };
            let pending: Vec<NodePath> = page
                .into_iter()
                .map(|doc| doc.path)
                .filter(|path| !failed.contains(path))
                .collect();
            if pending.is_empty() {
                break;
            }
            report.pages += 1;
            let fetched = pending.len();
            for doc in pending {
                let sub = self.delete_subtree(&doc).await?;
                if sub.failed_at(&doc) {
                    failed.insert(doc);
                } else {
                    report.deleted += 1;
                }
                report.subtree.absorb(sub);
            }
            debug!(%collection, page = report.pages, fetched, "page processed");
            if fetched < batch_size {
                break;
            }
        }

        info!(
            %collection,
            deleted = report.deleted,
            pages = report.pages,
            "collection delete finished"
        );
        Ok(report)
    }

    /// Copy the document at `source` with all of its sub-collections to
    /// `target`, overwriting whatever fields `target` had.
    ///
    /// Document IDs and collection names are preserved. The source is left
    /// untouched. A node that fails is skipped together with its subtree;
    /// documents already written stay written.
    pub async fn copy_subtree(&self, source: &NodePath, target: &NodePath) -> Result<CopyReport> {
        for path in [source, target] {
            if !path.is_document() || path.is_root() {
                return Err(Error::validation(format!("'{path}' is not a document path")));
            }
        }
        if target.starts_with(source) {
            return Err(Error::validation(format!(
                "cannot copy '{source}' into its own subtree '{target}'"
            )));
        }
        self.check_depth(target)?;
        let root = self
            .store
            .get_document(source)
            .await?
            .ok_or_else(|| Error::not_found(source))?;

        let mut report = CopyReport::default();
        let mut stack = vec![CopyTask {
            source: source.clone(),
            target: target.clone(),
            fields: root.fields,
        }];
        while let Some(task) = stack.pop() {
            if let Err((path, err)) = self.copy_node(task, &mut stack).await {
                report.fail(path, err);
                continue;
            }
            report.copied += 1;
        }

        info!(%source, %target, copied = report.copied, failed = report.failures.len(), "subtree copy finished");
        Ok(report)
    }

    /// Write one document and queue its children.
    async fn copy_node(
        &self,
        task: CopyTask,
        stack: &mut Vec<CopyTask>,
    ) -> std::result::Result<(), (NodePath, Error)> {
        let CopyTask {
            source,
            target,
            fields,
        } = task;
        if let Err(err) = self.store.set_document(&target, fields, false).await {
            return Err((source, err));
        }
        debug!(%source, %target, "copied document");

        let subs = match self.store.list_subcollections(&source).await {
            Ok(subs) => subs,
            Err(err) => return Err((source, err)),
        };
        let mut queued = Vec::new();
        for sub in subs {
            let target_sub = target.child(sub.id());
            if let Err(err) = self.check_depth(&target_sub) {
                return Err((sub, err));
            }
            let docs = match self.store.list_documents(&sub, None).await {
                Ok(docs) => docs,
                Err(err) => return Err((sub, err)),
            };
            queued.extend(docs.into_iter().map(|doc| CopyTask {
                target: target_sub.child(doc.id()),
                source: doc.path,
                fields: doc.fields,
            }));
        }
        stack.extend(queued.into_iter().rev());
        Ok(())
    }

    /// Move a collection to the sibling name `new_name` by copying every
    /// document subtree and then deleting the source.
    ///
    /// The source is only deleted when the copy finished without failures.
    pub async fn rename_collection(
        &self,
        source: &NodePath,
        new_name: &str,
    ) -> Result<RenameReport> {
        if !source.is_collection() {
            return Err(Error::validation(format!("'{source}' is not a collection path")));
        }
        let parent = source.parent().unwrap_or_default();
        let target = parent.join(new_name)?;
        if &target == source {
            return Err(Error::validation("new name equals the current name"));
        }
        if !self.store.list_documents(&target, Some(1)).await?.is_empty() {
            return Err(Error::already_exists(&target));
        }

        let mut copy = CopyReport::default();
        for doc in self.store.list_documents(source, None).await? {
            let dest = target.child(doc.id());
            match self.copy_subtree(&doc.path, &dest).await {
                Ok(report) => copy.absorb(report),
                Err(err) => copy.fail(doc.path, err),
            }
        }

        let removed = if copy.is_complete() {
            Some(self.delete_subtree(source).await?)
        } else {
            warn!(%source, %target, "copy incomplete, source kept");
            None
        };
        Ok(RenameReport {
            target,
            copy,
            removed,
        })
    }
}

/// Delete the node at `path` and its whole subtree.
pub async fn recursive_delete(store: &dyn DocumentStore, path: &NodePath) -> Result<DeleteReport> {
    TreeOps::new(store).delete_subtree(path).await
}

/// Delete a collection page by page, returning the number of top-level
/// documents removed along with per-node failures.
pub async fn batched_collection_delete(
    store: &dyn DocumentStore,
    collection: &NodePath,
    batch_size: usize,
) -> Result<BatchDeleteReport> {
    TreeOps::new(store)
        .delete_collection_batched(collection, batch_size)
        .await
}

/// Copy a document and everything beneath it to another document path.
pub async fn recursive_copy(
    store: &dyn DocumentStore,
    source: &NodePath,
    target: &NodePath,
) -> Result<CopyReport> {
    TreeOps::new(store).copy_subtree(source, target).await
}
