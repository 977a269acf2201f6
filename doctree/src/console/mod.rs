//! Interactive, menu-driven browser over a document store.
//!
//! Screens form a stack (root, collection, document); each step renders one
//! screen, reads one choice and tells the loop whether to stay, open a child,
//! go back or exit. Input and output are generic so sessions can be scripted.

pub mod format;

use crate::config::Config;
use anyhow::Result;
use doctree_core::auth::TokenVerifier;
use doctree_core::store::auto_id;
use doctree_core::tree::{NodeFailure, TreeOps, DEFAULT_BATCH_SIZE, DEFAULT_MAX_DEPTH};
use doctree_core::{DocumentStore, Error, Fields, NodePath};
use format::{cell, display_value, is_scalar, item_label, parse_input, pick, table};
use serde_json::Value;
use std::io::{BufRead, Write};
use tracing::info;

/// Placeholder document that makes a new collection visible.
const INIT_DOC_ID: &str = "_init_";

/// Raised when the input stream ends; closes the session quietly.
#[derive(Debug, thiserror::Error)]
#[error("input closed")]
struct InputClosed;

/// Check an identity token and require its email to be an administrator.
pub async fn admit(
    verifier: &dyn TokenVerifier,
    token: &str,
    config: &Config,
) -> doctree_core::Result<String> {
    let claims = verifier
        .verify(token)
        .await
        .ok_or_else(|| Error::Auth("invalid or expired identity token".to_string()))?;
    let email = claims
        .email
        .ok_or_else(|| Error::Auth("identity token carries no email".to_string()))?;
    if !config.is_admin(&email) {
        return Err(Error::Auth(format!("{email} is not an administrator")));
    }
    Ok(email)
}

#[derive(Clone, Debug)]
enum Screen {
    Root,
    Collection(NodePath),
    Document(NodePath),
}

enum Nav {
    Stay,
    Open(Screen),
    Replace(Screen),
    Back,
    Exit,
}

pub struct Browser<'a, R, W> {
    store: &'a dyn DocumentStore,
    input: R,
    output: W,
    operator: Option<String>,
    batch_size: usize,
    max_depth: usize,
}

impl<'a, R: BufRead, W: Write> Browser<'a, R, W> {
    pub fn new(store: &'a dyn DocumentStore, input: R, output: W) -> Self {
        Self {
            store,
            input,
            output,
            operator: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Identity recorded as `created_by` on new collections.
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn with_limits(mut self, batch_size: usize, max_depth: usize) -> Self {
        self.batch_size = batch_size;
        self.max_depth = max_depth;
        self
    }

    /// Run the session until the user exits or the input ends.
    pub async fn run(&mut self) -> Result<()> {
        match self.run_screens().await {
            Err(err) if err.downcast_ref::<InputClosed>().is_some() => Ok(()),
            other => other,
        }
    }

    async fn run_screens(&mut self) -> Result<()> {
        let mut stack = vec![Screen::Root];
        while let Some(screen) = stack.last().cloned() {
            let nav = match &screen {
                Screen::Root => self.root().await?,
                Screen::Collection(path) => self.collection(path).await?,
                Screen::Document(path) => self.document(path).await?,
            };
            match nav {
                Nav::Stay => {}
                Nav::Open(next) => stack.push(next),
                Nav::Replace(next) => {
                    stack.pop();
                    stack.push(next);
                }
                Nav::Back => {
                    stack.pop();
                }
                Nav::Exit => break,
            }
        }
        writeln!(self.output, "Goodbye.")?;
        Ok(())
    }

    fn tree(&self) -> TreeOps<'a> {
        TreeOps::new(self.store).with_max_depth(self.max_depth)
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(InputClosed.into());
        }
        Ok(line.trim().to_string())
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(self.ask(prompt)?.eq_ignore_ascii_case("y"))
    }

    fn say(&mut self, message: impl AsRef<str>) -> Result<()> {
        writeln!(self.output, "{}", message.as_ref())?;
        Ok(())
    }

    /// Print a store error and hand back `None` so the screen can carry on.
    fn check<T>(&mut self, result: doctree_core::Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.say(format!("Error: {err}"))?;
                Ok(None)
            }
        }
    }

    fn show_failures(&mut self, failures: &[NodeFailure]) -> Result<()> {
        for failure in failures {
            self.say(format!("  failed: {} ({})", failure.path, failure.error))?;
        }
        Ok(())
    }

    fn location(&mut self, path: &NodePath) -> Result<()> {
        self.say(format!("\nYou are here: /{path}"))
    }

    fn menu(&mut self, title: &str, entries: &[(&str, &str)]) -> Result<()> {
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|(key, label)| vec![key.to_string(), label.to_string()])
            .collect();
        let rendered = table(title, &["Key", "Action"], &rows);
        self.say(rendered.trim_end())
    }

    async fn exists(&mut self, path: &NodePath) -> Result<Option<bool>> {
        let store = self.store;
        Ok(self.check(store.get_document(path).await)?.map(|doc| doc.is_some()))
    }

    async fn root(&mut self) -> Result<Nav> {
        let store = self.store;
        let root = NodePath::root();
        let collections = self
            .check(store.list_subcollections(&root).await)?
            .unwrap_or_default();
        self.location(&root)?;
        if collections.is_empty() {
            self.say("No collections found.")?;
        } else {
            let rows = numbered(collections.iter().map(|c| c.id().to_string()));
            let rendered = table("Collections", &["#", "Collection ID"], &rows);
            self.say(rendered.trim_end())?;
        }

        let choice =
            self.ask("Enter a collection number to browse, or press Enter for actions (Q to exit): ")?;
        match choice.to_ascii_uppercase().as_str() {
            "" => self.root_actions(&collections).await,
            "Q" | "0" => Ok(Nav::Exit),
            other => match pick(other, collections.len()) {
                Some(i) => Ok(Nav::Open(Screen::Collection(collections[i].clone()))),
                None => {
                    self.say("Invalid choice.")?;
                    Ok(Nav::Stay)
                }
            },
        }
    }

    async fn root_actions(&mut self, collections: &[NodePath]) -> Result<Nav> {
        self.menu(
            "Collection Actions",
            &[
                ("A", "Create collection"),
                ("B", "Rename collection"),
                ("C", "Delete collection"),
                ("Q", "Exit"),
            ],
        )?;
        match self.ask("Select an action (A, B, C, Q): ")?.to_ascii_uppercase().as_str() {
            "A" => self.create_collection().await?,
            "B" => self.rename_collection(collections).await?,
            "C" => self.delete_collection(collections).await?,
            "Q" => return Ok(Nav::Exit),
            _ => self.say("Invalid choice.")?,
        }
        Ok(Nav::Stay)
    }

    async fn create_collection(&mut self) -> Result<()> {
        let name = self.ask("Enter new collection name: ")?;
        if name.is_empty() {
            return self.say("No collection name entered.");
        }
        let Some(path) = self.check(NodePath::collection(&name).and_then(|c| c.join(INIT_DOC_ID)))? else {
            return Ok(());
        };
        let store = self.store;
        let collection = path.parent().unwrap_or_default();
        let Some(existing) = self.check(store.list_documents(&collection, Some(1)).await)? else {
            return Ok(());
        };
        if !existing.is_empty() {
            return self.say(format!("Collection '{name}' already exists."));
        }
        let mut fields = Fields::new();
        fields.insert("created".into(), Value::Bool(true));
        if let Some(operator) = &self.operator {
            fields.insert("created_by".into(), Value::String(operator.clone()));
        }
        if self.check(store.set_document(&path, fields, false).await)?.is_some() {
            info!(%collection, "collection created");
            self.say(format!("Collection '{name}' created."))?;
        }
        Ok(())
    }

    async fn rename_collection(&mut self, collections: &[NodePath]) -> Result<()> {
        let answer = self.ask("Enter the collection to rename (number or name): ")?;
        let Some(source) = choose(&answer, collections) else {
            return self.say(format!("No collection '{answer}'."));
        };
        let new_name = self.ask("Enter the new collection name: ")?;
        if new_name.is_empty() {
            return self.say("No new name entered.");
        }
        let Some(report) = self.check(self.tree().rename_collection(&source, &new_name).await)? else {
            return Ok(());
        };
        self.say(format!(
            "Copied {} documents from '{}' to '{}'.",
            report.copy.copied, source, report.target
        ))?;
        self.show_failures(&report.copy.failures)?;
        match report.removed {
            Some(removed) => {
                self.say(format!("Collection '{source}' renamed to '{}'.", report.target))?;
                self.show_failures(&removed.failures)?;
            }
            None => self.say(format!("Copy was incomplete; '{source}' was kept."))?,
        }
        Ok(())
    }

    async fn delete_collection(&mut self, collections: &[NodePath]) -> Result<()> {
        let answer = self.ask("Enter the collection to delete (number or name): ")?;
        let Some(collection) = choose(&answer, collections) else {
            return self.say(format!("No collection '{answer}'."));
        };
        let prompt = format!(
            "Are you sure you want to delete collection '{collection}' and everything in it? (y/N): "
        );
        if !self.confirm(&prompt)? {
            return self.say("Cancelled.");
        }
        let batch_size = self.batch_size;
        let outcome = self
            .tree()
            .delete_collection_batched(&collection, batch_size)
            .await;
        if let Some(report) = self.check(outcome)? {
            self.say(format!(
                "Collection '{collection}' deleted ({} documents removed).",
                report.deleted
            ))?;
            self.show_failures(&report.subtree.failures)?;
        }
        Ok(())
    }

    async fn collection(&mut self, path: &NodePath) -> Result<Nav> {
        let store = self.store;
        self.location(path)?;
        let listed = self
            .check(store.list_documents(path, None).await)?
            .unwrap_or_default();
        let mut ids: Vec<String> = listed.iter().map(|d| d.id().to_string()).collect();
        if ids.is_empty() {
            ids = self.identity_fallback(path).await?;
            if ids.is_empty() {
                self.say("No documents found in this collection.")?;
            } else {
                self.say("No documents listed; showing user IDs stored here.")?;
            }
        }
        if !ids.is_empty() {
            let rows = numbered(ids.iter().cloned());
            let rendered = table(&format!("Documents in /{path}"), &["#", "Document ID"], &rows);
            self.say(rendered.trim_end())?;
        }

        let choice =
            self.ask("Enter a document number to view, or press Enter for actions (Q to go back): ")?;
        match choice.to_ascii_uppercase().as_str() {
            "" => self.collection_actions(path).await,
            "Q" | "0" => Ok(Nav::Back),
            other => match pick(other, ids.len()) {
                Some(i) => Ok(Nav::Open(Screen::Document(path.child(&ids[i])))),
                None => {
                    self.say("Please enter a valid number or press Enter for actions.")?;
                    Ok(Nav::Stay)
                }
            },
        }
    }

    /// User identities that have a document (or sub-collections) in
    /// `collection`, for collections whose documents cannot be listed.
    async fn identity_fallback(&mut self, collection: &NodePath) -> Result<Vec<String>> {
        let store = self.store;
        let Some(identities) = self.check(store.list_user_identities().await)? else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for id in identities {
            let Ok(doc) = collection.join(&id) else {
                continue;
            };
            let Some(present) = self.check(store.get_document(&doc).await)? else {
                break;
            };
            let present = present.is_some()
                || store
                    .list_subcollections(&doc)
                    .await
                    .map(|subs| !subs.is_empty())
                    .unwrap_or(false);
            if present {
                found.push(id);
            }
        }
        Ok(found)
    }

    async fn collection_actions(&mut self, collection: &NodePath) -> Result<Nav> {
        self.menu(
            "Document List Actions",
            &[
                ("A", "Create new document"),
                ("B", "Delete document by ID"),
                ("C", "Rename (copy) document by ID"),
                ("Q", "Go back"),
            ],
        )?;
        match self.ask("Select an action (A, B, C, Q): ")?.to_ascii_uppercase().as_str() {
            "A" => self.create_document(collection).await?,
            "B" => self.delete_document_by_id(collection).await?,
            "C" => self.copy_document_by_id(collection).await?,
            "Q" | "0" => return Ok(Nav::Back),
            _ => self.say("Invalid choice.")?,
        }
        Ok(Nav::Stay)
    }

    async fn create_document(&mut self, collection: &NodePath) -> Result<()> {
        let mut id = self.ask("Enter new document ID (leave blank for auto-ID): ")?;
        if id.is_empty() {
            id = auto_id();
        }
        let Some(path) = self.check(collection.join(&id))? else {
            return Ok(());
        };
        match self.exists(&path).await? {
            Some(true) => return self.say(format!("Document '{id}' already exists.")),
            Some(false) => {}
            None => return Ok(()),
        }
        let store = self.store;
        if self.check(store.set_document(&path, Fields::new(), false).await)?.is_some() {
            self.say(format!("Document '{id}' created."))?;
        }
        Ok(())
    }

    async fn delete_document_by_id(&mut self, collection: &NodePath) -> Result<()> {
        let id = self.ask("Enter document ID to delete: ")?;
        if id.is_empty() {
            return self.say("No document ID entered.");
        }
        let Some(path) = self.check(collection.join(&id))? else {
            return Ok(());
        };
        if self.exists(&path).await? != Some(true) {
            return self.say(format!("Document '{id}' does not exist."));
        }
        self.delete_document(&path).await?;
        Ok(())
    }

    /// Confirm, then remove a document with everything beneath it. Returns
    /// whether the deletion ran.
    async fn delete_document(&mut self, path: &NodePath) -> Result<bool> {
        let prompt = format!(
            "Are you sure you want to delete document '{}' and everything beneath it? (y/N): ",
            path.id()
        );
        if !self.confirm(&prompt)? {
            self.say("Cancelled.")?;
            return Ok(false);
        }
        let Some(report) = self.check(self.tree().delete_subtree(path).await)? else {
            return Ok(false);
        };
        self.say(format!(
            "Document '{}' deleted ({} documents removed).",
            path.id(),
            report.deleted
        ))?;
        self.show_failures(&report.failures)?;
        Ok(true)
    }

    async fn copy_document_by_id(&mut self, collection: &NodePath) -> Result<()> {
        let id = self.ask("Enter source document ID: ")?;
        if id.is_empty() {
            return self.say("No source document ID entered.");
        }
        let Some(source) = self.check(collection.join(&id))? else {
            return Ok(());
        };
        if self.exists(&source).await? != Some(true) {
            return self.say(format!("Document '{id}' does not exist."));
        }
        self.copy_document(&source).await?;
        Ok(())
    }

    /// Copy `source` and its subtree to a sibling ID read from the user,
    /// then optionally delete the original. Returns the new path when the
    /// original was removed.
    async fn copy_document(&mut self, source: &NodePath) -> Result<Option<NodePath>> {
        let new_id = self.ask("Enter new document ID: ")?;
        if new_id.is_empty() {
            self.say("No new document ID entered.")?;
            return Ok(None);
        }
        let collection = source.parent().unwrap_or_default();
        let Some(target) = self.check(collection.join(&new_id))? else {
            return Ok(None);
        };
        match self.exists(&target).await? {
            Some(true) => {
                self.say(format!("A document with ID '{new_id}' already exists."))?;
                return Ok(None);
            }
            Some(false) => {}
            None => return Ok(None),
        }
        let Some(report) = self.check(self.tree().copy_subtree(source, &target).await)? else {
            return Ok(None);
        };
        self.say(format!(
            "Document '{}' copied to '{new_id}' ({} documents, including sub-collections).",
            source.id(),
            report.copied
        ))?;
        if !report.is_complete() {
            self.show_failures(&report.failures)?;
            self.say("Copy was incomplete; the original was kept.")?;
            return Ok(None);
        }
        if !self.confirm("Delete the original document? (y/N): ")? {
            return Ok(None);
        }
        let Some(removed) = self.check(self.tree().delete_subtree(source).await)? else {
            return Ok(None);
        };
        self.say(format!("Original document '{}' deleted.", source.id()))?;
        if !removed.is_complete() {
            self.show_failures(&removed.failures)?;
        }
        Ok(Some(target))
    }

    async fn document(&mut self, path: &NodePath) -> Result<Nav> {
        let store = self.store;
        self.location(path)?;
        let Some(doc) = self.check(store.get_document(path).await)? else {
            return Ok(Nav::Back);
        };
        let subcollections = self
            .check(store.list_subcollections(path).await)?
            .unwrap_or_default();
        if doc.is_none() && subcollections.is_empty() {
            self.say(format!("Document '{}' does not exist.", path.id()))?;
            return Ok(Nav::Back);
        }
        if doc.is_none() {
            self.say("(no stored fields; only sub-collections)")?;
        }
        let fields = doc.map(|d| d.fields).unwrap_or_default();

        let mut rows = Vec::new();
        for (name, value) in &fields {
            rows.push(vec![name.clone(), "field".to_string(), cell(value)]);
        }
        for sub in &subcollections {
            rows.push(vec![sub.id().to_string(), "collection".to_string(), String::new()]);
        }
        let rows = numbered_rows(rows);
        let rendered = table(
            &format!("Document {}", path.id()),
            &["#", "Name", "Kind", "Value"],
            &rows,
        );
        self.say(rendered.trim_end())?;

        let choice =
            self.ask("Enter a number to explore, or press Enter for actions (Q to go back): ")?;
        match choice.to_ascii_uppercase().as_str() {
            "" => self.document_actions(path, &fields, &subcollections).await,
            "Q" | "0" => Ok(Nav::Back),
            other => match pick(other, fields.len() + subcollections.len()) {
                Some(i) if i < fields.len() => {
                    if let Some((name, value)) = fields.iter().nth(i) {
                        self.explore(value, name)?;
                    }
                    Ok(Nav::Stay)
                }
                Some(i) => Ok(Nav::Open(Screen::Collection(
                    subcollections[i - fields.len()].clone(),
                ))),
                None => {
                    self.say("Invalid choice.")?;
                    Ok(Nav::Stay)
                }
            },
        }
    }

    async fn document_actions(
        &mut self,
        path: &NodePath,
        fields: &Fields,
        subcollections: &[NodePath],
    ) -> Result<Nav> {
        self.menu(
            "Document Actions",
            &[
                ("E", "Edit fields or sub-collections"),
                ("D", "Delete document"),
                ("Q", "Go back"),
            ],
        )?;
        match self.ask("Select an action (E, D, Q): ")?.to_ascii_uppercase().as_str() {
            "E" => self.edit(path, fields, subcollections).await,
            "D" => Ok(if self.delete_document(path).await? {
                Nav::Back
            } else {
                Nav::Stay
            }),
            "Q" | "0" => Ok(Nav::Back),
            _ => {
                self.say("Invalid choice.")?;
                Ok(Nav::Stay)
            }
        }
    }

    async fn edit(
        &mut self,
        path: &NodePath,
        fields: &Fields,
        subcollections: &[NodePath],
    ) -> Result<Nav> {
        self.menu(
            "Edit Document",
            &[
                ("A", "Add field"),
                ("F", "Edit or delete field"),
                ("S", "Create sub-collection"),
                ("X", "Delete sub-collection"),
                ("R", "Rename (copy to new ID)"),
                ("Q", "Go back"),
            ],
        )?;
        let action = self.ask("Select an edit action (A, F, S, X, R, Q): ")?;
        match action.to_ascii_uppercase().as_str() {
            "A" => self.add_field(path).await?,
            "F" => self.edit_field(path, fields).await?,
            "S" => self.create_subcollection(path).await?,
            "X" => self.delete_subcollection(subcollections).await?,
            "R" => {
                if let Some(target) = self.copy_document(path).await? {
                    return Ok(Nav::Replace(Screen::Document(target)));
                }
            }
            "Q" | "0" => {}
            _ => self.say("Invalid choice.")?,
        }
        Ok(Nav::Stay)
    }

    async fn write_field(&mut self, path: &NodePath, name: &str, raw: &str) -> Result<bool> {
        let mut update = Fields::new();
        update.insert(name.to_string(), parse_input(raw));
        let store = self.store;
        Ok(self.check(store.set_document(path, update, true).await)?.is_some())
    }

    async fn add_field(&mut self, path: &NodePath) -> Result<()> {
        let name = self.ask("Enter new field name: ")?;
        if name.is_empty() {
            return self.say("No field name entered.");
        }
        let raw = self.ask(&format!("Enter value for '{name}': "))?;
        if self.write_field(path, &name, &raw).await? {
            self.say(format!("Field '{name}' added."))?;
        }
        Ok(())
    }

    async fn edit_field(&mut self, path: &NodePath, fields: &Fields) -> Result<()> {
        let answer = self.ask("Enter the field to edit or delete (number or name): ")?;
        let name = match pick(&answer, fields.len()) {
            Some(i) => fields.keys().nth(i).cloned(),
            None => fields.contains_key(&answer).then(|| answer.clone()),
        };
        let Some(name) = name else {
            return self.say(format!("No field '{answer}'."));
        };
        let op = self.ask(&format!("(E)dit or (D)elete '{name}'? "))?;
        match op.to_ascii_uppercase().as_str() {
            "E" => {
                let raw = self.ask(&format!("Enter new value for '{name}': "))?;
                if self.write_field(path, &name, &raw).await? {
                    self.say(format!("Field '{name}' updated."))?;
                }
            }
            "D" => {
                let store = self.store;
                if self.check(store.delete_field(path, &name).await)?.is_some() {
                    self.say(format!("Field '{name}' deleted."))?;
                }
            }
            _ => self.say("Invalid choice.")?,
        }
        Ok(())
    }

    async fn create_subcollection(&mut self, path: &NodePath) -> Result<()> {
        let name = self.ask("Enter new sub-collection name: ")?;
        if name.is_empty() {
            return self.say("No sub-collection name entered.");
        }
        let mut id = self.ask("Enter the first document ID (leave blank for auto-ID): ")?;
        if id.is_empty() {
            id = auto_id();
        }
        let Some(doc) = self.check(path.join(&name).and_then(|sub| sub.join(&id)))? else {
            return Ok(());
        };
        let store = self.store;
        if self.check(store.set_document(&doc, Fields::new(), false).await)?.is_some() {
            self.say(format!("Sub-collection '{name}' created with document '{id}'."))?;
        }
        Ok(())
    }

    async fn delete_subcollection(&mut self, subcollections: &[NodePath]) -> Result<()> {
        let answer = self.ask("Enter the sub-collection to delete (number or name): ")?;
        let Some(sub) = choose(&answer, subcollections) else {
            return self.say(format!("No sub-collection '{answer}'."));
        };
        let prompt = format!(
            "Are you sure you want to delete sub-collection '{}' and everything in it? (y/N): ",
            sub.id()
        );
        if !self.confirm(&prompt)? {
            return self.say("Cancelled.");
        }
        if let Some(report) = self.check(self.tree().delete_subtree(&sub).await)? {
            self.say(format!(
                "Sub-collection '{}' deleted ({} documents removed).",
                sub.id(),
                report.deleted
            ))?;
            self.show_failures(&report.failures)?;
        }
        Ok(())
    }

    /// Walk a nested value: maps list their keys, lists their items,
    /// scalars print. Strings holding JSON are explored as parsed.
    fn explore(&mut self, value: &Value, label: &str) -> Result<()> {
        let parsed = match value {
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(|v| !is_scalar(v)),
            _ => None,
        };
        let value = parsed.as_ref().unwrap_or(value);
        match value {
            Value::Object(map) => loop {
                let rows = numbered(map.keys().cloned());
                let rendered = table(&format!("Keys at {label}"), &["#", "Key"], &rows);
                self.say(rendered.trim_end())?;
                let choice = self.ask("Select a key to view (or 0 to go back): ")?;
                if choice == "0" || choice.eq_ignore_ascii_case("q") {
                    return Ok(());
                }
                match pick(&choice, map.len()).and_then(|i| map.iter().nth(i)) {
                    Some((key, child)) => self.explore(child, &format!("{label}/{key}"))?,
                    None => self.say("Invalid choice.")?,
                }
            },
            Value::Array(items) => loop {
                let rows = numbered(items.iter().map(item_label));
                let rendered = table(
                    &format!("{label} ({} items)", items.len()),
                    &["#", "Item"],
                    &rows,
                );
                self.say(rendered.trim_end())?;
                let choice = self.ask("Select an item to view (or 0 to go back): ")?;
                if choice == "0" || choice.eq_ignore_ascii_case("q") {
                    return Ok(());
                }
                match pick(&choice, items.len()) {
                    Some(i) => self.explore(&items[i], &format!("{label}[{i}]"))?,
                    None => self.say("Invalid choice.")?,
                }
            },
            scalar => {
                self.say(format!("{label}: {}", display_value(scalar)))?;
                self.ask("Press Enter to continue...")?;
                Ok(())
            }
        }
    }
}

fn numbered(items: impl Iterator<Item = String>) -> Vec<Vec<String>> {
    items
        .enumerate()
        .map(|(i, item)| vec![(i + 1).to_string(), item])
        .collect()
}

fn numbered_rows(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, mut row)| {
            row.insert(0, (i + 1).to_string());
            row
        })
        .collect()
}

/// Resolve a menu answer given as a 1-based number or an ID.
fn choose(answer: &str, paths: &[NodePath]) -> Option<NodePath> {
    match pick(answer, paths.len()) {
        Some(i) => Some(paths[i].clone()),
        None => paths.iter().find(|p| p.id() == answer).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctree_core::auth::Hs256Verifier;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token(email: Option<&str>) -> String {
        let claims = json!({
            "sub": "u1",
            "email": email,
            "exp": chrono::Utc::now().timestamp() + 600
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
    }

    fn config() -> Config {
        Config {
            admin_emails: vec!["admin@example.com".to_string()],
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn admits_listed_admins_only() {
        let verifier = Hs256Verifier::new("secret".to_string());
        let email = admit(&verifier, &token(Some("admin@example.com")), &config())
            .await
            .unwrap();
        assert_eq!(email, "admin@example.com");

        let denied = admit(&verifier, &token(Some("guest@example.com")), &config())
            .await
            .unwrap_err();
        assert!(denied.is_auth());
        assert!(admit(&verifier, &token(None), &config())
            .await
            .unwrap_err()
            .is_auth());
        assert!(admit(&verifier, "garbage", &config())
            .await
            .unwrap_err()
            .is_auth());
    }

    #[test]
    fn chooses_by_number_or_id() {
        let paths = vec![
            NodePath::parse("users").unwrap(),
            NodePath::parse("orders").unwrap(),
        ];
        assert_eq!(choose("2", &paths), Some(paths[1].clone()));
        assert_eq!(choose("users", &paths), Some(paths[0].clone()));
        assert_eq!(choose("missing", &paths), None);
    }
}
