//! Document-tree browsing and subtree mutation over a hierarchical document
//! database.
//!
//! [`store::DocumentStore`] is the capability the rest of the crate is built
//! on; [`tree`] deletes, copies and renames whole subtrees through it.

pub mod auth;
pub mod credentials;
pub mod error;
pub mod path;
pub mod store;
pub mod tree;

pub use error::{Error, Result};
pub use path::{NodeKind, NodePath};
pub use store::{Document, DocumentStore, Fields};
