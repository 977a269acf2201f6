//! Client for the hosted document database's REST v1 interface.

use super::wire::{decode_fields, encode_fields};
use super::{Document, DocumentStore, Fields};
use crate::credentials::{AccessTokenSource, ServiceAccountKey};
use crate::error::{Error, Result};
use crate::path::NodePath;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const PAGE_SIZE: usize = 300;
const USER_PAGE_SIZE: usize = 1000;
const EMULATOR_TOKEN: &str = "owner";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsResponse {
    #[serde(default)]
    collection_ids: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetUsersResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    local_id: String,
}

/// REST-backed [`DocumentStore`] for one project's default database.
pub struct RestStore {
    client: reqwest::Client,
    tokens: AccessTokenSource,
    project_id: String,
    documents_url: String,
    identity_url: String,
}

impl RestStore {
    pub fn new(key: ServiceAccountKey) -> Self {
        let project_id = key.project_id.clone();
        Self::with_endpoints(
            project_id,
            AccessTokenSource::service_account(key),
            FIRESTORE_URL,
            IDENTITY_URL,
        )
    }

    /// Talk to a local emulator at `host` (e.g. `localhost:8080`).
    pub fn emulator(host: &str, project_id: impl Into<String>) -> Self {
        let base = format!("http://{}/v1", host.trim_end_matches('/'));
        Self::with_endpoints(
            project_id.into(),
            AccessTokenSource::fixed(EMULATOR_TOKEN),
            &base,
            &base,
        )
    }

    pub fn with_endpoints(
        project_id: String,
        tokens: AccessTokenSource,
        firestore_url: &str,
        identity_url: &str,
    ) -> Self {
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            firestore_url.trim_end_matches('/'),
            project_id
        );
        let identity_url = format!(
            "{}/projects/{}",
            identity_url.trim_end_matches('/'),
            project_id
        );
        Self {
            client: reqwest::Client::new(),
            tokens,
            project_id,
            documents_url,
            identity_url,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn url_for(&self, path: &NodePath) -> String {
        if path.is_root() {
            self.documents_url.clone()
        } else {
            format!("{}/{}", self.documents_url, path)
        }
    }

    /// Turn a resource name (`projects/../documents/a/b`) back into a path.
    fn path_from_name(&self, name: &str) -> Result<NodePath> {
        let (_, relative) = name.split_once("/documents/").ok_or_else(|| Error::Fault {
            path: name.to_string(),
            status: 200,
            reason: "document name outside the database".to_string(),
        })?;
        NodePath::parse(relative)
    }

    fn to_document(&self, raw: RawDocument) -> Result<Document> {
        let path = self.path_from_name(&raw.name)?;
        let fields = decode_fields(raw.fields.as_ref())?;
        Ok(Document::new(path, fields))
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.tokens.token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send(&self, path: &NodePath, builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let reason = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => Error::not_found(path),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(reason),
            _ => Error::Fault {
                path: path.to_string(),
                status: status.as_u16(),
                reason,
            },
        })
    }
}

/// Field paths outside `[A-Za-z_][A-Za-z0-9_]*` must be backtick-quoted.
fn quote_field_path(field: &str) -> String {
    let simple = field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn get_document(&self, path: &NodePath) -> Result<Option<Document>> {
        let builder = self.request(Method::GET, &self.url_for(path)).await?;
        match self.send(path, builder).await {
            Ok(resp) => {
                let raw: RawDocument = resp.json().await?;
                Ok(Some(self.to_document(raw)?))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set_document(&self, path: &NodePath, fields: Fields, merge: bool) -> Result<()> {
        // an empty mask cannot be expressed; merging nothing only has to
        // make sure the document exists
        if merge && fields.is_empty() && self.get_document(path).await?.is_some() {
            return Ok(());
        }
        let merge = merge && !fields.is_empty();
        let mut builder = self.request(Method::PATCH, &self.url_for(path)).await?;
        if merge {
            let mask: Vec<(&str, String)> = fields
                .keys()
                .map(|name| ("updateMask.fieldPaths", quote_field_path(name)))
                .collect();
            builder = builder.query(&mask);
        }
        let body = json!({ "fields": encode_fields(&fields) });
        self.send(path, builder.json(&body)).await?;
        debug!(%path, merge, "document written");
        Ok(())
    }

    async fn delete_document(&self, path: &NodePath) -> Result<()> {
        let builder = self.request(Method::DELETE, &self.url_for(path)).await?;
        self.send(path, builder).await?;
        Ok(())
    }

    async fn delete_field(&self, path: &NodePath, field: &str) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &self.url_for(path))
            .await?
            .query(&[
                ("updateMask.fieldPaths", quote_field_path(field)),
                ("currentDocument.exists", "true".to_string()),
            ])
            .json(&json!({ "fields": {} }));
        self.send(path, builder).await?;
        Ok(())
    }

    async fn list_documents(
        &self,
        collection: &NodePath,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let wanted = match limit {
                Some(limit) => limit.saturating_sub(out.len()).min(PAGE_SIZE),
                None => PAGE_SIZE,
            };
            if wanted == 0 {
                break;
            }
            let mut query = vec![("pageSize", wanted.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let builder = self
                .request(Method::GET, &self.url_for(collection))
                .await?
                .query(&query);
            let page: ListDocumentsResponse = match self.send(collection, builder).await {
                Ok(resp) => resp.json().await?,
                // an absent collection is simply empty
                Err(err) if err.is_not_found() => break,
                Err(err) => return Err(err),
            };
            for raw in page.documents {
                out.push(self.to_document(raw)?);
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(out)
    }

    async fn list_subcollections(&self, document: &NodePath) -> Result<Vec<NodePath>> {
        let url = format!("{}:listCollectionIds", self.url_for(document));
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({ "pageSize": PAGE_SIZE });
            if let Some(token) = page_token.take() {
                body["pageToken"] = Value::String(token);
            }
            let builder = self.request(Method::POST, &url).await?.json(&body);
            let page: ListCollectionIdsResponse = self.send(document, builder).await?.json().await?;
            out.extend(page.collection_ids.iter().map(|id| document.child(id)));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(out)
    }

    async fn list_user_identities(&self) -> Result<Vec<String>> {
        let url = format!("{}/accounts:batchGet", self.identity_url);
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("maxResults", USER_PAGE_SIZE.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("nextPageToken", token));
            }
            let builder = self.request(Method::GET, &url).await?.query(&query);
            let page: BatchGetUsersResponse =
                self.send(&NodePath::root(), builder).await?.json().await?;
            if page.users.is_empty() {
                break;
            }
            out.extend(page.users.into_iter().map(|u| u.local_id));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestStore {
        RestStore::emulator("localhost:8080/", "demo")
    }

    #[test]
    fn builds_resource_urls() {
        let store = store();
        assert_eq!(
            store.url_for(&NodePath::parse("users/alice").unwrap()),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/users/alice"
        );
        assert_eq!(
            store.url_for(&NodePath::root()),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents"
        );
        assert_eq!(store.identity_url, "http://localhost:8080/v1/projects/demo");
    }

    #[test]
    fn maps_resource_names_to_paths() {
        let store = store();
        let path = store
            .path_from_name("projects/demo/databases/(default)/documents/a/b/c/d")
            .unwrap();
        assert_eq!(path.to_string(), "a/b/c/d");
        assert!(store.path_from_name("projects/demo/elsewhere").is_err());
    }

    #[test]
    fn quotes_unusual_field_names() {
        assert_eq!(quote_field_path("plain_name1"), "plain_name1");
        assert_eq!(quote_field_path("with space"), "`with space`");
        assert_eq!(quote_field_path("1starts"), "`1starts`");
        assert_eq!(quote_field_path("tick`"), "`tick\\``");
    }
}
