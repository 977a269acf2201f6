//! HTTP API layer exposing collection and document endpoints per tenant.

pub mod tenants;

use axum::{
    extract::{multipart::MultipartError, FromRequestParts, Multipart, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use doctree_core::auth::TokenVerifier;
use doctree_core::store::auto_id;
use doctree_core::tree::{NodeFailure, TreeOps, DEFAULT_BATCH_SIZE, DEFAULT_MAX_DEPTH};
use doctree_core::{DocumentStore, Error, Fields, NodePath};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use tenants::{ServiceAccountDir, StaticTenants, TenantRegistry};

pub const TENANT_HEADER: &str = "X-Service-Account-ID";
/// Placeholder document that makes a new collection visible.
pub const INIT_DOC_ID: &str = "_init_";

/// Authentication context extracted from the bearer token.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: String,
    pub email: Option<String>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "Missing or invalid Authorization header",
                )
            })?;
        match state.verifier.verify(token).await {
            Some(claims) => Ok(Self {
                user_id: claims.sub,
                email: claims.email,
            }),
            None => Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token",
            )),
        }
    }
}

/// Store selected by the `X-Service-Account-ID` header.
pub struct Tenant(pub Arc<dyn DocumentStore>);

impl FromRequestParts<AppState> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    format!("Missing {TENANT_HEADER} header."),
                )
            })?;
        let store = state.tenants.resolve(id).await.map_err(|err| {
            if err.is_not_found() {
                ApiError::new(StatusCode::NOT_FOUND, "Service account file not found.")
            } else {
                err.into()
            }
        })?;
        Ok(Self(store))
    }
}

/// Error response carrying a JSON `detail` message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::AlreadyExists { .. } => StatusCode::CONFLICT,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::DepthExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            warn!(%err, "store request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<dyn TenantRegistry>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub batch_size: usize,
    pub max_depth: usize,
}

impl AppState {
    pub fn new(tenants: Arc<dyn TenantRegistry>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            tenants,
            verifier,
            batch_size: DEFAULT_BATCH_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_limits(mut self, batch_size: usize, max_depth: usize) -> Self {
        self.batch_size = batch_size;
        self.max_depth = max_depth;
        self
    }

    fn tree<'a>(&self, store: &'a dyn DocumentStore) -> TreeOps<'a> {
        TreeOps::new(store).with_max_depth(self.max_depth)
    }
}

#[derive(Deserialize)]
struct CreateCollectionRequest {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct DocumentRequest {
    #[serde(default)]
    data: Option<Fields>,
}

#[derive(Deserialize)]
struct RenameRequest {
    #[serde(default)]
    new_name: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct UploadResponse {
    service_account_id: String,
}

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
    docs_deleted: usize,
    failures: Vec<NodeFailure>,
}

#[derive(Serialize)]
struct CreatedResponse {
    message: String,
    doc_id: String,
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<Value>,
    requested_by: String,
}

#[derive(Serialize)]
struct RenameResponse {
    message: String,
    docs_copied: usize,
    source_deleted: bool,
    failures: Vec<NodeFailure>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/service-account/upload", post(upload_service_account))
        .route("/collection", post(create_collection))
        .route(
            "/collection/{name}",
            get(list_documents).delete(delete_collection),
        )
        .route("/collection/{name}/document", post(add_document))
        .route(
            "/collection/{name}/document/{id}",
            put(update_document).delete(delete_document),
        )
        .route("/collection/{name}/rename", post(rename_collection))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn required<T>(value: Option<T>, detail: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::bad_request(detail))
}

fn non_empty(value: Option<String>, detail: &str) -> Result<String, ApiError> {
    required(value.filter(|v| !v.is_empty()), detail)
}

/// Form part carrying the uploaded key file.
pub const UPLOAD_FIELD: &str = "file";

async fn upload_service_account(
    State(state): State<AppState>,
    auth: AuthContext,
    mut form: Multipart,
) -> ApiResult<UploadResponse> {
    let bad_form = |err: MultipartError| ApiError::new(err.status(), err.body_text());
    let mut key = None;
    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        if field.name() == Some(UPLOAD_FIELD) {
            key = Some(field.text().await.map_err(bad_form)?);
            break;
        }
    }
    let key = non_empty(key, "Missing service account file.")?;
    let id = state.tenants.register(&key).await?;
    info!(user = %auth.user_id, %id, "service account uploaded");
    Ok(Json(UploadResponse {
        service_account_id: id,
    }))
}

async fn create_collection(
    auth: AuthContext,
    Tenant(store): Tenant,
    Json(req): Json<CreateCollectionRequest>,
) -> ApiResult<MessageResponse> {
    let name = non_empty(req.name, "Missing collection name.")?;
    let path = NodePath::collection(&name)?.join(INIT_DOC_ID)?;
    let mut fields = Fields::new();
    fields.insert("created".into(), Value::Bool(true));
    fields.insert("created_by".into(), Value::String(auth.user_id.clone()));
    store.set_document(&path, fields, false).await?;
    Ok(Json(MessageResponse {
        message: format!(
            "Collection '{name}' created with dummy document by user {}.",
            auth.user_id
        ),
    }))
}

async fn delete_collection(
    State(state): State<AppState>,
    auth: AuthContext,
    Tenant(store): Tenant,
    Path(name): Path<String>,
) -> ApiResult<DeleteResponse> {
    let collection = NodePath::collection(&name)?;
    let report = state
        .tree(store.as_ref())
        .delete_collection_batched(&collection, state.batch_size)
        .await?;
    info!(%collection, deleted = report.deleted, pages = report.pages, "collection deleted");
    Ok(Json(DeleteResponse {
        message: format!("Collection '{name}' deleted by user {}.", auth.user_id),
        docs_deleted: report.deleted,
        failures: report.subtree.failures,
    }))
}

async fn add_document(
    auth: AuthContext,
    Tenant(store): Tenant,
    Path(name): Path<String>,
    Json(req): Json<DocumentRequest>,
) -> ApiResult<CreatedResponse> {
    let mut data = required(req.data, "Missing document data.")?;
    let doc_id = auto_id();
    let path = NodePath::collection(&name)?.join(&doc_id)?;
    data.insert("created_by".into(), Value::String(auth.user_id.clone()));
    store.set_document(&path, data, false).await?;
    Ok(Json(CreatedResponse {
        message: format!("Document created in '{name}' by user {}", auth.user_id),
        doc_id,
    }))
}

async fn existing_document(
    store: &dyn DocumentStore,
    name: &str,
    id: &str,
) -> Result<NodePath, ApiError> {
    let path = NodePath::collection(name)?.join(id)?;
    if store.get_document(&path).await?.is_none() {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Document not found."));
    }
    Ok(path)
}

async fn update_document(
    auth: AuthContext,
    Tenant(store): Tenant,
    Path((name, id)): Path<(String, String)>,
    Json(req): Json<DocumentRequest>,
) -> ApiResult<MessageResponse> {
    let mut data = required(req.data, "Missing document data.")?;
    let path = existing_document(store.as_ref(), &name, &id).await?;
    data.insert("updated_by".into(), Value::String(auth.user_id.clone()));
    store.set_document(&path, data, true).await?;
    Ok(Json(MessageResponse {
        message: format!("Document '{id}' updated in '{name}' by user {}", auth.user_id),
    }))
}

async fn delete_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Tenant(store): Tenant,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult<DeleteResponse> {
    let path = existing_document(store.as_ref(), &name, &id).await?;
    let report = state.tree(store.as_ref()).delete_subtree(&path).await?;
    Ok(Json(DeleteResponse {
        message: format!("Document '{id}' deleted from '{name}' by user {}", auth.user_id),
        docs_deleted: report.deleted,
        failures: report.failures,
    }))
}

async fn list_documents(
    auth: AuthContext,
    Tenant(store): Tenant,
    Path(name): Path<String>,
) -> ApiResult<ListResponse> {
    let collection = NodePath::collection(&name)?;
    let documents = store
        .list_documents(&collection, None)
        .await?
        .into_iter()
        .map(|doc| {
            let mut entry = Fields::new();
            entry.insert("id".into(), Value::String(doc.id().to_string()));
            entry.extend(doc.fields);
            Value::Object(entry)
        })
        .collect();
    Ok(Json(ListResponse {
        documents,
        requested_by: auth.user_id,
    }))
}

async fn rename_collection(
    State(state): State<AppState>,
    auth: AuthContext,
    Tenant(store): Tenant,
    Path(name): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<RenameResponse> {
    let new_name = non_empty(req.new_name, "Missing new collection name.")?;
    let source = NodePath::collection(&name)?;
    let report = state
        .tree(store.as_ref())
        .rename_collection(&source, &new_name)
        .await?;
    let source_deleted = report.removed.is_some();
    let mut failures = report.copy.failures;
    if let Some(removed) = report.removed {
        failures.extend(removed.failures);
    }
    let message = if source_deleted {
        format!("Collection '{name}' renamed to '{new_name}' by user {}", auth.user_id)
    } else {
        format!("Collection '{name}' copied to '{new_name}' by user {}; source kept after failures", auth.user_id)
    };
    Ok(Json(RenameResponse {
        message,
        docs_copied: report.copy.copied,
        source_deleted,
        failures,
    }))
}
