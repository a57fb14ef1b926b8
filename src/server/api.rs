//! HTTP surface of the document store.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /me`: The organization the API key belongs to
//! - `GET /collections/{collection}/documents`: All documents in a collection
//! - `GET|PUT|DELETE /collections/{collection}/documents/{id}`: One document

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{ServerStorage, ServerStorageError};

// ============================================================================
// Authentication
// ============================================================================

/// API key entry in the server config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub org_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Authenticated organization, added to request extensions after auth.
#[derive(Debug, Clone)]
pub struct AuthOrg {
    pub org_id: String,
}

/// Maps API key to organization.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, AuthOrg>,
}

impl ApiKeyStore {
    pub fn from_entries(entries: impl IntoIterator<Item = ApiKeyEntry>) -> Self {
        let keys = entries
            .into_iter()
            .map(|entry| (entry.key, AuthOrg { org_id: entry.org_id }))
            .collect();
        Self { keys }
    }

    /// Loads API keys from the YAML config file. A missing or broken file
    /// leaves the store empty so every authenticated request fails.
    pub fn load(config_path: &FsPath) -> Self {
        let store = match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(config) => Self::from_entries(config.api_keys),
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", config_path.display(), e);
                Self::default()
            }
        };
        if store.keys.is_empty() {
            tracing::warn!("No API keys loaded - all authenticated requests will fail");
        } else {
            tracing::info!("Loaded {} API key(s)", store.keys.len());
        }
        store
    }

    fn validate(&self, key: &str) -> Option<AuthOrg> {
        self.keys.get(key).cloned()
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct ServerState {
    pub api_keys: Arc<ApiKeyStore>,
    pub storage: ServerStorage,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

async fn auth_middleware(State(state): State<ServerState>, mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key.trim(),
            None => {
                return error_response(
                    StatusCode::UNAUTHORIZED,
                    "invalid_auth",
                    "Authorization header must use Bearer scheme",
                );
            }
        },
        None => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authorization header required",
            );
        }
    };

    match state.api_keys.validate(api_key) {
        Some(org) => {
            request.extensions_mut().insert(org);
            next.run(request).await
        }
        None => error_response(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

impl IntoResponse for ServerStorageError {
    fn into_response(self) -> Response {
        match &self {
            ServerStorageError::InvalidCollection(_) => {
                error_response(StatusCode::NOT_FOUND, "unknown_collection", self.to_string())
            }
            ServerStorageError::InvalidDocumentId(_) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_id", self.to_string())
            }
            ServerStorageError::InvalidOrganization(_) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_organization", self.to_string())
            }
            ServerStorageError::Io(_, _) | ServerStorageError::Json(_, _) => {
                tracing::error!("storage failure: {}", self);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "Document storage failed",
                )
            }
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct MeResponse {
    org_id: String,
}

async fn me(Extension(org): Extension<AuthOrg>) -> Json<MeResponse> {
    Json(MeResponse { org_id: org.org_id })
}

async fn list_documents(
    State(state): State<ServerState>,
    Extension(org): Extension<AuthOrg>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Value>>, ServerStorageError> {
    let documents = state.storage.list(&org.org_id, &collection).await?;
    Ok(Json(documents))
}

async fn get_document(
    State(state): State<ServerState>,
    Extension(org): Extension<AuthOrg>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Response, ServerStorageError> {
    match state.storage.get(&org.org_id, &collection, &id).await? {
        Some(document) => Ok(Json(document).into_response()),
        None => Ok(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No document '{}' in {}", id, collection),
        )),
    }
}

async fn put_document(
    State(state): State<ServerState>,
    Extension(org): Extension<AuthOrg>,
    Path((collection, id)): Path<(String, String)>,
    Json(document): Json<Value>,
) -> Result<Response, ServerStorageError> {
    let Some(fields) = document.as_object() else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_document",
            "Document must be a JSON object",
        ));
    };
    if let Some(body_id) = fields.get("id").and_then(Value::as_str) {
        if body_id != id {
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                "id_mismatch",
                format!("Body id '{}' does not match path id '{}'", body_id, id),
            ));
        }
    }
    state.storage.put(&org.org_id, &collection, &id, document).await?;
    tracing::debug!(org = %org.org_id, %collection, %id, "document stored");
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_document(
    State(state): State<ServerState>,
    Extension(org): Extension<AuthOrg>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Response, ServerStorageError> {
    if state.storage.delete(&org.org_id, &collection, &id).await? {
        tracing::debug!(org = %org.org_id, %collection, %id, "document deleted");
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No document '{}' in {}", id, collection),
        ))
    }
}

/// Builds the full router. `/health` is public; everything else goes
/// through API key auth.
pub fn router(state: ServerState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/me", get(me))
        .route("/collections/{collection}/documents", get(list_documents))
        .route(
            "/collections/{collection}/documents/{id}",
            get(get_document).put(put_document).delete(delete_document),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request as HttpRequest};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const KEY: &str = "north-key";

    fn app() -> (Router, TempDir) {
        let temp = TempDir::new().unwrap();
        let state = ServerState {
            api_keys: Arc::new(ApiKeyStore::from_entries(vec![
                ApiKeyEntry {
                    key: KEY.to_string(),
                    org_id: "north".to_string(),
                },
                ApiKeyEntry {
                    key: "south-key".to_string(),
                    org_id: "south".to_string(),
                },
            ])),
            storage: ServerStorage::new(temp.path()),
        };
        (router(state), temp)
    }

    fn request(method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let (app, _temp) = app();
        let response = app.oneshot(request(Method::GET, "/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_auth_failures_are_401_json() {
        let (app, _temp) = app();

        let missing = app
            .clone()
            .oneshot(request(Method::GET, "/me", None, None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(missing).await["error"], "missing_auth");

        let wrong = app
            .clone()
            .oneshot(request(Method::GET, "/me", Some("nope"), None))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(wrong).await["error"], "invalid_key");

        let basic = HttpRequest::builder()
            .uri("/collections/students/documents")
            .header(header::AUTHORIZATION, "Basic abc")
            .body(Body::empty())
            .unwrap();
        let basic = app.oneshot(basic).await.unwrap();
        assert_eq!(basic.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(basic).await["error"], "invalid_auth");
    }

    #[tokio::test]
    async fn test_me_returns_org() {
        let (app, _temp) = app();
        let response = app.oneshot(request(Method::GET, "/me", Some(KEY), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["org_id"], "north");
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let (app, _temp) = app();
        let uri = "/collections/invoices/documents/inv-1";
        let doc = json!({"id": "inv-1", "number": "INV-001"});

        let put = app
            .clone()
            .oneshot(request(Method::PUT, uri, Some(KEY), Some(doc.clone())))
            .await
            .unwrap();
        assert_eq!(put.status(), StatusCode::NO_CONTENT);

        let get = app.clone().oneshot(request(Method::GET, uri, Some(KEY), None)).await.unwrap();
        assert_eq!(get.status(), StatusCode::OK);
        assert_eq!(json_body(get).await, doc);

        let list = app
            .clone()
            .oneshot(request(Method::GET, "/collections/invoices/documents", Some(KEY), None))
            .await
            .unwrap();
        assert_eq!(json_body(list).await, json!([doc]));

        let delete = app
            .clone()
            .oneshot(request(Method::DELETE, uri, Some(KEY), None))
            .await
            .unwrap();
        assert_eq!(delete.status(), StatusCode::NO_CONTENT);

        let again = app
            .clone()
            .oneshot(request(Method::DELETE, uri, Some(KEY), None))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);

        let gone = app.oneshot(request(Method::GET, uri, Some(KEY), None)).await.unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_organizations_do_not_share_documents() {
        let (app, _temp) = app();
        app.clone()
            .oneshot(request(
                Method::PUT,
                "/collections/students/documents/s-1",
                Some(KEY),
                Some(json!({"id": "s-1"})),
            ))
            .await
            .unwrap();

        let south = app
            .oneshot(request(Method::GET, "/collections/students/documents", Some("south-key"), None))
            .await
            .unwrap();
        assert_eq!(json_body(south).await, json!([]));
    }

    #[tokio::test]
    async fn test_rejects_bad_documents_and_collections() {
        let (app, _temp) = app();

        let not_object = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/collections/students/documents/s-1",
                Some(KEY),
                Some(json!([1, 2])),
            ))
            .await
            .unwrap();
        assert_eq!(not_object.status(), StatusCode::BAD_REQUEST);

        let mismatch = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/collections/students/documents/s-1",
                Some(KEY),
                Some(json!({"id": "s-2"})),
            ))
            .await
            .unwrap();
        assert_eq!(json_body(mismatch).await["error"], "id_mismatch");

        let unknown = app
            .oneshot(request(Method::GET, "/collections/library_books/documents", Some(KEY), None))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(unknown).await["error"], "unknown_collection");
    }

    #[test]
    fn test_load_api_keys_from_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "api_keys:\n  - key: abc\n    org_id: school-a\n").unwrap();

        let store = ApiKeyStore::load(&path);
        assert_eq!(store.validate("abc").unwrap().org_id, "school-a");
        assert!(store.validate("xyz").is_none());

        let missing = ApiKeyStore::load(&temp.path().join("absent.yaml"));
        assert!(missing.validate("abc").is_none());
    }
}
