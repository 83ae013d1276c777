//! HTTP handlers for the lock service.
//!
//! Implements:
//! - GET|POST /canhaz/{path} (alias /lock) - Take a lock
//! - GET|POST /nowant/{path} (alias /unlock) - Release a lock
//! - GET|POST /dohaz/{path} (alias /status) - Who holds a path
//! - GET /locks - Every held lock
//! - GET /health - Health check endpoint
//!
//! Path segments come from the URL, options from the query string.

use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::Uri;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use locker_core::{
    HierarchicalLockStore, LockEntry, LockOutcome, PathKey, UnlockOutcome, ANONYMOUS_OWNER,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ServerError};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HierarchicalLockStore>,
}

/// Verbs and aliases that take a resource path.
const PATH_VERBS: [&str; 6] = ["canhaz", "lock", "nowant", "unlock", "dohaz", "status"];

/// Build the router for every lock verb and its alias.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/locks", get(list_handler))
        .route("/canhaz/{*path}", get(lock_handler).post(lock_handler))
        .route("/lock/{*path}", get(lock_handler).post(lock_handler))
        .route("/nowant/{*path}", get(unlock_handler).post(unlock_handler))
        .route("/unlock/{*path}", get(unlock_handler).post(unlock_handler))
        .route("/dohaz/{*path}", get(status_handler).post(status_handler))
        .route("/status/{*path}", get(status_handler).post(status_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub persistent: bool,
    pub locks: usize,
}

/// GET /health - Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        persistent: state.store.is_persistent(),
        locks: state.store.lock_count().await,
    })
}

/// Query parameters of the lock verb.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockParams {
    id: Option<String>,
    #[serde(alias = "lock_parents")]
    lock_parents: Option<String>,
    #[serde(alias = "lock_children")]
    lock_children: Option<String>,
}

/// Query parameters of the unlock verb.
#[derive(Debug, Default, Deserialize)]
pub struct UnlockParams {
    token: Option<String>,
}

/// Lock verb response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
}

impl From<LockOutcome> for LockResponse {
    fn from(outcome: LockOutcome) -> Self {
        match outcome {
            LockOutcome::Granted { token } => Self {
                ok: true,
                token: Some(token),
                locked_by: None,
            },
            LockOutcome::Denied { locked_by } => Self {
                ok: false,
                token: None,
                locked_by: Some(locked_by),
            },
        }
    }
}

/// Unlock verb response.
#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub ok: bool,
}

/// Status verb response. `lockedBy` is `null` for a free path.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub locked_by: Option<String>,
}

/// One entry of GET /locks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockView {
    pub path: PathKey,
    pub locked_by: String,
    pub lock_parents: bool,
    pub lock_children: bool,
    pub locked_at: DateTime<Utc>,
}

impl From<LockEntry> for LockView {
    fn from(entry: LockEntry) -> Self {
        Self {
            path: entry.path,
            locked_by: entry.owner_id,
            lock_parents: entry.lock_parents,
            lock_children: entry.lock_children,
            locked_at: entry.locked_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub locks: Vec<LockView>,
}

/// Turn the captured wildcard into a `PathKey`.
fn extract_path(path: std::result::Result<Path<String>, PathRejection>) -> Result<PathKey> {
    let Path(raw) = path.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    Ok(PathKey::parse(&raw)?)
}

fn extract_query<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

/// Parse a boolean query flag, falling back to `default` when absent.
fn parse_flag(name: &str, value: Option<&str>, default: bool) -> Result<bool> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ServerError::BadRequest(format!(
            "{} must be a boolean, got {:?}",
            name, value
        ))),
    }
}

/// GET|POST /canhaz/{path} - Take a lock.
pub async fn lock_handler(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<LockParams>, QueryRejection>,
) -> Result<Json<LockResponse>> {
    let path = extract_path(path)?;
    let params = extract_query(query)?;
    let lock_parents = parse_flag("lockParents", params.lock_parents.as_deref(), true)?;
    let lock_children = parse_flag("lockChildren", params.lock_children.as_deref(), true)?;
    let owner_id = match params.id {
        None => ANONYMOUS_OWNER.to_string(),
        Some(id) if id.is_empty() => {
            return Err(ServerError::BadRequest("id must not be empty".to_string()))
        }
        Some(id) => id,
    };

    let outcome = state
        .store
        .lock(&path, &owner_id, lock_parents, lock_children)
        .await?;

    match &outcome {
        LockOutcome::Granted { .. } => info!("Lock on {} granted to {}", path, owner_id),
        LockOutcome::Denied { locked_by } => {
            debug!("Lock on {} for {} refused, held by {}", path, owner_id, locked_by)
        }
    }

    Ok(Json(outcome.into()))
}

/// GET|POST /nowant/{path} - Release a lock.
pub async fn unlock_handler(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<UnlockParams>, QueryRejection>,
) -> Result<Json<UnlockResponse>> {
    let path = extract_path(path)?;
    let token = extract_query(query)?
        .token
        .ok_or_else(|| ServerError::BadRequest("token is required".to_string()))?;

    let outcome = state.store.unlock(&path, &token).await?;
    match outcome {
        UnlockOutcome::Released => info!("Lock on {} released", path),
        UnlockOutcome::Rejected(reason) => {
            debug!("Unlock of {} refused: {}", path, reason.as_str())
        }
    }

    Ok(Json(UnlockResponse {
        ok: outcome.is_released(),
    }))
}

/// GET|POST /dohaz/{path} - Who holds a path.
pub async fn status_handler(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<StatusResponse>> {
    let path = extract_path(path)?;
    Ok(Json(StatusResponse {
        locked_by: state.store.status(&path).await,
    }))
}

/// GET /locks - Every held lock, ordered by path.
pub async fn list_handler(State(state): State<AppState>) -> Json<ListResponse> {
    let locks = state.store.list().await.into_iter().map(Into::into).collect();
    Json(ListResponse { locks })
}

/// Unmatched requests. A verb with nothing after it (`/canhaz`, `/canhaz/`)
/// is a request without a path rather than an unknown route.
pub async fn fallback_handler(uri: Uri) -> ServerError {
    let route = uri.path().trim_matches('/');
    if PATH_VERBS.contains(&route) {
        ServerError::BadRequest("path must not be empty".to_string())
    } else {
        ServerError::NotFound(uri.path().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use locker_core::{FileSnapshotStore, MemorySnapshotStore};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn setup() -> (Router, Arc<HierarchicalLockStore>) {
        let store = Arc::new(HierarchicalLockStore::new(Arc::new(
            MemorySnapshotStore::new(),
        )));
        let app = router(AppState {
            store: store.clone(),
        });
        (app, store)
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: &Router, uri: &str) -> Value {
        let (status, body) = call(app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK, "{} -> {}", uri, body);
        body
    }

    #[tokio::test]
    async fn test_lock_conflict_and_release() {
        let (app, _) = setup();

        let first = get_json(&app, "/canhaz/proj/module?id=alice").await;
        assert_eq!(first["ok"], true);
        let token = first["token"].as_str().unwrap().to_string();
        assert!(first.get("lockedBy").is_none());

        let second = get_json(&app, "/canhaz/proj/module?id=bob").await;
        assert_eq!(second, json!({"ok": false, "lockedBy": "alice"}));

        let parent = get_json(&app, "/dohaz/proj").await;
        assert_eq!(parent, json!({"lockedBy": "alice"}));

        let wrong = get_json(&app, "/nowant/proj/module?token=WRONG").await;
        assert_eq!(wrong, json!({"ok": false}));
        assert_eq!(get_json(&app, "/dohaz/proj").await, json!({"lockedBy": "alice"}));

        let released = get_json(&app, &format!("/nowant/proj/module?token={}", token)).await;
        assert_eq!(released, json!({"ok": true}));
        assert_eq!(get_json(&app, "/dohaz/proj").await, json!({"lockedBy": null}));
    }

    #[tokio::test]
    async fn test_lock_children_flag() {
        let (app, _) = setup();

        assert_eq!(get_json(&app, "/canhaz/x?lockChildren=true&id=carol").await["ok"], true);
        let deep = get_json(&app, "/canhaz/x/y/z?id=dave").await;
        assert_eq!(deep, json!({"ok": false, "lockedBy": "carol"}));

        assert_eq!(get_json(&app, "/canhaz/w?lockChildren=false&id=carol").await["ok"], true);
        assert_eq!(get_json(&app, "/canhaz/w/y?id=dave").await["ok"], true);
    }

    #[tokio::test]
    async fn test_flags_off_and_aliases() {
        let (app, store) = setup();

        let lone = get_json(&app, "/lock/a/b/c?lock_parents=0&lock_children=no&id=alice").await;
        assert_eq!(lone["ok"], true);
        assert_eq!(get_json(&app, "/status/a/b").await, json!({"lockedBy": null}));
        assert_eq!(get_json(&app, "/lock/a/b").await["ok"], true);
        assert_eq!(get_json(&app, "/lock/a/b/c/d").await["ok"], false);
        assert_eq!(store.lock_count().await, 2);
    }

    #[tokio::test]
    async fn test_default_owner() {
        let (app, _) = setup();
        get_json(&app, "/canhaz/a").await;
        assert_eq!(get_json(&app, "/dohaz/a").await, json!({"lockedBy": "?"}));

        let (status, _) = call(&app, Method::GET, "/canhaz/b?id=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(get_json(&app, "/dohaz/b").await, json!({"lockedBy": null}));
    }

    #[tokio::test]
    async fn test_post_is_accepted() {
        let (app, _) = setup();
        let (status, body) = call(&app, Method::POST, "/canhaz/a?id=alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, status_body) = call(&app, Method::POST, "/dohaz/a").await;
        assert_eq!(status_body, json!({"lockedBy": "alice"}));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let (app, store) = setup();

        let (status, body) = call(&app, Method::GET, "/canhaz/a?lockParents=maybe").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        let (status, body) = call(&app, Method::GET, "/canhaz/a//b").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        let (status, body) = call(&app, Method::GET, "/canhaz/a?id=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        let (status, body) = call(&app, Method::GET, "/nowant/a").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        assert_eq!(store.lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_verb_without_path() {
        let (app, store) = setup();

        for uri in [
            "/canhaz",
            "/canhaz/",
            "/lock/?id=alice",
            "/dohaz/",
            "/status",
            "/nowant/?token=x",
            "/unlock/",
        ] {
            let (status, body) = call(&app, Method::GET, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["code"], "INVALID_INPUT", "{}", uri);
        }

        let (status, _) = call(&app, Method::POST, "/canhaz/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/nothing/here").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        assert_eq!(store.lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_and_health() {
        let (app, _) = setup();
        get_json(&app, "/canhaz/b?id=bob").await;
        get_json(&app, "/canhaz/a/x?id=alice&lockParents=false").await;

        let list = get_json(&app, "/locks").await;
        let locks = list["locks"].as_array().unwrap();
        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0]["path"], json!(["a", "x"]));
        assert_eq!(locks[0]["lockedBy"], "alice");
        assert_eq!(locks[0]["lockParents"], false);
        assert!(locks[0].get("token").is_none());
        assert!(locks[0]["lockedAt"].is_string());

        let health = get_json(&app, "/health").await;
        assert_eq!(health["healthy"], true);
        assert_eq!(health["locks"], 2);
        assert_eq!(health["persistent"], false);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported_and_rolled_back() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let snapshots = Arc::new(FileSnapshotStore::new(blocker.join("locks.db")));
        let app = router(AppState {
            store: Arc::new(HierarchicalLockStore::new(snapshots)),
        });

        let (status, body) = call(&app, Method::GET, "/canhaz/a/b?id=alice").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "PERSISTENCE_FAILURE");
        assert_eq!(get_json(&app, "/dohaz/a").await, json!({"lockedBy": null}));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("f", None, true).unwrap());
        assert!(!parse_flag("f", None, false).unwrap());
        assert!(parse_flag("f", Some("TRUE"), false).unwrap());
        assert!(parse_flag("f", Some("on"), false).unwrap());
        assert!(!parse_flag("f", Some("False"), true).unwrap());
        assert!(!parse_flag("f", Some("0"), true).unwrap());
        assert!(parse_flag("f", Some(""), true).is_err());
    }
}
