//! Loopback fakes for the HTTP collaborators.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// ===== PowerDNS =====

#[derive(Default)]
pub struct PdnsState {
    /// zone name -> (name, type) record sets
    pub zones: BTreeMap<String, Vec<(String, String)>>,
    pub created: Vec<Value>,
    pub patches: Vec<Value>,
}

pub type SharedPdns = Arc<Mutex<PdnsState>>;

pub fn pdns_router(state: SharedPdns) -> Router {
    Router::new()
        .route("/api/v1/servers/{server}/zones", post(create_zone))
        .route(
            "/api/v1/servers/{server}/zones/{zone}",
            get(get_zone).patch(patch_zone),
        )
        .with_state(state)
}

fn zone_json(name: &str, rrsets: &[(String, String)]) -> Value {
    json!({
        "id": name,
        "name": name,
        "type": "Zone",
        "kind": "Native",
        "rrsets": rrsets
            .iter()
            .map(|(rr_name, rrtype)| json!({
                "name": rr_name,
                "type": rrtype,
                "ttl": 3600,
                "records": [{"content": "placeholder", "disabled": false}],
                "comments": []
            }))
            .collect::<Vec<_>>()
    })
}

async fn get_zone(
    State(state): State<SharedPdns>,
    Path((_server, zone)): Path<(String, String)>,
) -> impl IntoResponse {
    let state = state.lock().unwrap();
    match state.zones.get(&zone) {
        Some(rrsets) => (StatusCode::OK, Json(zone_json(&zone, rrsets))).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "Not Found"}))).into_response(),
    }
}

async fn create_zone(
    State(state): State<SharedPdns>,
    Path(_server): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    if state.zones.contains_key(&name) {
        return (StatusCode::CONFLICT, Json(json!({"error": "Conflict"}))).into_response();
    }
    let rrsets = vec![
        (name.clone(), "SOA".to_string()),
        (name.clone(), "NS".to_string()),
    ];
    let response = zone_json(&name, &rrsets);
    state.zones.insert(name, rrsets);
    state.created.push(body);
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn patch_zone(
    State(state): State<SharedPdns>,
    Path((_server, zone)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    let deletions: Vec<(String, String)> = body["rrsets"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|rr| rr["changetype"] == "DELETE")
        .map(|rr| {
            (
                rr["name"].as_str().unwrap_or_default().to_string(),
                rr["type"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let Some(rrsets) = state.zones.get_mut(&zone) else {
        return StatusCode::NOT_FOUND;
    };
    rrsets.retain(|rr| !deletions.contains(rr));
    state.patches.push(body);
    StatusCode::NO_CONTENT
}

// ===== GitHub =====

#[derive(Default)]
pub struct GitHubState {
    pub dispatches: Vec<(String, Value)>,
    pub authorizations: Vec<String>,
    pub reject: bool,
}

pub type SharedGitHub = Arc<Mutex<GitHubState>>;

pub fn github_router(state: SharedGitHub) -> Router {
    Router::new()
        .route("/repos/{owner}/{name}/dispatches", post(dispatch))
        .with_state(state)
}

async fn dispatch(
    State(state): State<SharedGitHub>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.authorizations.push(auth.to_string());
    }
    if state.reject {
        return StatusCode::UNAUTHORIZED;
    }
    state.dispatches.push((format!("{owner}/{name}"), body));
    StatusCode::NO_CONTENT
}

// ===== Container credentials =====

pub struct CredentialsState {
    pub expiration: String,
    pub hits: usize,
    pub authorizations: Vec<String>,
}

pub type SharedCredentials = Arc<Mutex<CredentialsState>>;

pub fn credentials_router(state: SharedCredentials) -> Router {
    Router::new()
        .route("/v2/credentials/{id}", get(task_credentials))
        .with_state(state)
}

async fn task_credentials(
    State(state): State<SharedCredentials>,
    headers: HeaderMap,
) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.hits += 1;
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.authorizations.push(auth.to_string());
    }
    Json(json!({
        "AccessKeyId": format!("ASIA{}", state.hits),
        "SecretAccessKey": "secret",
        "Token": format!("session-{}", state.hits),
        "Expiration": state.expiration,
        "RoleArn": "arn:aws:iam::123456789012:role/worker"
    }))
}
