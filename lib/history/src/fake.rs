//! In-process stand-in for the history service.
//!
//! Documents come back with the storage metadata the real service adds, so
//! callers exercise metadata stripping on every read.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Default)]
pub struct Records {
    pub chats: HashMap<String, Value>,
    pub bots: Vec<Value>,
    /// Requests received, as `METHOD /path`.
    pub requests: Vec<String>,
}

impl Records {
    pub fn count(&self, request: &str) -> usize {
        self.requests.iter().filter(|r| r.as_str() == request).count()
    }
}

pub type Shared = Arc<Mutex<Records>>;

/// Starts the service on a local port, returning its base URL.
pub async fn spawn() -> (String, Shared) {
    let records = Shared::default();
    let router = Router::new()
        .route("/chats/", post(create_chat))
        .route(
            "/chats/{id}",
            get(get_chat).patch(update_chat).delete(delete_chat),
        )
        .route("/bots", get(list_bots))
        .route("/bots/", post(create_bot))
        .with_state(records.clone());
    (serve(router).await, records)
}

/// A service answering every request with `status` and `body`.
pub async fn failing(status: StatusCode, body: &'static str) -> String {
    serve(Router::new().fallback(move || async move { (status, body) })).await
}

/// Base URL of a port nothing listens on.
pub async fn unreachable() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move { axum::serve(listener, router).await.expect("serve") });
    format!("http://{addr}")
}

fn with_metadata(mut doc: Value) -> Value {
    if let Value::Object(map) = &mut doc {
        map.insert("_id".into(), json!("65f0c0ffee"));
        map.insert("__v".into(), json!(0));
        map.insert("createdAt".into(), json!("2024-03-01T00:00:00.000Z"));
        map.insert("updatedAt".into(), json!("2024-03-01T00:00:00.000Z"));
        if let Some(Value::Array(turns)) = map.get_mut("history") {
            for turn in turns.iter_mut() {
                if let Value::Object(turn) = turn {
                    turn.insert("_id".into(), json!("t1"));
                }
            }
        }
    }
    doc
}

async fn create_chat(State(records): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut records = records.lock().expect("lock");
    records.requests.push("POST /chats/".into());
    let id = body["id"].as_str().unwrap_or_default().to_string();
    records.chats.insert(id, with_metadata(body));
    StatusCode::CREATED.into_response()
}

async fn get_chat(State(records): State<Shared>, Path(id): Path<String>) -> Response {
    let mut records = records.lock().expect("lock");
    records.requests.push(format!("GET /chats/{id}"));
    match records.chats.get(&id) {
        Some(doc) => Json(doc.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_chat(
    State(records): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut records = records.lock().expect("lock");
    records.requests.push(format!("PATCH /chats/{id}"));
    let Some(doc) = records.chats.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    doc["history"] = body["history"].clone();
    *doc = with_metadata(doc.take());
    StatusCode::OK.into_response()
}

async fn delete_chat(State(records): State<Shared>, Path(id): Path<String>) -> Response {
    let mut records = records.lock().expect("lock");
    records.requests.push(format!("DELETE /chats/{id}"));
    match records.chats.remove(&id) {
        Some(_) => StatusCode::OK.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_bots(State(records): State<Shared>) -> Response {
    let mut records = records.lock().expect("lock");
    records.requests.push("GET /bots".into());
    Json(Value::Array(records.bots.clone())).into_response()
}

async fn create_bot(State(records): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut records = records.lock().expect("lock");
    records.requests.push("POST /bots/".into());
    records.bots.push(with_metadata(body));
    StatusCode::CREATED.into_response()
}
