//! In-process stand-in for the cataloging backend.
//!
//! Every request is recorded; responses are canned per `METHOD /path`.

#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use libris::config::Config;
use libris::http::HttpClient;
use libris::{LibrisApi, MemorySessionStore, Session};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockBackend {
    pub url: String,
    state: MockState,
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    });

    if path == "/slow" {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }

    let key = format!("{} {}", method, path);
    let (status, text) = state
        .routes
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or((404, r#"{"error":"no such route"}"#.to_string()));
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        text,
    )
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.respond_raw(method, path, status, &body.to_string());
    }

    pub fn respond_raw(&self, method: &str, path: &str, status: u16, body: &str) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path), (status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("at least one request")
    }

    pub fn client(&self, store: Arc<MemorySessionStore>) -> HttpClient {
        let config = Config::new(&self.url).unwrap();
        HttpClient::new(&config, Session::new(store)).unwrap()
    }

    pub fn api(&self, store: Arc<MemorySessionStore>) -> LibrisApi {
        LibrisApi::new(self.client(store))
    }
}
