//! In-process mock of the GitLab REST v4 endpoints the crate calls.
//!
//! Each test builds a [`MockGitLab`] fixture, starts it on an ephemeral port,
//! and points the crate's config at it. The mock counts every request it
//! receives so tests can assert that nothing was sent.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use gitlab_multisearch::config::{parse_config, Config};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const TOKEN: &str = "test-token";

#[derive(Default, Clone)]
pub struct MockGitLab {
    /// Projects resolvable via `GET projects/:id`, keyed by id.
    pub projects: HashMap<u64, Value>,
    pub issues: HashMap<u64, Vec<Value>>,
    pub wikis: HashMap<u64, Vec<Value>>,
    pub notes: HashMap<(u64, u64), Vec<Value>>,
    /// Projects whose issues endpoint answers 403.
    pub forbidden_issues: HashSet<u64>,
    /// Issues whose notes endpoint answers 500.
    pub failing_notes: HashSet<(u64, u64)>,
    /// Pages served by `GET projects`, one project per page.
    pub listing_pages: u32,
    /// Host advertised in the listing's `next` link instead of the mock's own.
    pub listing_next_host: Option<String>,
}

struct MockState {
    data: MockGitLab,
    base_url: String,
    hits: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed_quick: AtomicUsize,
}

pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Highest number of `/held` requests being served at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Responses already sent by `/quick` and `/garbled`.
    pub fn completed_quick(&self) -> usize {
        self.state.completed_quick.load(Ordering::SeqCst)
    }

    /// Config pointing at this mock with the valid token.
    pub fn config(&self) -> Config {
        config_for(&self.base_url, TOKEN)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn config_for(base_url: &str, token: &str) -> Config {
    parse_config(&format!(
        r#"
[gitlab]
url = "{}"
token = "{}"

[http]
connect_timeout_secs = 2
timeout_secs = 5

[search]
concurrency = 3
notes_concurrency = 4
"#,
        base_url, token
    ))
    .unwrap()
}

pub fn project(base_url: &str, id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "name_with_namespace": format!("Group / {}", name),
        "path_with_namespace": format!("group/{}", name),
        "web_url": format!("{}/group/{}", base_url, name),
    })
}

pub fn issue(project_id: u64, iid: u64, title: &str, description: &str) -> Value {
    json!({
        "id": project_id * 1000 + iid,
        "iid": iid,
        "project_id": project_id,
        "title": title,
        "description": description,
        "state": "opened",
        "labels": ["triage"],
        "web_url": format!("https://gitlab.test/p{}/-/issues/{}", project_id, iid),
    })
}

pub fn note(id: u64, body: &str, system: bool) -> Value {
    json!({
        "id": id,
        "body": body,
        "system": system,
        "author": {"id": 1, "name": "Robin", "username": "robin"},
        "created_at": "2024-05-02T08:30:00.000Z",
    })
}

pub fn wiki_page(slug: &str, title: &str, content: &str) -> Value {
    json!({"slug": slug, "title": title, "format": "markdown", "content": content})
}

/// Start `data` on an ephemeral port. `build` gets the base URL so fixtures
/// can embed absolute links.
pub async fn start(build: impl FnOnce(&str) -> MockGitLab) -> MockServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let state = Arc::new(MockState {
        data: build(&base_url),
        base_url: base_url.clone(),
        hits: AtomicUsize::new(0),
        in_flight: AtomicUsize::new(0),
        peak_in_flight: AtomicUsize::new(0),
        completed_quick: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/api/v4/projects", get(list_projects))
        .route("/api/v4/projects/{id}", get(get_project))
        .route("/api/v4/projects/{id}/issues", get(list_issues))
        .route("/api/v4/projects/{id}/wikis", get(list_wikis))
        .route("/api/v4/projects/{id}/issues/{iid}/notes", get(list_notes))
        .route("/api/v4/held/{n}", get(held))
        .route("/api/v4/stalled", get(stalled))
        .route("/api/v4/quick", get(quick))
        .route("/api/v4/garbled", get(garbled))
        .with_state(state.clone());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    MockServer {
        base_url,
        state,
        handle,
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Counts the request and checks the token.
fn admit(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let token = headers.get("PRIVATE-TOKEN").and_then(|v| v.to_str().ok());
    if token != Some(TOKEN) {
        return Err(error(StatusCode::UNAUTHORIZED, "401 Unauthorized"));
    }
    Ok(())
}

async fn list_projects(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = admit(&state, &headers) {
        return resp;
    }
    let page: u32 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let body = json!([project(&state.base_url, page as u64, &format!("listed-{}", page))]);

    let mut response = Json(body).into_response();
    if page < state.data.listing_pages {
        let link = format!(
            "<{base}/api/v4/projects?page={next}&per_page=1>; rel=\"next\", <{base}/api/v4/projects?page=1&per_page=1>; rel=\"first\"",
            base = state
                .data
                .listing_next_host
                .as_deref()
                .unwrap_or(&state.base_url),
            next = page + 1
        );
        response
            .headers_mut()
            .insert(header::LINK, link.parse().unwrap());
    }
    response
}

async fn get_project(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(resp) = admit(&state, &headers) {
        return resp;
    }
    match state.data.projects.get(&id) {
        Some(p) => Json(p.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "404 Project Not Found"),
    }
}

async fn list_issues(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(resp) = admit(&state, &headers) {
        return resp;
    }
    if state.data.forbidden_issues.contains(&id) {
        return error(StatusCode::FORBIDDEN, "403 Forbidden");
    }
    // The real API pre-filters on `search`; returning everything checks that
    // callers re-filter locally.
    Json(Value::Array(state.data.issues.get(&id).cloned().unwrap_or_default())).into_response()
}

async fn list_wikis(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(resp) = admit(&state, &headers) {
        return resp;
    }
    Json(Value::Array(state.data.wikis.get(&id).cloned().unwrap_or_default())).into_response()
}

async fn list_notes(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path((id, iid)): Path<(u64, u64)>,
) -> Response {
    if let Err(resp) = admit(&state, &headers) {
        return resp;
    }
    if state.data.failing_notes.contains(&(id, iid)) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "<html><h1>500</h1></html>").into_response();
    }
    Json(Value::Array(
        state.data.notes.get(&(id, iid)).cloned().unwrap_or_default(),
    ))
    .into_response()
}

/// Holds the connection for 100ms while tracking concurrent requests.
async fn held(State(state): State<Arc<MockState>>, Path(n): Path<u64>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    Json(json!({ "n": n })).into_response()
}

/// Answers long after any client timeout used in the tests.
async fn stalled(State(state): State<Arc<MockState>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    Json(json!({ "late": true })).into_response()
}

async fn quick(State(state): State<Arc<MockState>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.completed_quick.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "quick": true })).into_response()
}

/// A 200 whose body is not JSON, like a proxy's login page.
async fn garbled(State(state): State<Arc<MockState>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.completed_quick.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, "<html>Sign in</html>").into_response()
}

pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}
