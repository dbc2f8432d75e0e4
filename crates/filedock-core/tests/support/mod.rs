//! In-process stand-in for the storage server, bound to an ephemeral port.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub owner: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct Backend {
    pub users: HashMap<String, String>,
    pub files: BTreeMap<String, StoredFile>,
    pub hits: HashMap<&'static str, usize>,
    pub last_form_token: Option<String>,
    pub last_search: Option<String>,
    pub quirks: Quirks,
    next_hash: u64,
}

/// Misbehaviours a real server has been seen to produce with a 2xx status.
#[derive(Debug, Default, Clone, Copy)]
pub struct Quirks {
    /// register/login answer `{}`.
    pub omit_token: bool,
    /// upload answers `"file_hash": ""`.
    pub blank_upload_hash: bool,
    /// delete/update answer 200 `{"success": false}`.
    pub soft_reject: bool,
}

impl Backend {
    fn hit(&mut self, endpoint: &'static str) {
        *self.hits.entry(endpoint).or_default() += 1;
    }

    fn owner(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers.get("X-Auth-Token")?.to_str().ok()?;
        let user = token.strip_prefix("tok-")?;
        self.users.contains_key(user).then(|| user.to_string())
    }
}

type Shared = Arc<Mutex<Backend>>;

pub struct MockStorageServer {
    address: String,
    backend: Shared,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockStorageServer {
    pub async fn start() -> Self {
        let backend: Shared = Arc::new(Mutex::new(Backend::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock storage listener");
        let addr = listener.local_addr().expect("listener addr lookup");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = Router::new()
            .route("/api/register", post(register))
            .route("/api/login", post(login))
            .route("/api/upload", post(upload))
            .route("/api/download/:hash", get(download))
            .route("/api/delete/:hash", delete(remove))
            .route("/api/update/:hash", put(update))
            .route("/api/search", get(search))
            .route("/api/list", get(list))
            .with_state(backend.clone());

        tokio::spawn(async move {
            let server = axum::serve(listener, app);
            let graceful = server.with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            let _ = graceful.await;
        });

        Self {
            address: format!("http://{}", addr),
            backend,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn hits(&self, endpoint: &str) -> usize {
        self.backend.lock().hits.get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.backend.lock().hits.values().sum()
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.backend
            .lock()
            .users
            .insert(username.to_string(), password.to_string());
    }

    pub fn add_file(&self, owner: &str, hash: &str, name: &str, data: &[u8]) {
        self.backend.lock().files.insert(
            hash.to_string(),
            StoredFile {
                owner: owner.to_string(),
                file_name: name.to_string(),
                data: data.to_vec(),
            },
        );
    }

    pub fn file(&self, hash: &str) -> Option<StoredFile> {
        self.backend.lock().files.get(hash).cloned()
    }

    pub fn last_form_token(&self) -> Option<String> {
        self.backend.lock().last_form_token.clone()
    }

    pub fn last_search(&self) -> Option<String> {
        self.backend.lock().last_search.clone()
    }

    pub fn set_quirks(&self, quirks: Quirks) {
        self.backend.lock().quirks = quirks;
    }
}

impl Drop for MockStorageServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn register(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut b = backend.lock();
    b.hit("register");
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    if b.users.contains_key(&username) {
        return error(StatusCode::CONFLICT, "User already exists");
    }
    b.users.insert(username.clone(), password);
    if b.quirks.omit_token {
        return (StatusCode::CREATED, Json(json!({}))).into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({ "token": format!("tok-{username}") })),
    )
        .into_response()
}

async fn login(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut b = backend.lock();
    b.hit("login");
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match b.users.get(username) {
        Some(_) if b.quirks.omit_token => Json(json!({})).into_response(),
        Some(stored) if stored == password => {
            Json(json!({ "token": format!("tok-{username}") })).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

struct Form {
    file: Option<(String, Vec<u8>)>,
    token: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Form {
    let mut form = Form {
        file: None,
        token: None,
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("unnamed").to_string();
                let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                form.file = Some((name, data));
            }
            Some("token") => form.token = field.text().await.ok(),
            _ => {}
        }
    }
    form
}

async fn upload(
    State(backend): State<Shared>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let form = read_form(multipart).await;
    let mut b = backend.lock();
    b.hit("upload");
    b.last_form_token = form.token;
    let Some(owner) = b.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "User ID required");
    };
    let Some((file_name, data)) = form.file else {
        return error(StatusCode::BAD_REQUEST, "No file provided");
    };
    b.next_hash += 1;
    let hash = format!("{:064x}", b.next_hash);
    b.files.insert(
        hash.clone(),
        StoredFile {
            owner,
            file_name: file_name.clone(),
            data,
        },
    );
    let reported = if b.quirks.blank_upload_hash {
        String::new()
    } else {
        hash
    };
    (
        StatusCode::CREATED,
        Json(json!({ "file_hash": reported, "file_name": file_name })),
    )
        .into_response()
}

async fn download(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Response {
    let mut b = backend.lock();
    b.hit("download");
    let Some(owner) = b.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "User ID required");
    };
    match b.files.get(&hash) {
        Some(f) if f.owner == owner => Json(json!({
            "file_hash": hash,
            "file_name": f.file_name,
            "data": String::from_utf8_lossy(&f.data),
        }))
        .into_response(),
        _ => error(StatusCode::NOT_FOUND, "File not found"),
    }
}

async fn remove(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Response {
    let mut b = backend.lock();
    b.hit("delete");
    let Some(owner) = b.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "User ID required");
    };
    if b.quirks.soft_reject {
        return Json(json!({ "success": false })).into_response();
    }
    let owned = b.files.get(&hash).map(|f| f.owner == owner).unwrap_or(false);
    if owned {
        b.files.remove(&hash);
        Json(json!({ "success": true })).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "success": false }))).into_response()
    }
}

async fn update(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(hash): Path<String>,
    multipart: Multipart,
) -> Response {
    let form = read_form(multipart).await;
    let mut b = backend.lock();
    b.hit("update");
    b.last_form_token = form.token;
    let Some(owner) = b.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "User ID required");
    };
    let Some((_, data)) = form.file else {
        return error(StatusCode::BAD_REQUEST, "No file provided");
    };
    if b.quirks.soft_reject {
        return Json(json!({ "success": false })).into_response();
    }
    match b.files.get_mut(&hash) {
        Some(f) if f.owner == owner => {
            f.data = data;
            Json(json!({ "success": true })).into_response()
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({ "success": false }))).into_response(),
    }
}

fn entries<'a>(files: impl Iterator<Item = (&'a String, &'a StoredFile)>) -> Value {
    Value::Array(
        files
            .map(|(hash, f)| json!({ "file_hash": hash, "file_name": f.file_name }))
            .collect(),
    )
}

async fn search(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut b = backend.lock();
    b.hit("search");
    let query = params.get("query").cloned().unwrap_or_default();
    b.last_search = Some(query.clone());
    let Some(owner) = b.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "User ID required");
    };
    let found = entries(
        b.files
            .iter()
            .filter(|(_, f)| f.owner == owner && f.file_name.contains(&query)),
    );
    Json(found).into_response()
}

async fn list(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let mut b = backend.lock();
    b.hit("list");
    let Some(owner) = b.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "User ID required");
    };
    Json(entries(b.files.iter().filter(|(_, f)| f.owner == owner))).into_response()
}
