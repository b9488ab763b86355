#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ekascribe_lib::clients::{ClientConfig, Credentials, EkaClient};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "good-secret";
pub const TRANSACTION_ID: &str = "txn123";
pub const FOLDER_PATH: &str = "/txn123/";

/// `{"transcript":"Patient reports mild fever."}`
pub const TRANSCRIPT_B64: &str = "eyJ0cmFuc2NyaXB0IjoiUGF0aWVudCByZXBvcnRzIG1pbGQgZmV2ZXIuIn0=";
/// `{"a":1}`
pub const SUMMARY_B64: &str = "eyJhIjoxfQ==";

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub field_names: Vec<String>,
    pub key: Option<String>,
    pub file_name: Option<String>,
    pub size: usize,
    pub had_authorization: bool,
}

#[derive(Debug, Clone)]
pub struct RecordedRefresh {
    pub authorization: Option<String>,
    pub client_id: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct MockState {
    pub base_url: String,
    /// Status call on which every output turns terminal
    pub complete_on_poll: u32,
    pub login_bodies: Mutex<Vec<Value>>,
    pub refreshes: Mutex<Vec<RecordedRefresh>>,
    pub negotiations: AtomicU32,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub inits: Mutex<Vec<(String, Value)>>,
    pub status_calls: AtomicU32,
    /// Fired once storage starts receiving `slow.mp3`, which never finishes
    pub upload_cancel: CancellationToken,
}

impl MockState {
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn inits(&self) -> Vec<(String, Value)> {
        self.inits.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

/// Mock EkaScribe API and storage bucket on a random local port
pub struct MockService {
    pub base_url: String,
    pub state: Arc<MockState>,
    shutdown_tx: oneshot::Sender<()>,
}

impl MockService {
    pub async fn start() -> Self {
        Self::start_with(3).await
    }

    pub async fn start_with(complete_on_poll: u32) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let state = Arc::new(MockState {
            base_url: base_url.clone(),
            complete_on_poll,
            ..Default::default()
        });

        let app = Router::new()
            .route("/connect-auth/v1/account/login", post(login))
            .route("/connect-auth/v1/account/refresh-token", post(refresh))
            .route("/v1/file-upload", post(negotiate))
            .route("/storage", post(storage))
            .route("/voice/api/v2/transaction/init/{txn}", post(init))
            .route("/voice/api/v3/status/{txn}", get(status))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        Self {
            base_url,
            state,
            shutdown_tx,
        }
    }

    pub fn client(&self) -> EkaClient {
        self.client_with_secret(CLIENT_SECRET)
    }

    pub fn client_with_secret(&self, secret: &str) -> EkaClient {
        let config = ClientConfig {
            base_url: self.base_url.clone(),
            ..Default::default()
        };
        EkaClient::new(config, Credentials::new(CLIENT_ID, secret)).unwrap()
    }

    pub fn shutdown(self) {
        self.shutdown_tx.send(()).ok();
    }
}

/// Write fake audio files into `dir`
pub fn audio_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, format!("fake audio for {}", name)).unwrap();
            path
        })
        .collect()
}

fn token(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_expires_in": 86400
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn unauthorized_token(headers: &HeaderMap) -> Option<Response> {
    match bearer(headers).as_deref() {
        Some("Bearer expired") => Some(
            (StatusCode::UNAUTHORIZED, r#"{"error":"token expired"}"#).into_response(),
        ),
        Some(_) => None,
        None => Some((StatusCode::UNAUTHORIZED, r#"{"error":"missing token"}"#).into_response()),
    }
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.login_bodies.lock().unwrap().push(body.clone());

    if body["client_id"] == CLIENT_ID && body["client_secret"] == CLIENT_SECRET {
        Json(token("access-1", "refresh-1")).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#).into_response()
    }
}

async fn refresh(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.refreshes.lock().unwrap().push(RecordedRefresh {
        authorization: bearer(&headers),
        client_id: headers
            .get("client-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    if body["refresh_token"] == "refresh-1" {
        Json(token("access-2", "refresh-2")).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, r#"{"error":"invalid refresh token"}"#).into_response()
    }
}

async fn negotiate(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.negotiations.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = unauthorized_token(&headers) {
        return rejection;
    }

    match query.get("action").map(String::as_str) {
        Some("forbidden") => (StatusCode::FORBIDDEN, "action not allowed").into_response(),
        // Descriptor without an upload url
        Some("broken") => Json(json!({
            "uploadData": { "fields": {} },
            "folderPath": FOLDER_PATH,
            "txn_id": TRANSACTION_ID
        }))
        .into_response(),
        Some(_) => Json(json!({
            "uploadData": {
                "url": format!("{}/storage", state.base_url),
                "fields": {
                    "key": "stale/${filename}",
                    "policy": "cG9saWN5",
                    "x-amz-algorithm": "AWS4-HMAC-SHA256",
                    "x-amz-signature": "c2lnbmF0dXJl"
                }
            },
            "folderPath": FOLDER_PATH,
            "txn_id": TRANSACTION_ID
        }))
        .into_response(),
        None => (StatusCode::BAD_REQUEST, "missing action").into_response(),
    }
}

async fn storage(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut upload = RecordedUpload {
        field_names: Vec::new(),
        key: None,
        file_name: None,
        size: 0,
        had_authorization: headers.contains_key(header::AUTHORIZATION),
    };

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap();

        match name.as_str() {
            "key" => upload.key = Some(String::from_utf8_lossy(&data).to_string()),
            "file" => {
                upload.file_name = file_name;
                upload.size = data.len();
            }
            _ => {}
        }
        upload.field_names.push(name);
    }

    if upload.file_name.as_deref() == Some("slow.mp3") {
        state.upload_cancel.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
    }

    let rejected = upload.file_name.as_deref() == Some("reject.mp3");
    state.uploads.lock().unwrap().push(upload);

    if rejected {
        (StatusCode::FORBIDDEN, "<Error><Code>AccessDenied</Code></Error>").into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn init(
    State(state): State<Arc<MockState>>,
    UrlPath(txn): UrlPath<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejection) = unauthorized_token(&headers) {
        return rejection;
    }
    state.inits.lock().unwrap().push((txn.clone(), body));

    if txn == "rejected-txn" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"unknown output template"}"#,
        )
            .into_response();
    }

    Json(json!({
        "status": "success",
        "message": "Transaction initialized",
        "txn_id": txn,
        "b_id": "batch-1"
    }))
    .into_response()
}

async fn status(
    State(state): State<Arc<MockState>>,
    UrlPath(_txn): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = unauthorized_token(&headers) {
        return rejection;
    }
    let call = state.status_calls.fetch_add(1, Ordering::SeqCst) + 1;

    if call < state.complete_on_poll {
        return Json(json!({
            "data": {
                "output": [
                    { "template_id": "transcript_template", "type": "json", "name": "Transcript", "status": "in-progress" },
                    { "template_id": "summary_template", "type": "json", "name": "Summary", "status": "success", "value": SUMMARY_B64 }
                ]
            }
        }))
        .into_response();
    }

    Json(json!({
        "data": {
            "output": [
                {
                    "template_id": "transcript_template",
                    "type": "json",
                    "name": "Transcript",
                    "status": "success",
                    "value": TRANSCRIPT_B64,
                    "errors": [],
                    "warnings": [{ "code": "low_volume", "msg": "Audio volume is low" }]
                },
                {
                    "template_id": "summary_template",
                    "type": "json",
                    "name": "Summary",
                    "status": "SUCCESS",
                    "value": SUMMARY_B64,
                    "errors": null,
                    "warnings": null
                }
            ],
            "additional_data": { "doctor": { "id": "d-1" } }
        }
    }))
    .into_response()
}
