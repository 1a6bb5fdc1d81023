//! HTTP API server.
//!
//! Every client works in its own session: a private document index, a
//! document QA transcript and a chatbot. Requests within one session are
//! serialized; separate sessions proceed independently.

use crate::chatbot::{ChatTurn, ChatbotSession, RetrievedAnswer};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::ParleyError;
use crate::orchestrator::{DocumentIndex, IngestReport, Orchestrator, UploadedFile};
use crate::rag::RagResponse;
use crate::vector_store::IndexedSource;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// One client's private state.
struct Session {
    documents: Option<DocumentIndex>,
    document_history: Vec<ChatTurn>,
    chatbot: ChatbotSession,
}

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl AppState {
    fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn create_session(&self) -> Result<Uuid, ParleyError> {
        let session = Session {
            documents: None,
            document_history: Vec::new(),
            chatbot: self.orchestrator.chatbot_session()?,
        };

        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Arc::new(Mutex::new(session)));
        info!("Created session {}", id);
        Ok(id)
    }

    async fn session(&self, id: &str) -> Result<Arc<Mutex<Session>>, ParleyError> {
        let not_found = || ParleyError::SessionNotFound(id.to_string());
        let id = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.sessions.read().await.get(&id).cloned().ok_or_else(not_found)
    }

    /// Remove a session. Its document index directory is deleted with it.
    async fn remove_session(&self, id: &str) -> Result<(), ParleyError> {
        let not_found = || ParleyError::SessionNotFound(id.to_string());
        let id = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.sessions.write().await.remove(&id).map(|_| ()).ok_or_else(not_found)?;
        info!("Removed session {}", id);
        Ok(())
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve) {
        Output::error(&format!("{}", e));
        Output::info("Run 'parley doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let max_upload_bytes = settings.server.max_upload_bytes;
    let state = Arc::new(AppState::new(Orchestrator::new(settings)?));
    let app = router(state, max_upload_bytes);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Parley API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Sessions", "POST   /sessions, DELETE /sessions/{id}");
    Output::kv("Documents", "POST|GET|DELETE /sessions/{id}/documents");
    Output::kv("Ask documents", "POST   /sessions/{id}/documents/ask");
    Output::kv("Chat log", "POST|DELETE /sessions/{id}/chatbot/log");
    Output::kv("Chatbot target", "POST   /sessions/{id}/chatbot/target");
    Output::kv("Chatbot message", "POST   /sessions/{id}/chatbot/messages");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", axum::routing::delete(delete_session))
        .route(
            "/sessions/{id}/documents",
            post(upload_documents).get(list_documents).delete(delete_documents),
        )
        .route("/sessions/{id}/documents/ask", post(ask_documents))
        .route("/sessions/{id}/documents/history", get(document_history))
        .route("/sessions/{id}/chatbot/log", post(upload_log).delete(delete_log))
        .route("/sessions/{id}/chatbot/target", post(select_target))
        .route("/sessions/{id}/chatbot/messages", post(chatbot_message))
        .route("/sessions/{id}/chatbot/history", get(chatbot_history))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Errors ===

/// A library error rendered as `{ "error": ... }` with a matching status.
struct ApiError(ParleyError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ParleyError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ParleyError::InvalidInput(_) | ParleyError::UnsupportedFormat(_) | ParleyError::Loader(_) => {
                StatusCode::BAD_REQUEST
            }
            ParleyError::EmptyCorpus(_) => StatusCode::CONFLICT,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ParleyError> for ApiError {
    fn from(e: ParleyError) -> Self {
        Self(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self(ParleyError::InvalidInput(format!("invalid upload: {}", e)))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// === Request/Response Types ===

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<IndexedSource>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct LogResponse {
    file_name: String,
    speakers: Vec<String>,
    records: usize,
}

#[derive(Deserialize)]
struct TargetRequest {
    speaker: String,
}

#[derive(Serialize)]
struct TargetResponse {
    speaker: String,
    pairs_indexed: usize,
}

#[derive(Deserialize)]
struct MessageRequest {
    message: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_session(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let session_id = state.create_session().await?;
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.remove_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_documents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<IngestReport>> {
    let session = state.session(&id).await?;
    let files = read_files(multipart).await?;
    if files.is_empty() {
        return Err(ParleyError::InvalidInput("no files in upload".to_string()).into());
    }

    let mut session = session.lock().await;
    if session.documents.is_none() {
        session.documents = Some(state.orchestrator.create_index()?);
    }
    let index = session
        .documents
        .as_ref()
        .ok_or_else(|| ParleyError::VectorStore("document index unavailable".to_string()))?;

    let report = state.orchestrator.ingest(index, files).await?;
    Ok(Json(report))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SourcesResponse>> {
    let session = state.session(&id).await?;
    let session = session.lock().await;

    let sources = match &session.documents {
        Some(index) => index.sources().await?,
        None => Vec::new(),
    };
    Ok(Json(SourcesResponse { sources }))
}

async fn delete_documents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;
    session.documents = None;
    session.document_history.clear();
    Ok(StatusCode::NO_CONTENT)
}

async fn ask_documents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> ApiResult<Json<RagResponse>> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;

    let index = session
        .documents
        .as_ref()
        .ok_or_else(|| ParleyError::EmptyCorpus("no documents have been uploaded".to_string()))?;

    let response = state.orchestrator.rag_engine(index).ask(&req.question).await?;
    session.document_history.push(ChatTurn {
        user: req.question.trim().to_string(),
        bot: response.answer.clone(),
    });
    Ok(Json(response))
}

async fn document_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ChatTurn>>> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(Json(session.document_history.clone()))
}

async fn upload_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<LogResponse>> {
    let session = state.session(&id).await?;
    let mut files = read_files(multipart).await?;
    if files.len() != 1 {
        return Err(ParleyError::InvalidInput(format!(
            "expected exactly one chat log, got {} files",
            files.len()
        ))
        .into());
    }
    let UploadedFile { name, bytes } = files.remove(0);

    let mut session = session.lock().await;
    let log = session.chatbot.load_log(&name, &bytes)?;
    Ok(Json(LogResponse {
        file_name: log.file_name.clone(),
        speakers: log.speakers.clone(),
        records: log.records.len(),
    }))
}

async fn delete_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.session(&id).await?;
    session.lock().await.chatbot.reset();
    Ok(StatusCode::NO_CONTENT)
}

async fn select_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TargetRequest>,
) -> ApiResult<Json<TargetResponse>> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;

    let embedder = state.orchestrator.embedder();
    let index = session.chatbot.select_target(&req.speaker, embedder.as_ref()).await?;
    Ok(Json(TargetResponse {
        speaker: req.speaker,
        pairs_indexed: index.len(),
    }))
}

async fn chatbot_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<Json<RetrievedAnswer>> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;

    let embedder = state.orchestrator.embedder();
    let answer = session.chatbot.ask(&req.message, embedder.as_ref()).await?;
    Ok(Json(answer))
}

async fn chatbot_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ChatTurn>>> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(Json(session.chatbot.transcript().to_vec()))
}

/// Collect every file field of a multipart body. Fields without a file name are ignored.
async fn read_files(mut multipart: Multipart) -> ApiResult<Vec<UploadedFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::embedding::testing::FakeEmbedder;
    use crate::rag::testing::FakeGenerator;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(dir: &std::path::Path) -> AppState {
        let mut settings = Settings::default();
        settings.general.temp_dir = dir.to_string_lossy().to_string();
        settings.vector_store.provider = "memory".to_string();

        AppState::new(Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(FakeEmbedder::new()),
            Arc::new(FakeGenerator::replying("ok")),
        ))
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: ParleyError| ApiError(e).status();
        assert_eq!(status(ParleyError::SessionNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(ParleyError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(ParleyError::UnsupportedFormat("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(ParleyError::EmptyCorpus("x".into())), StatusCode::CONFLICT);
        assert_eq!(status(ParleyError::OpenAI("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(ParleyError::Embedding("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(ParleyError::VectorStore("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        tokio_test::block_on(async {
            let id = state.create_session().await.unwrap();
            assert!(state.session(&id.to_string()).await.is_ok());

            state.remove_session(&id.to_string()).await.unwrap();
            assert!(matches!(
                state.session(&id.to_string()).await,
                Err(ParleyError::SessionNotFound(_))
            ));
            assert!(matches!(
                state.remove_session(&id.to_string()).await,
                Err(ParleyError::SessionNotFound(_))
            ));
        });
    }

    #[test]
    fn test_malformed_session_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let result = tokio_test::block_on(state.session("not-a-uuid"));
        assert!(matches!(result, Err(ParleyError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let a = state.create_session().await.unwrap().to_string();
        let b = state.create_session().await.unwrap().to_string();

        {
            let session = state.session(&a).await.unwrap();
            let mut session = session.lock().await;
            session
                .chatbot
                .load_log("log.txt", b"h\nh\nh\n[Kim] [1] hi\n[Lee] [2] hey\n")
                .unwrap();
        }

        let session_b = state.session(&b).await.unwrap();
        assert!(session_b.lock().await.chatbot.log().is_none());
        let session_a = state.session(&a).await.unwrap();
        assert_eq!(session_a.lock().await.chatbot.speakers().len(), 2);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let dir = tempfile::tempdir().unwrap();
        let _router = router(Arc::new(state(dir.path())), 1024);
    }

    const BOUNDARY: &str = "parley-test-boundary";
    const LOG: &str = "Chat export\nSaved\n\n[A] [1] opener\n[B] [2] how are you\n[C] [3] fine thanks\n";

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_file(uri: &str, file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: text/plain\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn new_session(app: &Router) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_chatbot_flow() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(Arc::new(state(dir.path())), 1 << 20);
        let id = new_session(&app).await;

        let (status, body) = send(&app, post_file(&format!("/sessions/{}/chatbot/log", id), "chat.txt", LOG)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["speakers"], serde_json::json!(["A", "B", "C"]));
        assert_eq!(body["records"], 3);

        let target = format!("/sessions/{}/chatbot/target", id);
        let (status, body) = send(&app, post_json(&target, serde_json::json!({ "speaker": "C" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pairs_indexed"], 1);

        let messages = format!("/sessions/{}/chatbot/messages", id);
        let (status, body) = send(&app, post_json(&messages, serde_json::json!({ "message": "how are you" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "fine thanks");
        assert_eq!(body["question"], "how are you");

        let (status, body) = send(&app, get_request(&format!("/sessions/{}/chatbot/history", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_target_without_pairs_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(Arc::new(state(dir.path())), 1 << 20);
        let id = new_session(&app).await;

        send(&app, post_file(&format!("/sessions/{}/chatbot/log", id), "chat.txt", LOG)).await;

        let target = format!("/sessions/{}/chatbot/target", id);
        send(&app, post_json(&target, serde_json::json!({ "speaker": "C" }))).await;
        let (status, body) = send(&app, post_json(&target, serde_json::json!({ "speaker": "A" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());

        let messages = format!("/sessions/{}/chatbot/messages", id);
        let (status, _) = send(&app, post_json(&messages, serde_json::json!({ "message": "hello" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_document_upload_and_ask() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(Arc::new(state(dir.path())), 1 << 20);
        let id = new_session(&app).await;

        let documents = format!("/sessions/{}/documents", id);
        let (status, body) = send(&app, post_file(&documents, "notes.txt", "The launch is on Friday.")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunks_indexed"], 1);

        let ask = format!("/sessions/{}/documents/ask", id);
        let (status, body) = send(&app, post_json(&ask, serde_json::json!({ "question": "When is the launch?" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "ok");
        assert_eq!(body["sources"][0]["source"], "notes.txt");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(Arc::new(state(dir.path())), 1 << 20);

        let (status, body) = send(&app, get_request(&format!("/sessions/{}/chatbot/history", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}
