use crate::agent::ChatEngine;
use crate::cli::Args;
use crate::history::ConversationStore;
use crate::models::api::{
    AnswerResponse,
    ChatData,
    ChatEmptyRequest,
    ChatOptions,
    ChatRequest,
    ChatResult,
    HistoryResponse,
    InitChatRequest,
    InitChatResponse,
    QueryRequest,
};
use crate::models::chat::ChatMessage;
use crate::response;
use crate::server::error::ApiError;

use axum::{
    extract::{ rejection::JsonRejection, Path as UrlPath, State },
    routing::{ get, post },
    Json,
    Router,
};
use chrono::Local;
use log::{ error, info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub engine: Arc<dyn ChatEngine>,
}

pub fn build_router(state: AppState, storage_dir: &Path, output_dir: &Path) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let mut app = Router::new()
        .route("/query", post(query_handler))
        .route("/chat", post(chat_handler))
        .route("/chat-empty", post(chat_empty_handler))
        .route("/chat/init", post(init_chat_handler))
        .route("/chat/{chat_id}", get(history_handler))
        .route("/api/chat/request", post(chat_request_handler));

    if storage_dir.is_dir() {
        info!("Serving {} under /api/files/data", storage_dir.display());
        app = app.nest_service("/api/files/data", ServeDir::new(storage_dir));
    } else {
        warn!("Storage directory {} not found, /api/files/data is disabled", storage_dir.display());
    }
    if output_dir.is_dir() {
        info!("Serving {} under /api/files/output", output_dir.display());
        app = app.nest_service("/api/files/output", ServeDir::new(output_dir));
    }

    app.layer(cors).with_state(state)
}

pub async fn start_http_server(
    args: &Args,
    state: AppState
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = args.server_addr().parse::<SocketAddr>()?;
    let app = build_router(state, Path::new(&args.storage_dir), Path::new(&args.output_dir));

    match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert_path), Some(key_path)) if args.enable_tls => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;
            info!("Starting HTTPS API server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        }
        _ => {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                e
            })?;
            info!("Starting HTTP API server on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }
    }
    Ok(())
}

fn answer(raw: &str) -> Json<AnswerResponse> {
    let (response, think) = response::partition(raw);
    Json(AnswerResponse { response, think })
}

fn log_elapsed(route: &str, started: chrono::DateTime<Local>) {
    let finished = Local::now();
    info!(
        "{} started {} finished {} ({} ms)",
        route,
        started.format("%H:%M:%S%.3f"),
        finished.format("%H:%M:%S%.3f"),
        (finished - started).num_milliseconds()
    );
}

async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(req) = payload?;
    let started = Local::now();
    let raw = state.engine.query(&req.content).await.map_err(|e| {
        error!("Query failed: {}", e);
        ApiError::internal(e)
    })?;
    log_elapsed("/query", started);
    Ok(answer(&raw))
}

/// One conversation turn. The store entry stays locked until the assistant
/// message is written, so concurrent turns on one id never interleave.
async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(req) = payload?;
    let started = Local::now();

    let mut turn = state.store.begin_turn(&req.chat_id).await;
    let history = turn.messages().to_vec();
    turn.push_user(&req.content);

    match state.engine.chat(&history, &req.content, &ChatOptions::default()).await {
        Ok(raw) => {
            let (response, think) = response::partition(&raw);
            turn.push_assistant(&response);
            log_elapsed("/chat", started);
            Ok(Json(AnswerResponse { response, think }))
        }
        Err(e) => {
            turn.rollback();
            error!("Chat turn for '{}' failed: {}", turn.id(), e);
            Err(ApiError::internal(e))
        }
    }
}

async fn chat_empty_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatEmptyRequest>, JsonRejection>
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(req) = payload?;
    let started = Local::now();
    let history = [ChatMessage::system(&req.system)];
    let raw = state.engine
        .chat(&history, &req.content, &ChatOptions::default()).await
        .map_err(|e| {
            error!("Stateless chat failed: {}", e);
            ApiError::internal(e)
        })?;
    log_elapsed("/chat-empty", started);
    Ok(answer(&raw))
}

async fn init_chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<InitChatRequest>, JsonRejection>
) -> Result<Json<InitChatResponse>, ApiError> {
    let Json(req) = payload?;
    state.store.init(&req.chat_id, &req.system).await;
    info!("Chat '{}' initialized", req.chat_id);
    Ok(
        Json(InitChatResponse {
            message: "Chat initialized".to_string(),
            chat_id: req.chat_id,
        })
    )
}

async fn history_handler(
    State(state): State<AppState>,
    UrlPath(chat_id): UrlPath<String>
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.store.get(&chat_id).await?;
    Ok(Json(HistoryResponse { history }))
}

async fn chat_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatData>, JsonRejection>
) -> Result<Json<ChatResult>, ApiError> {
    let Json(data) = payload?;
    let started = Local::now();
    let (history, latest) = data
        .split_last()
        .ok_or_else(|| ApiError::BadRequest("Messages must not be empty".to_string()))?;
    let options = data.data.clone().unwrap_or_default();
    options.validate().map_err(ApiError::BadRequest)?;

    let content = state.engine.chat(history, latest, &options).await.map_err(|e| {
        error!("Chat request failed: {}", e);
        ApiError::internal(e)
    })?;
    log_elapsed("/api/chat/request", started);
    Ok(Json(ChatResult { result: ChatMessage::assistant(content) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use crate::testing::{ EngineCall, StubEngine };
    use axum::body::{ to_bytes, Body };
    use axum::http::{ Request, StatusCode };
    use serde_json::{ json, Value };
    use tower::ServiceExt;

    const RAW: &str = "A<think>B</think>C";

    fn app(engine: Arc<StubEngine>, store: Arc<ConversationStore>) -> Router {
        let missing = Path::new("/definitely/not/here");
        build_router(AppState { store, engine }, missing, missing)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) =>
                request
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn query_partitions_answer() {
        let engine = Arc::new(StubEngine::replying(RAW));
        let (status, body) = send(
            app(engine.clone(), Arc::new(ConversationStore::new())),
            "POST",
            "/query",
            Some(json!({ "content": "q" }))
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "--response--": "AC", "--think--": "B" }));
        assert_eq!(engine.calls().await, vec![EngineCall::Query("q".into())]);
    }

    #[tokio::test]
    async fn chat_appends_user_and_cleaned_assistant() {
        let engine = Arc::new(StubEngine::replying(RAW));
        let store = Arc::new(ConversationStore::new());
        store.init("c1", "be nice").await;

        let (status, body) = send(
            app(engine.clone(), store.clone()),
            "POST",
            "/chat",
            Some(json!({ "chat_id": "c1", "content": "hello" }))
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["--response--"], "AC");

        let history = store.get("c1").await.unwrap();
        assert_eq!(
            history,
            vec![
                ChatMessage::system("be nice"),
                ChatMessage::user("hello"),
                ChatMessage::assistant("AC")
            ]
        );

        match &engine.calls().await[0] {
            EngineCall::Chat { history, latest, options } => {
                assert_eq!(history, &vec![ChatMessage::system("be nice")]);
                assert_eq!(latest, "hello");
                assert_eq!(options, &ChatOptions::default());
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_on_unknown_id_creates_history() {
        let store = Arc::new(ConversationStore::new());
        let (status, _) = send(
            app(Arc::new(StubEngine::replying("hi")), store.clone()),
            "POST",
            "/chat",
            Some(json!({ "chat_id": "new", "content": "x" }))
        ).await;
        assert_eq!(status, StatusCode::OK);
        let history = store.get("new").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn failed_chat_rolls_back_user_message() {
        let store = Arc::new(ConversationStore::new());
        store.init("c1", "sys").await;
        let (status, body) = send(
            app(Arc::new(StubEngine::failing()), store.clone()),
            "POST",
            "/chat",
            Some(json!({ "chat_id": "c1", "content": "hello" }))
        ).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].is_string());
        assert_eq!(store.get("c1").await.unwrap(), vec![ChatMessage::system("sys")]);
    }

    #[tokio::test]
    async fn failed_first_chat_keeps_id_unknown() {
        let store = Arc::new(ConversationStore::new());
        let engine = Arc::new(StubEngine::failing());
        let (status, _) = send(
            app(engine.clone(), store.clone()),
            "POST",
            "/chat",
            Some(json!({ "chat_id": "new", "content": "hello" }))
        ).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = send(app(engine, store), "GET", "/chat/new", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Chat history not found" }));
    }

    #[tokio::test]
    async fn chat_empty_leaves_store_untouched() {
        let engine = Arc::new(StubEngine::replying(RAW));
        let store = Arc::new(ConversationStore::new());
        let (status, body) = send(
            app(engine.clone(), store.clone()),
            "POST",
            "/chat-empty",
            Some(json!({ "content": "hi", "system": "sys" }))
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["--think--"], "B");
        assert!(store.get("hi").await.is_err());
        match &engine.calls().await[0] {
            EngineCall::Chat { history, latest, .. } => {
                assert_eq!(history, &vec![ChatMessage::system("sys")]);
                assert_eq!(latest, "hi");
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn init_overwrites_and_history_reads_back() {
        let store = Arc::new(ConversationStore::new());
        store.append_user("c1", "old").await;
        let engine = Arc::new(StubEngine::replying(""));

        let (status, body) = send(
            app(engine.clone(), store.clone()),
            "POST",
            "/chat/init",
            Some(json!({ "chat_id": "c1", "system": "fresh" }))
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Chat initialized", "chat_id": "c1" }));

        let (status, body) = send(app(engine, store), "GET", "/chat/c1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "--history--": [{ "role": "system", "content": "fresh" }] }));
    }

    #[tokio::test]
    async fn unknown_history_is_404() {
        let (status, body) = send(
            app(Arc::new(StubEngine::replying("")), Arc::new(ConversationStore::new())),
            "GET",
            "/chat/nope",
            None
        ).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Chat history not found" }));
    }

    #[tokio::test]
    async fn chat_request_splits_history_and_passes_options() {
        let engine = Arc::new(StubEngine::replying("answer"));
        let (status, body) = send(
            app(engine.clone(), Arc::new(ConversationStore::new())),
            "POST",
            "/api/chat/request",
            Some(
                json!({
                "messages": [
                    { "role": "user", "content": "first" },
                    { "role": "assistant", "content": "reply" },
                    { "role": "user", "content": "second" }
                ],
                "data": { "top_k": 4, "use_tools": false }
            })
            )
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": { "role": "assistant", "content": "answer" } }));

        match &engine.calls().await[0] {
            EngineCall::Chat { history, latest, options } => {
                assert_eq!(history.len(), 2);
                assert_eq!(latest, "second");
                assert_eq!(options.top_k, Some(4));
                assert_eq!(options.use_tools, Some(false));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_request_rejects_bad_payloads() {
        let engine = Arc::new(StubEngine::replying("answer"));
        let store = Arc::new(ConversationStore::new());

        let (status, body) = send(
            app(engine.clone(), store.clone()),
            "POST",
            "/api/chat/request",
            Some(json!({ "messages": [] }))
        ).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Messages must not be empty");

        let (status, _) = send(
            app(engine.clone(), store.clone()),
            "POST",
            "/api/chat/request",
            Some(json!({ "messages": [{ "role": "user", "content": "x" }], "data": { "top_k": 0 } }))
        ).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            app(engine.clone(), store),
            "POST",
            "/api/chat/request",
            Some(json!({ "messages": [{ "role": "user", "content": "x" }], "data": { "bogus": 1 } }))
        ).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
        assert!(engine.calls().await.is_empty());
    }

    #[tokio::test]
    async fn storage_dir_is_served_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("docstore.json"), "{}").unwrap();
        let state = AppState {
            store: Arc::new(ConversationStore::new()),
            engine: Arc::new(StubEngine::replying("")),
        };
        let router = build_router(state, dir.path(), Path::new("/definitely/not/here"));
        let (status, body) = send(router, "GET", "/api/files/data/docstore.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }
}
