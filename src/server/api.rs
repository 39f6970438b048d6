use crate::models::stream::{ ChatRequest, ChatResponse, StreamEvent };
use crate::orchestrator::Orchestrator;

use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Path, Query, State },
    http::StatusCode,
    response::{ IntoResponse, Response },
    response::sse::{ Event, KeepAlive, Sse },
};
use futures::StreamExt;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use lazy_static::lazy_static;
use log::{ error, info };
use serde::Deserialize;
use std::error::Error as StdError;
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };

lazy_static! {
    static ref REQUEST_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap()));
}

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

pub async fn start_http_server(
    addr: &str,
    orchestrator: Arc<Orchestrator>
) -> Result<(), Box<dyn StdError + Send + Sync>> {
    info!("Starting HTTP server on: http://{}", addr);

    let app_state = AppState { orchestrator };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/api/conversations", get(list_conversations_handler))
        .route("/api/conversations/{id}/turns", get(conversation_turns_handler))
        .route("/api/search", get(search_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn chat_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>
) -> Response {
    if REQUEST_LIMITER.check().is_err() {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }

    let events = state.orchestrator.handle(request);
    let sse_stream = events.map(|event| Event::default().json_data(&event));
    Sse::new(sse_stream).keep_alive(KeepAlive::default()).into_response()
}

async fn chat_handler(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    if REQUEST_LIMITER.check().is_err() {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }

    let mut events = state.orchestrator.handle(request);
    let mut response_text = String::new();
    let mut intent = String::new();
    let mut conversation_id = None;
    let mut response_time = 0.0;
    let mut failed = false;

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Start { .. } => {}
            StreamEvent::ConversationId { conversation_id: id } => {
                conversation_id = Some(id);
            }
            StreamEvent::Intent { intent: classified } => {
                intent = classified;
            }
            StreamEvent::Content { content } => response_text.push_str(&content),
            StreamEvent::Complete { response_time: elapsed } => {
                response_time = elapsed;
            }
            StreamEvent::Error { message } => {
                response_text = message;
                failed = true;
            }
        }
    }

    if failed && intent.is_empty() {
        intent = "error".to_string();
    }

    Json(ChatResponse {
        response: response_text,
        intent,
        conversation_id,
        response_time,
    }).into_response()
}

#[derive(Deserialize)]
struct ListQuery {
    user_id: String,
    limit: Option<usize>,
}

async fn list_conversations_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>
) -> Response {
    match
        state.orchestrator
            .conversations()
            .list_conversations(&query.user_id, query.limit.unwrap_or(20)).await
    {
        Ok(conversations) => Json(conversations).into_response(),
        Err(e) => {
            error!("Failed to list conversations for {}: {}", query.user_id, e);
            internal_error()
        }
    }
}

#[derive(Deserialize)]
struct TurnsQuery {
    limit: Option<usize>,
}

async fn conversation_turns_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<TurnsQuery>
) -> Response {
    match
        state.orchestrator
            .conversations()
            .recent_turns(&conversation_id, query.limit.unwrap_or(100)).await
    {
        Ok(turns) => Json(turns).into_response(),
        Err(e) => {
            error!("Failed to read turns for {}: {}", conversation_id, e);
            internal_error()
        }
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    user_id: String,
    q: String,
}

async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>
) -> Response {
    match
        state.orchestrator.conversations().search_conversations(&query.user_id, &query.q).await
    {
        Ok(conversation_ids) => Json(conversation_ids).into_response(),
        Err(e) => {
            error!("Search failed for {}: {}", query.user_id, e);
            internal_error()
        }
    }
}

async fn health_handler() -> Response {
    Json(
        serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
    })
    ).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "internal error"})),
    ).into_response()
}
