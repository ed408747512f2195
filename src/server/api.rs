use axum::{
    routing::get,
    Router,
    extract::{ State, Path, Query },
    response::{ IntoResponse, Response, sse::{ Event, KeepAlive, Sse } },
    http::StatusCode,
    Json,
};
use futures::StreamExt;
use serde::{ Deserialize, Serialize };
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

use super::AppState;
use crate::history::StoreError;
use crate::models::chat::Message;
use crate::models::proxy::ErrorBody;

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub owner: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub owner_id: String,
    pub title: String,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    user_message: Option<Message>,
    ai_message: Option<Message>,
    fell_back: bool,
}

fn store_error(err: StoreError) -> Response {
    let status = match &err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidTitle => StatusCode::BAD_REQUEST,
        StoreError::Backend(_) | StoreError::Serialization(_) => {
            error!("Store failure: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorBody::new(err.to_string()))).into_response()
}

pub fn routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/conversations", get(list_conversations).post(create_conversation))
        .route(
            "/api/conversations/{id}",
            get(get_conversation).patch(rename_conversation).delete(delete_conversation)
        )
        .route("/api/conversations/{id}/messages", get(list_messages).post(send_message))
        .route("/api/conversations/{id}/events", get(message_events))
        .layer(cors)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>
) -> Response {
    match state.store.list_conversations(&query.owner).await {
        Ok(conversations) => Json(conversations).into_response(),
        Err(e) => store_error(e),
    }
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateConversationRequest>
) -> Response {
    match state.store.create_conversation(&req.owner_id, &req.title).await {
        Ok(conversation) => {
            info!("Conversation {} created for {}", conversation.id, conversation.owner_id);
            (StatusCode::CREATED, Json(conversation)).into_response()
        }
        Err(e) => store_error(e),
    }
}

async fn get_conversation(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.get_conversation(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(e) => store_error(e),
    }
}

async fn rename_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>
) -> Response {
    match state.store.rename_conversation(&id, &req.title).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(e) => store_error(e),
    }
}

async fn delete_conversation(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.delete_conversation(&id).await {
        Ok(()) => {
            info!("Conversation {} deleted", id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => store_error(e),
    }
}

async fn list_messages(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.list_messages(&id).await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => store_error(e),
    }
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>
) -> Response {
    if req.content.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::new("Message content is required"))).into_response();
    }
    if let Err(e) = state.store.get_conversation(&id).await {
        return store_error(e);
    }

    match state.relay.send(&id, &req.content).await {
        Some(outcome) =>
            (
                StatusCode::ACCEPTED,
                Json(SendResponse {
                    user_message: outcome.user_message,
                    ai_message: outcome.ai_message,
                    fell_back: outcome.fell_back,
                }),
            ).into_response(),
        None => (StatusCode::BAD_REQUEST, Json(ErrorBody::new("Message content is required"))).into_response(),
    }
}

/// Server-sent events: one `snapshot` event with the ordered messages per
/// store change, starting with the current state.
async fn message_events(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let subscription = match state.store.subscribe(&id).await {
        Ok(sub) => sub,
        Err(e) => {
            return store_error(e);
        }
    };
    info!("Live subscription opened for {}", id);

    let stream = subscription.into_stream().map(move |snapshot| {
        Event::default()
            .event("snapshot")
            .json_data(&snapshot)
            .map_err(|e| {
                warn!("Failed to encode snapshot for {}: {}", id, e);
                e
            })
    });
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}
