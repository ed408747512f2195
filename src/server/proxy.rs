use axum::{
    body::Bytes,
    extract::State,
    http::{ header, HeaderValue, Method, StatusCode },
    response::{ IntoResponse, Response },
    routing::any,
    Json,
    Router,
};
use log::{ error, info };
use tower_http::set_header::SetResponseHeaderLayer;

use super::AppState;
use crate::llm::chat::complete_with_system;
use crate::models::proxy::{ ErrorBody, GenerateRequest, GenerateResponse };

/// `/generateAIResponse` and its `/api/generate` alias. The allow-origin
/// header is set by a layer so extractor rejections carry it too.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/generateAIResponse", any(generate_ai_response))
        .route("/api/generate", any(generate_ai_response))
        .layer(
            SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*")
            )
        )
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

/// Stateless completion proxy: `{message, chatId}` in, `{response}` out.
pub async fn generate_ai_response(
    State(state): State<AppState>,
    method: Method,
    body: Bytes
) -> Response {
    if method == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
        return response;
    }

    if method != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    let request = GenerateRequest::from_body(&body);
    let (message, chat_id) = match request.fields() {
        Some(fields) => fields,
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Message and chatId are required");
        }
    };

    match
        complete_with_system(
            state.chat_client.as_ref(),
            &state.prompts.system_prompt,
            message
        ).await
    {
        Ok(response) => {
            info!("Generated AI response for chat {}", chat_id);
            (StatusCode::OK, Json(GenerateResponse { response })).into_response()
        }
        Err(e) => {
            error!("Error generating AI response for chat {}: {}", chat_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate AI response")
        }
    }
}
