use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

use sendmoney_agent::{resolve_session_id, AgentRuntime};
use sendmoney_core::domain::chat::ChatRequest;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatQuery {
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/chat", post(chat))
        .with_state(ChatState { runtime })
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let session_header = HeaderName::from_static(SESSION_HEADER);
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
            .expose_headers([session_header]);
    }

    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, session_header.clone()])
        .allow_credentials(true)
        .expose_headers([session_header])
}

fn unprocessable(detail: String) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorBody { detail })).into_response()
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    response
}

pub async fn chat(
    State(state): State<ChatState>,
    query: Result<Query<ChatQuery>, QueryRejection>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            warn!(
                event_name = "api.chat.invalid_query",
                correlation_id = "unassigned",
                error = %rejection.body_text(),
                "chat request rejected"
            );
            return unprocessable(rejection.body_text());
        }
    };
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                event_name = "api.chat.invalid_body",
                correlation_id = query.session_id.as_deref().unwrap_or("unassigned"),
                error = %rejection.body_text(),
                "chat request rejected"
            );
            return unprocessable(rejection.body_text());
        }
    };

    let session_id = resolve_session_id(query.session_id);
    info!(
        event_name = "api.chat.received",
        correlation_id = %session_id,
        history_len = request.message_history.len(),
        has_current_state = request.current_state.is_some(),
        "chat turn received"
    );

    match state.runtime.handle_turn(&request, Some(session_id.clone())).await {
        Ok(outcome) => {
            let response = (StatusCode::OK, Json(outcome.response)).into_response();
            with_session_header(response, &outcome.session_id)
        }
        Err(failure) => {
            let error_class = failure.error_class();
            let interface = failure.into_interface(session_id.as_str());
            let status = StatusCode::from_u16(interface.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                error!(
                    event_name = "api.chat.failed",
                    correlation_id = %interface.correlation_id(),
                    error_class,
                    error = %interface,
                    "chat turn failed"
                );
            } else {
                warn!(
                    event_name = "api.chat.rejected",
                    correlation_id = %interface.correlation_id(),
                    error_class,
                    error = %interface,
                    "chat turn rejected"
                );
            }
            let response = (status, Json(ErrorBody { detail: interface.detail() })).into_response();
            with_session_header(response, &session_id)
        }
    }
}
