//! Axum route handlers for the OpenAI-compatible gateway surface

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use conduit_core::{HttpError, RequestContext};
use futures_util::{Stream, StreamExt};

use crate::convert;
use crate::error::GatewayError;
use crate::orchestrator::Orchestrator;
use crate::protocol::openai::{OpenAiModel, OpenAiModelList, OpenAiRequest, OpenAiResponse};
use crate::types::{CompletionRequest, StreamEvent};

/// Shared state for gateway route handlers
#[derive(Clone)]
pub struct GatewayState {
    orchestrator: Arc<Orchestrator>,
}

impl GatewayState {
    /// Wrap an assembled orchestrator
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Build the gateway router with all endpoints
pub fn llm_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/models", routing::get(list_models))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(
    State(state): State<GatewayState>,
    headers: http::HeaderMap,
    Json(wire_request): Json<OpenAiRequest>,
) -> Response {
    let context = RequestContext::from_headers(headers);

    let internal_request: CompletionRequest = match wire_request.try_into() {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    if internal_request.stream {
        match state.orchestrator.complete_stream(internal_request, &context).await {
            Ok(outcome) => stream_response(outcome.stream, outcome.model).into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match state.orchestrator.complete(internal_request, &context).await {
            Ok(outcome) => {
                let wire_response: OpenAiResponse = outcome.response.into();
                Json(wire_response).into_response()
            }
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `GET /v1/models`
async fn list_models(State(state): State<GatewayState>) -> Response {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let data: Vec<OpenAiModel> = state
        .orchestrator
        .list_models()
        .into_iter()
        .map(|id| OpenAiModel {
            id,
            object: "model".to_owned(),
            created: now,
            owned_by: "conduit".to_owned(),
        })
        .collect();

    let response = OpenAiModelList {
        object: "list".to_owned(),
        data,
    };

    Json(response).into_response()
}

/// Build a streaming SSE response in `OpenAI` chunk format
///
/// Each canonical chunk flushes as produced. A terminal failure is
/// delivered as a final SSE error event rather than an abrupt close.
fn stream_response(
    stream: futures_util::stream::BoxStream<'static, Result<StreamEvent, GatewayError>>,
    model: String,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let response_id = format!("chatcmpl-{now}");

    let event_stream = stream.map(move |result| match result {
        Ok(StreamEvent::Delta(delta)) => {
            let chunk = convert::openai::delta_to_openai_chunk(&delta, &response_id, &model, now);
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            Ok(Event::default().data(data))
        }
        Ok(StreamEvent::Usage(usage)) => {
            let chunk = convert::openai::usage_to_openai_chunk(&usage, &response_id, &model, now);
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            Ok(Event::default().data(data))
        }
        Ok(StreamEvent::Done) => Ok(Event::default().data("[DONE]")),
        Err(e) => Ok(Event::default().data(error_body(&e).to_string())),
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}

/// Convert a gateway error to an HTTP error response
fn error_response(error: &GatewayError) -> Response {
    (error.status_code(), Json(error_body(error))).into_response()
}

/// JSON error body with `code` and `message`, plus structured validation
/// detail when present
fn error_body(error: &GatewayError) -> serde_json::Value {
    let mut body = serde_json::json!({
        "error": {
            "code": error.error_code(),
            "message": error.client_message(),
        }
    });

    if let GatewayError::Validation(failure) = error {
        body["error"]["details"] = serde_json::json!({
            "errors": failure.errors,
            "total": failure.total,
        });
    }

    body
}
