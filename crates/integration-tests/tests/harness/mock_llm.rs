//! Mock upstream LLM server for integration tests
//!
//! Implements a minimal OpenAI-compatible chat completions API with
//! canned responses, SSE streaming, and failure injection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Mock LLM backend that returns predictable responses
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    completion_count: AtomicU32,
    /// Number of requests to fail before succeeding (0 = never fail)
    fail_count: AtomicU32,
    /// HTTP status used for injected failures
    fail_status: AtomicU16,
    /// Body returned with injected failures
    fail_body: String,
    /// Custom response content (if set)
    response_content: Option<String>,
}

impl MockLlm {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0, 500, None, None).await
    }

    /// Start a mock server that fails the first `n` requests with 500
    pub async fn start_failing(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n, 500, None, None).await
    }

    /// Start a mock server that fails the first `n` requests with the
    /// given status and body
    pub async fn start_failing_with(n: u32, status: u16, body: &str) -> anyhow::Result<Self> {
        Self::start_inner(n, status, Some(body.to_owned()), None).await
    }

    /// Start a mock server with custom response content
    pub async fn start_with_response(content: &str) -> anyhow::Result<Self> {
        Self::start_inner(0, 500, None, Some(content.to_owned())).await
    }

    async fn start_inner(
        fail_count: u32,
        fail_status: u16,
        fail_body: Option<String>,
        response_content: Option<String>,
    ) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            completion_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            fail_status: AtomicU16::new(fail_status),
            fail_body: fail_body
                .unwrap_or_else(|| r#"{"error": {"message": "mock server intentional failure"}}"#.to_owned()),
            response_content,
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    ///
    /// Includes `/v1` since the OpenAI provider appends `/chat/completions`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of completion requests received
    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Wire types matching OpenAI format --

#[derive(Debug, Deserialize)]
struct ChatCompletionRequest {
    model: String,
    #[allow(dead_code)]
    messages: Vec<serde_json::Value>,
    #[serde(default)]
    stream: Option<bool>,
    #[serde(default)]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionResponse {
    id: String,
    object: String,
    created: u64,
    model: String,
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Debug, Serialize)]
struct Choice {
    index: u32,
    message: ResponseMessage,
    finish_reason: String,
}

#[derive(Debug, Serialize)]
struct ResponseMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct StreamChunk {
    id: String,
    object: String,
    created: u64,
    model: String,
    choices: Vec<StreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
}

#[derive(Debug, Serialize)]
struct StreamChoice {
    index: u32,
    delta: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_reason: Option<String>,
}

// -- Handlers --

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    Json(req): Json<ChatCompletionRequest>,
) -> impl IntoResponse {
    state.completion_count.fetch_add(1, Ordering::Relaxed);

    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.fail_count.fetch_sub(1, Ordering::Relaxed);
        let status = StatusCode::from_u16(state.fail_status.load(Ordering::Relaxed))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            state.fail_body.clone(),
        )
            .into_response();
    }

    if req.stream.unwrap_or(false) {
        return build_streaming_response(&state, &req).into_response();
    }

    let content = state
        .response_content
        .as_deref()
        .unwrap_or("Hello from mock LLM");

    // If tools were provided, simulate a tool call
    let (content, tool_calls, finish_reason) = if req.tools.is_some() {
        (
            String::new(),
            Some(vec![serde_json::json!({
                "id": "call_test_123",
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "arguments": "{\"location\":\"San Francisco\"}"
                }
            })]),
            "tool_calls".to_owned(),
        )
    } else {
        (content.to_owned(), None, "stop".to_owned())
    };

    let response = ChatCompletionResponse {
        id: "chatcmpl-test-123".to_owned(),
        object: "chat.completion".to_owned(),
        created: 1_700_000_000,
        model: req.model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_owned(),
                content,
                tool_calls,
            },
            finish_reason,
        }],
        usage: Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
    };

    Json(response).into_response()
}

/// Build an SSE streaming response body
fn build_streaming_response(state: &MockLlmState, req: &ChatCompletionRequest) -> impl IntoResponse {
    let content = state
        .response_content
        .as_deref()
        .unwrap_or("Hello from mock LLM")
        .to_owned();
    let model = req.model.clone();

    let id = "chatcmpl-test-stream";
    let created = 1_700_000_000u64;
    let mut body = String::new();

    let mut push_chunk = |choices: Vec<StreamChoice>, usage: Option<Usage>| {
        let chunk = StreamChunk {
            id: id.to_owned(),
            object: "chat.completion.chunk".to_owned(),
            created,
            model: model.clone(),
            choices,
            usage,
        };
        body.push_str(&format!("data: {}\n\n", serde_json::to_string(&chunk).unwrap()));
    };

    // Role chunk
    push_chunk(
        vec![StreamChoice {
            index: 0,
            delta: serde_json::json!({"role": "assistant", "content": ""}),
            finish_reason: None,
        }],
        None,
    );

    // Content chunks (one per word)
    for word in content.split_whitespace() {
        push_chunk(
            vec![StreamChoice {
                index: 0,
                delta: serde_json::json!({"content": format!("{word} ")}),
                finish_reason: None,
            }],
            None,
        );
    }

    // Finish reason chunk
    push_chunk(
        vec![StreamChoice {
            index: 0,
            delta: serde_json::json!({}),
            finish_reason: Some("stop".to_owned()),
        }],
        None,
    );

    // Usage chunk
    push_chunk(
        vec![],
        Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    );

    body.push_str("data: [DONE]\n\n");

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
}
