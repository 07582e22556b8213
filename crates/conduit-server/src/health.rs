use axum::Json;
use axum::response::IntoResponse;

/// Handle the health endpoint
pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
