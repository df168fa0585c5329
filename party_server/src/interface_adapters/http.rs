// Plain HTTP routes served next to the bus bridge.

use axum::Json;

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}
