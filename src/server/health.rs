//! 存活探针

use axum::http::StatusCode;

/// `GET /healthz`，固定返回 200 `OK\n`
pub async fn healthz_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK\n")
}
