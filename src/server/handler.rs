//! Pub/Sub push 处理：解码 -> 过滤 -> 格式化 -> 投递
//!
//! 响应码：
//! - 200: 已投递，或按规则跳过（空数据、无 type_url、不在白名单）
//! - 400: 请求体无法读取或解码
//! - 500: 投递失败（重试耗尽或被取消）

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::error::DecodeError;
use crate::notification::{build_payload, is_allowed, DeliveryError};
use crate::pubsub::PubSubEnvelope;

/// 跳过投递的原因，不是错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyData,
    MissingTypeUrl,
    NotAllowed,
}

/// 单个请求的处理结果
#[derive(Debug)]
pub enum Outcome {
    Delivered { attempts: u32 },
    Skipped(SkipReason),
    BadRequest(DecodeError),
    Failed(DeliveryError),
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Delivered { .. } | Outcome::Skipped(_) => StatusCode::OK.into_response(),
            Outcome::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad Request\n").into_response(),
            Outcome::Failed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send Slack notification\n",
            )
                .into_response(),
        }
    }
}

/// `POST /`
pub async fn pubsub_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Outcome {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Data read failed");
            return Outcome::BadRequest(DecodeError::Body(e.body_text()));
        }
    };

    // 客户端断开时整个 future 被丢弃；进程关闭时通过父 token 取消
    let cancel = state.shutdown().child_token();
    relay(&state, &body, &cancel).await
}

/// 处理一条推送消息
pub async fn relay(state: &AppState, body: &[u8], cancel: &CancellationToken) -> Outcome {
    let envelope = match PubSubEnvelope::decode(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(error = %e, "Data unmarshal failed");
            return Outcome::BadRequest(e);
        }
    };

    debug!(
        data = %String::from_utf8_lossy(body).replace(' ', ""),
        "Request"
    );

    if envelope.message.data.is_empty() {
        warn!("Received empty data payload, skipping.");
        return Outcome::Skipped(SkipReason::EmptyData);
    }

    let type_url = envelope.type_url();
    if type_url.is_empty() {
        warn!("No type_url in message attributes, skipping Slack notification.");
        return Outcome::Skipped(SkipReason::MissingTypeUrl);
    }

    let allow_list = &state.config().allowed_type_urls;
    if !is_allowed(type_url, allow_list) {
        debug!(
            type_url = %type_url,
            allowed_list = %allow_list,
            "Received type_url is not on allowed list, skipping"
        );
        return Outcome::Skipped(SkipReason::NotAllowed);
    }

    let payload = build_payload(&envelope);
    let message = envelope.data_text();

    info!(type_url = %type_url, message = %message, "Sending slack notification");
    match state.slack().deliver(&payload, cancel).await {
        Ok(attempts) => {
            debug!(type_url = %type_url, attempts, "Slack notification delivered");
            Outcome::Delivered { attempts }
        }
        Err(e) => {
            error!(
                type_url = %type_url,
                attempts = e.attempts(),
                error = %e,
                "Sending slack message fail"
            );
            Outcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AllowList, RelayConfig};
    use crate::notification::RetryConfig;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &[u8] = br#"{"message":{"data":"aGVsbG8=","attributes":{"type_url":"x.y.Z"}}}"#;

    fn test_state(server: &MockServer, allow: &str) -> AppState {
        let config = RelayConfig::new(0, false, AllowList::parse(allow), &server.uri()).unwrap();
        let retry = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            attempt_timeout: Duration::from_secs(5),
        };
        AppState::new(config, retry, CancellationToken::new()).unwrap()
    }

    async fn ok_server(expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_relay_delivers_allowed_event() {
        let server = ok_server(1).await;
        let state = test_state(&server, "x.y.Z");

        let outcome = relay(&state, BODY, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Delivered { attempts: 1 }));
    }

    #[tokio::test]
    async fn test_relay_skips_empty_data() {
        let server = ok_server(0).await;
        let state = test_state(&server, "");

        let body = br#"{"message":{"data":"","attributes":{"type_url":"x"}}}"#;
        let outcome = relay(&state, body, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::EmptyData)));
    }

    #[tokio::test]
    async fn test_relay_skips_missing_type_url() {
        let server = ok_server(0).await;
        let state = test_state(&server, "");

        let body = br#"{"message":{"data":"aGVsbG8=","attributes":{"type_url":""}}}"#;
        let outcome = relay(&state, body, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::MissingTypeUrl)));

        let body = br#"{"message":{"data":"aGVsbG8=","attributes":{}}}"#;
        let outcome = relay(&state, body, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::MissingTypeUrl)));
    }

    #[tokio::test]
    async fn test_relay_delivers_whitespace_type_url_without_allow_list() {
        let server = ok_server(1).await;
        let state = test_state(&server, "");

        let body = br#"{"message":{"data":"aGVsbG8=","attributes":{"type_url":" "}}}"#;
        let outcome = relay(&state, body, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Delivered { attempts: 1 }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_relay_filters_whitespace_type_url_with_allow_list() {
        let server = ok_server(0).await;
        let state = test_state(&server, "y,z");

        let body = br#"{"message":{"data":"aGVsbG8=","attributes":{"type_url":" "}}}"#;
        let outcome = relay(&state, body, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::NotAllowed)));
    }

    #[tokio::test]
    async fn test_relay_skips_filtered_type() {
        let server = ok_server(0).await;
        let state = test_state(&server, "y,z");

        let outcome = relay(&state, BODY, &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::NotAllowed)));
    }

    #[tokio::test]
    async fn test_relay_rejects_malformed_body() {
        let server = ok_server(0).await;
        let state = test_state(&server, "");

        let outcome = relay(&state, b"{not json", &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_relay_cancelled_by_shutdown() {
        let server = ok_server(0).await;
        let state = test_state(&server, "");
        state.shutdown().cancel();

        let cancel = state.shutdown().child_token();
        let outcome = relay(&state, BODY, &cancel).await;
        assert!(matches!(
            outcome,
            Outcome::Failed(DeliveryError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_outcome_status_codes() {
        assert_eq!(
            Outcome::Delivered { attempts: 1 }.into_response().status(),
            StatusCode::OK
        );
        assert_eq!(
            Outcome::Skipped(SkipReason::NotAllowed).into_response().status(),
            StatusCode::OK
        );
        assert_eq!(
            Outcome::BadRequest(DecodeError::Body("truncated".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Outcome::Failed(DeliveryError::Cancelled { attempts: 1 })
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
