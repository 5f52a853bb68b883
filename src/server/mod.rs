//! HTTP 服务
//!
//! # Endpoints
//!
//! - `POST /` - 接收 Pub/Sub push 消息并转发到 Slack
//! - `GET /healthz` - 存活探针，固定返回 `OK\n`
//!
//! # 生命周期
//!
//! `Starting -> Listening -> Draining -> Stopped`。收到关闭信号后停止接收新连接，
//! 正在进行的投递被取消，进行中的请求最多再等待 `SHUTDOWN_GRACE`。

use std::fmt;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::error::StartupError;
use crate::notification::{RetryConfig, SlackClient};

pub mod handler;
pub mod health;

pub use handler::{pubsub_handler, relay, Outcome, SkipReason};
pub use health::healthz_handler;

/// 关闭时等待进行中请求的最长时间
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// 请求体上限：Pub/Sub 消息最大 10MB，base64 编码后约 13.4MB，再留出 JSON 外层的余量
pub const MAX_PUSH_BODY_BYTES: usize = 16 * 1024 * 1024;

/// 服务生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Starting,
    Listening,
    Draining,
    Stopped,
}

impl ServerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerPhase::Starting => "starting",
            ServerPhase::Listening => "listening",
            ServerPhase::Draining => "draining",
            ServerPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 所有 handler 共享的只读状态
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RelayConfig,
    slack: SlackClient,
    /// 进程级关闭信号，每个请求派生子 token
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        retry: RetryConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, StartupError> {
        let slack = SlackClient::new(config.webhook_url.clone(), retry)
            .map_err(StartupError::HttpClient)?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                slack,
                shutdown,
            }),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    pub fn slack(&self) -> &SlackClient {
        &self.inner.slack
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> axum::Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/", post(pubsub_handler))
        .layer(DefaultBodyLimit::max(MAX_PUSH_BODY_BYTES))
        .with_state(state)
}

/// 绑定监听地址
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

/// 在已绑定的监听器上提供服务，直到 `state.shutdown()` 被取消
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), StartupError> {
    let shutdown = state.shutdown().clone();
    let address = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();

    let graceful = shutdown.clone();
    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .into_future();
    tokio::pin!(server);

    info!(address = %address, phase = %ServerPhase::Listening, "Starting HTTP server");

    tokio::select! {
        result = &mut server => {
            // 未收到关闭信号就退出，说明监听器出错
            result.map_err(StartupError::Serve)?;
            info!(phase = %ServerPhase::Stopped, "HTTP server stopped");
            return Ok(());
        }
        _ = shutdown.cancelled() => {}
    }

    info!(
        phase = %ServerPhase::Draining,
        grace_secs = SHUTDOWN_GRACE.as_secs(),
        "Shutting down HTTP server..."
    );

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "Error shutting down HTTP server");
            return Err(StartupError::Serve(e));
        }
        Err(_) => {
            warn!("Grace period elapsed, forcing shutdown of in-flight requests");
        }
    }

    info!(phase = %ServerPhase::Stopped, "HTTP server stopped");
    Ok(())
}

/// 启动服务：构建状态、绑定端口、运行到关闭
pub async fn run(config: RelayConfig, shutdown: CancellationToken) -> Result<(), StartupError> {
    info!(
        phase = %ServerPhase::Starting,
        address = %config.listen_addr,
        allowed_type_urls = %config.allowed_type_urls,
        "Starting relay"
    );

    let listener = bind(config.listen_addr).await?;
    let state = AppState::new(config, RetryConfig::default(), shutdown)?;
    serve(listener, state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllowList;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        test_state_with(AllowList::allow_all())
    }

    fn test_state_with(allowed: AllowList) -> AppState {
        let config = RelayConfig::new(0, false, allowed, "http://127.0.0.1:9/hook").unwrap();
        AppState::new(config, RetryConfig::default(), CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_server_phase_display() {
        assert_eq!(ServerPhase::Starting.to_string(), "starting");
        assert_eq!(ServerPhase::Listening.to_string(), "listening");
        assert_eq!(ServerPhase::Draining.to_string(), "draining");
        assert_eq!(ServerPhase::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = test_state();
        let cloned = state.clone();
        assert_eq!(
            state.slack().webhook_url(),
            cloned.slack().webhook_url()
        );
        assert_eq!(state.slack().retry_config(), &RetryConfig::DEFAULT);
    }

    #[tokio::test]
    async fn test_healthz_route() {
        let app = build_router(test_state());

        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK\n");
    }

    #[tokio::test]
    async fn test_root_rejects_get() {
        let app = build_router(test_state());

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_push_body_larger_than_axum_default_is_accepted() {
        // 约 4MB，超过 axum 默认的 2MB 上限；type_url 不在白名单，不会触发投递
        let data = "QUFB".repeat(1_000_000);
        let body = format!(
            r#"{{"message":{{"data":"{}","attributes":{{"type_url":"x"}}}}}}"#,
            data
        );
        assert!(body.len() > 2 * 1024 * 1024);

        let app = build_router(test_state_with(AllowList::parse("y")));
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_push_body_over_limit_is_rejected() {
        let body = vec![b' '; MAX_PUSH_BODY_BYTES + 1];

        let app = build_router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_startup_error() {
        let first = bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let addr = first.local_addr().unwrap();

        match bind(addr).await {
            Err(StartupError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
            other => panic!("expected Bind error, got {:?}", other.map(|_| ())),
        }
    }
}
