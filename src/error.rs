//! 错误类型定义
//!
//! - `DecodeError`: 入站请求格式错误，映射为 400，不重试
//! - `StartupError`: 启动阶段的致命错误，进程以非零状态退出
//!
//! 投递相关的错误（`AttemptError` / `DeliveryError`）定义在
//! `notification::delivery` 中，与重试状态机放在一起。

use thiserror::Error;

/// Pub/Sub 推送消息解码失败
#[derive(Debug, Error)]
pub enum DecodeError {
    /// 请求体读取失败
    #[error("failed to read request body: {0}")]
    Body(String),

    /// 请求体不是合法的 JSON，或缺少 `message` 对象
    #[error("invalid push envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// `message.data` 不是合法的 base64
    #[error("invalid base64 in message.data: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// 启动失败（配置非法、端口绑定失败、监听器异常）
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid slack webhook url {url:?}: {reason}")]
    InvalidWebhookUrl { url: String, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl StartupError {
    /// 日志中使用的简短描述
    pub fn summary(&self) -> &'static str {
        match self {
            StartupError::InvalidWebhookUrl { .. } => "Invalid configuration",
            StartupError::Bind { .. } => "Failed to bind HTTP listener",
            StartupError::HttpClient(_) => "Failed to initialize Slack client",
            StartupError::Serve(_) => "HTTP server encountered an error",
        }
    }
}
