//! Slack webhook 投递与重试
//!
//! 每次投递最多尝试 `max_attempts` 次，两次尝试之间按指数退避等待
//! （`base_delay * 2^(attempt-1)`，默认 1s、2s）。退避等待和进行中的请求
//! 都与取消信号竞争，一旦取消立即结束，不再重试。
//!
//! 状态流转：
//! ```text
//! Attempting(n) --ok--------------------------> Succeeded
//! Attempting(n) --err, n < max---------------> BackingOff(n)
//! Attempting(n) --err, n == max--------------> Exhausted
//! BackingOff(n) --delay elapsed--------------> Attempting(n+1)
//! Attempting / BackingOff --cancelled--------> Cancelled
//! ```
//!
//! Slack 成功时返回 200 且响应体恰好为 `ok`，其他任何响应都视为失败。

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::payload::SlackPayload;

/// Slack 确认成功时的响应体
pub const ACK_BODY: &str = "ok";

/// 重试配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待时间
    pub base_delay: Duration,
    /// 单次请求超时
    pub attempt_timeout: Duration,
}

impl RetryConfig {
    /// 3 次尝试，1s / 2s 退避，单次 10s 超时
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        attempt_timeout: Duration::from_secs(10),
    };

    /// 第 `attempt` 次尝试（从 1 开始）失败后的等待时间
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// 所有退避等待时间，最后一次尝试之后不等待
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay_after_attempt(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// 单次尝试失败，均可重试
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request to Slack failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("non-200 status returned from Slack: {0}")]
    Status(u16),

    #[error("failed to read Slack response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("non-ok response returned from Slack: {0}")]
    UnexpectedBody(String),
}

/// 投递最终失败
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to send Slack notification after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("Slack delivery cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("failed to encode Slack payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DeliveryError {
    /// 已发起的尝试次数
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryError::Exhausted { attempts, .. } => *attempts,
            DeliveryError::Cancelled { attempts } => *attempts,
            DeliveryError::Encode(_) => 0,
        }
    }
}

#[derive(Debug)]
enum DeliveryState {
    Attempting { attempt: u32 },
    BackingOff { attempt: u32, error: AttemptError },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32, error: AttemptError },
    Cancelled { attempts: u32 },
}

/// Slack incoming webhook 客户端
///
/// 内部的 `reqwest::Client` 持有连接池，克隆开销很小，可在并发请求间共享。
#[derive(Debug, Clone)]
pub struct SlackClient {
    client: Client,
    webhook_url: Url,
    retry: RetryConfig,
}

impl SlackClient {
    /// 创建客户端，单次请求超时取自 `retry.attempt_timeout`
    pub fn new(webhook_url: Url, retry: RetryConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(retry.attempt_timeout).build()?;
        Ok(Self {
            client,
            webhook_url,
            retry,
        })
    }

    #[cfg(test)]
    pub(crate) fn webhook_url(&self) -> &Url {
        &self.webhook_url
    }

    #[cfg(test)]
    pub(crate) fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// 投递消息，成功时返回实际尝试次数
    ///
    /// 请求体只序列化一次，每次尝试发送完全相同的字节。
    pub async fn deliver(
        &self,
        payload: &SlackPayload,
        cancel: &CancellationToken,
    ) -> Result<u32, DeliveryError> {
        let body = serde_json::to_vec(payload)?;
        let mut state = DeliveryState::Attempting { attempt: 1 };

        loop {
            state = match state {
                DeliveryState::Attempting { attempt } => {
                    debug!(attempt, "Sending Slack webhook request");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => DeliveryState::Cancelled { attempts: attempt },
                        result = self.send_once(&body) => match result {
                            Ok(()) => DeliveryState::Succeeded { attempts: attempt },
                            Err(error) if attempt < self.retry.max_attempts => {
                                DeliveryState::BackingOff { attempt, error }
                            }
                            Err(error) => DeliveryState::Exhausted { attempts: attempt, error },
                        },
                    }
                }
                DeliveryState::BackingOff { attempt, error } => {
                    let delay = self.retry.delay_after_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Slack send failed, retrying..."
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => DeliveryState::Cancelled { attempts: attempt },
                        _ = tokio::time::sleep(delay) => DeliveryState::Attempting { attempt: attempt + 1 },
                    }
                }
                DeliveryState::Succeeded { attempts } => return Ok(attempts),
                DeliveryState::Exhausted { attempts, error } => {
                    return Err(DeliveryError::Exhausted {
                        attempts,
                        last: error,
                    })
                }
                DeliveryState::Cancelled { attempts } => {
                    return Err(DeliveryError::Cancelled { attempts })
                }
            };
        }
    }

    async fn send_once(&self, body: &[u8]) -> Result<(), AttemptError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let text = response.text().await.map_err(AttemptError::Body)?;
        if text != ACK_BODY {
            return Err(AttemptError::UnexpectedBody(text));
        }

        Ok(())
    }
}
