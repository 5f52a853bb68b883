//! Pub/Sub push 消息解码
//!
//! 推送格式：
//! ```json
//! {
//!   "message": {
//!     "data": "<base64>",
//!     "attributes": {
//!       "cluster_location": "us-central1",
//!       "cluster_name": "prod",
//!       "project_id": "123456789",
//!       "type_url": "type.googleapis.com/google.container.v1beta1.UpgradeEvent",
//!       "payload": "{...}"
//!     }
//!   },
//!   "subscription": "projects/p/subscriptions/s"
//! }
//! ```

use base64::Engine;
use serde::Deserialize;

use crate::error::DecodeError;

/// 完整的推送请求体
#[derive(Debug, Clone)]
pub struct PubSubEnvelope {
    pub message: PubSubMessage,
    pub subscription: String,
}

/// Pub/Sub 消息
#[derive(Debug, Clone, Default)]
pub struct PubSubMessage {
    /// base64 解码后的原始数据
    pub data: Vec<u8>,
    pub attributes: MessageAttributes,
}

/// 线上格式，`data` 仍是 base64 文本
#[derive(Deserialize)]
struct WireEnvelope {
    message: WireMessage,
    #[serde(default)]
    subscription: String,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    attributes: MessageAttributes,
}

/// GKE 集群通知携带的属性
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageAttributes {
    #[serde(default)]
    pub cluster_location: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub type_url: String,
}

impl PubSubEnvelope {
    /// 解码请求体，要么整体成功要么失败
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireEnvelope = serde_json::from_slice(body)?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(wire.message.data.unwrap_or_default())?;

        Ok(Self {
            message: PubSubMessage {
                data,
                attributes: wire.message.attributes,
            },
            subscription: wire.subscription,
        })
    }

    /// 事件正文（按 UTF-8 宽松解码）
    pub fn data_text(&self) -> String {
        String::from_utf8_lossy(&self.message.data).into_owned()
    }

    pub fn attributes(&self) -> &MessageAttributes {
        &self.message.attributes
    }

    pub fn type_url(&self) -> &str {
        &self.message.attributes.type_url
    }
}
