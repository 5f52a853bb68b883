//! Slack incoming webhook 的请求体
//!
//! Payload 格式：
//! ```json
//! {
//!   "text": "事件正文",
//!   "attachments": [
//!     {
//!       "fields": [
//!         { "short": true, "title": "cluster name", "value": "prod" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::Serialize;

/// Slack 请求体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attachments: Vec<SlackAttachment>,
}

/// 消息附件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlackAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// 需要按 mrkdwn 渲染的字段名
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mrkdwn_in: Vec<String>,
    pub fields: Vec<SlackField>,
}

/// 附件中的键值字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackField {
    pub short: bool,
    pub title: String,
    pub value: String,
}

impl SlackField {
    /// 可并排显示的短字段
    pub fn short(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            short: true,
            title: title.into(),
            value: value.into(),
        }
    }
}
