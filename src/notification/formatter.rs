//! 将 GKE 集群通知转换为 Slack 消息

use super::payload::{SlackAttachment, SlackField, SlackPayload};
use crate::pubsub::{MessageAttributes, PubSubEnvelope};

/// Field titles
mod title {
    pub const CLUSTER_NAME: &str = "cluster name";
    pub const CLUSTER_LOCATION: &str = "cluster location";
    pub const PROJECT: &str = "project number";
    pub const EVENT_TYPE: &str = "event type";
}

/// 构建 Slack 请求体
///
/// 事件正文原样放入 `text`，不开启任何 mrkdwn 字段。
pub fn build_payload(envelope: &PubSubEnvelope) -> SlackPayload {
    SlackPayload {
        text: Some(envelope.data_text()),
        attachments: vec![SlackAttachment {
            fields: message_fields(envelope.attributes()),
            ..Default::default()
        }],
    }
}

/// 按固定顺序生成附件字段
pub fn message_fields(attributes: &MessageAttributes) -> Vec<SlackField> {
    vec![
        SlackField::short(title::CLUSTER_NAME, &attributes.cluster_name),
        SlackField::short(title::CLUSTER_LOCATION, &attributes.cluster_location),
        SlackField::short(title::PROJECT, &attributes.project_id),
        SlackField::short(title::EVENT_TYPE, event_type_name(&attributes.type_url)),
    ]
}

/// type_url 最后一个 `.` 之后的部分
///
/// `type.googleapis.com/google.container.v1beta1.UpgradeEvent` -> `UpgradeEvent`
pub fn event_type_name(type_url: &str) -> &str {
    match type_url.rsplit_once('.') {
        Some((_, name)) => name,
        None => type_url,
    }
}
