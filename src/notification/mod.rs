//! 通知处理：过滤、格式化、投递
//!
//! # 使用示例
//! ```ignore
//! use pubsub_slack_relay::notification::{build_payload, is_allowed, RetryConfig, SlackClient};
//!
//! if is_allowed(envelope.type_url(), &allow_list) {
//!     let client = SlackClient::new(webhook_url, RetryConfig::default())?;
//!     client.deliver(&build_payload(&envelope), &cancel).await?;
//! }
//! ```

pub mod delivery;
pub mod filter;
pub mod formatter;
pub mod payload;

pub use delivery::{AttemptError, DeliveryError, RetryConfig, SlackClient, ACK_BODY};
pub use filter::is_allowed;
pub use formatter::{build_payload, event_type_name, message_fields};
pub use payload::{SlackAttachment, SlackField, SlackPayload};
