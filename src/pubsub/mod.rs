//! Pub/Sub 推送订阅的入站消息

pub mod envelope;

pub use envelope::{MessageAttributes, PubSubEnvelope, PubSubMessage};
