//! Pub/Sub Slack Relay - 将 GKE 集群通知从 Pub/Sub push 订阅转发到 Slack

pub mod cli;
pub mod config;
pub mod error;
pub mod notification;
pub mod pubsub;
pub mod server;

pub use cli::Cli;
pub use config::{AllowList, RelayConfig};
pub use error::{DecodeError, StartupError};
pub use notification::{DeliveryError, RetryConfig, SlackClient, SlackPayload};
pub use pubsub::PubSubEnvelope;
pub use server::{build_router, AppState, ServerPhase};
