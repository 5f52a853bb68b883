//! 命令行参数，每个参数都可以通过环境变量提供

use clap::Parser;

use crate::config::{AllowList, RelayConfig};
use crate::error::StartupError;

#[derive(Parser, Debug)]
#[command(name = "pubsub-slack-relay")]
#[command(about = "Relay GKE cluster notifications from Pub/Sub push to Slack")]
#[command(version)]
pub struct Cli {
    /// Verbose mode.
    #[arg(short, long)]
    pub verbose: bool,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Comma separated allowed type URLs. If empty, all types will be allowed.
    #[arg(long, env = "ALLOWED_TYPE_URLS", default_value = "")]
    pub allowed_type_urls: String,

    /// Slack webhook URL.
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    pub slack_webhook_url: String,
}

impl Cli {
    /// 转换为运行时配置
    pub fn into_config(self) -> Result<RelayConfig, StartupError> {
        RelayConfig::new(
            self.port,
            self.verbose,
            AllowList::parse(&self.allowed_type_urls),
            &self.slack_webhook_url,
        )
    }
}
