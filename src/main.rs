//! Pub/Sub Slack Relay
//!
//! 接收 GKE 集群通知的 Pub/Sub push 消息，按 type_url 过滤后转发到 Slack

use anyhow::{Context, Result};
use clap::Parser;
use pubsub_slack_relay::{server, Cli, StartupError};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化 tracing 日志系统
    // RUST_LOG 优先，否则 --verbose 时为 debug，默认 info
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pubsub_slack_relay={}", default_level)));

    fmt()
        .json()
        .with_writer(std::io::stdout)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Program started");

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_shutdown_signal(shutdown.clone()));

    if let Err(e) = run(cli, shutdown).await {
        // 配置错误和服务运行错误分开描述
        let summary = e
            .downcast_ref::<StartupError>()
            .map(StartupError::summary)
            .unwrap_or("Relay failed");
        error!(error = %format!("{:#}", e), "{}", summary);
        std::process::exit(1);
    }

    info!("Program gracefully stopped");
}

async fn run(cli: Cli, shutdown: CancellationToken) -> Result<()> {
    let config = cli.into_config().context("invalid configuration")?;
    server::run(config, shutdown)
        .await
        .context("relay server failed")?;
    Ok(())
}

/// 等待 SIGINT / SIGTERM，然后触发进程级取消
async fn watch_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }

    shutdown.cancel();
}
