use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod app;
mod render;

#[derive(Parser)]
#[command(name = "hookchat")]
#[command(about = "hookchat - chat client for webhook reply endpoints")]
#[command(version)]
struct Cli {
    /// Webhook URL to send messages to
    #[arg(short, long)]
    webhook: Option<String>,

    /// Directory for conversation state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Allow only one in-flight exchange per conversation
    #[arg(long)]
    serialize: bool,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = hookchat_core::Settings::load();

    if let Some(webhook) = cli.webhook {
        settings.webhook_url = webhook;
    }
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = Some(data_dir);
    }
    if cli.serialize {
        settings.exchange_policy = hookchat_core::ExchangePolicy::Serialize;
    }
    if let Some(timeout) = cli.timeout {
        settings.request_timeout_secs = timeout;
    }

    app::run(settings).await
}
