use rmcp::{ServiceExt, transport::stdio};

use mediaflow::config::Config;
use mediaflow::server::MediaflowServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    load_dotenv();

    tracing::info!("mediaflow starting");

    let config = Config::load()?;
    tracing::info!(
        store = %config.store.dir.display(),
        webhooks = config.webhook.base_url.is_some(),
        poll_interval_secs = config.polling.interval_secs,
        max_attempts = config.polling.max_attempts,
        "configuration loaded"
    );
    let server = MediaflowServer::new(config)?;
    if let Err(e) = server.resume_polling().await {
        tracing::warn!("could not resume polling jobs: {e}");
    }

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("serving error: {e:?}"))?;

    service.waiting().await?;

    tracing::info!("mediaflow shutting down");
    Ok(())
}

/// `.env` next to the binary, then the cargo project root (target/release/../..),
/// then dotenvy's own CWD search. MCP servers may start with any CWD.
fn load_dotenv() {
    let candidates = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| [dir.join(".env"), dir.join("../../.env")]));
    match candidates.into_iter().flatten().find(|p| p.exists()) {
        Some(path) => {
            dotenvy::from_path(&path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
}
