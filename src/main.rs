use evtx_relay::config::RelayConfig;
use evtx_relay::server::{self, StartupError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("evtx_relay=info,tower_http=info"))
        )
        .init();

    if let Err(e) = start().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn start() -> Result<(), StartupError> {
    let config = RelayConfig::load()?;

    tracing::info!(
        "Basic-auth lookup {}, OAuth client {}",
        if config.basic_auth().is_some() { "enabled" } else { "disabled" },
        if config.oauth().is_some() { "configured" } else { "not configured" },
    );

    server::run(config).await
}
