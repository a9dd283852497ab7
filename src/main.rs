use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use rolegate::config::AppConfig;
use rolegate::identity::TrustSignals;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let armed = TrustSignals::from_config(&config.auth).armed();
    info!(
        target: "rolegate",
        "rolegate starting: RUST_LOG='{}', env={}, http_port={}, trust_signals={:?}",
        rust_log,
        config.auth.environment.as_str(),
        config.http_port,
        armed
    );

    rolegate::server::run(config).await
}
