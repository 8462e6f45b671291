use tracing_subscriber::EnvFilter;

use switchboard::bot;
use switchboard::config::BotConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env()?;
    bot::start(config).await?;
    Ok(())
}
