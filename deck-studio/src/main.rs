use anyhow::Result;
use deck_studio::StudioConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,deck_studio=debug")),
        )
        .init();

    let config = StudioConfig::from_env()?;

    let addr = config.addr();
    let ax = deck_studio::build(config).await?;

    ax.listen(addr).await?;

    Ok(())
}
