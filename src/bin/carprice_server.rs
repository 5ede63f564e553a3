use std::sync::Arc;

use carprice::Server;
use carprice::app::{AppState, build_pipeline};
use carprice::config::Settings;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let server = Server::bind(&settings.bind_addr).await?;
    let state = Arc::new(AppState::from_settings(settings));
    info!(
        cache = state.prediction.cache_backend(),
        model = %state.settings.model_path.display(),
        rate = state.settings.exchange_rate,
        currency = %state.settings.currency,
        "configuration loaded"
    );
    let pipeline = Arc::new(build_pipeline(state));

    server
        .run_until(
            move |req| {
                let pipeline = Arc::clone(&pipeline);
                async move { pipeline.handle(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    info!("server stopped");
    Ok(())
}
