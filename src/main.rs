use tracing_subscriber::EnvFilter;

use signal_csm::config::Config;
use signal_csm::csm::Csm;
use signal_csm::http::{self, AppState};
use signal_csm::sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let csm = Csm::new(config.csm.clone());
    sweeper::spawn(csm.clone(), config.csm.sweep_interval);

    let router = http::create_router(AppState { csm });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "signal-csm listening");

    axum::serve(listener, router).await?;
    Ok(())
}
