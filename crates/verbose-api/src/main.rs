//! Verbose recording REST API server.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verbose_api::server::{self, AppState};
use verbose_publish::GistPublisher;
use verbose_recorder::{ChannelNotifier, RecorderConfig, SystemClock, TracingSink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RecorderConfig::from_env();
    let publisher = Arc::new(GistPublisher::from_env());
    let notifier = Arc::new(ChannelNotifier::new(
        Arc::new(TracingSink),
        &tokio::runtime::Handle::current(),
    ));
    let state = Arc::new(AppState::new(
        config,
        publisher,
        notifier,
        Arc::new(SystemClock),
    ));

    let app = server::router(state);
    let addr: SocketAddr = std::env::var("VERBOSE_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:8002".to_string())
        .parse()?;
    tracing::info!("verbose API listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
