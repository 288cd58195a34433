mod config;
mod dispatch;
mod error;
mod models;
mod normalize;
mod openrouter;
mod optimizer;
mod output;
mod providers;
mod replicate;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{mask_secret, Config};
use crate::openrouter::OpenRouterClient;
use crate::providers::{ChatProvider, ImageProvider};
use crate::replicate::ReplicateClient;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Arc::new(Config::from_env());

    // Missing credentials are reported per request, not at startup.
    let images: Option<Arc<dyn ImageProvider>> = match &config.replicate_api_token {
        Some(token) => {
            tracing::info!("✅ Replicate API token configured: {}", mask_secret(token));
            Some(Arc::new(ReplicateClient::new(token.clone(), &config)))
        }
        None => {
            tracing::warn!("⚠️ REPLICATE_API_TOKEN is not set; /generate-image will return 500");
            None
        }
    };
    let chat: Option<Arc<dyn ChatProvider>> = match &config.openrouter_api_key {
        Some(key) => Some(Arc::new(OpenRouterClient::new(key.clone(), &config))),
        None => {
            tracing::warn!("⚠️ OPENROUTER_API_KEY is not set; /optimize-prompt will return 500");
            None
        }
    };

    let app = router(AppState { config: config.clone(), images, chat });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
