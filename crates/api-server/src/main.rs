//! API server binary entry point

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use video_dub_api_server::{start_server, ApiState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_dub=info,video_dub_api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("DUB_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let output_root =
        std::env::var("DUB_OUTPUT_DIR").unwrap_or_else(|_| "outputs/sessions".to_string());

    let state = ApiState::from_env(output_root)?;

    tracing::info!("Starting video dubbing service");
    start_server(&addr, state).await?;

    Ok(())
}
