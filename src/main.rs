use std::path::Path;

use esencial_downloader::{
    config::AppConfig,
    error::ServerError,
    extractor::YtDlp,
    orchestrator::Orchestrator,
    tools::ToolLocator,
    web::{self, AppState},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "esencial_downloader=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let working_dir = std::env::current_dir().map_err(ServerError::WorkingDir)?;
    let config = AppConfig::from_env(&working_dir);

    ensure_storage_ready(&config.download.download_dir).await?;

    let locator = ToolLocator::for_processor();
    match locator.locate_processor().processor_path {
        Some(path) => info!("FFmpeg detectado en: {}", path.display()),
        None => warn!(
            "FFmpeg no encontrado. La conversion a MP3 fallara y los videos pueden estar limitados a 720p."
        ),
    }

    let orchestrator = Orchestrator::new(
        YtDlp::new(&config.extractor_binary),
        locator,
        config.download.clone(),
    );
    let app = web::router(AppState::new(orchestrator));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;

    info!("App iniciada en http://{}", config.bind_addr);

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}

/// Creates the download directory if it is missing; safe to call repeatedly.
async fn ensure_storage_ready(download_dir: &Path) -> Result<(), ServerError> {
    tokio::fs::create_dir_all(download_dir)
        .await
        .map_err(|source| ServerError::Storage {
            path: download_dir.to_path_buf(),
            source,
        })
}
