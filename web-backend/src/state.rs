use std::sync::Arc;
use tubedrop_core::{Downloader, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub downloader: Arc<Downloader>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        // Create scratch directory
        tokio::fs::create_dir_all(&config.download_dir).await?;

        let downloader = Arc::new(Downloader::new(&config));

        Ok(Self {
            config: Arc::new(config),
            downloader,
        })
    }
}
