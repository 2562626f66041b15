use thiserror::Error;

/// Every way a download request can fail, from input validation to delivery
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Missing or unsupported request parameters
    #[error("{0}")]
    Validation(String),

    /// yt-dlp could not be run or reported a failure (bad URL, network, unsupported site, ...)
    #[error("Download failed: {0}")]
    Extraction(String),

    /// yt-dlp finished but the expected file is not on disk, usually a missing ffmpeg
    #[error("Download failed: {0}")]
    ArtifactMissing(String),

    /// The file disappeared between download and streaming
    #[error("{0}")]
    Delivery(String),

    #[error("Scratch directory error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// True when the caller sent a bad request
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
