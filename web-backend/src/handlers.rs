use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};
use tubedrop_core::{
    check_ffmpeg, check_ytdlp, content_type_for_extension, Artifact, DownloadError, DownloadRequest,
};

use crate::state::AppState;

#[derive(Debug, Default)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub format: Option<String>,
}

impl DownloadQuery {
    /// The first value wins when a parameter is repeated; unknown ones are ignored
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();

        for (key, value) in pairs {
            let slot = match key.as_str() {
                "url" => &mut query.url,
                "format" => &mut query.format,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        query
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `DownloadError` rendered as `{ "error": ... }` with a 400 or 500 status
#[derive(Debug)]
pub struct ApiError(DownloadError);

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "tubedrop-web",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// Dependency check endpoint
pub async fn dependency_check(State(state): State<AppState>) -> impl IntoResponse {
    let (yt_dlp, ffmpeg) = tokio::join!(
        check_ytdlp(state.downloader.ytdlp()),
        check_ffmpeg(&state.config.ffmpeg_path)
    );

    let status = if yt_dlp.available && ffmpeg.available {
        "ok"
    } else {
        "partial"
    };

    Json(serde_json::json!({
        "status": status,
        "yt_dlp": yt_dlp,
        "ffmpeg": ffmpeg,
    }))
}

/// `GET /download?url=...&format=mp4|mp3`
pub async fn download(
    State(state): State<AppState>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(pairs) = params.map_err(|e| DownloadError::Validation(e.body_text()))?;
    let query = DownloadQuery::from_pairs(pairs);
    info!("Download requested: url={:?} format={:?}", query.url, query.format);

    let request = DownloadRequest::validate(query.url.as_deref(), query.format.as_deref())?;
    let artifact = state.downloader.download(&request).await?;

    stream_artifact(artifact).await.map_err(|e| {
        error!("Delivery failed: {}", e.0);
        e
    })
}

async fn stream_artifact(artifact: Artifact) -> Result<Response, ApiError> {
    // Check the file is still there right before streaming
    let metadata = match tokio::fs::metadata(&artifact.path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => {
            return Err(DownloadError::Delivery("Downloaded file does not exist".to_string()).into());
        }
    };

    let file = File::open(&artifact.path).await.map_err(|e| {
        DownloadError::Delivery(format!("Failed to open downloaded file: {}", e))
    })?;

    let file_name = artifact.file_name();
    let disposition = HeaderValue::from_str(&content_disposition(&file_name))
        .map_err(|e| DownloadError::Delivery(format!("Invalid file name {:?}: {}", file_name, e)))?;
    let content_type = HeaderValue::from_static(content_type_for_extension(&artifact.extension));

    info!(
        "Streaming {} ({} bytes) as {:?}",
        artifact.scratch_id(),
        metadata.len(),
        file_name
    );

    let body = Body::from_stream(guarded_stream(file, artifact));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(metadata.len())),
        ],
        body,
    )
        .into_response())
}

/// File stream that owns the artifact. After the last chunk its scratch files
/// are released on the blocking pool; if the body is dropped early (client
/// disconnect, error) the artifact's drop removes them instead.
fn guarded_stream(file: File, artifact: Artifact) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let cleanup = stream::once(artifact.release()).filter_map(|removed| async move {
        debug!("Response sent, {} scratch file(s) released", removed);
        None::<std::io::Result<Bytes>>
    });

    ReaderStream::new(file).chain(cleanup)
}

/// `attachment` with an ASCII fallback name plus the RFC 5987 UTF-8 form
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(file_name)
    )
}
