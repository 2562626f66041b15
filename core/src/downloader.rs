use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::artifact::{Artifact, ScratchGuard};
use crate::settings::ServerConfig;
use crate::error::{DownloadError, Result};
use crate::request::DownloadRequest;
use crate::utils::get_file_extension;
use crate::ytdlp::{DownloadOptions, MediaInfo, YtDlp};

/// Extensions tried, in order, when the transcoded mp3 is not where we expect it.
///
/// yt-dlp does not report which file its FFmpegExtractAudio step leaves behind
/// (a skipped or failed transcode keeps the source container), so this list
/// tracks its observed behaviour and may need updating with it.
pub const AUDIO_CANDIDATE_EXTENSIONS: [&str; 3] = ["mp3", "m4a", "webm"];

const ARTIFACT_MISSING_MESSAGE: &str = "Could not produce the MP3 file. FFmpeg may not be installed.";

/// Runs yt-dlp for one request and hands back the file it produced
#[derive(Debug, Clone)]
pub struct Downloader {
    ytdlp: YtDlp,
    scratch_dir: PathBuf,
    ffmpeg_location: Option<String>,
}

impl Downloader {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            ytdlp: YtDlp::from_command_line(&config.ytdlp_command),
            scratch_dir: config.download_dir.clone(),
            ffmpeg_location: config.custom_ffmpeg_location().map(str::to_string),
        }
    }

    pub fn ytdlp(&self) -> &YtDlp {
        &self.ytdlp
    }

    /// Fetch metadata, download, and locate the result. Every failure is
    /// logged and returned; scratch files of a failed run are removed.
    pub async fn download(&self, request: &DownloadRequest) -> Result<Artifact> {
        match self.run(request).await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                error!("Download of {} failed: {}", request.url, e);
                Err(e)
            }
        }
    }

    async fn run(&self, request: &DownloadRequest) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        // dropped with the future if the request is cancelled, taking partial files with it
        let guard = ScratchGuard::new(&self.scratch_dir);

        match self.fetch(request, &guard).await {
            Ok((path, info)) => {
                let extension = get_file_extension(&path)
                    .unwrap_or_else(|| request.format.extension().to_string());
                Ok(Artifact::new(path, info.display_title(), extension, guard))
            }
            Err(e) => {
                guard.release().await;
                Err(e)
            }
        }
    }

    async fn fetch(&self, request: &DownloadRequest, guard: &ScratchGuard) -> Result<(PathBuf, MediaInfo)> {
        let options = DownloadOptions::new(request.format, guard.output_template())
            .with_ffmpeg_location(self.ffmpeg_location.as_deref());

        let info = self.ytdlp.fetch_info(&options, &request.url).await?;
        info!("Media info: {}", info.display_title());

        self.ytdlp.download(&options, &request.url).await?;

        let path = if request.format.is_audio() {
            locate_audio(guard).await?
        } else {
            locate_video(guard, &info).await?
        };

        Ok((path, info))
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// The video lands at `<id>.<ext>` where `ext` is what the metadata call reported
async fn locate_video(guard: &ScratchGuard, info: &MediaInfo) -> Result<PathBuf> {
    let extension = info.ext.as_deref().unwrap_or("mp4");
    let path = guard.path_with_extension(extension);

    if exists(&path).await {
        Ok(path)
    } else {
        Err(DownloadError::ArtifactMissing(format!(
            "Expected output {:?} was not produced",
            path.file_name().unwrap_or_default()
        )))
    }
}

async fn locate_audio(guard: &ScratchGuard) -> Result<PathBuf> {
    for extension in AUDIO_CANDIDATE_EXTENSIONS {
        let path = guard.path_with_extension(extension);
        if exists(&path).await {
            if extension != AUDIO_CANDIDATE_EXTENSIONS[0] {
                warn!("No mp3 produced for {}, delivering .{} instead", guard.id(), extension);
            }
            return Ok(path);
        }
    }

    Err(DownloadError::ArtifactMissing(ARTIFACT_MISSING_MESSAGE.to_string()))
}
