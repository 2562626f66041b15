use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{DownloadError, Result};
use crate::request::MediaFormat;
use crate::utils::FALLBACK_TITLE;

/// Best mp4 video muxed with m4a audio, then any mp4, then anything
pub const VIDEO_FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
pub const AUDIO_FORMAT_SELECTOR: &str = "bestaudio/best";
/// Bitrate handed to ffmpeg when transcoding to mp3
pub const AUDIO_QUALITY: &str = "192K";

/// Subset of `--dump-single-json` output we care about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl MediaInfo {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(FALLBACK_TITLE)
    }
}

/// Options for one download, turned into yt-dlp arguments
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub format: MediaFormat,
    /// yt-dlp output template, e.g. `downloads/<id>.%(ext)s`
    pub output_template: PathBuf,
    pub ffmpeg_location: Option<String>,
}

impl DownloadOptions {
    pub fn new(format: MediaFormat, output_template: impl Into<PathBuf>) -> Self {
        Self {
            format,
            output_template: output_template.into(),
            ffmpeg_location: None,
        }
    }

    pub fn with_ffmpeg_location(mut self, location: Option<&str>) -> Self {
        self.ffmpeg_location = location.map(str::to_string);
        self
    }

    fn format_selector(&self) -> &'static str {
        if self.format.is_audio() {
            AUDIO_FORMAT_SELECTOR
        } else {
            VIDEO_FORMAT_SELECTOR
        }
    }

    /// Arguments for the metadata-only call. Uses the same selector as the
    /// download so the reported `ext` matches the file that will be written.
    pub fn metadata_args(&self, url: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--dump-single-json".into(),
            "--skip-download".into(),
            "--no-playlist".into(),
            "--format".into(),
            self.format_selector().into(),
        ];
        args.push(url.into());
        args
    }

    pub fn download_args(&self, url: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--no-playlist".into(),
            "--format".into(),
            self.format_selector().into(),
        ];

        if self.format.is_audio() {
            // FFmpegExtractAudio post-processor
            args.push("--extract-audio".into());
            args.push("--audio-format".into());
            args.push(self.format.extension().into());
            args.push("--audio-quality".into());
            args.push(AUDIO_QUALITY.into());
        }

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.into());
        }

        args.push("--output".into());
        args.push(self.output_template.clone().into_os_string());

        // url always goes last
        args.push(url.into());
        args
    }
}

/// Handle on the yt-dlp executable (or `python -m yt_dlp` style command line)
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    base_args: Vec<String>,
}

impl YtDlp {
    /// Split a whitespace separated command line into program and leading arguments
    pub fn from_command_line(command_line: &str) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "yt-dlp".to_string());

        Self {
            program,
            base_args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own group, so ffmpeg and other helpers can be killed along with it
        #[cfg(unix)]
        command.process_group(0);
        command
    }

    async fn run(&self, args: Vec<OsString>) -> Result<Output> {
        let mut command = self.command();
        command.args(&args);

        let child = command.spawn().map_err(|e| {
            DownloadError::Extraction(format!("Failed to execute {}: {}", self.program, e))
        })?;
        let _group = ProcessGroup::of(&child);

        let output = child.wait_with_output().await.map_err(|e| {
            DownloadError::Extraction(format!("Failed to wait for {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            return Err(DownloadError::Extraction(failure_message(&output)));
        }

        Ok(output)
    }

    /// `yt-dlp --version`, first line of stdout
    pub async fn version(&self) -> Result<String> {
        let output = self.run(vec!["--version".into()]).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    /// Resolve metadata without fetching any media
    pub async fn fetch_info(&self, options: &DownloadOptions, url: &str) -> Result<MediaInfo> {
        let output = self.run(options.metadata_args(url)).await?;

        serde_json::from_slice(&output.stdout).map_err(|e| {
            DownloadError::Extraction(format!("Failed to parse yt-dlp metadata: {}", e))
        })
    }

    /// Download (and post-process) into `options.output_template`
    pub async fn download(&self, options: &DownloadOptions, url: &str) -> Result<()> {
        info!(
            "Executing {} for {} -> {}",
            self.program,
            url,
            options.output_template.display()
        );
        self.run(options.download_args(url)).await?;
        Ok(())
    }
}

/// Kills every process left in a yt-dlp run's group when dropped, whether the
/// run finished or its future was cancelled mid-download.
#[derive(Debug)]
struct ProcessGroup {
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
}

impl ProcessGroup {
    #[cfg(unix)]
    fn of(child: &Child) -> Self {
        Self {
            pgid: child
                .id()
                .and_then(|id| i32::try_from(id).ok())
                .map(nix::unistd::Pid::from_raw),
        }
    }

    #[cfg(not(unix))]
    fn of(_child: &Child) -> Self {
        Self {}
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};

            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) => debug!("Killed leftover processes in group {}", pgid),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
            }
        }
    }
}

/// Best human readable message from a failed run: the `ERROR:` lines if there
/// are any, otherwise all of stderr, otherwise the exit status.
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);

    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ERROR:"))
        .collect();

    if !errors.is_empty() {
        return errors.join("\n");
    }

    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    format!("yt-dlp exited with {}", output.status)
}
