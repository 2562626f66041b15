use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;

use crate::ytdlp::YtDlp;

static FFMPEG_VERSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^ffmpeg version (\S+)").unwrap());

/// Availability of one external program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
    pub detail: Option<String>,
}

impl ToolStatus {
    fn found(name: &str, version: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            version,
            detail: None,
        }
    }

    fn missing(name: &str, detail: String) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            version: None,
            detail: Some(detail),
        }
    }
}

/// Run `<ffmpeg> -version`
pub async fn check_ffmpeg(ffmpeg_path: &str) -> ToolStatus {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            ToolStatus::found("ffmpeg", parse_ffmpeg_version(&stdout))
        }
        Ok(output) => ToolStatus::missing("ffmpeg", format!("{} -version exited with {}", ffmpeg_path, output.status)),
        Err(e) => ToolStatus::missing("ffmpeg", format!("Failed to execute {}: {}", ffmpeg_path, e)),
    }
}

/// Run `yt-dlp --version`
pub async fn check_ytdlp(ytdlp: &YtDlp) -> ToolStatus {
    match ytdlp.version().await {
        Ok(version) => ToolStatus::found("yt-dlp", Some(version).filter(|v| !v.is_empty())),
        Err(e) => ToolStatus::missing("yt-dlp", e.to_string()),
    }
}

fn parse_ffmpeg_version(output: &str) -> Option<String> {
    FFMPEG_VERSION_REGEX
        .captures(output)
        .map(|captures| captures[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffmpeg_version() {
        let output = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc 13";
        assert_eq!(parse_ffmpeg_version(output), Some("6.1.1-3ubuntu5".to_string()));
        assert_eq!(parse_ffmpeg_version("not ffmpeg"), None);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_reported() {
        let status = check_ffmpeg("tubedrop-no-such-ffmpeg").await;
        assert!(!status.available);
        assert_eq!(status.name, "ffmpeg");
        assert!(status.detail.unwrap().contains("tubedrop-no-such-ffmpeg"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ytdlp_version_from_stub() {
        let dir = tempfile::TempDir::new().unwrap();
        let stub = crate::testing::StubYtDlp::new("x").install(dir.path()).unwrap();

        let status = check_ytdlp(&YtDlp::from_command_line(&stub.command())).await;
        assert!(status.available);
        assert_eq!(status.version.as_deref(), Some("2024.01.01"));
    }
}
