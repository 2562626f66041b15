use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DownloadError, Result};

/// Output container requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Mp4,
    Mp3,
}

impl MediaFormat {
    /// Extension of the file we expect to hand back
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }

    pub fn is_audio(self) -> bool {
        matches!(self, Self::Mp3)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mp4" => Ok(Self::Mp4),
            "mp3" => Ok(Self::Mp3),
            _ => Err(DownloadError::Validation(
                "Invalid format. Only mp4 or mp3 are accepted".to_string(),
            )),
        }
    }
}

/// A validated `{url, format}` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub format: MediaFormat,
}

impl DownloadRequest {
    /// Check raw query parameters. The URL itself is not inspected;
    /// anything yt-dlp cannot handle fails later as an extraction error.
    pub fn validate(url: Option<&str>, format: Option<&str>) -> Result<Self> {
        let url = match url {
            Some(url) if !url.is_empty() => url,
            _ => return Err(DownloadError::Validation("URL is required".to_string())),
        };

        let format = match format {
            Some(format) => format.parse()?,
            None => MediaFormat::default(),
        };

        Ok(Self {
            url: url.to_string(),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_is_rejected() {
        for url in [None, Some("")] {
            let err = DownloadRequest::validate(url, Some("mp4")).unwrap_err();
            assert!(err.is_client_error());
            assert_eq!(err.to_string(), "URL is required");
        }
    }

    #[test]
    fn test_format_defaults_to_video() {
        let request = DownloadRequest::validate(Some("https://example.com/v"), None).unwrap();
        assert_eq!(request.format, MediaFormat::Mp4);
        assert_eq!(request.url, "https://example.com/v");
    }

    #[test]
    fn test_unknown_formats_are_rejected() {
        for format in ["", "wav", "MP3", "mp4 "] {
            let err = DownloadRequest::validate(Some("https://example.com/v"), Some(format)).unwrap_err();
            assert!(err.is_client_error(), "{format:?} should be rejected");
        }
    }

    #[test]
    fn test_malformed_url_passes_validation() {
        let request = DownloadRequest::validate(Some("not-a-url"), Some("mp3")).unwrap();
        assert_eq!(request.format, MediaFormat::Mp3);
        assert!(request.format.is_audio());
    }
}
