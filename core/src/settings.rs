use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_STATIC_DIR: &str = "static";
/// 50 MiB
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 50 * 1024 * 1024;
pub const DEFAULT_YTDLP_COMMAND: &str = "yt-dlp";
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Process-wide settings, loaded once at startup and shared read-only.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Scratch directory holding one transient file per in-flight download
    pub download_dir: PathBuf,
    /// Directory containing the landing page `index.html`
    pub static_dir: PathBuf,
    pub max_content_length: usize,
    /// yt-dlp invocation, split on whitespace (e.g. `python3 -m yt_dlp`)
    pub ytdlp_command: String,
    pub ffmpeg_path: String,
    /// Refuse to start when `ffmpeg -version` fails
    pub require_ffmpeg: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            ytdlp_command: DEFAULT_YTDLP_COMMAND.to_string(),
            ffmpeg_path: DEFAULT_FFMPEG_PATH.to_string(),
            require_ffmpeg: false,
        }
    }
}

impl ServerConfig {
    /// Load from `TUBEDROP_*` environment variables; `PORT` wins over `TUBEDROP_PORT`.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(Environment::with_prefix("TUBEDROP"))
            .set_override_option("port", std::env::var("PORT").ok())?;

        Self::from_builder(builder)
    }

    /// Builder pre-populated with every default value.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("host", Ipv4Addr::UNSPECIFIED.to_string())?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("download_dir", DEFAULT_DOWNLOAD_DIR)?
            .set_default("static_dir", DEFAULT_STATIC_DIR)?
            .set_default("max_content_length", DEFAULT_MAX_CONTENT_LENGTH as i64)?
            .set_default("ytdlp_command", DEFAULT_YTDLP_COMMAND)?
            .set_default("ffmpeg_path", DEFAULT_FFMPEG_PATH)?
            .set_default("require_ffmpeg", false)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;

        if config.ytdlp_command.split_whitespace().next().is_none() {
            return Err(ConfigError::Message("ytdlp_command must not be empty".to_string()));
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether yt-dlp has to be told where ffmpeg lives
    pub fn custom_ffmpeg_location(&self) -> Option<&str> {
        (self.ffmpeg_path != DEFAULT_FFMPEG_PATH).then_some(self.ffmpeg_path.as_str())
    }
}
