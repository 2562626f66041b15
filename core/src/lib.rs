pub mod artifact;
pub mod settings;
pub mod downloader;
pub mod error;
pub mod request;
pub mod tools;
pub mod utils;
pub mod ytdlp;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use artifact::*;
pub use settings::*;
pub use downloader::*;
pub use error::DownloadError;
pub use request::*;
pub use tools::*;
pub use utils::*;
pub use ytdlp::*;
