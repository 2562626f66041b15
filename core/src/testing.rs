//! Shell stand-in for yt-dlp, for tests that must not touch the network.
//!
//! The stub answers `--version` and `--dump-single-json` with canned output,
//! and on a download call writes one small file per configured extension next
//! to the `--output` template. Every invocation is appended to `calls.log`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SCRIPT: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> @LOG@
mode=download
out=
while [ $# -gt 0 ]; do
  case "$1" in
    --version) echo 2024.01.01; exit 0 ;;
    --dump-single-json) mode=info ;;
    --output) shift; out="$1" ;;
  esac
  shift
done
@FAILURE@
if [ "$mode" = info ]; then
  printf '%s\n' @INFO@
  exit 0
fi
base=$(printf '%s\n' "$out" | sed 's/\.%(ext)s$//')
@PRODUCE@
exit 0
"#;

/// Builder for a fake yt-dlp
#[derive(Debug, Clone)]
pub struct StubYtDlp {
    title: String,
    info_ext: String,
    produces: Vec<String>,
    failure: Option<String>,
    helper: Option<String>,
}

impl StubYtDlp {
    /// Reports `title`, claims `mp4` and writes an `.mp4` file
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            info_ext: "mp4".to_string(),
            produces: vec!["mp4".to_string()],
            failure: None,
            helper: None,
        }
    }

    pub fn info_ext(mut self, ext: &str) -> Self {
        self.info_ext = ext.to_string();
        self
    }

    /// Extensions of the files written on download; empty means nothing is written
    pub fn produces(mut self, extensions: &[&str]) -> Self {
        self.produces = extensions.iter().map(|ext| ext.to_string()).collect();
        self
    }

    /// Every call prints `ERROR: <message>` to stderr and exits 1
    pub fn fails_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// On download, start a background helper that writes `.<ext>` a second
    /// later, then hang for five seconds (yt-dlp waiting on its ffmpeg child)
    pub fn stalls_with_helper(mut self, ext: &str) -> Self {
        self.helper = Some(ext.to_string());
        self
    }

    /// Write the script into `dir`
    pub fn install(&self, dir: &Path) -> io::Result<InstalledStub> {
        let script = dir.join("yt-dlp-stub.sh");
        let log = dir.join("calls.log");

        let info = serde_json::json!({
            "id": "stub",
            "title": self.title,
            "ext": self.info_ext,
            "webpage_url": "https://example.com/stub",
        });

        let failure = match &self.failure {
            Some(message) => format!(
                "printf 'ERROR: %s\\n' {} >&2\nexit 1",
                shell_quote(message)
            ),
            None => String::new(),
        };

        let mut produce = self
            .produces
            .iter()
            .map(|ext| format!("printf 'stub media payload' > \"$base.{}\"", ext))
            .collect::<Vec<_>>();
        if let Some(ext) = &self.helper {
            produce.push(format!("( sleep 1; printf 'late' > \"$base.{}\" ) &", ext));
            produce.push("sleep 5".to_string());
        }
        let produce = produce.join("\n");

        let body = SCRIPT
            .replace("@LOG@", &shell_quote(&log.to_string_lossy()))
            .replace("@FAILURE@", &failure)
            .replace("@INFO@", &shell_quote(&info.to_string()))
            .replace("@PRODUCE@", &produce);

        fs::write(&script, body)?;

        Ok(InstalledStub { script, log })
    }
}

#[derive(Debug)]
pub struct InstalledStub {
    script: PathBuf,
    log: PathBuf,
}

impl InstalledStub {
    /// Value for `ServerConfig::ytdlp_command`
    pub fn command(&self) -> String {
        format!("sh {}", self.script.display())
    }

    /// Argument lines of every run, oldest first
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// How many times the stub was run
    pub fn invocations(&self) -> usize {
        self.calls().len()
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
