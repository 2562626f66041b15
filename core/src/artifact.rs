use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::utils::sanitize_title;

/// Owns every scratch file of one download: `<dir>/<id>.*`.
///
/// Dropping the guard removes them all, including fallback candidates that
/// were never delivered and `.part` leftovers from an interrupted run.
/// Async callers should prefer [`ScratchGuard::release`], which does the
/// deleting on the blocking pool; the drop-time purge only covers guards that
/// were never released, such as those of a cancelled request.
#[derive(Debug)]
pub struct ScratchGuard {
    dir: PathBuf,
    id: String,
    armed: bool,
}

impl ScratchGuard {
    /// Reserve a fresh, collision-free scratch name inside `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            id: Uuid::new_v4().to_string(),
            armed: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// yt-dlp `--output` template for this scratch name
    pub fn output_template(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.id))
    }

    pub fn path_with_extension(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.id, extension))
    }

    /// Remove every file belonging to this scratch name, returns how many were deleted
    pub fn purge(&self) -> usize {
        purge_files(&self.dir, &self.id)
    }

    /// Delete the scratch files off the async worker threads and disarm the drop-time purge
    pub async fn release(mut self) -> usize {
        self.armed = false;
        let dir = self.dir.clone();
        let id = self.id.clone();

        let removed = match tokio::task::spawn_blocking(move || purge_files(&dir, &id)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Scratch cleanup for {} did not finish: {}", self.id, e);
                0
            }
        };
        debug!("Removed {} scratch file(s) for {}", removed, self.id);
        removed
    }
}

fn purge_files(dir: &Path, id: &str) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read scratch directory {:?}: {}", dir, e);
            return 0;
        }
    };

    let prefix = format!("{}.", id);
    let mut removed = 0;

    for entry in entries.flatten() {
        let owned = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if !owned {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to delete scratch file {:?}: {}", path, e),
        }
    }

    removed
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let removed = self.purge();
        debug!("Removed {} scratch file(s) for {}", removed, self.id);
    }
}

/// A downloaded file ready to be streamed. Its scratch files live exactly as
/// long as this value.
#[derive(Debug)]
pub struct Artifact {
    pub path: PathBuf,
    pub title: String,
    pub extension: String,
    guard: ScratchGuard,
}

impl Artifact {
    pub fn new(path: PathBuf, title: impl Into<String>, extension: impl Into<String>, guard: ScratchGuard) -> Self {
        Self {
            path,
            title: title.into(),
            extension: extension.into(),
            guard,
        }
    }

    /// Name offered to the caller: sanitized title plus the real extension
    pub fn file_name(&self) -> String {
        format!("{}.{}", sanitize_title(&self.title), self.extension)
    }

    pub fn scratch_id(&self) -> &str {
        self.guard.id()
    }

    /// Give up the artifact, deleting its scratch files on the blocking pool
    pub async fn release(self) -> usize {
        self.guard.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_scratch_names_are_unique() {
        let dir = TempDir::new().unwrap();
        let a = ScratchGuard::new(dir.path());
        let b = ScratchGuard::new(dir.path());

        assert_ne!(a.id(), b.id());
        assert_eq!(
            a.output_template(),
            dir.path().join(format!("{}.%(ext)s", a.id()))
        );
    }

    #[test]
    fn test_drop_removes_only_owned_files() {
        let dir = TempDir::new().unwrap();
        let guard = ScratchGuard::new(dir.path());
        let other = dir.path().join("someone-else.mp4");

        touch(&guard.path_with_extension("mp3"));
        touch(&guard.path_with_extension("webm"));
        touch(&guard.path_with_extension("webm.part"));
        touch(&other);

        drop(guard);

        let remaining: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(remaining, vec![other]);
    }

    #[test]
    fn test_purge_tolerates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let guard = ScratchGuard::new(dir.path().join("gone"));
        assert_eq!(guard.purge(), 0);
    }

    #[test]
    fn test_artifact_file_name_uses_sanitized_title() {
        let dir = TempDir::new().unwrap();
        let guard = ScratchGuard::new(dir.path());
        let path = guard.path_with_extension("mp4");
        touch(&path);

        let artifact = Artifact::new(path.clone(), "What? A/B: test", "mp4", guard);
        assert_eq!(artifact.file_name(), "What AB test.mp4");

        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_purges_and_disarms_drop() {
        let dir = TempDir::new().unwrap();
        let guard = ScratchGuard::new(dir.path());
        touch(&guard.path_with_extension("mp4"));
        touch(&guard.path_with_extension("mp4.part"));

        assert_eq!(guard.release().await, 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unpolled_release_still_purges_on_drop() {
        let dir = TempDir::new().unwrap();
        let guard = ScratchGuard::new(dir.path());
        let path = guard.path_with_extension("mp3");
        touch(&path);

        let artifact = Artifact::new(path.clone(), "Song", "mp3", guard);
        drop(artifact.release());

        assert!(!path.exists());
    }
}
