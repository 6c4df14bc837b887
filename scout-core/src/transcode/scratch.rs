use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Directory holding transient remux artifacts.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Creates the directory if it does not exist yet.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Unique artifact path: `video-<millis>-<seq>.mp4`.
    pub fn allocate(&self) -> ScratchArtifact {
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let name = format!("video-{}-{}.mp4", Utc::now().timestamp_millis(), sequence);
        ScratchArtifact::new(self.root.join(name))
    }
}

/// Owns one scratch file; dropping the guard deletes it.
///
/// With a grace delay set the deletion is scheduled on the runtime instead of
/// happening inline.
#[derive(Debug)]
pub struct ScratchArtifact {
    path: PathBuf,
    grace: Duration,
}

impl ScratchArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            grace: Duration::ZERO,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defer_removal(&mut self, grace: Duration) {
        self.grace = grace;
    }
}

fn remove(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed scratch artifact"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove scratch artifact"),
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        let path = std::mem::take(&mut self.path);
        if self.grace.is_zero() {
            remove(&path);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let grace = self.grace;
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    remove(&path);
                });
            }
            Err(_) => remove(&path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(dir.path().join("temp")).unwrap();
        assert!(scratch.root().is_dir());
        let first = scratch.allocate();
        let second = scratch.allocate();
        assert_ne!(first.path(), second.path());
        let name = first.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("video-") && name.ends_with(".mp4"));
    }

    #[test]
    fn drop_removes_file_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(dir.path()).unwrap();
        let artifact = scratch.allocate();
        let path = artifact.path().to_path_buf();
        std::fs::write(&path, b"partial").unwrap();
        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn deferred_removal_waits_for_grace() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(dir.path()).unwrap();
        let mut artifact = scratch.allocate();
        let path = artifact.path().to_path_buf();
        std::fs::write(&path, b"complete").unwrap();
        artifact.defer_removal(Duration::from_millis(50));
        drop(artifact);
        assert!(path.exists());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!path.exists());
    }
}
