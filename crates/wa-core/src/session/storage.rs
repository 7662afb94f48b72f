//! Session storage maintenance
//!
//! Persisted credentials live in a single directory that the client
//! reads and writes on its own. This module only creates and clears
//! that directory, never inspecting its contents. Clearing is best
//! effort: the browser process can hold files locked, so a failed
//! child removal is logged and siblings are still attempted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::client::WebClient;
use crate::{Error, Result};

/// Owns the on-disk session credential directory
pub struct SessionStorage {
    path: PathBuf,
}

impl SessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove everything inside the storage directory.
    ///
    /// Creates the directory first when it is absent, so a clear on a
    /// fresh machine is a no-op success. When a child removal fails with
    /// a busy/locked error and a client handle is still held, asks that
    /// client once to close its browser process and retries the child.
    ///
    /// Callers must not assume the directory is empty afterward; this is
    /// reclamation, not a transactional guarantee.
    pub async fn clear(&self, holder: Option<&dyn WebClient>) -> Result<()> {
        fs::create_dir_all(&self.path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create {}: {}", self.path.display(), e)))?;

        let mut entries = fs::read_dir(&self.path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", self.path.display(), e)))?;

        let mut released = false;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(Error::Storage(format!(
                        "Failed to enumerate {}: {}",
                        self.path.display(),
                        e
                    )));
                }
            };

            let child = entry.path();
            if let Err(e) = remove_child(&child).await {
                warn!(path = %child.display(), error = %e, "Could not remove session file");

                if is_locked(&e) && !released {
                    if let Some(client) = holder {
                        released = true;
                        if let Err(close_err) = client.force_close().await {
                            warn!(error = %close_err, "Force close during cleanup failed");
                        }
                        if let Err(retry_err) = remove_child(&child).await {
                            warn!(
                                path = %child.display(),
                                error = %retry_err,
                                "Session file still locked after force close"
                            );
                        }
                    }
                }
            }
        }

        debug!(path = %self.path.display(), "Session cleanup completed");
        Ok(())
    }
}

/// Remove one directory entry, file or tree. A concurrently vanished
/// entry counts as removed.
async fn remove_child(path: &Path) -> std::io::Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn is_locked(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ResourceBusy | ErrorKind::PermissionDenied
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::client::{Conversation, RawMessage};

    /// Marks a file immutable so removal fails with a permission error
    /// even when tests run as root. Returns false where the filesystem
    /// does not support the attribute; callers skip the scenario then.
    fn set_immutable(path: &Path) -> bool {
        std::process::Command::new("chattr")
            .arg("+i")
            .arg(path)
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn lift_immutable(path: &Path) {
        let _ = std::process::Command::new("chattr")
            .arg("-i")
            .arg(path)
            .status();
    }

    /// Stand-in for the browser-holding client: force_close releases
    /// the locks listed in `holds`, nothing else.
    #[derive(Default)]
    struct LockHolder {
        holds: Vec<PathBuf>,
        force_closes: AtomicUsize,
    }

    #[async_trait]
    impl WebClient for LockHolder {
        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn destroy(&self) -> Result<()> {
            Ok(())
        }

        async fn force_close(&self) -> Result<()> {
            self.force_closes.fetch_add(1, Ordering::SeqCst);
            for path in &self.holds {
                lift_immutable(path);
            }
            Ok(())
        }

        async fn resolve_identity(&self, _number: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn send_message(&self, _chat_id: &str, _body: &str) -> Result<()> {
            Ok(())
        }

        async fn list_conversations(&self) -> Result<Vec<Conversation>> {
            Ok(Vec::new())
        }

        async fn fetch_history(
            &self,
            _chat_id: &str,
            _limit: Option<usize>,
        ) -> Result<Vec<RawMessage>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_clear_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("session");
        let storage = SessionStorage::new(&target);

        storage.clear(None).await.unwrap();

        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_clear_removes_files_and_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path());

        fs::write(dir.path().join("Default"), b"cookies").await.unwrap();
        let nested = dir.path().join("Local Storage");
        fs::create_dir_all(nested.join("leveldb")).await.unwrap();
        fs::write(nested.join("leveldb").join("000001.log"), b"x")
            .await
            .unwrap();

        storage.clear(None).await.unwrap();

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path());

        storage.clear(None).await.unwrap();
        storage.clear(None).await.unwrap();

        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_locked_classification() {
        assert!(is_locked(&std::io::Error::from(ErrorKind::ResourceBusy)));
        assert!(is_locked(&std::io::Error::from(ErrorKind::PermissionDenied)));
        assert!(!is_locked(&std::io::Error::from(ErrorKind::NotFound)));
    }

    #[tokio::test]
    async fn test_locked_child_is_removed_after_force_close() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path());
        let locked = dir.path().join("SingletonLock");
        fs::write(&locked, b"lock").await.unwrap();
        if !set_immutable(&locked) {
            return;
        }

        let holder = LockHolder {
            holds: vec![locked.clone()],
            force_closes: AtomicUsize::new(0),
        };
        let result = storage.clear(Some(&holder)).await;
        // Lift the flag before asserting so tempdir teardown always works.
        lift_immutable(&locked);

        result.unwrap();
        assert_eq!(holder.force_closes.load(Ordering::SeqCst), 1);
        assert!(!locked.exists());
    }

    #[tokio::test]
    async fn test_force_close_is_asked_at_most_once_per_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path());
        let first = dir.path().join("LOCK");
        let second = dir.path().join("SingletonCookie");
        fs::write(&first, b"a").await.unwrap();
        fs::write(&second, b"b").await.unwrap();
        if !set_immutable(&first) || !set_immutable(&second) {
            lift_immutable(&first);
            lift_immutable(&second);
            return;
        }

        // This holder releases nothing, so both children stay locked.
        let holder = LockHolder::default();
        let result = storage.clear(Some(&holder)).await;
        lift_immutable(&first);
        lift_immutable(&second);

        result.unwrap();
        assert_eq!(holder.force_closes.load(Ordering::SeqCst), 1);
        assert!(first.exists());
        assert!(second.exists());
    }
}
