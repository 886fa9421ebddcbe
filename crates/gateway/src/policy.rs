//! Policy Snapshot Loader: reads the externally-supplied policy
//! decision file and holds the current fail-closed snapshot, refreshed
//! either on demand or by a background file watch.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use infergate_core::{PolicyDecisionFile, PolicySnapshot};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Reads `POLICY_DECISION_PATH` and exposes the current [`PolicySnapshot`].
/// Missing or malformed files fail closed: the snapshot is read fresh on
/// [`PolicySnapshotLoader::reload`] and cached in between, a short-TTL cache
/// over the on-disk file.
pub struct PolicySnapshotLoader {
    path: PathBuf,
    current: RwLock<PolicySnapshot>,
}

impl PolicySnapshotLoader {
    /// Read `path` once and build a loader holding that initial snapshot.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = read_snapshot(&path);
        Self {
            path,
            current: RwLock::new(initial),
        }
    }

    /// The most recently loaded snapshot.
    #[must_use]
    pub fn current(&self) -> PolicySnapshot {
        self.current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Re-read the policy decision file and replace the cached snapshot.
    pub fn reload(&self) {
        let snapshot = read_snapshot(&self.path);
        info!(ok = snapshot.ok, path = %self.path.display(), "policy snapshot reloaded");
        *self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = snapshot;
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_snapshot(path: &Path) -> PolicySnapshot {
    let source = path.display().to_string();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => return PolicySnapshot::fail_closed(source, e.to_string()),
    };
    match serde_json::from_str::<PolicyDecisionFile>(&raw) {
        Ok(file) => PolicySnapshot::from_file(source, file),
        Err(e) => PolicySnapshot::fail_closed(source, e.to_string()),
    }
}

/// Spawns a `notify`-backed background watch that calls
/// [`PolicySnapshotLoader::reload`] whenever the policy decision file
/// changes, debounced so editor save cycles trigger one reload instead of
/// several.
pub struct PolicyFileWatch {
    _watcher: RecommendedWatcher,
}

impl PolicyFileWatch {
    /// Start watching `loader`'s file. `loader` must outlive the returned
    /// handle (typically held in the same `Arc` as the rest of app state).
    ///
    /// # Errors
    ///
    /// Returns a `notify` error if the underlying OS watch cannot be set up.
    pub fn spawn(
        loader: std::sync::Arc<PolicySnapshotLoader>,
    ) -> Result<Self, notify::Error> {
        let watch_dir = loader
            .path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = loader
            .path()
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();

        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(16);
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) if is_relevant_event(event.kind) => {
                    let is_our_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().is_some_and(|n| n == file_name.as_os_str()));
                    if is_our_file {
                        let _ = tx.try_send(());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "policy file watcher error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        info!(path = %loader.path().display(), "policy file watch started");

        tokio::spawn(async move {
                loop {
                    if rx.recv().await.is_none() {
                        debug!("policy watcher channel closed, shutting down");
                        break;
                    }
                    tokio::time::sleep(DEFAULT_DEBOUNCE).await;
                    while rx.try_recv().is_ok() {}
                    loader.reload();
                }
        });

        Ok(Self { _watcher: watcher })
    }
}

impl std::fmt::Debug for PolicyFileWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyFileWatch").finish_non_exhaustive()
    }
}

fn is_relevant_event(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_fails_closed() {
        let loader = PolicySnapshotLoader::new("/nonexistent/policy.json");
        assert!(!loader.current().ok);
    }

    #[test]
    fn malformed_file_fails_closed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let loader = PolicySnapshotLoader::new(file.path());
        assert!(!loader.current().ok);
    }

    #[test]
    fn valid_file_loads_and_reload_picks_up_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"enable_extract": true}"#).unwrap();
        let loader = PolicySnapshotLoader::new(file.path());
        assert!(loader.current().ok);
        assert!(loader.current().enable_extract.unwrap_or(false));

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(loader.path())
            .unwrap();
        file.write_all(br#"{"enable_extract": false}"#).unwrap();
        loader.reload();
        assert!(!loader.current().enable_extract.unwrap_or(true));
    }

    #[test]
    fn is_relevant_event_filters_access() {
        assert!(!is_relevant_event(EventKind::Access(
                    notify::event::AccessKind::Read
        )));
        assert!(is_relevant_event(EventKind::Modify(
                    notify::event::ModifyKind::Data(notify::event::DataChange::Content)
        )));
    }
}
