//! Atomic snapshot hand-off between the poll loop and the server.
//!
//! The poll loop publishes each rendered document through a
//! [`SnapshotPublisher`]; the server reads through a cloned
//! [`SnapshotHandle`]. The document is only ever replaced whole, never
//! mutated in place, so a scrape always sees a complete snapshot:
//!
//! - in memory, an `Arc<str>` swapped under a single lock,
//! - on disk, a sibling temp file renamed over the published path.
//!
//! A failed disk write is reported to the caller (and logged there) while
//! the in-memory swap still happens, so serving continues.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

/// Read side of the snapshot hand-off. Cheap to clone.
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Option<Arc<str>>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently published snapshot, if any cycle has completed.
    pub fn latest(&self) -> Option<Arc<str>> {
        self.inner.read().clone()
    }

    fn swap(&self, text: Arc<str>) {
        *self.inner.write() = Some(text);
    }
}

/// Write side of the snapshot hand-off, owned by the poll loop.
pub struct SnapshotPublisher {
    handle: SnapshotHandle,
    path: PathBuf,
}

impl SnapshotPublisher {
    /// `path` is where the rendered document is persisted on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            handle: SnapshotHandle::new(),
            path: path.into(),
        }
    }

    /// Returns a read handle for the server.
    pub fn handle(&self) -> SnapshotHandle {
        self.handle.clone()
    }

    /// Publishes a rendered snapshot: swaps the in-memory document, then
    /// writes the file via temp-path + rename. The swap happens first so a
    /// disk failure never blocks serving the fresh snapshot.
    pub fn publish(&self, text: String) -> io::Result<()> {
        self.handle.swap(Arc::from(text.as_str()));

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text.as_bytes())?;
        std::fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_empty_before_first_publish() {
        let publisher = SnapshotPublisher::new("/nonexistent/unused.prom");
        assert!(publisher.handle().latest().is_none());
    }

    #[test]
    fn publish_swaps_memory_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        let publisher = SnapshotPublisher::new(&path);
        let handle = publisher.handle();

        publisher.publish("a 1\n".to_string()).unwrap();
        assert_eq!(handle.latest().as_deref(), Some("a 1\n"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a 1\n");

        publisher.publish("a 2\n".to_string()).unwrap();
        assert_eq!(handle.latest().as_deref(), Some("a 2\n"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a 2\n");

        // No temp file is left behind after a successful rename.
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn disk_failure_still_swaps_memory() {
        let publisher = SnapshotPublisher::new("/nonexistent/dir/metrics.prom");
        let handle = publisher.handle();

        let result = publisher.publish("a 1\n".to_string());
        assert!(result.is_err());
        assert_eq!(handle.latest().as_deref(), Some("a 1\n"));
    }
}
