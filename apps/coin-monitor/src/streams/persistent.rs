//! File-backed change detection.
//!
//! A [`PersistentDiff`] reads its baseline from a plain-text file, emits
//! `(previous, current)` only when a value differs from the baseline, and
//! writes the latest value back from a background flusher.
//!
//! Writes are sampled: the flusher wakes every sample interval and writes
//! the newest unflushed value, if any. One final write happens when the
//! change stream is dropped. Write errors are logged and never reach the
//! stream.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::diff::changes;
use crate::infrastructure::metrics::{self, Outcome};

/// Default time between flushes.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

static OPEN_PATHS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Errors opening persisted state.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Another live [`PersistentDiff`] owns the file.
    #[error("state file already in use: {}", .0.display())]
    PathInUse(PathBuf),
}

/// Exclusive claim on a state file path, released on drop.
#[derive(Debug)]
struct PathLease(PathBuf);

impl PathLease {
    fn acquire(path: &Path) -> Result<Self, PersistError> {
        let mut open = OPEN_PATHS.lock();
        if open.insert(path.to_path_buf()) {
            Ok(Self(path.to_path_buf()))
        } else {
            Err(PersistError::PathInUse(path.to_path_buf()))
        }
    }
}

impl Drop for PathLease {
    fn drop(&mut self) {
        OPEN_PATHS.lock().remove(&self.0);
    }
}

/// Change detector whose baseline survives restarts.
#[derive(Debug)]
pub struct PersistentDiff<T> {
    lease: PathLease,
    baseline: T,
    sample_interval: Duration,
}

impl<T> PersistentDiff<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Claim `path` and load the baseline from it.
    ///
    /// A missing or unreadable file is treated as empty text; `deserialize`
    /// decides what empty or malformed text means.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::PathInUse`] if the path is already open.
    pub async fn open(
        path: impl Into<PathBuf>,
        deserialize: impl FnOnce(&str) -> T,
    ) -> Result<Self, PersistError> {
        let path = path.into();
        let lease = PathLease::acquire(&path)?;

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read state file");
                String::new()
            }
        };

        Ok(Self {
            lease,
            baseline: deserialize(&text),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        })
    }

    /// Override the flush interval.
    #[must_use]
    pub const fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Value loaded from the file.
    pub const fn baseline(&self) -> &T {
        &self.baseline
    }

    /// Path backing this diff.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lease.0
    }

    /// Emit changes of `stream` against the persisted baseline.
    ///
    /// Spawns the flusher; it holds the path until its final write.
    pub fn diff<S, F>(self, stream: S, serialize: F) -> PersistedChanges<T>
    where
        S: Stream<Item = T> + Send + 'static,
        F: Fn(&T) -> String + Send + 'static,
    {
        let pending = Arc::new(Mutex::new(None::<T>));
        let done = CancellationToken::new();

        let flusher = tokio::spawn(flush_loop(
            self.lease,
            Arc::clone(&pending),
            serialize,
            self.sample_interval,
            done.clone(),
        ));

        let inner = changes(stream, self.baseline)
            .inspect(move |(_, current)| {
                *pending.lock() = Some(current.clone());
            })
            .boxed();

        PersistedChanges {
            inner,
            done: done.drop_guard(),
            flusher,
        }
    }
}

/// Change stream returned by [`PersistentDiff::diff`].
///
/// Dropping it triggers the final flush; [`Self::close`] also waits for it.
pub struct PersistedChanges<T> {
    inner: BoxStream<'static, (T, T)>,
    done: DropGuard,
    flusher: JoinHandle<()>,
}

impl<T> PersistedChanges<T> {
    /// Stop the stream and wait until the final flush has been written.
    pub async fn close(self) {
        let Self { done, flusher, .. } = self;
        drop(done);
        if let Err(e) = flusher.await {
            tracing::error!(error = %e, "State flusher failed");
        }
    }
}

impl<T> Stream for PersistedChanges<T> {
    type Item = (T, T);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

async fn flush_loop<T, F>(
    lease: PathLease,
    pending: Arc<Mutex<Option<T>>>,
    serialize: F,
    interval: Duration,
    done: CancellationToken,
) where
    F: Fn(&T) -> String,
{
    let path = lease.0.as_path();

    loop {
        let finished = tokio::select! {
            () = done.cancelled() => true,
            () = tokio::time::sleep(interval) => false,
        };

        let latest = pending.lock().take();
        if let Some(value) = latest {
            write_state(path, serialize(&value)).await;
        }

        if finished {
            break;
        }
    }

    tracing::debug!(path = %path.display(), "State flusher stopped");
}

async fn write_state(path: &Path, contents: String) {
    let result = tokio::fs::write(path, contents).await;
    metrics::record_state_flush(Outcome::from(&result));
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "State flushed"),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to write state file"),
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use tempfile::TempDir;

    use super::*;

    fn parse_count(text: &str) -> u32 {
        text.trim().parse().unwrap_or(0)
    }

    /// Reopen until the flusher has released the path, then read it.
    async fn read_after_release(path: &Path) -> String {
        for _ in 0..200 {
            if let Ok(reopened) = PersistentDiff::open(path, parse_count).await {
                drop(reopened);
                return std::fs::read_to_string(path).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("state file never released");
    }

    #[tokio::test]
    async fn emits_only_changes_from_empty_baseline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("count.txt");

        let persistent = PersistentDiff::open(&path, parse_count).await.unwrap();
        assert_eq!(*persistent.baseline(), 0);

        let pairs: Vec<_> = persistent
            .diff(stream::iter([4, 4, 9]), u32::to_string)
            .collect()
            .await;

        assert_eq!(pairs, vec![(0, 4), (4, 9)]);
        assert_eq!(read_after_release(&path).await, "9");
    }

    #[tokio::test]
    async fn close_waits_for_final_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("count.txt");

        let mut pairs = PersistentDiff::open(&path, parse_count)
            .await
            .unwrap()
            .with_sample_interval(Duration::from_secs(3600))
            .diff(stream::iter([7]), u32::to_string);
        assert_eq!(pairs.next().await, Some((0, 7)));

        pairs.close().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "7");
        assert!(PersistentDiff::open(&path, parse_count).await.is_ok());
    }

    #[tokio::test]
    async fn baseline_comes_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("count.txt");
        std::fs::write(&path, "12965").unwrap();

        let persistent = PersistentDiff::open(&path, parse_count).await.unwrap();
        assert_eq!(*persistent.baseline(), 12_965);

        let pairs: Vec<_> = persistent
            .diff(stream::iter([12_965, 13_000]), u32::to_string)
            .collect()
            .await;
        assert_eq!(pairs, vec![(12_965, 13_000)]);
    }

    #[tokio::test]
    async fn malformed_file_uses_deserializer_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("count.txt");
        std::fs::write(&path, "not a number").unwrap();

        let persistent = PersistentDiff::open(&path, parse_count).await.unwrap();
        assert_eq!(*persistent.baseline(), 0);
    }

    #[tokio::test]
    async fn same_path_cannot_be_opened_twice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("count.txt");

        let first = PersistentDiff::open(&path, parse_count).await.unwrap();
        let second = PersistentDiff::open(&path, parse_count).await;
        assert!(matches!(second, Err(PersistError::PathInUse(p)) if p == path));

        drop(first);
        assert!(PersistentDiff::open(&path, parse_count).await.is_ok());
    }

    #[tokio::test]
    async fn flushes_periodically_while_stream_is_alive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("count.txt");
        let (tx, rx) = futures::channel::mpsc::unbounded();

        let mut pairs = PersistentDiff::open(&path, parse_count)
            .await
            .unwrap()
            .with_sample_interval(Duration::from_millis(20))
            .diff(rx, u32::to_string);

        tx.unbounded_send(5).unwrap();
        assert_eq!(pairs.next().await, Some((0, 5)));

        let mut contents = String::new();
        for _ in 0..200 {
            contents = std::fs::read_to_string(&path).unwrap_or_default();
            if contents == "5" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(contents, "5");
    }

    #[tokio::test]
    async fn write_failure_does_not_reach_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("count.txt");

        let pairs: Vec<_> = PersistentDiff::open(&path, parse_count)
            .await
            .unwrap()
            .with_sample_interval(Duration::from_millis(5))
            .diff(stream::iter([1, 2]), u32::to_string)
            .collect()
            .await;

        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
    }
}
