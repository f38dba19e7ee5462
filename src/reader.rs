//! The tailing engine.

use crate::error::{Error, Result, SetupSource};
use crate::options::Options;
use crate::watcher::{ChangeKind, ChangeMask, ChangeNotifier, NotifyWatcher, WatchTarget};
use std::fs::Metadata;
use std::future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::{Pin, pin};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

/// Events that can mean new data, a truncation, or the file going away.
/// Truncation shows up as a metadata change on some platforms.
const DATA_EVENTS: ChangeMask = ChangeMask::NONE
    .union(ChangeKind::Create)
    .union(ChangeKind::Write)
    .union(ChangeKind::Remove)
    .union(ChangeKind::Rename)
    .union(ChangeKind::Attribute);

/// Reads bytes appended to a file by another process, following it across
/// truncation, deletion and replacement.
///
/// Reads are sequential and binary-safe. `read` resolves once new bytes are
/// available and reports end-of-stream as `Ok(0)`. The reader is meant for
/// a single consumer; every blocking call borrows it mutably.
///
/// Truncation is detected by comparing the read offset with the file size
/// seen on each pass. A file that shrinks and grows back past the old offset
/// between two checks is indistinguishable from one that only grew.
pub struct TailingReader<N: ChangeNotifier = NotifyWatcher> {
    target: WatchTarget,
    file: Option<OpenFile>,
    offset: u64,
    options: Options,
    notifier: N,
}

struct OpenFile {
    file: File,
    identity: Option<FileIdentity>,
}

/// Device and inode of an opened file, used to spot replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waited {
    Event(ChangeKind),
    TimedOut,
}

impl TailingReader<NotifyWatcher> {
    /// Tails `path` with [`Options::DEFAULT`].
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, Options::DEFAULT)
    }

    pub fn with_options<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let notifier = NotifyWatcher::new().map_err(|e| Error::Setup {
            path: path.as_ref().to_path_buf(),
            source: SetupSource::Notify(e),
        })?;
        Self::with_notifier(path, options, notifier)
    }
}

impl<N: ChangeNotifier> TailingReader<N> {
    /// Tails `path` using a caller-supplied change notifier, which is
    /// pointed at the file's parent directory.
    pub fn with_notifier<P: AsRef<Path>>(path: P, options: Options, mut notifier: N) -> Result<Self> {
        let target = WatchTarget::resolve(path.as_ref())?;

        notifier.watch(target.dir()).map_err(|e| Error::Setup {
            path: target.dir().to_path_buf(),
            source: SetupSource::Notify(e),
        })?;
        debug!(
            path = %target.path().display(),
            dir = %target.dir().display(),
            "watching for changes"
        );

        Ok(Self {
            target,
            file: None,
            offset: 0,
            options,
            notifier,
        })
    }

    pub fn path(&self) -> &Path {
        self.target.path()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Bytes delivered from the currently open handle.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Blocks until the file exists and returns its size. Always waits,
    /// whatever `wait_for_file` says, bounded by `wait_for_file_timeout`.
    ///
    /// Returns `Ok(None)` for end-of-stream: the timeout elapsed with
    /// `treat_timeouts_as_eof` set, or the open file was deleted with
    /// `close_on_delete` set.
    pub async fn wait_for_file(&mut self) -> Result<Option<u64>> {
        self.wait_for_file_until(future::pending::<()>()).await
    }

    /// [`wait_for_file`](Self::wait_for_file) that gives up with
    /// [`Error::Cancelled`] once `cancel` completes.
    pub async fn wait_for_file_until<F: Future>(&mut self, cancel: F) -> Result<Option<u64>> {
        let mut cancel = pin!(cancel);
        self.current_size(true, cancel.as_mut()).await
    }

    /// Reads newly available bytes into `buf`, waiting for them if needed.
    ///
    /// `Ok(0)` means end-of-stream and no further bytes will be produced,
    /// unless `buf` is empty. Timeouts and access errors leave the reader
    /// consistent, so the call may be retried.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_until(buf, future::pending::<()>()).await
    }

    /// [`read`](Self::read) that gives up with [`Error::Cancelled`] once
    /// `cancel` completes.
    pub async fn read_until<F: Future>(&mut self, buf: &mut [u8], cancel: F) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut cancel = pin!(cancel);

        loop {
            let Some(size) = self.current_size(false, cancel.as_mut()).await? else {
                return Ok(0);
            };

            if detect_file_truncation(size, self.offset) {
                debug!(
                    path = %self.target.path().display(),
                    offset = self.offset,
                    size,
                    "file truncated"
                );
                self.release_file();
                if self.options.close_on_truncate {
                    return Ok(0);
                }
                continue;
            }

            if has_unread_bytes(size, self.offset) {
                let n = self.read_available(buf).await?;
                if n > 0 {
                    return Ok(n);
                }
            }

            let limit = self.options.idle_limit();
            match self.wait_for(DATA_EVENTS, limit, cancel.as_mut()).await? {
                Waited::Event(ChangeKind::Remove | ChangeKind::Rename) => {
                    debug!(path = %self.target.path().display(), "file removed or renamed");
                    if self.options.close_on_delete {
                        self.release_file();
                        return Ok(0);
                    }
                    // With a known identity the next size check sees the
                    // deletion or replacement itself, and a stale event for
                    // a file already reopened must not rewind the offset.
                    if !self.tracks_identity() {
                        self.release_file();
                    }
                }
                Waited::Event(kind) => {
                    trace!(?kind, "change observed");
                }
                Waited::TimedOut => {
                    let timeout = self.options.idle_timeout;
                    debug!(path = %self.target.path().display(), ?timeout, "idle timeout");
                    if self.options.treat_timeouts_as_eof {
                        return Ok(0);
                    }
                    return Err(Error::IdleTimeout {
                        path: self.target.path().to_path_buf(),
                        timeout,
                    });
                }
            }
        }
    }

    /// Stops watching and releases the file handle. Dropping the reader
    /// releases the same resources but discards teardown errors.
    pub fn close(mut self) -> Result<()> {
        let closed = self.notifier.close();
        self.release_file();
        closed.map_err(Error::Notification)
    }

    /// Resolves the current size of the file, waiting for it to appear
    /// when allowed. `None` is end-of-stream.
    async fn current_size<F: Future>(
        &mut self,
        force_wait: bool,
        mut cancel: Pin<&mut F>,
    ) -> Result<Option<u64>> {
        loop {
            match tokio::fs::metadata(self.target.path()).await {
                Ok(metadata) => {
                    if !self.is_replaced_by(&metadata) {
                        return Ok(Some(metadata.len()));
                    }
                    debug!(path = %self.target.path().display(), "file replaced");
                    self.release_file();
                    if self.options.close_on_delete {
                        return Ok(None);
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if self.file.is_some() {
                        debug!(path = %self.target.path().display(), "file deleted");
                        self.release_file();
                        if self.options.close_on_delete {
                            return Ok(None);
                        }
                        continue;
                    }

                    if !self.options.wait_for_file && !force_wait {
                        return Err(Error::file_access(self.target.path(), e));
                    }

                    let limit = self.options.wait_for_file_limit();
                    let create = ChangeMask::from(ChangeKind::Create);
                    if self.wait_for(create, limit, cancel.as_mut()).await? == Waited::TimedOut {
                        let timeout = self.options.wait_for_file_timeout;
                        debug!(path = %self.target.path().display(), ?timeout, "wait for file timed out");
                        if self.options.treat_timeouts_as_eof {
                            return Ok(None);
                        }
                        return Err(Error::WaitTimeout {
                            path: self.target.path().to_path_buf(),
                            timeout,
                        });
                    }
                }
                Err(e) => return Err(Error::file_access(self.target.path(), e)),
            }
        }
    }

    /// Whether the open handle no longer refers to the file at the path.
    fn is_replaced_by(&self, metadata: &Metadata) -> bool {
        match (&self.file, file_identity(metadata)) {
            (Some(OpenFile { identity: Some(open), .. }), Some(current)) => *open != current,
            _ => false,
        }
    }

    fn tracks_identity(&self) -> bool {
        self.file.as_ref().is_some_and(|open| open.identity.is_some())
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let path = self.target.path();
        let open = match &mut self.file {
            Some(open) => open,
            slot @ None => {
                let file = File::open(path)
                    .await
                    .map_err(|e| Error::file_access(path, e))?;
                let identity = file.metadata().await.ok().as_ref().and_then(file_identity);
                debug!(path = %path.display(), "opened file");
                self.offset = 0;
                slot.insert(OpenFile { file, identity })
            }
        };

        let n = open
            .file
            .read(buf)
            .await
            .map_err(|e| Error::file_access(path, e))?;
        self.offset += n as u64;
        trace!(bytes = n, offset = self.offset, "read");
        Ok(n)
    }

    fn release_file(&mut self) {
        if self.file.take().is_some() {
            trace!(path = %self.target.path().display(), "released file handle");
        }
        self.offset = 0;
    }

    /// Waits for an event of a kind in `mask` on the exact target path.
    /// The timeout covers the whole wait, including skipped events.
    async fn wait_for<F: Future>(
        &mut self,
        mask: ChangeMask,
        limit: Option<Duration>,
        cancel: Pin<&mut F>,
    ) -> Result<Waited> {
        let target = &self.target;
        let notifier = &mut self.notifier;

        let matching = async {
            loop {
                match notifier.next_event().await {
                    Some(Ok(event)) if mask.contains(event.kind) && target.matches(&event.path) => {
                        return Ok(event.kind);
                    }
                    Some(Ok(event)) => trace!(?event, "ignored change"),
                    Some(Err(e)) => return Err(Error::Notification(e)),
                    None => return Err(Error::NotifierClosed),
                }
            }
        };

        let bounded = async {
            match limit {
                Some(limit) => match tokio::time::timeout(limit, matching).await {
                    Ok(result) => result.map(Waited::Event),
                    Err(_) => Ok(Waited::TimedOut),
                },
                None => matching.await.map(Waited::Event),
            }
        };

        tokio::select! {
            result = bounded => result,
            _ = cancel => Err(Error::Cancelled),
        }
    }
}

/// Detect if the file was truncated by comparing current size with the read offset
fn detect_file_truncation(current_size: u64, offset: u64) -> bool {
    current_size < offset
}

fn has_unread_bytes(current_size: u64, offset: u64) -> bool {
    current_size > offset
}

#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(FileIdentity {
        dev: metadata.dev(),
        ino: metadata.ino(),
    })
}

/// No stable identity off unix; replacement is caught by size comparison only.
#[cfg(not(unix))]
fn file_identity(_metadata: &Metadata) -> Option<FileIdentity> {
    None
}
