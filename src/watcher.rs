//! Change notification for the directory holding the tailed file.
//!
//! The engine only needs three things from a notifier: start watching a
//! directory, hand out the next change event, and stop. [`NotifyWatcher`]
//! does that over the `notify` crate; [`ChannelNotifier`] is an in-memory
//! source driven by hand, for tests and embedders that already receive
//! change events some other way.

use crate::error::{Error, Result, SetupSource};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// The kinds of change the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
    /// Metadata change. Some platforms report truncation only this way.
    Attribute,
}

impl ChangeKind {
    const fn bit(self) -> u8 {
        match self {
            ChangeKind::Create => 1,
            ChangeKind::Write => 1 << 1,
            ChangeKind::Remove => 1 << 2,
            ChangeKind::Rename => 1 << 3,
            ChangeKind::Attribute => 1 << 4,
        }
    }
}

/// A set of [`ChangeKind`]s, built with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeMask(u8);

impl ChangeMask {
    pub const NONE: ChangeMask = ChangeMask(0);

    pub const fn contains(self, kind: ChangeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// `self | kind`, usable in constants.
    pub const fn union(self, kind: ChangeKind) -> ChangeMask {
        ChangeMask(self.0 | kind.bit())
    }
}

impl From<ChangeKind> for ChangeMask {
    fn from(kind: ChangeKind) -> Self {
        ChangeMask(kind.bit())
    }
}

impl BitOr for ChangeKind {
    type Output = ChangeMask;

    fn bitor(self, rhs: ChangeKind) -> ChangeMask {
        ChangeMask(self.bit() | rhs.bit())
    }
}

impl BitOr<ChangeKind> for ChangeMask {
    type Output = ChangeMask;

    fn bitor(self, rhs: ChangeKind) -> ChangeMask {
        self.union(rhs)
    }
}

/// A single change to a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Source of change events for the immediate children of a directory.
pub trait ChangeNotifier: Send {
    /// Starts delivering events for `dir`.
    fn watch(&mut self, dir: &Path) -> notify::Result<()>;

    /// Waits for the next event, in delivery order. `None` once the source
    /// has shut down.
    fn next_event(&mut self) -> impl Future<Output = Option<notify::Result<ChangeEvent>>> + Send;

    /// Stops watching. Events already queued may be discarded.
    fn close(&mut self) -> notify::Result<()>;
}

/// [`ChangeNotifier`] backed by the platform's recommended `notify` watcher.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<ChangeEvent>>,
    watched: Option<PathBuf>,
}

impl NotifyWatcher {
    pub fn new() -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in translate_event(event) {
                        let _ = tx.send(Ok(change));
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                }
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher,
            receiver: rx,
            watched: None,
        })
    }
}

impl ChangeNotifier for NotifyWatcher {
    fn watch(&mut self, dir: &Path) -> notify::Result<()> {
        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched = Some(dir.to_path_buf());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<notify::Result<ChangeEvent>> {
        self.receiver.recv().await
    }

    fn close(&mut self) -> notify::Result<()> {
        self.receiver.close();
        match self.watched.take() {
            Some(dir) => self.watcher.unwatch(&dir),
            None => Ok(()),
        }
    }
}

/// In-memory [`ChangeNotifier`]; events are injected through its
/// [`ChannelNotifierHandle`].
pub struct ChannelNotifier {
    receiver: mpsc::UnboundedReceiver<notify::Result<ChangeEvent>>,
    watched: Option<PathBuf>,
}

/// Sending half of a [`ChannelNotifier`]. The notifier reports shutdown
/// once every handle is dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifierHandle {
    sender: mpsc::UnboundedSender<notify::Result<ChangeEvent>>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, ChannelNotifierHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                receiver,
                watched: None,
            },
            ChannelNotifierHandle { sender },
        )
    }

    /// The directory passed to the last `watch` call.
    pub fn watched(&self) -> Option<&Path> {
        self.watched.as_deref()
    }
}

impl ChannelNotifierHandle {
    /// Returns false if the notifier is gone.
    pub fn send(&self, path: impl Into<PathBuf>, kind: ChangeKind) -> bool {
        self.sender.send(Ok(ChangeEvent::new(path, kind))).is_ok()
    }

    pub fn send_error(&self, error: notify::Error) -> bool {
        self.sender.send(Err(error)).is_ok()
    }
}

impl ChangeNotifier for ChannelNotifier {
    fn watch(&mut self, dir: &Path) -> notify::Result<()> {
        self.watched = Some(dir.to_path_buf());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<notify::Result<ChangeEvent>> {
        self.receiver.recv().await
    }

    fn close(&mut self) -> notify::Result<()> {
        self.receiver.close();
        self.watched = None;
        Ok(())
    }
}

/// Splits a `notify` event into one [`ChangeEvent`] per affected path.
pub(crate) fn translate_event(event: Event) -> Vec<ChangeEvent> {
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
        // paths are [from, to]
        let mut paths = event.paths.into_iter();
        let from = paths.next().map(|p| ChangeEvent::new(p, ChangeKind::Rename));
        let to = paths.next().map(|p| ChangeEvent::new(p, ChangeKind::Create));
        return from.into_iter().chain(to).collect();
    }

    event
        .paths
        .into_iter()
        .filter_map(|path| classify(&event.kind, &path).map(|kind| ChangeEvent::new(path, kind)))
        .collect()
}

fn classify(kind: &EventKind, path: &Path) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeKind::Attribute),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Rename),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Create),
        // backends that cannot tell the two ends of a rename apart
        EventKind::Modify(ModifyKind::Name(_)) => Some(if path.exists() {
            ChangeKind::Create
        } else {
            ChangeKind::Rename
        }),
        EventKind::Modify(_) => Some(ChangeKind::Write),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// The tailed path together with the directory that gets watched.
#[derive(Debug, Clone)]
pub(crate) struct WatchTarget {
    path: PathBuf,
    dir: PathBuf,
    canonical: PathBuf,
}

impl WatchTarget {
    /// Fails with [`Error::Setup`] when the parent directory cannot be
    /// resolved.
    pub(crate) fn resolve(path: &Path) -> Result<Self> {
        let file_name = path.file_name().ok_or_else(|| Error::InvalidPath {
            message: format!("{} has no file name", path.display()),
        })?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = std::fs::canonicalize(parent).map_err(|e| Error::Setup {
            path: parent.to_path_buf(),
            source: SetupSource::Io(e),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            canonical: dir.join(file_name),
            dir,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Exact match only: sibling files in the watched directory never match.
    pub(crate) fn matches(&self, path: &Path) -> bool {
        path == self.canonical || path == self.path
    }
}
